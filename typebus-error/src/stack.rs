use std::{fmt, panic::Location, sync::Arc};

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::{ErrorExt, StatusCode};

/// Ошибка брокера вместе с путём, по которому она поднялась.
///
/// `origin` указывает на место, где корневая ошибка превратилась в
/// `StackError` (обычно это `?` в методе брокера или загрузчике
/// настроек). Каждый вызов [`StackError::context`] добавляет кадр с
/// местом вызова.
#[derive(Clone)]
pub struct StackError {
    root: Arc<dyn ErrorExt>,
    origin: &'static Location<'static>,
    frames: Vec<Frame>,
}

/// Один кадр контекста.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub message: String,
    pub location: &'static Location<'static>,
}

/// Ответ для host-процесса: код, безопасное сообщение и кадры контекста
/// от внешнего к внутреннему.
#[cfg(feature = "serde")]
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u32,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contexts: Vec<String>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StackError {
    #[track_caller]
    pub fn new<E: ErrorExt>(err: E) -> Self {
        Self {
            root: Arc::new(err),
            origin: Location::caller(),
            frames: Vec::new(),
        }
    }

    /// Добавляет внешний кадр контекста.
    #[track_caller]
    pub fn context(
        mut self,
        msg: impl Into<String>,
    ) -> Self {
        self.frames.push(Frame {
            message: msg.into(),
            location: Location::caller(),
        });
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.root.status_code()
    }

    pub fn client_message(&self) -> String {
        self.root.client_message()
    }

    pub fn root(&self) -> &dyn ErrorExt {
        self.root.as_ref()
    }

    /// Место, где была создана ошибка.
    pub fn origin(&self) -> &'static Location<'static> {
        self.origin
    }

    /// Кадры в порядке добавления: первым идёт ближайший к корню.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Теги корневой ошибки плюс глубина контекста.
    pub fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = self.root.metrics_tags();
        tags.push(("context_depth", self.frames.len().to_string()));
        tags
    }

    pub fn downcast_ref<T: ErrorExt + 'static>(&self) -> Option<&T> {
        self.root.as_any().downcast_ref::<T>()
    }

    #[cfg(feature = "serde")]
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.status_code().code(),
            message: self.client_message(),
            contexts: self
                .frames
                .iter()
                .rev()
                .map(|frame| frame.message.clone())
                .collect(),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для StackError
////////////////////////////////////////////////////////////////////////////////

impl fmt::Display for Frame {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "{} at {}:{}",
            self.message,
            self.location.file(),
            self.location.line()
        )
    }
}

impl fmt::Debug for StackError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let frames: Vec<String> = self.frames.iter().rev().map(Frame::to_string).collect();
        f.debug_struct("StackError")
            .field("root", &self.root.log_message())
            .field("status_code", &self.status_code())
            .field(
                "origin",
                &format_args!("{}:{}", self.origin.file(), self.origin.line()),
            )
            .field("frames", &frames)
            .finish()
    }
}

/// Внешний контекст первым, корневая ошибка последней:
/// `start billing: subscribe to OrderPlaced: subscriber #3 has a closed inbox`.
impl fmt::Display for StackError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        for frame in self.frames.iter().rev() {
            write!(f, "{}: ", frame.message)?;
        }
        write!(f, "{}", self.root)
    }
}

impl std::error::Error for StackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.root.as_ref())
    }
}

impl<E: ErrorExt> From<E> for StackError {
    #[track_caller]
    fn from(e: E) -> Self {
        StackError::new(e)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BrokerError, DeliveryError, QueueError};

    /// Тест проверяет порядок кадров и место их добавления.
    #[test]
    fn test_frames_record_callers() {
        let stack = StackError::new(BrokerError::InvalidHandle { subscriber: 3 })
            .context("subscribe to OrderPlaced")
            .context("start billing");

        assert_eq!(stack.frames().len(), 2);
        assert_eq!(stack.frames()[0].message, "subscribe to OrderPlaced");
        assert_eq!(stack.frames()[1].message, "start billing");
        assert!(stack.frames()[0].location.file().ends_with("stack.rs"));
        assert!(stack.origin().file().ends_with("stack.rs"));
        assert_eq!(stack.status_code(), StatusCode::InvalidHandle);
    }

    /// Тест проверяет, что `?` запоминает место конвертации.
    #[test]
    fn test_origin_points_at_question_mark() {
        fn deliver() -> Result<(), StackError> {
            Err::<(), _>(DeliveryError::InboxClosed { subscriber: 9 })?;
            Ok(())
        }

        let err = deliver().unwrap_err();
        assert!(err.origin().file().ends_with("stack.rs"));
        assert!(err.frames().is_empty());
    }

    #[test]
    fn test_downcast() {
        let stack = StackError::new(QueueError::Closed);
        assert!(stack.downcast_ref::<QueueError>().is_some());
        assert!(stack.downcast_ref::<BrokerError>().is_none());
    }

    /// Тест проверяет, что `Display` читается от внешнего кадра к корню.
    #[test]
    fn test_display_outermost_first() {
        let stack = StackError::new(BrokerError::Stopped {
            broker: "audit".to_string(),
        })
        .context("publish audit record")
        .context("close fiscal day");

        assert_eq!(
            stack.to_string(),
            "close fiscal day: publish audit record: broker 'audit' is stopped"
        );

        let bare = StackError::new(QueueError::Closed);
        assert_eq!(bare.to_string(), "queue is closed");
    }

    #[test]
    fn test_metrics_tags_include_depth() {
        let stack = StackError::new(DeliveryError::InboxClosed { subscriber: 4 })
            .context("fan out OrderPlaced");
        let tags = stack.metrics_tags();

        assert!(tags.iter().any(|(k, v)| *k == "subscriber" && v == "4"));
        assert!(tags.iter().any(|(k, v)| *k == "context_depth" && v == "1"));
    }

    #[test]
    fn test_debug_lists_frames() {
        let stack = StackError::new(QueueError::Closed).context("drain mailbox");
        let debug = format!("{stack:?}");

        assert!(debug.contains("QueueClosed"));
        assert!(debug.contains("drain mailbox at"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_response_outermost_first() {
        let stack = StackError::new(QueueError::Closed)
            .context("drain")
            .context("shutdown");
        let response = stack.to_response();
        assert_eq!(response.code, StatusCode::QueueClosed.code());
        assert_eq!(response.contexts, vec!["shutdown", "drain"]);

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("Queue closed"));

        let bare = serde_json::to_string(&StackError::new(QueueError::Closed).to_response())
            .unwrap();
        assert!(!bare.contains("contexts"));
    }
}
