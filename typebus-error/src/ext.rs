use std::{any::Any, error::Error};

use crate::StatusCode;

/// Расширение для ошибок брокера (object-safe).
///
/// Даёт статус-код, безопасное сообщение для вызывающей стороны,
/// детальное сообщение для логов и теги для метрик.
pub trait ErrorExt: Error + Send + Sync + 'static {
    /// По умолчанию [`StatusCode::Internal`].
    fn status_code(&self) -> StatusCode {
        StatusCode::Internal
    }

    /// Возвращает ошибку как [`Any`](std::any::Any) для downcast.
    fn as_any(&self) -> &dyn Any;

    /// Сообщение для вызывающей стороны без внутренних деталей.
    fn client_message(&self) -> String {
        match self.status_code() {
            StatusCode::Internal => "Internal broker error".to_string(),
            _ => self.to_string(),
        }
    }

    /// Детализированное сообщение для логов.
    fn log_message(&self) -> String {
        format!("{self:?}")
    }

    /// Набор тегов для систем наблюдаемости.
    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        vec![
            ("error_type", self.type_name()),
            ("status_code", self.status_code().to_string()),
        ]
    }

    /// Короткое имя типа ошибки (без пути модуля).
    fn type_name(&self) -> String {
        std::any::type_name::<Self>()
            .split("::")
            .last()
            .unwrap_or("Unknown")
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::{any::Any, fmt};

    use super::*;

    #[derive(Debug)]
    struct OpaqueError;

    impl fmt::Display for OpaqueError {
        fn fmt(
            &self,
            f: &mut fmt::Formatter<'_>,
        ) -> fmt::Result {
            write!(f, "worker panicked at slot 3")
        }
    }

    impl Error for OpaqueError {}

    impl ErrorExt for OpaqueError {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct StoppedError;

    impl fmt::Display for StoppedError {
        fn fmt(
            &self,
            f: &mut fmt::Formatter<'_>,
        ) -> fmt::Result {
            write!(f, "broker stopped")
        }
    }

    impl Error for StoppedError {}

    impl ErrorExt for StoppedError {
        fn status_code(&self) -> StatusCode {
            StatusCode::BrokerStopped
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    /// Тест проверяет, что внутренние детали не утекают в client_message.
    #[test]
    fn test_client_message_hides_internal() {
        let e = OpaqueError;
        assert_eq!(e.status_code(), StatusCode::Internal);
        assert_eq!(e.client_message(), "Internal broker error");
    }

    #[test]
    fn test_client_message_non_internal() {
        let e = StoppedError;
        assert_eq!(e.client_message(), "broker stopped");
    }

    #[test]
    fn test_as_any_downcast() {
        let e = StoppedError;
        assert!(e.as_any().downcast_ref::<StoppedError>().is_some());
        assert!(e.as_any().downcast_ref::<OpaqueError>().is_none());
    }

    #[test]
    fn test_metrics_tags_and_type_name() {
        let e = StoppedError;
        let tags = e.metrics_tags();
        assert!(tags
            .iter()
            .any(|(k, v)| *k == "status_code" && v == &StatusCode::BrokerStopped.to_string()));
        assert!(e.type_name().ends_with("StoppedError"));
    }
}
