use std::any::Any;

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибки приёма запроса брокером.
///
/// Возвращаются синхронно в момент постановки запроса в очередь и
/// никогда не повторяются брокером автоматически.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// Брокер остановлен и больше не принимает запросы.
    #[error("broker '{broker}' is stopped")]
    Stopped { broker: String },

    /// Handle подписчика недействителен (его inbox уже закрыт).
    #[error("subscriber #{subscriber} has a closed inbox")]
    InvalidHandle { subscriber: u64 },
}

/// Ошибки очереди с приоритетами.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Очередь остановлена: новые элементы не принимаются, а потребитель
    /// получает эту ошибку после того, как вычитал всё оставшееся.
    #[error("queue is closed")]
    Closed,
}

/// Ошибки доставки сообщения в inbox подписчика.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("inbox of subscriber #{subscriber} is closed")]
    InboxClosed { subscriber: u64 },
}

impl ErrorExt for BrokerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Stopped { .. } => StatusCode::BrokerStopped,
            Self::InvalidHandle { .. } => StatusCode::InvalidHandle,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        match self {
            Self::Stopped { .. } => "Broker is stopped".to_string(),
            Self::InvalidHandle { .. } => "Subscriber handle is no longer valid".to_string(),
        }
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("error_type", "broker_request".to_string()),
            ("status_code", self.status_code().to_string()),
        ];

        match self {
            Self::Stopped { broker } => tags.push(("broker", broker.clone())),
            Self::InvalidHandle { subscriber } => {
                tags.push(("subscriber", subscriber.to_string()))
            }
        }

        tags
    }
}

impl ErrorExt for QueueError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Closed => StatusCode::QueueClosed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn client_message(&self) -> String {
        "Queue closed".to_string()
    }
}

impl ErrorExt for DeliveryError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InboxClosed { .. } => StatusCode::InboxClosed,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn metrics_tags(&self) -> Vec<(&'static str, String)> {
        let Self::InboxClosed { subscriber } = self;
        vec![
            ("error_type", "pubsub_delivery".to_string()),
            ("status_code", self.status_code().to_string()),
            ("subscriber", subscriber.to_string()),
        ]
    }
}
