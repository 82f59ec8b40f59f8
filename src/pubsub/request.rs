use std::fmt;

use tokio::sync::oneshot;

use super::{Classify, Payload, Priority, SubscriberHandle, TypeKey};

/// Запрос к брокеру в том виде, в каком он лежит в очереди.
pub enum Request {
    /// Подписка handle на точный ключ типа.
    Subscribe {
        handle: SubscriberHandle,
        key: TypeKey,
    },
    /// Отписка handle от ключа типа.
    Unsubscribe {
        handle: SubscriberHandle,
        key: TypeKey,
    },
    /// Снятие handle со всех ключей, на которые он подписан.
    UnsubscribeAll { handle: SubscriberHandle },
    /// Публикация. `None`: пустая публикация, которая ничего не доставляет.
    Publish(Option<Payload>),
    /// Барьер: срабатывает, когда цикл обработки дошёл до него.
    Flush(oneshot::Sender<()>),
}

impl Request {
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Subscribe { .. } => "subscribe",
            Request::Unsubscribe { .. } => "unsubscribe",
            Request::UnsubscribeAll { .. } => "unsubscribe_all",
            Request::Publish(_) => "publish",
            Request::Flush(_) => "flush",
        }
    }
}

/// Подписка и отписка идут как управляющие сообщения, остальное как обычные.
impl Classify for Request {
    fn classify(&self) -> Priority {
        match self {
            Request::Subscribe { .. }
            | Request::Unsubscribe { .. }
            | Request::UnsubscribeAll { .. } => Priority::Control,
            _ => Priority::Payload,
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Request::Subscribe { handle, key } | Request::Unsubscribe { handle, key } => f
                .debug_struct(self.kind())
                .field("subscriber", &handle.id())
                .field("key", key)
                .finish(),
            Request::UnsubscribeAll { handle } => f
                .debug_struct(self.kind())
                .field("subscriber", &handle.id())
                .finish(),
            Request::Publish(payload) => f.debug_tuple("publish").field(payload).finish(),
            Request::Flush(_) => f.write_str("flush"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pubsub::{Mailbox, Object};

    #[test]
    fn test_classify_control_and_payload() {
        let (handle, _mailbox) = Mailbox::new();
        let key = TypeKey::of::<Object>();
        let (tx, _rx) = oneshot::channel();

        let subscribe = Request::Subscribe {
            handle: handle.clone(),
            key,
        };
        let unsubscribe = Request::Unsubscribe {
            handle: handle.clone(),
            key,
        };
        let unsubscribe_all = Request::UnsubscribeAll { handle };

        assert_eq!(subscribe.classify(), Priority::Control);
        assert_eq!(unsubscribe.classify(), Priority::Control);
        assert_eq!(unsubscribe_all.classify(), Priority::Control);
        assert_eq!(unsubscribe_all.kind(), "unsubscribe_all");
        assert_eq!(
            Request::Publish(Some(Payload::from("x"))).classify(),
            Priority::Payload
        );
        assert_eq!(Request::Publish(None).classify(), Priority::Payload);
        assert_eq!(Request::Flush(tx).classify(), Priority::Payload);
    }

    /// Тест проверяет, что публикация строки, даже если это текст
    /// "subscribe", остаётся обычным сообщением.
    #[test]
    fn test_payload_content_does_not_affect_class() {
        let request = Request::Publish(Some(Payload::from("subscribe")));
        assert_eq!(request.classify(), Priority::Payload);
        assert_eq!(request.kind(), "publish");
    }
}
