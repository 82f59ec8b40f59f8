use std::{
    fmt,
    hash::{Hash, Hasher},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use typebus_error::{DeliveryError, QueueError};

use super::{Payload, Priority, PriorityQueue};

static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

/// Уникальный в пределах процесса идентификатор подписчика.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

/// Приёмник сообщений подписчика (исходящий API брокера).
///
/// Брокер вызывает [`Inbox::deliver`] для каждого подходящего сообщения.
/// Реализация может приостанавливать вызывающего (backpressure).
#[async_trait]
pub trait Inbox: Send + Sync {
    async fn deliver(
        &self,
        payload: Payload,
        priority: Priority,
    ) -> Result<(), DeliveryError>;

    /// Закрытый inbox больше не принимает сообщения.
    fn is_closed(&self) -> bool;
}

/// Handle подписчика: идентификатор плюс ссылка на его inbox.
///
/// Равенство и хеш: только по идентификатору, поэтому клоны одного handle
/// считаются одним подписчиком.
#[derive(Clone)]
pub struct SubscriberHandle {
    id: SubscriberId,
    inbox: Arc<dyn Inbox>,
}

/// Входящая очередь подписчика с приоритетами.
///
/// Создаётся вместе с handle через [`Mailbox::new`]. При `Drop` очередь
/// закрывается, и брокер перестаёт считать handle действительным.
pub struct Mailbox {
    id: SubscriberId,
    queue: Arc<PriorityQueue<Payload>>,
}

/// Inbox, который пишет в очередь [`Mailbox`].
struct MailboxInbox {
    id: SubscriberId,
    queue: Arc<PriorityQueue<Payload>>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl SubscriberId {
    pub fn next() -> Self {
        Self(NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl SubscriberHandle {
    /// Оборачивает произвольный inbox в handle с новым идентификатором.
    pub fn new(inbox: Arc<dyn Inbox>) -> Self {
        Self::with_id(SubscriberId::next(), inbox)
    }

    /// Handle с заданным id. Равенство и хеш handle определяются только id,
    /// поэтому id не должен повторяться для разных inbox'ов: снаружи handle
    /// создаются через [`SubscriberHandle::new`] или [`Mailbox::new`].
    pub(crate) fn with_id(
        id: SubscriberId,
        inbox: Arc<dyn Inbox>,
    ) -> Self {
        Self { id, inbox }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.inbox.is_closed()
    }

    /// Доставка обычного сообщения.
    pub async fn deliver(
        &self,
        payload: Payload,
    ) -> Result<(), DeliveryError> {
        self.inbox.deliver(payload, Priority::Payload).await
    }

    /// Доставка управляющего сообщения: в inbox оно обгонит ещё не
    /// прочитанные обычные сообщения.
    pub async fn send_control(
        &self,
        payload: Payload,
    ) -> Result<(), DeliveryError> {
        self.inbox.deliver(payload, Priority::Control).await
    }
}

impl Mailbox {
    pub fn new() -> (SubscriberHandle, Mailbox) {
        let id = SubscriberId::next();
        let queue = Arc::new(PriorityQueue::new());
        let inbox = MailboxInbox {
            id,
            queue: queue.clone(),
        };
        (
            SubscriberHandle::with_id(id, Arc::new(inbox)),
            Mailbox { id, queue },
        )
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Асинхронно ожидает следующее сообщение.
    ///
    /// # Возвращает
    /// - `Ok(Payload)`: очередное сообщение
    /// - `Err(QueueError::Closed)`: mailbox закрыт и пуст
    pub async fn recv(&self) -> Result<Payload, QueueError> {
        self.queue.dequeue().await
    }

    /// Пытается получить сообщение без ожидания.
    pub fn try_recv(&self) -> Result<Option<Payload>, QueueError> {
        self.queue.try_dequeue()
    }

    /// Закрывает mailbox: новые доставки отклоняются, уже полученные
    /// сообщения остаются доступны.
    pub fn close(&self) {
        self.queue.shutdown();
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[async_trait]
impl Inbox for MailboxInbox {
    async fn deliver(
        &self,
        payload: Payload,
        priority: Priority,
    ) -> Result<(), DeliveryError> {
        self.queue
            .enqueue(payload, priority)
            .map_err(|_| DeliveryError::InboxClosed {
                subscriber: self.id.get(),
            })
    }

    fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Drop for Mailbox {
    fn drop(&mut self) {
        self.queue.shutdown();
    }
}

impl PartialEq for SubscriberHandle {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.id == other.id
    }
}

impl Eq for SubscriberHandle {}

impl Hash for SubscriberHandle {
    fn hash<H: Hasher>(
        &self,
        state: &mut H,
    ) {
        self.id.hash(state);
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

impl fmt::Debug for SubscriberHandle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("SubscriberHandle")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl fmt::Debug for Mailbox {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("id", &self.id)
            .field("queue", &self.queue)
            .finish()
    }
}
