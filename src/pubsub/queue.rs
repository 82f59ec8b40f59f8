use std::{
    cmp::{Ordering, Reverse},
    collections::BinaryHeap,
};

use parking_lot::Mutex;
use tokio::sync::Notify;
use typebus_error::QueueError;

/// Класс приоритета элемента очереди.
///
/// Меньшее значение извлекается раньше: все `Control` идут перед всеми
/// `Payload`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Priority {
    /// Управляющие сообщения: подписка и отписка.
    Control = 0,
    /// Всё остальное.
    Payload = 1,
}

/// Классификатор сообщений для очереди с приоритетами.
pub trait Classify {
    fn classify(&self) -> Priority;
}

/// Неограниченная очередь с приоритетами и FIFO внутри класса.
///
/// Порядок извлечения: по возрастанию `(priority, sequence)`, где
/// `sequence` это номер поступления. Постановка никогда не блокируется;
/// извлечение приостанавливает потребителя, пока очередь пуста.
///
/// После [`PriorityQueue::shutdown`] новые элементы отклоняются, а уже
/// принятые вычитываются до конца, после чего `dequeue` возвращает
/// [`QueueError::Closed`].
pub struct PriorityQueue<T> {
    inner: Mutex<Inner<T>>,
    notify: Notify,
}

struct Inner<T> {
    heap: BinaryHeap<Reverse<QueuedItem<T>>>,
    next_seq: u64,
    closed: bool,
}

/// Элемент очереди вместе с ключом сортировки.
struct QueuedItem<T> {
    priority: Priority,
    seq: u64,
    item: T,
}

impl<T> PriorityQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                next_seq: 0,
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Ставит элемент в очередь с заданным классом приоритета.
    pub fn enqueue(
        &self,
        item: T,
        priority: Priority,
    ) -> Result<(), QueueError> {
        {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(QueueError::Closed);
            }
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.heap.push(Reverse(QueuedItem {
                priority,
                seq,
                item,
            }));
        }
        self.notify.notify_one();
        Ok(())
    }

    /// Извлекает следующий элемент, ожидая его появления.
    pub async fn dequeue(&self) -> Result<T, QueueError> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Регистрируемся до проверки, чтобы не потерять notify_one
            // между проверкой и ожиданием.
            notified.as_mut().enable();

            if let Some(item) = self.try_dequeue()? {
                return Ok(item);
            }

            notified.await;
        }
    }

    /// Неблокирующее извлечение.
    ///
    /// `Ok(None)`: очередь пуста, но открыта.
    pub fn try_dequeue(&self) -> Result<Option<T>, QueueError> {
        let mut inner = self.inner.lock();
        match inner.heap.pop() {
            Some(Reverse(queued)) => Ok(Some(queued.item)),
            None if inner.closed => Err(QueueError::Closed),
            None => Ok(None),
        }
    }

    /// Закрывает очередь для новых элементов и будит ожидающих.
    pub fn shutdown(&self) {
        self.inner.lock().closed = true;
        self.notify.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().heap.is_empty()
    }

    /// Количество ожидающих элементов указанного класса.
    pub fn len_of(
        &self,
        priority: Priority,
    ) -> usize {
        self.inner
            .lock()
            .heap
            .iter()
            .filter(|Reverse(queued)| queued.priority == priority)
            .count()
    }
}

impl<T: Classify> PriorityQueue<T> {
    /// Ставит элемент в очередь, определяя класс классификатором.
    pub fn push(
        &self,
        item: T,
    ) -> Result<(), QueueError> {
        let priority = item.classify();
        self.enqueue(item, priority)
    }
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for PriorityQueue<T> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("PriorityQueue")
            .field("len", &inner.heap.len())
            .field("closed", &inner.closed)
            .finish()
    }
}

impl<T> QueuedItem<T> {
    fn sort_key(&self) -> (Priority, u64) {
        (self.priority, self.seq)
    }
}

impl<T> PartialEq for QueuedItem<T> {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl<T> Eq for QueuedItem<T> {}

impl<T> PartialOrd for QueuedItem<T> {
    fn partial_cmp(
        &self,
        other: &Self,
    ) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for QueuedItem<T> {
    fn cmp(
        &self,
        other: &Self,
    ) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}
