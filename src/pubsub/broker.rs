use std::sync::{
    atomic::{AtomicU64, AtomicU8, Ordering},
    Arc,
};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::{
    runtime::Handle,
    sync::{oneshot, watch},
    task::JoinHandle,
};
use tracing::{debug, error, info, trace, warn};
use typebus_error::{BrokerError, ErrorExt, GenericError, QueueError, StatusCode, TypebusResult};

use super::{
    AncestryResolver, Payload, PriorityQueue, Request, SubscriberHandle, SubscriptionRegistry,
    TypeKey, Typed,
};
use crate::config::BrokerConfig;

/// Состояние жизненного цикла брокера.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum BrokerState {
    /// Принимает запросы.
    Running = 0,
    /// Запросы отклоняются; уже принятые дорабатываются циклом.
    Stopped = 1,
}

/// Счётчики брокера. Обновляются без блокировок.
#[derive(Debug, Default)]
pub struct BrokerMetrics {
    /// Непустые публикации, обработанные циклом
    pub published: AtomicU64,
    /// Публикации `None`
    pub empty_publishes: AtomicU64,
    /// Успешные доставки (по одной на подписчика)
    pub delivered: AtomicU64,
    /// Доставки, отклонённые inbox'ом подписчика
    pub failed_deliveries: AtomicU64,
    pub subscribes: AtomicU64,
    pub unsubscribes: AtomicU64,
    /// Подписчики, удалённые из реестра после неудачной доставки
    pub pruned: AtomicU64,
}

/// Снимок счётчиков брокера.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BrokerStats {
    pub published: u64,
    pub empty_publishes: u64,
    pub delivered: u64,
    pub failed_deliveries: u64,
    pub subscribes: u64,
    pub unsubscribes: u64,
    pub pruned: u64,
    /// Запросы, ещё лежащие в очереди
    pub pending: usize,
}

/// Брокер Pub/Sub с учётом иерархии типов.
///
/// Все запросы попадают в одну приоритетную очередь, которую разбирает
/// единственный цикл обработки (tokio-задача). Подписка и отписка
/// обрабатываются раньше ещё не разобранных публикаций; внутри одного класса
/// сохраняется порядок поступления.
///
/// Публикация значения типа `T` доставляется каждому подписчику, который
/// подписан на `T`, на любого предка `T` или на возможность, реализованную
/// `T` или его предками. Каждый подписчик получает сообщение ровно один раз.
///
/// Методы `subscribe`/`unsubscribe`/`publish` возвращают `Ok(())`, когда
/// запрос *принят*. Доставка происходит позже; дождаться её можно через
/// [`Broker::flush`].
pub struct Broker {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    /// Становится `true`, когда цикл разобрал очередь до конца.
    drained: watch::Receiver<bool>,
}

/// Состояние, общее для handle брокера и цикла обработки.
struct Shared {
    config: BrokerConfig,
    queue: PriorityQueue<Request>,
    registry: SubscriptionRegistry,
    resolver: Arc<AncestryResolver>,
    state: AtomicU8,
    metrics: BrokerMetrics,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl Broker {
    /// Запускает брокер на текущем tokio runtime.
    ///
    /// Резолвер предков: собственный или общий на процесс, в зависимости от
    /// [`BrokerConfig::share_global_resolver`].
    pub fn start(config: BrokerConfig) -> TypebusResult<Self> {
        let resolver = if config.share_global_resolver {
            AncestryResolver::global()
        } else {
            Arc::new(AncestryResolver::new())
        };
        Self::with_resolver(config, resolver)
    }

    /// Запускает брокер с заданным резолвером предков.
    pub fn with_resolver(
        config: BrokerConfig,
        resolver: Arc<AncestryResolver>,
    ) -> TypebusResult<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|e| {
            GenericError::new(
                StatusCode::InvalidOperation,
                format!("broker must be started inside a tokio runtime: {e}"),
            )
        })?;

        let shared = Arc::new(Shared {
            config,
            queue: PriorityQueue::new(),
            registry: SubscriptionRegistry::new(),
            resolver,
            state: AtomicU8::new(BrokerState::Running as u8),
            metrics: BrokerMetrics::default(),
        });

        let (drained_tx, drained) = watch::channel(false);
        let worker = runtime.spawn(run(shared.clone(), drained_tx));
        info!(broker = %shared.config.name, "Broker started");

        Ok(Self {
            shared,
            worker: Mutex::new(Some(worker)),
            drained,
        })
    }

    /// Подписывает handle на точный ключ типа или возможности.
    pub fn subscribe(
        &self,
        handle: &SubscriberHandle,
        key: TypeKey,
    ) -> Result<(), BrokerError> {
        self.ensure_valid(handle)?;
        self.submit(Request::Subscribe {
            handle: handle.clone(),
            key,
        })
    }

    /// Подписка на тип или возможность `T` (например `dyn Display`).
    pub fn subscribe_to<T: ?Sized + 'static>(
        &self,
        handle: &SubscriberHandle,
    ) -> Result<(), BrokerError> {
        self.subscribe(handle, TypeKey::of::<T>())
    }

    /// Отписывает handle от ключа. Отписка без подписки ничего не меняет.
    ///
    /// Handle с закрытым inbox'ом тоже принимается: так его можно убрать из
    /// реестра, когда очистка при доставке отключена.
    pub fn unsubscribe(
        &self,
        handle: &SubscriberHandle,
        key: TypeKey,
    ) -> Result<(), BrokerError> {
        self.submit(Request::Unsubscribe {
            handle: handle.clone(),
            key,
        })
    }

    pub fn unsubscribe_from<T: ?Sized + 'static>(
        &self,
        handle: &SubscriberHandle,
    ) -> Result<(), BrokerError> {
        self.unsubscribe(handle, TypeKey::of::<T>())
    }

    /// Убирает handle со всех ключей, на которые он подписан.
    pub fn unsubscribe_all(
        &self,
        handle: &SubscriberHandle,
    ) -> Result<(), BrokerError> {
        self.submit(Request::UnsubscribeAll {
            handle: handle.clone(),
        })
    }

    /// Публикует сообщение. `None` принимается и ничего не доставляет.
    pub fn publish(
        &self,
        payload: Option<Payload>,
    ) -> Result<(), BrokerError> {
        self.submit(Request::Publish(payload))
    }

    pub fn publish_value<T: Typed>(
        &self,
        value: T,
    ) -> Result<(), BrokerError> {
        self.publish(Some(Payload::new(value)))
    }

    /// Ожидает, пока цикл обработки разберёт всё, что было принято до
    /// вызова. Подписки, принятые позже, тоже могут успеть примениться:
    /// у них более высокий приоритет.
    pub async fn flush(&self) -> Result<(), BrokerError> {
        let (tx, rx) = oneshot::channel();
        self.submit(Request::Flush(tx))?;
        rx.await.map_err(|_| self.stopped())
    }

    /// Останавливает приём запросов, дожидается обработки уже принятых и
    /// завершения цикла. Повторный вызов безопасен: любой вызов, в том числе
    /// одновременный с первым, возвращается только после разбора очереди.
    pub async fn shutdown(&self) {
        let previous = self
            .shared
            .state
            .swap(BrokerState::Stopped as u8, Ordering::AcqRel);
        self.shared.queue.shutdown();

        if previous == BrokerState::Running as u8 {
            info!(
                broker = %self.shared.config.name,
                pending = self.shared.queue.len(),
                "Broker shutting down"
            );
        }

        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!(broker = %self.shared.config.name, error = %e, "Broker loop failed");
            }
        }

        // Упавший цикл роняет отправителя, тогда ждать больше нечего.
        let mut drained = self.drained.clone();
        let _ = drained.wait_for(|done| *done).await;
    }

    pub fn state(&self) -> BrokerState {
        match self.shared.state.load(Ordering::Acquire) {
            0 => BrokerState::Running,
            _ => BrokerState::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == BrokerState::Running
    }

    pub fn name(&self) -> &str {
        &self.shared.config.name
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.shared.config
    }

    pub fn metrics(&self) -> BrokerStats {
        let m = &self.shared.metrics;
        BrokerStats {
            published: m.published.load(Ordering::Relaxed),
            empty_publishes: m.empty_publishes.load(Ordering::Relaxed),
            delivered: m.delivered.load(Ordering::Relaxed),
            failed_deliveries: m.failed_deliveries.load(Ordering::Relaxed),
            subscribes: m.subscribes.load(Ordering::Relaxed),
            unsubscribes: m.unsubscribes.load(Ordering::Relaxed),
            pruned: m.pruned.load(Ordering::Relaxed),
            pending: self.shared.queue.len(),
        }
    }

    /// Реестр подписок. Изменяется только циклом обработки.
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.shared.registry
    }

    pub fn resolver(&self) -> &Arc<AncestryResolver> {
        &self.shared.resolver
    }

    fn ensure_valid(
        &self,
        handle: &SubscriberHandle,
    ) -> Result<(), BrokerError> {
        if !self.is_running() {
            return Err(self.stopped());
        }
        if handle.is_closed() {
            return Err(BrokerError::InvalidHandle {
                subscriber: handle.id().get(),
            });
        }
        Ok(())
    }

    fn submit(
        &self,
        request: Request,
    ) -> Result<(), BrokerError> {
        if !self.is_running() {
            return Err(self.stopped());
        }
        // Очередь закрывается только вместе с остановкой брокера.
        self.shared.queue.push(request).map_err(|e| match e {
            QueueError::Closed => self.stopped(),
        })
    }

    fn stopped(&self) -> BrokerError {
        BrokerError::Stopped {
            broker: self.shared.config.name.clone(),
        }
    }
}

impl Shared {
    async fn apply(
        &self,
        request: Request,
    ) {
        match request {
            Request::Subscribe { handle, key } => {
                let added = self.registry.subscribe(key, handle.clone());
                self.metrics.subscribes.fetch_add(1, Ordering::Relaxed);
                debug!(
                    broker = %self.config.name,
                    subscriber = %handle.id(),
                    key = %key,
                    added,
                    "Subscription applied"
                );
            }
            Request::Unsubscribe { handle, key } => {
                let removed = self.registry.unsubscribe(key, &handle);
                self.metrics.unsubscribes.fetch_add(1, Ordering::Relaxed);
                debug!(
                    broker = %self.config.name,
                    subscriber = %handle.id(),
                    key = %key,
                    removed,
                    "Unsubscription applied"
                );
            }
            Request::UnsubscribeAll { handle } => {
                let keys = self.registry.remove_subscriber(&handle);
                self.metrics.unsubscribes.fetch_add(1, Ordering::Relaxed);
                debug!(
                    broker = %self.config.name,
                    subscriber = %handle.id(),
                    keys,
                    "Subscriber removed from all keys"
                );
            }
            Request::Publish(None) => {
                self.metrics.empty_publishes.fetch_add(1, Ordering::Relaxed);
                trace!(broker = %self.config.name, "Empty publish ignored");
            }
            Request::Publish(Some(payload)) => self.dispatch(payload).await,
            Request::Flush(done) => {
                // Ожидающий мог уже уйти, это не ошибка.
                let _ = done.send(());
            }
        }
    }

    async fn dispatch(
        &self,
        payload: Payload,
    ) {
        self.metrics.published.fetch_add(1, Ordering::Relaxed);

        let keys = self.resolver.resolve(payload.node());
        let handles = self.registry.collect(&keys);
        trace!(
            broker = %self.config.name,
            message_type = payload.type_name(),
            keys = keys.len(),
            subscribers = handles.len(),
            "Dispatching message"
        );

        for handle in handles {
            match handle.deliver(payload.clone()).await {
                Ok(()) => {
                    self.metrics.delivered.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    self.metrics
                        .failed_deliveries
                        .fetch_add(1, Ordering::Relaxed);
                    warn!(
                        broker = %self.config.name,
                        subscriber = %handle.id(),
                        message_type = payload.type_name(),
                        error = %e,
                        "Delivery failed"
                    );
                    if self.config.prune_closed_subscribers && e.status_code().is_terminal() {
                        self.prune(&handle);
                    }
                }
            }
        }
    }

    fn prune(
        &self,
        handle: &SubscriberHandle,
    ) {
        let keys = self.registry.remove_subscriber(handle);
        if keys > 0 {
            self.metrics.pruned.fetch_add(1, Ordering::Relaxed);
            warn!(
                broker = %self.config.name,
                subscriber = %handle.id(),
                keys,
                "Pruned closed subscriber"
            );
        }
    }
}

/// Цикл обработки: разбирает очередь, пока она не закрыта и не пуста.
async fn run(
    shared: Arc<Shared>,
    drained: watch::Sender<bool>,
) {
    loop {
        match shared.queue.dequeue().await {
            Ok(request) => {
                trace!(broker = %shared.config.name, request = ?request, "Processing request");
                shared.apply(request).await;
            }
            Err(QueueError::Closed) => break,
        }
    }
    drained.send_replace(true);
    info!(broker = %shared.config.name, "Broker loop stopped");
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

/// Брошенный брокер закрывает очередь: цикл дорабатывает принятое и
/// завершается сам.
impl Drop for Broker {
    fn drop(&mut self) {
        self.shared
            .state
            .store(BrokerState::Stopped as u8, Ordering::Release);
        self.shared.queue.shutdown();
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("name", &self.shared.config.name)
            .field("state", &self.state())
            .field("keys", &self.shared.registry.len())
            .field("pending", &self.shared.queue.len())
            .finish()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
