use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use tokio::runtime::Runtime;
use typebus::{typed, AncestryResolver, Broker, BrokerConfig, Mailbox, Object, TypeKey};

trait Auditable {}

struct Event;
struct OrderPlaced;
struct OrderShipped;

typed!(Event: Object; dyn Auditable);
typed!(OrderPlaced: Event);
typed!(OrderShipped: OrderPlaced);

fn bench_resolve_cached(c: &mut Criterion) {
    let resolver = AncestryResolver::new();
    resolver.resolve_type::<OrderShipped>();
    c.bench_function("resolve_cached", |b| {
        b.iter(|| black_box(resolver.resolve_type::<OrderShipped>()))
    });
}

fn bench_resolve_cold(c: &mut Criterion) {
    let resolver = AncestryResolver::new();
    c.bench_function("resolve_cold", |b| {
        b.iter(|| {
            resolver.clear();
            black_box(resolver.resolve_type::<OrderShipped>())
        })
    });
}

fn bench_publish_no_subscribers(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let broker = rt.block_on(async { Broker::start(BrokerConfig::default()).unwrap() });

    c.bench_function("publish_0_subs", |b| {
        b.to_async(&rt).iter(|| async {
            broker.publish_value(black_box(OrderShipped)).unwrap();
            broker.flush().await.unwrap();
        })
    });
}

fn bench_publish_10_subscribers(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let broker = rt.block_on(async { Broker::start(BrokerConfig::default()).unwrap() });

    // Подписчики на разные уровни иерархии одного сообщения.
    let keys = [
        TypeKey::of::<OrderShipped>(),
        TypeKey::of::<OrderPlaced>(),
        TypeKey::of::<Event>(),
        TypeKey::of::<Object>(),
        TypeKey::of::<dyn Auditable>(),
    ];
    let mailboxes: Vec<Mailbox> = (0..10)
        .map(|i| {
            let (handle, mailbox) = Mailbox::new();
            broker.subscribe(&handle, keys[i % keys.len()]).unwrap();
            mailbox
        })
        .collect();

    c.bench_function("publish_10_subs", |b| {
        b.to_async(&rt).iter(|| async {
            broker.publish_value(black_box(OrderShipped)).unwrap();
            broker.flush().await.unwrap();
            for mailbox in &mailboxes {
                while let Ok(Some(_)) = mailbox.try_recv() {}
            }
        })
    });
}

criterion_group!(
    benches,
    bench_resolve_cached,
    bench_resolve_cold,
    bench_publish_no_subscribers,
    bench_publish_10_subscribers
);
criterion_main!(benches);
