use std::{collections::HashSet, sync::Arc};

use dashmap::{mapref::entry::Entry, DashMap};

use super::{SubscriberHandle, TypeKey};

/// Неизменяемый снимок подписчиков одного ключа.
pub type SubscriberSet = Arc<HashSet<SubscriberHandle>>;

/// Потокобезопасный реестр подписок: ключ типа → множество подписчиков.
///
/// Множества хранятся по принципу copy-on-write: мутация под блокировкой
/// шарда `DashMap` заменяет множество целиком, поэтому снимок, взятый
/// читателем, никогда не бывает наполовину обновлённым. Снимки разных ключей
/// не блокируют друг друга.
///
/// Пустые множества не хранятся: последняя отписка удаляет ключ.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    subscribers: DashMap<TypeKey, SubscriberSet>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Добавляет подписчика. Возвращает `false`, если он уже был подписан.
    pub fn subscribe(
        &self,
        key: TypeKey,
        handle: SubscriberHandle,
    ) -> bool {
        let mut entry = self.subscribers.entry(key).or_default();
        if entry.contains(&handle) {
            return false;
        }
        Arc::make_mut(entry.value_mut()).insert(handle)
    }

    /// Удаляет подписчика. Возвращает `true`, если он был подписан.
    pub fn unsubscribe(
        &self,
        key: TypeKey,
        handle: &SubscriberHandle,
    ) -> bool {
        match self.subscribers.entry(key) {
            Entry::Occupied(mut entry) => {
                if !entry.get().contains(handle) {
                    return false;
                }
                let set = Arc::make_mut(entry.get_mut());
                set.remove(handle);
                if set.is_empty() {
                    entry.remove();
                }
                true
            }
            Entry::Vacant(_) => false,
        }
    }

    /// Текущие подписчики ключа; пустое множество, если их нет.
    pub fn snapshot(
        &self,
        key: &TypeKey,
    ) -> SubscriberSet {
        self.subscribers
            .get(key)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Объединение снимков нескольких ключей без повторов.
    ///
    /// Порядок: по первому появлению: ключи в переданном порядке.
    pub fn collect<'a, I>(
        &self,
        keys: I,
    ) -> Vec<SubscriberHandle>
    where
        I: IntoIterator<Item = &'a TypeKey>,
    {
        let mut seen = HashSet::new();
        let mut handles = Vec::new();
        for key in keys {
            let snapshot = self.snapshot(key);
            for handle in snapshot.iter() {
                if seen.insert(handle.id()) {
                    handles.push(handle.clone());
                }
            }
        }
        handles
    }

    /// Удаляет подписчика из всех ключей. Возвращает число затронутых ключей.
    pub fn remove_subscriber(
        &self,
        handle: &SubscriberHandle,
    ) -> usize {
        let keys: Vec<TypeKey> = self
            .subscribers
            .iter()
            .filter(|entry| entry.value().contains(handle))
            .map(|entry| *entry.key())
            .collect();

        keys.into_iter()
            .filter(|key| self.unsubscribe(*key, handle))
            .count()
    }

    pub fn subscriber_count(
        &self,
        key: &TypeKey,
    ) -> usize {
        self.subscribers
            .get(key)
            .map(|entry| entry.value().len())
            .unwrap_or(0)
    }

    /// Ключи, на которые есть хотя бы одна подписка.
    pub fn keys(&self) -> Vec<TypeKey> {
        self.subscribers.iter().map(|entry| *entry.key()).collect()
    }

    pub fn contains_key(
        &self,
        key: &TypeKey,
    ) -> bool {
        self.subscribers.contains_key(key)
    }

    /// Количество ключей с подписками.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::pubsub::{Mailbox, Object};

    fn key() -> TypeKey {
        TypeKey::of::<String>()
    }

    /// Тест проверяет идемпотентность подписки.
    #[test]
    fn test_subscribe_is_idempotent() {
        let registry = SubscriptionRegistry::new();
        let (handle, _mailbox) = Mailbox::new();

        assert!(registry.subscribe(key(), handle.clone()));
        assert!(!registry.subscribe(key(), handle.clone()));
        assert_eq!(registry.subscriber_count(&key()), 1);
    }

    /// Тест проверяет, что последняя отписка удаляет ключ целиком.
    #[test]
    fn test_unsubscribe_removes_empty_key() {
        let registry = SubscriptionRegistry::new();
        let (a, _ma) = Mailbox::new();
        let (b, _mb) = Mailbox::new();

        registry.subscribe(key(), a.clone());
        registry.subscribe(key(), b.clone());

        assert!(registry.unsubscribe(key(), &a));
        assert!(registry.contains_key(&key()));
        assert!(registry.unsubscribe(key(), &b));
        assert!(!registry.contains_key(&key()));
        assert!(registry.is_empty());

        // повторная отписка и неизвестный ключ: no-op
        assert!(!registry.unsubscribe(key(), &b));
        assert!(!registry.unsubscribe(TypeKey::of::<Object>(), &b));
    }

    /// Тест проверяет, что снимок не меняется после последующих мутаций.
    #[test]
    fn test_snapshot_is_point_in_time() {
        let registry = SubscriptionRegistry::new();
        let (a, _ma) = Mailbox::new();
        let (b, _mb) = Mailbox::new();

        registry.subscribe(key(), a.clone());
        let before = registry.snapshot(&key());

        registry.subscribe(key(), b.clone());
        registry.unsubscribe(key(), &a);

        assert_eq!(before.len(), 1);
        assert!(before.contains(&a));
        let after = registry.snapshot(&key());
        assert_eq!(after.len(), 1);
        assert!(after.contains(&b));

        assert!(registry.snapshot(&TypeKey::of::<Object>()).is_empty());
    }

    /// Тест проверяет дедупликацию при сборе по нескольким ключам.
    #[test]
    fn test_collect_deduplicates_across_keys() {
        let registry = SubscriptionRegistry::new();
        let (a, _ma) = Mailbox::new();
        let (b, _mb) = Mailbox::new();

        registry.subscribe(TypeKey::of::<String>(), a.clone());
        registry.subscribe(TypeKey::of::<Object>(), a.clone());
        registry.subscribe(TypeKey::of::<Object>(), b.clone());

        let keys = [TypeKey::of::<String>(), TypeKey::of::<Object>()];
        let handles = registry.collect(keys.iter());
        assert_eq!(handles, vec![a, b]);
    }

    #[test]
    fn test_remove_subscriber_everywhere() {
        let registry = SubscriptionRegistry::new();
        let (a, _ma) = Mailbox::new();
        let (b, _mb) = Mailbox::new();

        registry.subscribe(TypeKey::of::<String>(), a.clone());
        registry.subscribe(TypeKey::of::<Object>(), a.clone());
        registry.subscribe(TypeKey::of::<Object>(), b.clone());

        assert_eq!(registry.remove_subscriber(&a), 2);
        assert_eq!(registry.keys(), vec![TypeKey::of::<Object>()]);
        assert_eq!(registry.remove_subscriber(&a), 0);
    }

    /// Тест проверяет отсутствие потерянных обновлений при конкурентных
    /// подписках на один ключ.
    #[test]
    fn test_concurrent_subscribe_no_lost_updates() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let mailboxes: Vec<_> = (0..32).map(|_| Mailbox::new()).collect();

        let threads: Vec<_> = mailboxes
            .iter()
            .map(|(handle, _)| {
                let registry = registry.clone();
                let handle = handle.clone();
                thread::spawn(move || {
                    registry.subscribe(key(), handle);
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(registry.subscriber_count(&key()), 32);
    }
}
