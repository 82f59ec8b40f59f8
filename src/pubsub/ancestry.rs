use std::{collections::HashSet, sync::Arc};

use dashmap::DashMap;
use once_cell::sync::Lazy;
use tracing::{trace, warn};

use super::{TypeKey, TypeNode, Typed};

/// Предельная глубина цепочки родителей.
///
/// Защищает от циклов в вручную написанных реализациях [`Typed`].
pub const MAX_ANCESTRY_DEPTH: usize = 64;

static GLOBAL_RESOLVER: Lazy<Arc<AncestryResolver>> =
    Lazy::new(|| Arc::new(AncestryResolver::new()));

/// Резолвер предков типа с мемоизацией.
///
/// Для конкретного типа вычисляет упорядоченный набор ключей: сам тип,
/// затем цепочку родителей до корня, затем все возможности типа и его
/// предков. Результат кешируется по конкретному типу; каждый вызов
/// получает собственную копию.
///
/// Кеш не вытесняет записи: число ключей ограничено числом различных
/// конкретных типов, а не объёмом трафика. Для долгоживущих процессов есть
/// явный [`AncestryResolver::clear`].
#[derive(Debug, Default)]
pub struct AncestryResolver {
    cache: DashMap<TypeKey, Arc<[TypeKey]>>,
}

impl AncestryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Общий на процесс резолвер.
    pub fn global() -> Arc<AncestryResolver> {
        GLOBAL_RESOLVER.clone()
    }

    /// Возвращает ключи, под которыми может быть найден подписчик на
    /// сообщение данного конкретного типа.
    ///
    /// Гонка двух первых вызовов для одного типа безопасна: оба вычисляют
    /// одинаковую последовательность, в кеше остаётся первая записанная.
    pub fn resolve(
        &self,
        node: TypeNode,
    ) -> Vec<TypeKey> {
        let key = node.key();
        if let Some(cached) = self.cache.get(&key) {
            return cached.to_vec();
        }

        let computed: Arc<[TypeKey]> = enumerate_key_types(node).into();
        trace!(
            target: "typebus::ancestry",
            concrete = key.name(),
            keys = computed.len(),
            "Resolved type ancestry"
        );

        let stored = self.cache.entry(key).or_insert(computed).clone();
        stored.to_vec()
    }

    pub fn resolve_type<T: Typed>(&self) -> Vec<TypeKey> {
        self.resolve(TypeNode::of::<T>())
    }

    pub fn is_cached(
        &self,
        key: &TypeKey,
    ) -> bool {
        self.cache.contains_key(key)
    }

    /// Конкретные типы, для которых уже есть запись в кеше.
    pub fn cached_types(&self) -> Vec<TypeKey> {
        self.cache.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Полностью сбрасывает кеш.
    ///
    /// Существующие записи не изменяются на месте: следующие вызовы
    /// просто вычислят их заново.
    pub fn clear(&self) {
        self.cache.clear();
    }
}

/// Обходит иерархию: тип, предки, затем возможности всей цепочки.
fn enumerate_key_types(node: TypeNode) -> Vec<TypeKey> {
    let mut chain = vec![node];
    let mut current = node.parent();
    while let Some(parent) = current {
        if chain.len() >= MAX_ANCESTRY_DEPTH {
            warn!(
                target: "typebus::ancestry",
                concrete = node.key().name(),
                depth = MAX_ANCESTRY_DEPTH,
                "Ancestry chain truncated"
            );
            break;
        }
        chain.push(parent);
        current = parent.parent();
    }

    let mut seen = HashSet::with_capacity(chain.len() * 2);
    let mut keys = Vec::with_capacity(chain.len() * 2);

    let lineage = chain.iter().map(TypeNode::key);
    let capabilities = chain.iter().flat_map(TypeNode::capabilities);
    for key in lineage.chain(capabilities) {
        if seen.insert(key) {
            keys.push(key);
        }
    }
    keys
}
