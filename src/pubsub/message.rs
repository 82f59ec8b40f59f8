use std::{
    any::{Any, TypeId},
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use bytes::Bytes;

/// Ключ типа сообщения: по нему индексируются подписки.
///
/// Это может быть конкретный тип, любой из его предков или реализованная
/// возможность (capability). Возможности удобно выражать trait-объектами:
/// `TypeKey::of::<dyn Auditable>()`.
///
/// Сравнение и хеширование идут только по `TypeId`, имя хранится для логов.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

/// Метаданные типа, по которым резолвер обходит иерархию.
///
/// Содержит ключ самого типа, ссылку на родителя и список возможностей,
/// объявленных непосредственно на этом типе.
#[derive(Clone, Copy)]
pub struct TypeNode {
    key: TypeKey,
    parent: fn() -> Option<TypeNode>,
    capabilities: fn() -> Vec<TypeKey>,
}

/// Тип, участвующий в иерархии сообщений.
///
/// По умолчанию родителем считается [`Object`], а возможностей нет. Обычно
/// реализуется через макрос [`typed!`](crate::typed).
pub trait Typed: Any + Send + Sync {
    /// Непосредственный родительский тип.
    fn parent() -> Option<TypeNode>
    where
        Self: Sized,
    {
        Some(TypeNode::of::<Object>())
    }

    /// Возможности, объявленные на самом типе (без учёта предков).
    fn capabilities() -> Vec<TypeKey>
    where
        Self: Sized,
    {
        Vec::new()
    }
}

/// Универсальный базовый тип: предок любого [`Typed`]-типа.
///
/// Подписка на `Object` получает все непустые публикации.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Object;

/// Опубликованное сообщение: значение произвольного типа вместе с его
/// метаданными.
///
/// Клонирование дешёвое: значение разделяется через `Arc`.
#[derive(Clone)]
pub struct Payload {
    node: TypeNode,
    value: Arc<dyn Any + Send + Sync>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl TypeNode {
    pub fn of<T: Typed>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            parent: T::parent,
            capabilities: T::capabilities,
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn parent(&self) -> Option<TypeNode> {
        (self.parent)()
    }

    pub fn capabilities(&self) -> Vec<TypeKey> {
        (self.capabilities)()
    }
}

impl Payload {
    pub fn new<T: Typed>(value: T) -> Self {
        Self {
            node: TypeNode::of::<T>(),
            value: Arc::new(value),
        }
    }

    /// Метаданные конкретного типа значения.
    pub fn node(&self) -> TypeNode {
        self.node
    }

    pub fn type_key(&self) -> TypeKey {
        self.node.key
    }

    pub fn type_name(&self) -> &'static str {
        self.node.key.name
    }

    pub fn is<T: Typed>(&self) -> bool {
        self.value.is::<T>()
    }

    pub fn downcast_ref<T: Typed>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Пытается получить `Arc<T>`; при несовпадении типа возвращает сам
    /// payload обратно.
    pub fn downcast<T: Typed>(self) -> Result<Arc<T>, Self> {
        let node = self.node;
        self.value
            .downcast::<T>()
            .map_err(|value| Self { node, value })
    }

    /// Проверяет, что оба payload указывают на одно и то же значение.
    pub fn ptr_eq(
        &self,
        other: &Payload,
    ) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Макрос объявления иерархии
////////////////////////////////////////////////////////////////////////////////

/// Реализует [`Typed`] для типа, объявляя его родителя и возможности.
///
/// ```ignore
/// use typebus::typed;
///
/// trait Auditable {}
/// struct Event;
/// struct OrderPlaced;
///
/// typed!(Event);
/// typed!(OrderPlaced: Event; dyn Auditable);
/// ```
///
/// Формы:
/// - `typed!(T)`: родитель `Object`, без возможностей;
/// - `typed!(T: Parent)`: явный родитель;
/// - `typed!(T; Cap1, Cap2)`: родитель `Object` и возможности;
/// - `typed!(T: Parent; Cap1, Cap2)`: всё сразу.
#[macro_export]
macro_rules! typed {
    ($ty:ty) => {
        impl $crate::pubsub::Typed for $ty {}
    };
    ($ty:ty : $parent:ty) => {
        impl $crate::pubsub::Typed for $ty {
            fn parent() -> Option<$crate::pubsub::TypeNode> {
                Some($crate::pubsub::TypeNode::of::<$parent>())
            }
        }
    };
    ($ty:ty ; $($cap:ty),+ $(,)?) => {
        impl $crate::pubsub::Typed for $ty {
            fn capabilities() -> Vec<$crate::pubsub::TypeKey> {
                vec![$($crate::pubsub::TypeKey::of::<$cap>()),+]
            }
        }
    };
    ($ty:ty : $parent:ty ; $($cap:ty),+ $(,)?) => {
        impl $crate::pubsub::Typed for $ty {
            fn parent() -> Option<$crate::pubsub::TypeNode> {
                Some($crate::pubsub::TypeNode::of::<$parent>())
            }

            fn capabilities() -> Vec<$crate::pubsub::TypeKey> {
                vec![$($crate::pubsub::TypeKey::of::<$cap>()),+]
            }
        }
    };
}

impl Typed for Object {
    fn parent() -> Option<TypeNode> {
        None
    }
}

// Встроенные типы значений. Строки и числа умеют форматироваться, это
// отражено возможностями `dyn Display` / `dyn Debug`.
typed!(String; dyn fmt::Display, dyn fmt::Debug);
typed!(&'static str; dyn fmt::Display, dyn fmt::Debug);
typed!(bool; dyn fmt::Display, dyn fmt::Debug);
typed!(i32; dyn fmt::Display, dyn fmt::Debug);
typed!(i64; dyn fmt::Display, dyn fmt::Debug);
typed!(u32; dyn fmt::Display, dyn fmt::Debug);
typed!(u64; dyn fmt::Display, dyn fmt::Debug);
typed!(f64; dyn fmt::Display, dyn fmt::Debug);
typed!(Vec<u8>; dyn fmt::Debug);
typed!(Bytes; dyn fmt::Debug);

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl PartialEq for TypeKey {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(
        &self,
        state: &mut H,
    ) {
        self.id.hash(state);
    }
}

impl PartialOrd for TypeKey {
    fn partial_cmp(
        &self,
        other: &Self,
    ) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeKey {
    fn cmp(
        &self,
        other: &Self,
    ) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "TypeKey({})", self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Debug for TypeNode {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("TypeNode").field("key", &self.key).finish()
    }
}

impl fmt::Debug for Payload {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Payload")
            .field("type", &self.node.key.name)
            .finish_non_exhaustive()
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::new(value)
    }
}

impl From<&'static str> for Payload {
    fn from(value: &'static str) -> Self {
        Payload::new(value)
    }
}

impl From<Bytes> for Payload {
    fn from(value: Bytes) -> Self {
        Payload::new(value)
    }
}
