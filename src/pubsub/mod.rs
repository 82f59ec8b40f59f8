//! Подсистема Publish–Subscribe с учётом иерархии типов.
//!
//! - `message`: ключи типов, описание иерархии ([`Typed`], [`typed!`]) и
//!   [`Payload`].
//! - `ancestry`: вычисление и кеширование набора ключей для конкретного типа.
//! - `registry`: реестр подписок `ключ → подписчики`.
//! - `queue`: очередь с двумя классами приоритета.
//! - `request`: запросы к брокеру и их классификация.
//! - `subscriber`: handle подписчика, [`Inbox`] и [`Mailbox`].
//! - `broker`: брокер и его цикл обработки.
//!
//! [`typed!`]: crate::typed

pub mod ancestry;
pub mod broker;
pub mod message;
pub mod queue;
pub mod registry;
pub mod request;
pub mod subscriber;

pub use ancestry::*;
pub use broker::*;
pub use message::*;
pub use queue::*;
pub use registry::*;
pub use request::*;
pub use subscriber::*;
