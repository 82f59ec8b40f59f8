/// Broker and logging configuration loading.
pub mod config;
/// Structured logging (formatting, filters, file sink).
pub mod logging;
/// Pub/Sub: type-aware broker, priority queue, subscribers.
pub mod pubsub;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// config
pub use config::{BrokerConfig, Settings};
/// Logging setup.
pub use logging::{init_logging, LogFormat, LoggingConfig, LoggingHandle};
/// Pub/Sub API.
pub use pubsub::{
    AncestryResolver, Broker, BrokerState, BrokerStats, Classify, Inbox, Mailbox, Object, Payload,
    Priority, PriorityQueue, SubscriberHandle, SubscriberId, SubscriptionRegistry, TypeKey,
    TypeNode, Typed,
};
/// Operation errors and result types.
pub use typebus_error::{
    BrokerError, DeliveryError, ErrorExt, QueueError, StackError, StatusCode, TypebusResult,
};
