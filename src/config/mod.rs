pub mod broker;
pub mod settings;

pub use broker::BrokerConfig;
pub use settings::{Settings, ENV_PREFIX};
