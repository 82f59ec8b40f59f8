use serde::{Deserialize, Serialize};
use typebus_error::{ensure, StatusCode, TypebusResult};

/// Настройки экземпляра брокера.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BrokerConfig {
    /// Имя брокера (в логах и ошибках).
    pub name: String,
    /// Удалять из реестра подписчиков, чей inbox оказался закрыт при
    /// доставке.
    pub prune_closed_subscribers: bool,
    /// Использовать общий на процесс кеш предков вместо собственного.
    pub share_global_resolver: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            name: "typebus".to_string(),
            prune_closed_subscribers: true,
            share_global_resolver: false,
        }
    }
}

impl BrokerConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> TypebusResult<()> {
        ensure!(
            !self.name.trim().is_empty(),
            StatusCode::InvalidArgs,
            "broker name cannot be empty"
        );
        Ok(())
    }
}
