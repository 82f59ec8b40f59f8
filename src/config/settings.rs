use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{config::BrokerConfig, logging::LoggingConfig};

/// Префикс переменных окружения: `TYPEBUS_BROKER__NAME=events`.
pub const ENV_PREFIX: &str = "TYPEBUS";

/// Полная конфигурация процесса, встраивающего брокер.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub broker: BrokerConfig,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Загружает настройки: значения по умолчанию + переменные окружения.
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder(None)?.build()?.try_deserialize()
    }

    /// То же, что [`Settings::load`], но сначала читает файл (toml, yaml,
    /// json: по расширению). Переменные окружения имеют приоритет над
    /// файлом.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        Self::builder(Some(path))?.build()?.try_deserialize()
    }

    fn builder(
        path: Option<&Path>
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let defaults = BrokerConfig::default();
        let mut builder = Config::builder()
            .set_default("broker.name", defaults.name)?
            .set_default(
                "broker.prune_closed_subscribers",
                defaults.prune_closed_subscribers,
            )?
            .set_default(
                "broker.share_global_resolver",
                defaults.share_global_resolver,
            )?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        Ok(builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        ))
    }
}
