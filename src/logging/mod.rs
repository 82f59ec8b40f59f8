//! Структурированное логирование на `tracing`.
//!
//! Библиотека сама подписчика не ставит: встраивающий процесс вызывает
//! [`init_logging`] один раз и держит [`LoggingHandle`] до завершения.

pub mod config;
mod filters;
mod formatter;
pub mod handle;
mod sinks;

pub use config::{LogFormat, LoggingConfig};
pub use handle::LoggingHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};
use typebus_error::{GenericError, StatusCode, TypebusResult};

/// Инициализация логирования с конфигурацией.
///
/// Повторный вызов в том же процессе возвращает ошибку
/// [`StatusCode::AlreadyExists`].
pub fn init_logging(mut config: LoggingConfig) -> TypebusResult<LoggingHandle> {
    config.apply_env_overrides();
    config.validate()?;
    config.ensure_log_dir()?;

    let env_filter = filters::build_filter_from_config(&config);
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.console_enabled {
        layers.push(formatter::build_formatter_from_config(&config));
    }

    let file_guard = match &config.log_dir {
        Some(dir) => {
            let (file_layer, guard) = sinks::file::layer(dir, &config.file_prefix);
            layers.push(file_layer);
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .map_err(|e| {
            GenericError::new(
                StatusCode::AlreadyExists,
                format!("global tracing subscriber already set: {e}"),
            )
        })?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        log_level = %config.level,
        format = ?config.format,
        console_enabled = config.console_enabled,
        file_enabled = file_guard.is_some(),
        "Logging system initialized"
    );

    Ok(LoggingHandle::new(file_guard))
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    /// Тест проверяет, что невалидная конфигурация отклоняется до установки
    /// глобального подписчика.
    #[test]
    #[serial]
    fn test_init_rejects_invalid_level() {
        std::env::remove_var("TYPEBUS_LOG_LEVEL");
        let config = LoggingConfig {
            level: "chatty".to_string(),
            ..Default::default()
        };
        let err = init_logging(config).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::InvalidArgs);
    }

    /// Тест проверяет, что второй вызов не паникует, а возвращает ошибку.
    #[test]
    #[serial]
    fn test_init_twice_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            console_enabled: false,
            log_dir: Some(tmp.path().join("logs")),
            ..Default::default()
        };

        let first = init_logging(config.clone());
        let second = init_logging(config);
        // Другой тест в этом бинарнике мог успеть поставить подписчика.
        if let Ok(handle) = first {
            assert!(handle.is_file_enabled());
            handle.shutdown();
        }
        let err = second.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::AlreadyExists);
    }
}
