use std::{env, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};
use typebus_error::{ensure, GenericError, StatusCode, TypebusResult};

/// Формат вывода логов в консоль.
#[derive(Debug, Default, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
    Json,
}

/// Конфигурация логирования.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Базовый уровень (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Дополнительные директивы фильтра, например `typebus::ancestry=trace`.
    pub directives: Vec<String>,
    pub format: LogFormat,
    pub console_enabled: bool,
    pub with_ansi: bool,
    pub with_target: bool,
    pub with_thread_ids: bool,
    /// Каталог для файловых логов; `None`: без файлового вывода.
    pub log_dir: Option<PathBuf>,
    /// Префикс имени файла для ежедневной ротации.
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directives: Vec::new(),
            format: LogFormat::default(),
            console_enabled: true,
            with_ansi: true,
            with_target: true,
            with_thread_ids: false,
            log_dir: None,
            file_prefix: "typebus.log".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Применяет короткие переменные окружения поверх конфигурации:
    /// `TYPEBUS_LOG_LEVEL`, `TYPEBUS_LOG_FORMAT`, `TYPEBUS_LOG_DIR`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("TYPEBUS_LOG_LEVEL") {
            self.level = level;
        }
        if let Ok(format) = env::var("TYPEBUS_LOG_FORMAT") {
            match format.parse() {
                Ok(format) => self.format = format,
                Err(e) => eprintln!("Ignoring TYPEBUS_LOG_FORMAT: {e}"),
            }
        }
        if let Ok(dir) = env::var("TYPEBUS_LOG_DIR") {
            self.log_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn validate(&self) -> TypebusResult<()> {
        ensure!(
            matches!(
                self.level.to_ascii_lowercase().as_str(),
                "trace" | "debug" | "info" | "warn" | "error" | "off"
            ),
            StatusCode::InvalidArgs,
            "unknown log level '{}'",
            self.level
        );
        ensure!(
            self.log_dir.is_none() || !self.file_prefix.is_empty(),
            StatusCode::InvalidArgs,
            "file_prefix cannot be empty when log_dir is set"
        );
        Ok(())
    }

    /// Каталог для файлов создаётся заранее, иначе appender молча теряет
    /// записи.
    pub fn ensure_log_dir(&self) -> TypebusResult<()> {
        if let Some(dir) = &self.log_dir {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// Строка директив для `EnvFilter`: уровень плюс дополнительные
    /// директивы через запятую.
    pub fn build_filter_directive(&self) -> String {
        std::iter::once(self.level.to_ascii_lowercase())
            .chain(self.directives.iter().cloned())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl FromStr for LogFormat {
    type Err = GenericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(GenericError::new(
                StatusCode::InvalidArgs,
                format!("unknown log format '{other}'"),
            )),
        }
    }
}
