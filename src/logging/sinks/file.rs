use std::path::Path;

use tracing_appender::{non_blocking, non_blocking::WorkerGuard, rolling::daily};
use tracing_subscriber::{fmt, Layer};

/// Файловый слой с ежедневной ротацией и неблокирующей записью.
///
/// Каталог должен существовать: его создаёт
/// [`LoggingConfig::ensure_log_dir`](crate::logging::LoggingConfig::ensure_log_dir).
pub fn layer<S>(
    dir: &Path,
    prefix: &str,
) -> (Box<dyn Layer<S> + Send + Sync>, WorkerGuard)
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    let file_appender = daily(dir, prefix);
    let (non_blocking_writer, guard) = non_blocking(file_appender);

    // В файл без ANSI-цветов.
    let layer = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(non_blocking_writer)
        .boxed();

    (layer, guard)
}
