use tracing_appender::non_blocking::WorkerGuard;

/// Handle для управления lifecycle логирования.
///
/// Держит guard неблокирующего файлового writer'а: пока handle жив,
/// фоновый поток дописывает буфер в файл. Буфер сбрасывается на диск при
/// [`LoggingHandle::shutdown`] или drop.
pub struct LoggingHandle {
    file_guard: Option<WorkerGuard>,
}

impl LoggingHandle {
    pub fn new(file_guard: Option<WorkerGuard>) -> Self {
        Self { file_guard }
    }

    pub fn is_file_enabled(&self) -> bool {
        self.file_guard.is_some()
    }

    /// Завершает логирование, дожидаясь записи файлового буфера.
    pub fn shutdown(mut self) {
        tracing::info!(
            file_enabled = self.is_file_enabled(),
            "Logging shutdown"
        );
        drop(self.file_guard.take());
    }
}

impl std::fmt::Debug for LoggingHandle {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("LoggingHandle")
            .field("file_enabled", &self.is_file_enabled())
            .finish()
    }
}
