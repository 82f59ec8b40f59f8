/// Немедленно возвращает ошибку (аналогично `anyhow::bail!`).
///
/// Формы:
/// - `bail!(err)`: готовый тип ошибки или `StackError`-совместимый тип;
/// - `bail!(code, "msg")`: `GenericError` с кодом и сообщением;
/// - `bail!(code, "fmt {}", arg)`: с форматированием.
///
/// ```ignore
/// use typebus_error::{bail, StatusCode, TypebusResult};
///
/// fn check_name(name: &str) -> TypebusResult<()> {
///     if name.is_empty() {
///         bail!(StatusCode::InvalidArgs, "broker name cannot be empty");
///     }
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! bail {
    ($err:expr) => {
        return Err($crate::StackError::from($err))
    };
    ($code:expr, $msg:expr) => {
        return Err($crate::StackError::new(
            $crate::types::GenericError::new($code, $msg)
        ))
    };
    ($code:expr, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::StackError::new(
            $crate::types::GenericError::new($code, format!($fmt, $($arg)*))
        ))
    };
}

/// Проверяет условие и вызывает `bail!`, если условие ложно.
///
/// ```ignore
/// use typebus_error::{ensure, StatusCode, TypebusResult};
///
/// fn check_depth(depth: usize) -> TypebusResult<()> {
///     ensure!(depth > 0, StatusCode::InvalidArgs, "depth must be positive");
///     Ok(())
/// }
/// ```
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr) => {
        if !($cond) {
            $crate::bail!($err);
        }
    };
    ($cond:expr, $code:expr, $msg:expr) => {
        if !($cond) {
            $crate::bail!($code, $msg);
        }
    };
    ($cond:expr, $code:expr, $fmt:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($code, $fmt, $($arg)*);
        }
    };
}

/// Добавляет контекст к `Result`, превращая ошибку в `StackError`.
#[macro_export]
macro_rules! context {
    ($result:expr, $msg:expr) => {
        match $result {
            Ok(val) => Ok(val),
            Err(e) => Err($crate::StackError::from(e).context($msg)),
        }
    };
    ($result:expr, $fmt:expr, $($arg:tt)*) => {
        match $result {
            Ok(val) => Ok(val),
            Err(e) => Err($crate::StackError::from(e).context(format!($fmt, $($arg)*))),
        }
    };
}

/// Трейт-расширение для `Result`: `.context(...)` и `.with_context(...)`.
pub trait ResultExt<T> {
    fn context<C>(
        self,
        ctx: C,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>;

    /// Ленивый контекст: замыкание вызывается только в случае ошибки.
    fn with_context<C, F>(
        self,
        f: F,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<crate::StackError>,
{
    #[track_caller]
    fn context<C>(
        self,
        ctx: C,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>,
    {
        self.map_err(|e| e.into().context(ctx))
    }

    #[track_caller]
    fn with_context<C, F>(
        self,
        f: F,
    ) -> Result<T, crate::StackError>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.into().context(f()))
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BrokerError, QueueError, StatusCode, TypebusResult};

    #[test]
    fn test_bail_with_error_type() {
        fn enqueue_after_close() -> TypebusResult<()> {
            bail!(QueueError::Closed);
        }

        let err = enqueue_after_close().unwrap_err();
        assert_eq!(err.status_code(), StatusCode::QueueClosed);
    }

    #[test]
    fn test_bail_with_format() {
        fn check(depth: usize) -> TypebusResult<()> {
            bail!(StatusCode::InvalidArgs, "ancestry too deep: {}", depth);
        }

        let err = check(65).unwrap_err();
        assert!(err.to_string().contains("ancestry too deep: 65"));
    }

    #[test]
    fn test_ensure() {
        fn validate(name: &str) -> TypebusResult<()> {
            ensure!(!name.is_empty(), StatusCode::InvalidArgs, "empty name");
            ensure!(
                name.len() < 32,
                StatusCode::InvalidArgs,
                "name too long: {}",
                name.len()
            );
            Ok(())
        }

        assert!(validate("events").is_ok());
        assert!(validate("").is_err());
        assert!(validate(&"x".repeat(40)).is_err());
    }

    #[test]
    fn test_result_ext() {
        fn inner() -> Result<(), BrokerError> {
            Err(BrokerError::InvalidHandle { subscriber: 1 })
        }

        fn outer() -> TypebusResult<()> {
            inner().context("register audit subscriber")?;
            Ok(())
        }

        let err = outer().unwrap_err();
        assert_eq!(err.frames().len(), 1);
        assert_eq!(err.frames()[0].message, "register audit subscriber");
    }

    #[test]
    fn test_with_context_lazy() {
        fn run(fail: bool) -> TypebusResult<()> {
            let result: Result<(), QueueError> = if fail {
                Err(QueueError::Closed)
            } else {
                Ok(())
            };
            result.with_context(|| format!("drain of {} items", 3))?;
            Ok(())
        }

        assert!(run(false).is_ok());
        let err = run(true).unwrap_err();
        assert!(err.to_string().starts_with("drain of 3 items"));
    }

    #[test]
    fn test_context_macro() {
        fn run() -> TypebusResult<()> {
            let r: Result<(), QueueError> = Err(QueueError::Closed);
            context!(r, "closing {}", "mailbox")
        }

        let err = run().unwrap_err();
        assert_eq!(err.frames()[0].message, "closing mailbox");
    }
}
