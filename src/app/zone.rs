use crate::exception::Exception;
use std::future::Future;

/// What a guarded zone does with an error after logging it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    /// Propagate the error to the caller.
    Rethrow,
    /// Absorb the error; the zone reports that nothing was produced.
    Swallow,
}

/// Explicit guarded-execution wrapper for risky entry points.
///
/// On success the callback's value comes back as `Ok(Some(_))`. On error the
/// zone logs it when `auto_flush_logs` is set, then either rethrows or
/// swallows it (`Ok(None)`) per the teardown policy.
pub struct ExceptionsZone;

impl ExceptionsZone {
    pub fn run<T>(
        callback: impl FnOnce() -> Result<T, Exception>,
        teardown: Teardown,
        auto_flush_logs: bool,
    ) -> Result<Option<T>, Exception> {
        match callback() {
            Ok(value) => Ok(Some(value)),
            Err(error) => Self::tear_down(error, teardown, auto_flush_logs),
        }
    }

    pub async fn async_run<T>(
        callback: impl Future<Output = Result<T, Exception>>,
        teardown: Teardown,
        auto_flush_logs: bool,
    ) -> Result<Option<T>, Exception> {
        match callback.await {
            Ok(value) => Ok(Some(value)),
            Err(error) => Self::tear_down(error, teardown, auto_flush_logs),
        }
    }

    fn tear_down<T>(
        error: Exception,
        teardown: Teardown,
        auto_flush_logs: bool,
    ) -> Result<Option<T>, Exception> {
        if auto_flush_logs {
            tracing::error!(error = %error, "exception caught in guarded zone");
        }
        match teardown {
            Teardown::Rethrow => Err(error),
            Teardown::Swallow => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exception::RuntimeError;

    fn failing() -> Result<u32, Exception> {
        Err(RuntimeError::other("boom").into())
    }

    #[test]
    fn success_passes_through() {
        let result = ExceptionsZone::run(|| Ok(7), Teardown::Rethrow, true);
        assert_eq!(result.unwrap(), Some(7));
    }

    #[test]
    fn rethrow_propagates_the_error() {
        let result = ExceptionsZone::run(failing, Teardown::Rethrow, false);
        assert!(result.is_err());
    }

    #[test]
    fn swallow_absorbs_the_error() {
        let result = ExceptionsZone::run(failing, Teardown::Swallow, false);
        assert_eq!(result.unwrap(), None);
    }

    #[tokio::test]
    async fn async_zone_applies_the_same_policy() {
        let rethrown =
            ExceptionsZone::async_run(async { failing() }, Teardown::Rethrow, false).await;
        assert!(rethrown.is_err());

        let swallowed =
            ExceptionsZone::async_run(async { failing() }, Teardown::Swallow, false).await;
        assert_eq!(swallowed.unwrap(), None);
    }
}
