//! Blocking adapter over asynchronous primitive clients.

use crate::error::{PrimitiveError, PrimitiveResult};
use std::future::Future;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::warn;

/// Runs asynchronous operations to completion on the caller's thread.
///
/// The future itself runs on the runtime, so the dispatch context stays free
/// to deliver the completion being waited on. The runtime must be
/// multi-threaded.
///
/// Callers must be plain OS threads. Threads owned by a runtime are refused,
/// and that includes `tokio::task::spawn_blocking` workers: they carry a
/// runtime context, so [`Handle::block_on`] would panic there. Use
/// [`std::thread::spawn`] to call a blocking client from async code.
#[derive(Debug, Clone)]
pub struct Blocking {
    handle: Handle,
    timeout: Duration,
}

impl Blocking {
    pub fn new(handle: Handle, timeout: Duration) -> Self {
        Self { handle, timeout }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Block until `future` completes or the timeout elapses.
    ///
    /// Fails with [`PrimitiveError::BlockingOnRuntime`] when called from a
    /// runtime worker or a `spawn_blocking` thread.
    pub fn wait<F, T>(&self, future: F) -> PrimitiveResult<T>
    where
        F: Future<Output = PrimitiveResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        if Handle::try_current().is_ok() {
            return Err(PrimitiveError::BlockingOnRuntime);
        }
        let task = self.handle.spawn(future);
        let abort = task.abort_handle();
        match self.handle.block_on(tokio::time::timeout(self.timeout, task)) {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => Err(PrimitiveError::Task(err.to_string())),
            Err(_) => {
                abort.abort();
                warn!(timeout = ?self.timeout, "blocking call timed out");
                Err(PrimitiveError::Timeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn returns_the_result() {
        let runtime = runtime();
        let blocking = Blocking::new(runtime.handle().clone(), Duration::from_secs(1));
        assert_eq!(blocking.wait(async { Ok(5) }).unwrap(), 5);
    }

    #[test]
    fn times_out_with_a_distinct_error() {
        let runtime = runtime();
        let blocking = Blocking::new(runtime.handle().clone(), Duration::from_millis(20));
        let result: PrimitiveResult<()> = blocking.wait(std::future::pending());
        assert!(matches!(result, Err(PrimitiveError::Timeout(d)) if d == Duration::from_millis(20)));
    }

    #[test]
    fn operation_errors_pass_through() {
        let runtime = runtime();
        let blocking = Blocking::new(runtime.handle().clone(), Duration::from_secs(1));
        let result: PrimitiveResult<()> =
            blocking.wait(async { Err(crate::error::SessionError::Closed.into()) });
        assert!(matches!(result, Err(PrimitiveError::Session(crate::error::SessionError::Closed))));
    }

    #[test]
    fn refuses_to_block_a_runtime_thread() {
        let runtime = runtime();
        let blocking = Blocking::new(runtime.handle().clone(), Duration::from_secs(1));
        let result = runtime.block_on(async move { blocking.wait(async { Ok(()) }) });
        assert!(matches!(result, Err(PrimitiveError::BlockingOnRuntime)));
    }
}
