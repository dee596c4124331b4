//! Sequential dispatch contexts.
//!
//! A [`ThreadContext`] is an actor task that runs submitted jobs one at a
//! time in submission order. Listener callbacks and operation completions
//! are funneled through one so user code never runs concurrently with
//! itself or on a transport I/O task.

use crate::config::DispatchMode;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, error};

/// A unit of work run on a dispatch context.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

tokio::task_local! {
    static CURRENT_CONTEXT: u64;
}

/// Handle to a sequential execution context.
///
/// Clones share the same context. The context task stops once every handle
/// has been dropped and the queue has drained.
#[derive(Clone)]
pub struct ThreadContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    id: u64,
    name: String,
    sender: mpsc::UnboundedSender<Job>,
    handle: Handle,
}

impl ThreadContext {
    /// Spawn a context on the current runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn spawn(name: impl Into<String>) -> Self {
        Self::spawn_on(name, &Handle::current())
    }

    /// Spawn a context on the given runtime.
    pub fn spawn_on(name: impl Into<String>, handle: &Handle) -> Self {
        let id = NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed);
        let name = name.into();
        let (sender, receiver) = mpsc::unbounded_channel();
        handle.spawn(CURRENT_CONTEXT.scope(id, Self::run(name.clone(), receiver)));
        debug!(context = %name, id, "dispatch context started");
        Self {
            inner: Arc::new(ContextInner {
                id,
                name,
                sender,
                handle: handle.clone(),
            }),
        }
    }

    async fn run(name: String, mut receiver: mpsc::UnboundedReceiver<Job>) {
        while let Some(job) = receiver.recv().await {
            if catch_unwind(AssertUnwindSafe(job)).is_err() {
                error!(context = %name, "dispatched callback panicked");
            }
        }
        debug!(context = %name, "dispatch context stopped");
    }

    /// Queue a job. Returns false if the context has stopped.
    pub fn execute<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner.sender.send(Box::new(job)).is_ok()
    }

    /// Whether the caller is running on this context.
    #[must_use]
    pub fn is_current(&self) -> bool {
        CURRENT_CONTEXT
            .try_with(|id| *id == self.inner.id)
            .unwrap_or(false)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Runtime the context runs on. Wrappers spawn their own tasks here.
    #[must_use]
    pub fn handle(&self) -> &Handle {
        &self.inner.handle
    }
}

impl std::fmt::Debug for ThreadContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadContext")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish()
    }
}

/// Selects the dispatch context for each new session client.
#[derive(Debug)]
pub struct ThreadContextFactory {
    mode: DispatchMode,
    handle: Handle,
    shared: OnceLock<ThreadContext>,
}

impl ThreadContextFactory {
    pub fn new(mode: DispatchMode, handle: Handle) -> Self {
        Self {
            mode,
            handle,
            shared: OnceLock::new(),
        }
    }

    /// One context per client.
    pub fn dedicated(handle: Handle) -> Self {
        Self::new(DispatchMode::Dedicated, handle)
    }

    /// One context for every client.
    pub fn shared(handle: Handle) -> Self {
        Self::new(DispatchMode::Shared, handle)
    }

    #[must_use]
    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    #[must_use]
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// The context for a client of the primitive called `name`.
    pub fn context(&self, name: &str) -> ThreadContext {
        match self.mode {
            DispatchMode::Dedicated => ThreadContext::spawn_on(format!("primitive:{name}"), &self.handle),
            DispatchMode::Shared => self
                .shared
                .get_or_init(|| ThreadContext::spawn_on("shared", &self.handle))
                .clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn jobs_run_in_submission_order() {
        let context = ThreadContext::spawn("test");
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..100 {
            let seen = seen.clone();
            context.execute(move || seen.lock().push(i));
        }
        let (tx, rx) = oneshot::channel();
        context.execute(move || {
            let _ = tx.send(());
        });
        rx.await.unwrap();
        assert_eq!(*seen.lock(), (0..100).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn is_current_only_inside_the_context() {
        let context = ThreadContext::spawn("test");
        let other = ThreadContext::spawn("other");
        assert!(!context.is_current());

        let (tx, rx) = oneshot::channel();
        let inside = context.clone();
        context.execute(move || {
            let _ = tx.send((inside.is_current(), other.is_current()));
        });
        assert_eq!(rx.await.unwrap(), (true, false));
    }

    #[tokio::test]
    async fn panicking_job_does_not_stop_the_context() {
        let context = ThreadContext::spawn("test");
        context.execute(|| panic!("boom"));
        let (tx, rx) = oneshot::channel();
        context.execute(move || {
            let _ = tx.send(42);
        });
        assert_eq!(rx.await.unwrap(), 42);
    }

    #[tokio::test]
    async fn shared_factory_reuses_one_context() {
        let factory = ThreadContextFactory::shared(Handle::current());
        let a = factory.context("a");
        let b = factory.context("b");
        assert_eq!(a.name(), "shared");
        assert!(Arc::ptr_eq(&a.inner, &b.inner));

        let dedicated = ThreadContextFactory::dedicated(Handle::current());
        let c = dedicated.context("c");
        let d = dedicated.context("c");
        assert!(!Arc::ptr_eq(&c.inner, &d.inner));
        assert_eq!(c.name(), "primitive:c");
    }
}
