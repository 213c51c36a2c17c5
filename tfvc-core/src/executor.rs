use std::future::Future;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info_span, Instrument};

use crate::error::{Result, TfvcError};

/// Shared background queue for long-running work. Everything submitted here
/// runs on the runtime's worker threads, never on the caller's thread.
#[derive(Debug, Clone)]
pub struct OperationExecutor {
    handle: Handle,
}

impl OperationExecutor {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Executor bound to the runtime the caller is running in.
    pub fn try_current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| TfvcError::Interrupted(format!("no async runtime available: {e}")))
    }

    pub fn submit_operation_task<F>(&self, name: &'static str, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!(operation = name, "Submitting background operation");
        self.handle
            .spawn(task.instrument(info_span!("operation", name)))
    }
}
