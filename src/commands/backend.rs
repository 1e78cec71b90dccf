//! Shared handle commands use to reach the orchestrator.

use std::future::Future;

use tokio::runtime::Handle;

use crate::orchestrator::Orchestrator;

/// The orchestrator plus the runtime it runs on.
///
/// Commands execute on blocking workers; async orchestrator calls are driven
/// to completion with [`Backend::block_on`].
#[derive(Clone)]
pub struct Backend {
    orchestrator: Orchestrator,
    runtime: Handle,
}

impl Backend {
    pub fn new(orchestrator: Orchestrator, runtime: Handle) -> Self {
        Self {
            orchestrator,
            runtime,
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Run `future` on the daemon runtime and wait for it.
    ///
    /// Must not be called from an async task.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}
