//! Single-slot execution state

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

use crate::ExecutionResult;

/// Callback that cancels an in-flight execution.
pub type AbortFn = Box<dyn FnOnce() + Send>;

struct ExecutionState {
    session_id: String,
    generation: u64,
    active: bool,
    abort: Option<AbortFn>,
    result: watch::Receiver<Option<ExecutionResult>>,
}

/// What a caller can observe about the current execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionSnapshot {
    pub session_id: String,
    pub active: bool,
}

/// Holds at most one execution. Starting a new one cancels the previous
/// one first; there is no queue.
#[derive(Default)]
pub struct ExecutionSlot {
    current: Mutex<Option<ExecutionState>>,
    generations: AtomicU64,
}

impl ExecutionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for a new execution.
    ///
    /// The previous execution's abort callback, if it is still active, runs
    /// exactly once before this returns. The returned sender publishes the
    /// new execution's result.
    pub fn begin(
        &self,
        session_id: &str,
        abort: Option<AbortFn>,
    ) -> (u64, watch::Sender<Option<ExecutionResult>>) {
        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = watch::channel(None);

        let previous = {
            let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
            current.replace(ExecutionState {
                session_id: session_id.to_string(),
                generation,
                active: true,
                abort,
                result: rx,
            })
        };

        if let Some(previous) = previous
            && previous.active
            && let Some(abort) = previous.abort
        {
            tracing::debug!(session_id = %previous.session_id, "Aborting preempted execution");
            abort();
        }

        (generation, tx)
    }

    /// Mark an execution settled. Ignored if a newer one owns the slot.
    pub fn settle(&self, generation: u64) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(state) = current.as_mut()
            && state.generation == generation
        {
            state.active = false;
            state.abort = None;
        }
    }

    pub fn snapshot(&self) -> Option<ExecutionSnapshot> {
        let current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        current.as_ref().map(|state| ExecutionSnapshot {
            session_id: state.session_id.clone(),
            active: state.active,
        })
    }

    pub fn is_active(&self) -> bool {
        self.snapshot().is_some_and(|s| s.active)
    }

    /// Wait for the current execution to finish and return its result.
    ///
    /// `None` when the slot is empty or the execution was dropped before
    /// producing a result.
    pub async fn wait_current(&self) -> Option<ExecutionResult> {
        let mut rx = {
            let current = self.current.lock().unwrap_or_else(|e| e.into_inner());
            current.as_ref()?.result.clone()
        };
        let result = rx.wait_for(Option::is_some).await.ok()?;
        result.clone()
    }
}
