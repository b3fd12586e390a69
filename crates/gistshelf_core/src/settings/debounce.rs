//! Single-slot trailing debounce timer on the tokio runtime.

use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::warn;

/// Runs at most one pending job, `delay` after the most recent
/// [`DebounceTimer::schedule`] call.
///
/// Cancelling only ever stops a job that is still waiting. Once the delay
/// elapses the job is detached onto its own task, so a cancel racing with a
/// running job cannot interrupt it halfway.
#[derive(Debug)]
pub struct DebounceTimer {
    slot: Mutex<Option<JoinHandle<()>>>,
    /// Runtime current when the timer was built, used when `schedule` is
    /// called from a plain thread.
    runtime: Option<Handle>,
}

impl Default for DebounceTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl DebounceTimer {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
            runtime: Handle::try_current().ok(),
        }
    }

    /// Replace any waiting job with `job`, to run after `delay`.
    ///
    /// Spawns on the current tokio runtime, or on the one the timer was
    /// built in.
    ///
    /// # Returns
    /// `false` when no runtime is reachable; nothing is scheduled and any
    /// waiting job is left alone.
    pub fn schedule<F>(&self, delay: Duration, job: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Some(runtime) = Handle::try_current().ok().or_else(|| self.runtime.clone()) else {
            warn!("no tokio runtime available; debounce job not scheduled");
            return false;
        };
        let spawner = runtime.clone();
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            spawner.spawn(job);
        });
        let previous = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
        true
    }

    /// Drop the waiting job, if any.
    ///
    /// # Returns
    /// `true` when a job was still waiting.
    pub fn cancel(&self) -> bool {
        let handle = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match handle {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.slot.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            handle.abort();
        }
    }
}
