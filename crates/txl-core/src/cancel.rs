//! Run-wide abort signal carrying the first fatal error.
//!
//! Every task of a pipeline run holds a clone. The first task that hits a
//! fatal error records it with [`CancelToken::fail`]; the producer, the
//! remaining workers and the writer see the token set and wind down instead
//! of blocking on channels nobody will service again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::TransferError;

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    failure: Mutex<Option<TransferError>>,
}

/// Shared abort flag for one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<Inner>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop the run without recording an error.
    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::Release);
    }

    /// Record `err` if it is the first failure of the run, then cancel.
    /// Later failures are usually fallout of the first and are only logged.
    pub fn fail(&self, err: TransferError) {
        {
            let mut slot = self.0.failure.lock().unwrap_or_else(PoisonError::into_inner);
            if slot.is_none() {
                tracing::warn!(error = %err, "transfer failed");
                *slot = Some(err);
            } else {
                tracing::debug!(error = %err, "additional failure after abort");
            }
        }
        self.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::Acquire)
    }

    /// Take the first recorded failure, if any.
    pub fn take_failure(&self) -> Option<TransferError> {
        self.0
            .failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}
