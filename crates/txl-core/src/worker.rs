//! Fixed-size pool of range-fetch workers.
//!
//! Workers share the receiving end of the part channel and the sending end of
//! the result channel. Each one loops: take a part, fetch exactly its bytes,
//! hand the payload to the writer. A failed or short fetch is fatal: the
//! worker records it on the run's [`CancelToken`] and stops taking parts.

use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crate::cancel::CancelToken;
use crate::error::{FetchError, TransferError};
use crate::planner::PartDescriptor;
use crate::sequencer::PartResult;
use crate::store::{ObjectCoordinates, ObjectStore};

/// Handles of the running workers. The result channel closes by itself once
/// every worker has exited and dropped its sender.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `count` workers pulling from `parts` and pushing to `results`.
    pub fn spawn(
        count: usize,
        store: Arc<dyn ObjectStore>,
        object: Arc<ObjectCoordinates>,
        parts: mpsc::Receiver<PartDescriptor>,
        results: mpsc::SyncSender<PartResult>,
        cancel: CancelToken,
    ) -> Self {
        let parts = Arc::new(Mutex::new(parts));
        let handles = (0..count)
            .map(|id| {
                let worker = Worker {
                    id,
                    store: Arc::clone(&store),
                    object: Arc::clone(&object),
                    parts: Arc::clone(&parts),
                    results: results.clone(),
                    cancel: cancel.clone(),
                };
                thread::spawn(move || worker.run())
            })
            .collect();
        Self { handles }
    }

    /// Wait for every worker to exit.
    pub fn join(self) -> Result<(), TransferError> {
        let mut panicked = false;
        for handle in self.handles {
            if handle.join().is_err() {
                panicked = true;
            }
        }
        if panicked {
            return Err(TransferError::WorkerPanicked);
        }
        Ok(())
    }
}

/// Fails the run if the worker unwinds, so the producer stops waiting on a
/// flow slot that the lost part will never give back.
struct UnwindGuard<'a>(&'a CancelToken);

impl Drop for UnwindGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.fail(TransferError::WorkerPanicked);
        }
    }
}

struct Worker {
    id: usize,
    store: Arc<dyn ObjectStore>,
    object: Arc<ObjectCoordinates>,
    parts: Arc<Mutex<mpsc::Receiver<PartDescriptor>>>,
    results: mpsc::SyncSender<PartResult>,
    cancel: CancelToken,
}

impl Worker {
    fn run(self) {
        let _guard = UnwindGuard(&self.cancel);
        while !self.cancel.is_cancelled() {
            let Some(part) = self.next_part() else {
                break;
            };
            match self.fetch(&part) {
                Ok(result) => {
                    if self.results.send(result).is_err() {
                        // Writer is gone; it has already recorded why.
                        break;
                    }
                }
                Err(err) => {
                    self.cancel.fail(err);
                    break;
                }
            }
        }
        tracing::trace!(worker = self.id, "fetch worker finished");
    }

    /// Next part, or `None` once the producer has closed the channel.
    fn next_part(&self) -> Option<PartDescriptor> {
        let parts = self.parts.lock().unwrap_or_else(PoisonError::into_inner);
        parts.recv().ok()
    }

    fn fetch(&self, part: &PartDescriptor) -> Result<PartResult, TransferError> {
        tracing::trace!(
            worker = self.id,
            index = part.index,
            range = %part.range_header_value(),
            "fetching part"
        );
        let payload = self
            .store
            .fetch_range(&self.object, part.start, part.end)
            .map_err(|source| TransferError::Fetch {
                index: part.index,
                source,
            })?;
        let received = payload.len() as u64;
        if received != part.len() {
            return Err(TransferError::Fetch {
                index: part.index,
                source: FetchError::ShortRead {
                    expected: part.len(),
                    received,
                },
            });
        }
        Ok(PartResult {
            index: part.index,
            payload,
        })
    }
}
