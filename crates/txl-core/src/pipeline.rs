//! Download pipeline: planner, producer, worker pool and ordered writer wired
//! together for one object.
//!
//! ```text
//! producer --(parts, bounded)--> workers x N --(results, bounded)--> writer --> sink
//!     ^                                                                 |
//!     +---------------------- flow slot released -----------------------+
//! ```
//!
//! The producer and workers run on their own threads; the writer runs on the
//! calling thread. Every channel is closed by dropping its last sender, so a
//! failure anywhere drains the rest of the run without hanging.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::cancel::CancelToken;
use crate::error::TransferError;
use crate::flow::FlowController;
use crate::planner::{PartDescriptor, PartPlan};
use crate::progress::ProgressStats;
use crate::sequencer::PartResult;
use crate::store::{ObjectCoordinates, ObjectStore};
use crate::worker::WorkerPool;
use crate::writer::OrderedWriter;

pub const DEFAULT_PART_SIZE: u64 = 100 * 1024 * 1024;
pub const DEFAULT_WORKERS: usize = 16;

/// Tuning knobs of one download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferOptions {
    /// Bytes per part (the last part may be shorter).
    pub part_size: u64,
    /// Number of concurrent range fetches.
    pub workers: usize,
    /// Maximum parts dispatched but not yet written.
    pub flow_ceiling: usize,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self::new(DEFAULT_PART_SIZE, DEFAULT_WORKERS)
    }
}

impl TransferOptions {
    /// Options with the flow ceiling equal to the worker count.
    pub fn new(part_size: u64, workers: usize) -> Self {
        Self {
            part_size,
            workers,
            flow_ceiling: workers,
        }
    }

    pub fn with_flow_ceiling(mut self, flow_ceiling: usize) -> Self {
        self.flow_ceiling = flow_ceiling;
        self
    }

    pub fn validate(&self) -> Result<(), TransferError> {
        if self.part_size == 0 {
            return Err(TransferError::InvalidOptions("part size must be at least 1 byte"));
        }
        if self.workers == 0 {
            return Err(TransferError::InvalidOptions("need at least one worker"));
        }
        if self.flow_ceiling == 0 {
            return Err(TransferError::InvalidOptions("flow ceiling must be at least 1"));
        }
        Ok(())
    }
}

/// What a successful run wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub bytes_written: u64,
    pub parts_written: u64,
    /// Most parts ever buffered behind a gap at once.
    pub peak_pending: usize,
}

/// Download `total_size` bytes of `object` into `sink`, in order.
///
/// On error the sink holds an unspecified prefix of the object and must be
/// discarded. The first fatal error observed by any task is returned.
pub fn download<W: Write>(
    store: Arc<dyn ObjectStore>,
    object: Arc<ObjectCoordinates>,
    total_size: u64,
    options: &TransferOptions,
    sink: W,
    progress: Option<mpsc::Sender<ProgressStats>>,
) -> Result<DownloadSummary, TransferError> {
    options.validate()?;
    let plan = PartPlan::new(total_size, options.part_size);
    let part_count = plan.part_count();
    if part_count == 0 {
        tracing::debug!(bucket = %object.bucket, key = %object.key, "empty object, nothing to fetch");
        return Ok(DownloadSummary::default());
    }
    let workers = usize::try_from(part_count)
        .map_or(options.workers, |parts| options.workers.min(parts));

    tracing::info!(
        bucket = %object.bucket,
        key = %object.key,
        total_size,
        part_count,
        workers,
        flow_ceiling = options.flow_ceiling,
        "starting download"
    );

    let cancel = CancelToken::new();
    let flow = Arc::new(FlowController::new(options.flow_ceiling));
    let (part_tx, part_rx) = mpsc::sync_channel::<PartDescriptor>(workers);
    let (result_tx, result_rx) = mpsc::sync_channel::<PartResult>(workers);

    let producer = spawn_producer(plan, part_tx, Arc::clone(&flow), cancel.clone());
    // The pool owns the only result senders from here on.
    let pool = WorkerPool::spawn(workers, store, object, part_rx, result_tx, cancel.clone());

    let mut writer = OrderedWriter::new(sink, Arc::clone(&flow), part_count, total_size);
    if let Some(tx) = progress {
        writer = writer.with_progress(tx);
    }
    // consume() drops the result receiver on return, which unblocks any
    // worker still sending after a writer failure.
    let summary = match writer.consume(result_rx) {
        Ok(summary) => Some(summary),
        Err(err) => {
            cancel.fail(err);
            None
        }
    };

    if producer.join().is_err() {
        cancel.fail(TransferError::WorkerPanicked);
    }
    if let Err(err) = pool.join() {
        cancel.fail(err);
    }

    match (cancel.take_failure(), summary) {
        (Some(err), _) => Err(err),
        (None, Some(summary)) => {
            tracing::debug!(
                bytes = summary.bytes_written,
                parts = summary.parts_written,
                peak_pending = summary.peak_pending,
                peak_in_flight = flow.peak(),
                "download complete"
            );
            Ok(summary)
        }
        // fail() always stores the error when the slot is empty.
        (None, None) => Err(TransferError::WorkerPanicked),
    }
}

/// Look up the object's size, truncate `output` and download into it.
pub fn get_object(
    store: Arc<dyn ObjectStore>,
    object: Arc<ObjectCoordinates>,
    options: &TransferOptions,
    output: &Path,
    progress: Option<mpsc::Sender<ProgressStats>>,
) -> Result<DownloadSummary, TransferError> {
    options.validate()?;
    let meta = store.stat(&object).map_err(TransferError::Lookup)?;
    let file = File::create(output).map_err(TransferError::Output)?;
    let summary = download(store, object, meta.size, options, &file, progress)?;
    file.sync_all().map_err(TransferError::Output)?;
    Ok(summary)
}

/// Dispatch every planned part, taking a flow slot before each send. Stops
/// early when the run is cancelled or every worker has gone away; dropping
/// `parts` on exit closes the channel.
fn spawn_producer(
    plan: PartPlan,
    parts: mpsc::SyncSender<PartDescriptor>,
    flow: Arc<FlowController>,
    cancel: CancelToken,
) -> JoinHandle<()> {
    thread::spawn(move || {
        for part in plan {
            if !flow.acquire(&cancel) {
                tracing::debug!(index = part.index, "dispatch stopped, transfer aborted");
                break;
            }
            let index = part.index;
            if parts.send(part).is_err() {
                flow.release();
                tracing::debug!(index, "dispatch stopped, no workers left");
                break;
            }
        }
    })
}
