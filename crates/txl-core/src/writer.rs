//! Sequential sink writer fed by out-of-order part results.
//!
//! The writer is the only task that touches the sink. It writes parts strictly
//! by ascending index, so the sink never needs to seek, and returns one flow
//! slot per part written.

use std::io::Write;
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{ProtocolViolation, TransferError};
use crate::flow::FlowController;
use crate::pipeline::DownloadSummary;
use crate::progress::ProgressStats;
use crate::sequencer::{PartResult, Sequencer};

/// Consumes [`PartResult`]s in any order and writes them to `sink` in order.
pub struct OrderedWriter<W: Write> {
    sink: W,
    flow: Arc<FlowController>,
    sequencer: Sequencer,
    part_count: u64,
    total_bytes: u64,
    bytes_written: u64,
    progress: Option<mpsc::Sender<ProgressStats>>,
    started: Instant,
}

impl<W: Write> OrderedWriter<W> {
    /// Writer for an object of `total_bytes` split into `part_count` parts.
    pub fn new(sink: W, flow: Arc<FlowController>, part_count: u64, total_bytes: u64) -> Self {
        Self {
            sink,
            flow,
            sequencer: Sequencer::new(),
            part_count,
            total_bytes,
            bytes_written: 0,
            progress: None,
            started: Instant::now(),
        }
    }

    /// Send a [`ProgressStats`] snapshot after every part written.
    pub fn with_progress(mut self, tx: mpsc::Sender<ProgressStats>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Parts buffered behind a gap right now.
    pub fn pending_len(&self) -> usize {
        self.sequencer.pending_len()
    }

    /// Accept one part. Writes it (and any buffered run behind it) if it is the
    /// next one due, otherwise buffers it.
    pub fn accept(&mut self, part: PartResult) -> Result<(), TransferError> {
        let index = part.index;
        let ready = self.sequencer.push(part)?;
        if ready.is_empty() {
            tracing::trace!(
                index,
                expected = self.sequencer.next_index(),
                pending = self.sequencer.pending_len(),
                "part buffered"
            );
        }
        for part in ready {
            self.write_part(part)?;
        }
        Ok(())
    }

    /// Drain `results` until every sender is gone, then verify completeness.
    pub fn consume(mut self, results: mpsc::Receiver<PartResult>) -> Result<DownloadSummary, TransferError> {
        for part in results {
            self.accept(part)?;
        }
        self.finish()
    }

    /// Verify that every part was written and flush the sink.
    pub fn finish(mut self) -> Result<DownloadSummary, TransferError> {
        self.sequencer.finish(self.part_count)?;
        if self.bytes_written != self.total_bytes {
            return Err(ProtocolViolation::SizeMismatch {
                written: self.bytes_written,
                expected: self.total_bytes,
            }
            .into());
        }
        self.sink.flush().map_err(TransferError::Output)?;
        Ok(DownloadSummary {
            bytes_written: self.bytes_written,
            parts_written: self.sequencer.next_index(),
            peak_pending: self.sequencer.peak_pending(),
        })
    }

    fn write_part(&mut self, part: PartResult) -> Result<(), TransferError> {
        // write_all surfaces a short write as ErrorKind::WriteZero.
        self.sink
            .write_all(&part.payload)
            .map_err(|source| TransferError::SinkWrite {
                index: part.index,
                source,
            })?;
        self.bytes_written += part.payload.len() as u64;
        self.flow.release();
        tracing::trace!(index = part.index, bytes = part.payload.len(), "part written");

        if let Some(tx) = &self.progress {
            let _ = tx.send(ProgressStats {
                parts_done: part.index + 1,
                part_count: self.part_count,
                bytes_done: self.bytes_written,
                total_bytes: self.total_bytes,
                elapsed_secs: self.started.elapsed().as_secs_f64(),
            });
        }
        Ok(())
    }
}
