//! Progress snapshots sent by the writer after each part reaches the sink.
//!
//! The CLI ticker prints a dot per snapshot and closes with the last
//! snapshot's share and rate.

/// Snapshot of download progress (CLI-friendly).
#[derive(Debug, Clone)]
pub struct ProgressStats {
    /// Parts written to the sink so far.
    pub parts_done: u64,
    /// Total number of planned parts.
    pub part_count: u64,
    /// Bytes written to the sink so far.
    pub bytes_done: u64,
    /// Object size in bytes.
    pub total_bytes: u64,
    /// Elapsed time since the pipeline started (seconds).
    pub elapsed_secs: f64,
}

impl ProgressStats {
    /// Write rate in bytes per second (0 if elapsed is 0).
    pub fn bytes_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.bytes_done as f64 / self.elapsed_secs
    }

    /// Fraction complete in [0.0, 1.0].
    pub fn fraction(&self) -> f64 {
        if self.total_bytes == 0 {
            return 1.0;
        }
        (self.bytes_done as f64 / self.total_bytes as f64).min(1.0)
    }

    pub fn is_complete(&self) -> bool {
        self.parts_done >= self.part_count
    }
}
