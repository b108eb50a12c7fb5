//! Post-transfer reporting: CSV-ish log line, human summary, IEC sizes.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

const MIB: f64 = 1024.0 * 1024.0;

/// Outcome of one finished transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferReport {
    /// `get` for downloads.
    pub operation: &'static str,
    pub bucket: String,
    pub object: String,
    pub bytes: u64,
    pub elapsed: Duration,
}

impl TransferReport {
    pub fn download(bucket: &str, object: &str, bytes: u64, elapsed: Duration) -> Self {
        Self {
            operation: "get",
            bucket: bucket.to_string(),
            object: object.to_string(),
            bytes,
            elapsed,
        }
    }

    /// Throughput in Mbit/s (2^20 bits); 0 when no time has elapsed.
    pub fn mbit_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.bytes as f64 * 8.0 / MIB / secs
    }

    /// `get,<bucket>,<object>,<bytes>,<secs>s,<rate> Mbit/s` (no newline).
    pub fn log_line(&self) -> String {
        format!(
            "{},{},{},{},{:.1}s,{:.0} Mbit/s",
            self.operation,
            self.bucket,
            self.object,
            self.bytes,
            self.elapsed.as_secs_f64(),
            self.mbit_per_sec()
        )
    }

    /// Append [`log_line`](Self::log_line) to `path`, creating it if needed.
    pub fn append_to(&self, path: &Path) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("open log file {}", path.display()))?;
        writeln!(file, "{}", self.log_line())
            .with_context(|| format!("write log file {}", path.display()))?;
        Ok(())
    }

    /// `Downloaded '<file>' in 1.2s (3.4 MB at 27 Mbit/s)`.
    pub fn summary_line(&self, file: &Path) -> String {
        format!(
            "Downloaded '{}' in {:.1}s ({:.1} MB at {:.0} Mbit/s)",
            file.display(),
            self.elapsed.as_secs_f64(),
            self.bytes as f64 / MIB,
            self.mbit_per_sec()
        )
    }
}

/// Human size in IEC units: `512 B`, `1.5 KiB`, `79 MiB`. One decimal below
/// ten units, none above.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if value < 10.0 {
        format!("{:.1} {}", value, UNITS[unit])
    } else {
        format!("{:.0} {}", value, UNITS[unit])
    }
}
