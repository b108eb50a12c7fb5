//! Error types for object lookup, range fetches and the download pipeline.

use std::io;

/// Failure reported by the object store (size lookup or a single range fetch).
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Curl reported an error (timeout, connection, etc.).
    #[error(transparent)]
    Curl(#[from] curl::Error),
    /// Response had a non-2xx status.
    #[error("HTTP {0}")]
    Http(u32),
    /// A ranged GET succeeded but the server did not answer with 206.
    #[error("expected 206 Partial Content, got HTTP {0}")]
    InvalidRangeResponse(u32),
    /// Fewer (or more) bytes arrived than the range asked for.
    #[error("short read: expected {expected} bytes, got {received}")]
    ShortRead { expected: u64, received: u64 },
    /// HEAD response carried no usable `Content-Length`.
    #[error("response has no Content-Length")]
    MissingContentLength,
    #[error("{0}")]
    Other(String),
}

/// Logic errors in part bookkeeping. These indicate a planner/worker bug
/// rather than an I/O problem.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolViolation {
    /// A part arrived whose index was already written.
    #[error("part {index} arrived after part {expected} was expected")]
    StaleIndex { index: u64, expected: u64 },
    /// The same index arrived twice while still pending.
    #[error("part {0} arrived twice")]
    DuplicateIndex(u64),
    /// Results ended with parts still buffered behind a gap.
    #[error("{pending} part(s) still buffered waiting for part {expected}")]
    PartsPending { expected: u64, pending: usize },
    /// Results ended before every planned part was written.
    #[error("only {written} of {total} parts were written")]
    PartsMissing { written: u64, total: u64 },
    /// All parts were written but the byte count does not match the object.
    #[error("wrote {written} bytes, object size is {expected}")]
    SizeMismatch { written: u64, expected: u64 },
}

/// Fatal error of a download. The first one observed is returned to the caller;
/// the output file must then be treated as invalid.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// Object size/metadata could not be retrieved; nothing was planned.
    #[error("object lookup failed: {0}")]
    Lookup(#[source] FetchError),
    /// A worker's range request failed or came back short.
    #[error("part {index} fetch failed: {source}")]
    Fetch {
        index: u64,
        #[source]
        source: FetchError,
    },
    /// Writing a part to the sink failed or was short (`WriteZero`).
    #[error("part {index} write failed: {source}")]
    SinkWrite {
        index: u64,
        #[source]
        source: io::Error,
    },
    #[error("protocol violation: {0}")]
    Protocol(#[from] ProtocolViolation),
    /// Opening, flushing or syncing the output failed outside a part write.
    #[error("output: {0}")]
    Output(#[source] io::Error),
    #[error("worker thread panicked")]
    WorkerPanicked,
    #[error("invalid transfer options: {0}")]
    InvalidOptions(&'static str),
}

impl TransferError {
    /// True for bookkeeping bugs, false for I/O, network and setup failures.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, TransferError::Protocol(_))
    }
}
