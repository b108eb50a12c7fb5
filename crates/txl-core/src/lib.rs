//! Parallel chunked downloads of S3-compatible objects with in-order
//! reassembly, plus the broker client and reporting used by the `txl` CLI.

pub mod config;
pub mod logging;

pub mod broker;
pub mod cancel;
pub mod checksum;
pub mod encrypt;
pub mod error;
pub mod flow;
pub mod pipeline;
pub mod planner;
pub mod progress;
pub mod report;
pub mod sequencer;
pub mod store;
pub mod worker;
pub mod writer;

pub use error::{FetchError, ProtocolViolation, TransferError};
pub use pipeline::{download, get_object, DownloadSummary, TransferOptions};
pub use store::{ObjectCoordinates, ObjectStore, S3Client};
