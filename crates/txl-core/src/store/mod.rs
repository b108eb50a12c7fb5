//! Object store collaborator: size lookup and byte-range fetches.
//!
//! The pipeline only depends on [`ObjectStore`]; [`S3Client`] is the
//! production implementation for S3-compatible endpoints.

mod head;
mod s3;

pub use head::ObjectMeta;
pub use s3::{S3Client, S3Settings};

use crate::encrypt::SseCustomerKey;
use crate::error::FetchError;

/// Access/secret key pair for the store.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Everything needed to address one object. Immutable for a pipeline run and
/// shared by reference with every worker.
#[derive(Debug, Clone)]
pub struct ObjectCoordinates {
    /// Host (and optional port) of the store, without scheme.
    pub endpoint: String,
    pub credentials: Credentials,
    pub bucket: String,
    pub key: String,
    /// SSE-C key when the object was stored encrypted.
    pub encryption: Option<SseCustomerKey>,
}

/// Range-addressable object storage.
pub trait ObjectStore: Send + Sync {
    /// Look up the object's size and validators.
    fn stat(&self, object: &ObjectCoordinates) -> Result<ObjectMeta, FetchError>;

    /// Fetch bytes `[start, end)`. Implementations must return exactly
    /// `end - start` bytes or fail.
    fn fetch_range(
        &self,
        object: &ObjectCoordinates,
        start: u64,
        end: u64,
    ) -> Result<Vec<u8>, FetchError>;
}
