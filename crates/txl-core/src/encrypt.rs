//! SSE-C (server-side encryption with customer-provided keys).
//!
//! The object key is derived from a passphrase with Argon2id, salted with
//! bucket name + object key, so the same passphrase yields a different key
//! per object. The store decrypts transparently when the key is presented on
//! every HEAD/GET.

use anyhow::{anyhow, bail, Result};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use std::fmt;

pub const HEADER_ALGORITHM: &str = "x-amz-server-side-encryption-customer-algorithm";
pub const HEADER_KEY: &str = "x-amz-server-side-encryption-customer-key";
pub const HEADER_KEY_MD5: &str = "x-amz-server-side-encryption-customer-key-MD5";

const ALGORITHM: &str = "AES256";

// Argon2id parameters used when the transfer was uploaded.
const ARGON_TIME_COST: u32 = 1;
const ARGON_MEMORY_KIB: u32 = 64 * 1024;
const ARGON_PARALLELISM: u32 = 4;
const KEY_LEN: usize = 32;
// argon2 refuses salts shorter than this.
const MIN_SALT_LEN: usize = 8;

/// 256-bit customer key for SSE-C requests.
#[derive(Clone, PartialEq, Eq)]
pub struct SseCustomerKey {
    key: [u8; KEY_LEN],
}

impl SseCustomerKey {
    /// Derive the key from `passphrase`, salted with `salt` (bucket + object key).
    pub fn derive(passphrase: &[u8], salt: &[u8]) -> Result<Self> {
        if salt.len() < MIN_SALT_LEN {
            bail!(
                "bucket and object name too short to salt the decryption key \
                 (need at least {} bytes, got {})",
                MIN_SALT_LEN,
                salt.len()
            );
        }
        let params = Params::new(
            ARGON_MEMORY_KIB,
            ARGON_TIME_COST,
            ARGON_PARALLELISM,
            Some(KEY_LEN),
        )
        .map_err(|e| anyhow!("argon2 params: {}", e))?;
        let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
        let mut key = [0u8; KEY_LEN];
        argon
            .hash_password_into(passphrase, salt, &mut key)
            .map_err(|e| anyhow!("derive SSE-C key: {}", e))?;
        Ok(Self { key })
    }

    /// Convenience for the usual salt: bucket name followed by object key.
    pub fn for_object(passphrase: &str, bucket: &str, object: &str) -> Result<Self> {
        let salt = format!("{}{}", bucket, object);
        Self::derive(passphrase.as_bytes(), salt.as_bytes())
    }

    /// The three request headers that carry this key.
    pub fn headers(&self) -> [(&'static str, String); 3] {
        let digest = md5::compute(self.key);
        [
            (HEADER_ALGORITHM, ALGORITHM.to_string()),
            (HEADER_KEY, B64.encode(self.key)),
            (HEADER_KEY_MD5, B64.encode(digest.0)),
        ]
    }
}

impl fmt::Debug for SseCustomerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SseCustomerKey(<redacted>)")
    }
}
