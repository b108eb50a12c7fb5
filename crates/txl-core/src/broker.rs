//! Client for the transfer broker's JSON API.
//!
//! The broker maps a short URL to temporary object-store credentials and
//! lists an account's transfers. Both calls are a JSON POST answered with
//! JSON; anything but 200 is a rejection.

use anyhow::{bail, Context, Result};
use curl::easy::{Easy, List};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::TxlConfig;
use crate::encrypt::SseCustomerKey;
use crate::store::{Credentials, ObjectCoordinates};

/// Prefix of shareable transfer links.
pub const SHORT_URL_PREFIX: &str = "https://transferxl.com/";

/// Reduce a pasted link (possibly with trailing newline) to its short code.
pub fn normalize_short_url(input: &str) -> &str {
    let trimmed = input.trim();
    trimmed.strip_prefix(SHORT_URL_PREFIX).unwrap_or(trimmed)
}

/// Temporary credentials for one transfer's object.
#[derive(Clone, Deserialize)]
pub struct DownloadCredentials {
    /// Store host; empty when the broker leaves it to the client.
    #[serde(default)]
    pub endpoint: String,
    #[serde(rename = "accesskey")]
    pub access_key: String,
    #[serde(rename = "secretkey")]
    pub secret_key: String,
    pub bucket: String,
    pub object: String,
    /// Name the uploader gave the file.
    #[serde(default)]
    pub filename: String,
}

impl fmt::Debug for DownloadCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadCredentials")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .field("bucket", &self.bucket)
            .field("object", &self.object)
            .field("filename", &self.filename)
            .finish()
    }
}

impl DownloadCredentials {
    /// Object address for the pipeline, falling back to `default_endpoint`.
    pub fn coordinates(
        &self,
        default_endpoint: &str,
        encryption: Option<SseCustomerKey>,
    ) -> ObjectCoordinates {
        let endpoint = if self.endpoint.trim().is_empty() {
            default_endpoint
        } else {
            self.endpoint.trim()
        };
        ObjectCoordinates {
            endpoint: endpoint.to_string(),
            credentials: Credentials {
                access_key: self.access_key.clone(),
                secret_key: self.secret_key.clone(),
            },
            bucket: self.bucket.clone(),
            key: self.object.clone(),
            encryption,
        }
    }

    /// Local output name: final path component of `filename`, else of the
    /// object key, else `transfer`.
    pub fn local_file_name(&self) -> PathBuf {
        [self.filename.as_str(), self.object.as_str()]
            .into_iter()
            .find_map(|name| Path::new(name).file_name())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("transfer"))
    }
}

/// One entry of an account's transfer listing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Transfer {
    #[serde(rename = "shorturl")]
    pub short_url: String,
    #[serde(default)]
    pub bucket: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "transfertype", default)]
    pub transfer_type: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub encrypted: bool,
    /// Nanoseconds since the epoch, as a decimal string.
    #[serde(rename = "creationdate", default)]
    pub creation_date: String,
    /// Nanoseconds since the epoch, as a decimal string.
    #[serde(default)]
    pub expiry: String,
}

impl Transfer {
    /// Creation time in nanoseconds; unparsable dates sort as oldest.
    pub fn created_nanos(&self) -> i64 {
        self.creation_date.trim().parse().unwrap_or(0)
    }

    /// Expiry as whole seconds since the epoch.
    pub fn expiry_secs(&self) -> Option<i64> {
        self.expiry
            .trim()
            .parse::<i64>()
            .ok()
            .map(|nanos| nanos / 1_000_000_000)
    }

    pub fn link(&self) -> String {
        format!("{}{}", SHORT_URL_PREFIX, self.short_url)
    }
}

/// Sort newest first by creation date.
pub fn sort_newest_first(transfers: &mut [Transfer]) {
    transfers.sort_by_key(|t| std::cmp::Reverse(t.created_nanos()));
}

#[derive(Serialize)]
struct DownloadCredentialsRequest<'a> {
    shorturl: &'a str,
}

#[derive(Serialize)]
struct ListTransfersRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct ListTransfersResponse {
    #[serde(default)]
    transfers: Vec<Transfer>,
}

/// Blocking broker client.
#[derive(Debug, Clone)]
pub struct BrokerClient {
    base_url: String,
    connect_timeout: Duration,
}

impl BrokerClient {
    /// `base_url` is joined with the endpoint name, so it should end with `/`.
    pub fn new(base_url: impl Into<String>, connect_timeout: Duration) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            base_url,
            connect_timeout,
        }
    }

    pub fn from_config(cfg: &TxlConfig) -> Self {
        Self::new(
            cfg.broker_url.clone(),
            Duration::from_secs(cfg.connect_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Exchange a short URL (or full link) for download credentials.
    pub fn download_credentials(&self, short_url: &str) -> Result<DownloadCredentials> {
        let shorturl = normalize_short_url(short_url);
        let (status, body) = self.post("downloadCredentials", &DownloadCredentialsRequest { shorturl })?;
        if status != 200 {
            tracing::debug!(status, shorturl, "broker rejected short url");
            bail!("bad short url");
        }
        decode(&body).context("decode download credentials")
    }

    /// All transfers of an account.
    pub fn list_transfers(&self, username: &str, password: &str) -> Result<Vec<Transfer>> {
        let (status, body) = self.post("listTransfers", &ListTransfersRequest { username, password })?;
        if status != 200 {
            tracing::debug!(status, username, "broker rejected credentials");
            bail!("bad credentials");
        }
        let resp: ListTransfersResponse = decode(&body).context("decode transfer list")?;
        Ok(resp.transfers)
    }

    fn post<T: Serialize>(&self, endpoint: &str, request: &T) -> Result<(u32, Vec<u8>)> {
        let url = format!("{}{}", self.base_url, endpoint);
        let payload = serde_json::to_vec(request).context("encode broker request")?;

        let mut easy = Easy::new();
        easy.url(&url)?;
        easy.connect_timeout(self.connect_timeout)?;
        easy.timeout(Duration::from_secs(60))?;
        easy.post(true)?;
        easy.post_fields_copy(&payload)?;
        let mut headers = List::new();
        headers.append("Content-Type: application/json")?;
        easy.http_headers(headers)?;

        let mut body = Vec::new();
        {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer
                .perform()
                .with_context(|| format!("POST {}", url))?;
        }
        let status = easy.response_code()?;
        tracing::debug!(%url, status, bytes = body.len(), "broker response");
        Ok((status, body))
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(body)?)
}
