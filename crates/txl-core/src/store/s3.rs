//! S3-compatible object store over libcurl.
//!
//! Requests are path-style (`{scheme}://{endpoint}/{bucket}/{key}`) and
//! signed with AWS SigV4 by libcurl itself. SSE-C headers are attached to
//! every request when the object is encrypted.

use std::str;
use std::time::Duration;

use curl::easy::{Easy, List};
use url::Url;

use super::head::{self, ObjectMeta};
use super::{ObjectCoordinates, ObjectStore};
use crate::error::FetchError;

/// Connection settings shared by all requests of one client.
#[derive(Debug, Clone)]
pub struct S3Settings {
    /// SigV4 signing region for endpoints whose host does not name one.
    pub region: String,
    /// Use https (true) or plain http (false).
    pub secure: bool,
    pub connect_timeout: Duration,
}

impl Default for S3Settings {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            secure: true,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Region named by a regional S3 host such as `s3.eu-central-1.wasabisys.com`
/// or `s3-eu-west-1.amazonaws.com`. `None` for global hosts and bare
/// addresses, which sign with the configured region.
pub fn endpoint_region(endpoint: &str) -> Option<&str> {
    let host = endpoint.rsplit_once(':').map_or(endpoint, |(host, _)| host);
    let mut labels = host.split('.');
    let first = labels.next()?;
    let candidate = match first.strip_prefix("s3-") {
        Some(region) => region,
        None if first.eq_ignore_ascii_case("s3") => labels.next()?,
        None => return None,
    };
    // The region label must be followed by a domain.
    labels.next()?;
    let region_like = candidate != "external-1"
        && candidate.contains('-')
        && candidate.ends_with(|c: char| c.is_ascii_digit())
        && candidate.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    region_like.then_some(candidate)
}

/// Blocking S3 client; one curl handle per request, safe to share across workers.
#[derive(Debug, Clone, Default)]
pub struct S3Client {
    settings: S3Settings,
}

impl S3Client {
    pub fn new(settings: S3Settings) -> Self {
        Self { settings }
    }

    /// Path-style URL of the object. Key separators stay path separators;
    /// everything else is percent-encoded per segment.
    pub fn object_url(&self, object: &ObjectCoordinates) -> Result<Url, FetchError> {
        let scheme = if self.settings.secure { "https" } else { "http" };
        let mut url = Url::parse(&format!("{}://{}/", scheme, object.endpoint))
            .map_err(|e| FetchError::Other(format!("invalid endpoint {:?}: {}", object.endpoint, e)))?;
        url.path_segments_mut()
            .map_err(|_| FetchError::Other(format!("endpoint {:?} cannot hold a path", object.endpoint)))?
            .pop_if_empty()
            .push(&object.bucket)
            .extend(object.key.split('/'));
        Ok(url)
    }

    fn request(&self, object: &ObjectCoordinates) -> Result<Easy, FetchError> {
        let url = self.object_url(object)?;

        let mut easy = Easy::new();
        easy.url(url.as_str())?;
        easy.connect_timeout(self.settings.connect_timeout)?;
        // Abort if throughput drops below 1 KiB/s for 60s; hard cap one hour.
        easy.low_speed_limit(1024)?;
        easy.low_speed_time(Duration::from_secs(60))?;
        easy.timeout(Duration::from_secs(3600))?;

        let region = endpoint_region(&object.endpoint).unwrap_or(self.settings.region.as_str());
        easy.aws_sigv4(&format!("aws:amz:{}:s3", region))?;
        easy.username(&object.credentials.access_key)?;
        easy.password(&object.credentials.secret_key)?;

        if let Some(key) = &object.encryption {
            let mut list = List::new();
            for (name, value) in key.headers() {
                list.append(&format!("{}: {}", name, value))?;
            }
            easy.http_headers(list)?;
        }
        Ok(easy)
    }
}

impl ObjectStore for S3Client {
    fn stat(&self, object: &ObjectCoordinates) -> Result<ObjectMeta, FetchError> {
        let mut headers: Vec<String> = Vec::new();
        let mut easy = self.request(object)?;
        easy.nobody(true)?;
        {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    headers.push(s.trim_end().to_string());
                }
                true
            })?;
            transfer.perform()?;
        }

        let code = easy.response_code()?;
        if !(200..300).contains(&code) {
            return Err(FetchError::Http(code));
        }
        let meta = head::parse_headers(&headers)?;
        tracing::debug!(
            bucket = %object.bucket,
            key = %object.key,
            size = meta.size,
            etag = ?meta.etag,
            "object stat"
        );
        Ok(meta)
    }

    fn fetch_range(
        &self,
        object: &ObjectCoordinates,
        start: u64,
        end: u64,
    ) -> Result<Vec<u8>, FetchError> {
        if end <= start {
            return Ok(Vec::new());
        }
        let expected = end - start;
        let mut body: Vec<u8> = Vec::with_capacity(expected as usize);
        let mut received = 0u64;

        let mut easy = self.request(object)?;
        // curl expects "start-end" (inclusive), not "bytes=start-end".
        easy.range(&format!("{}-{}", start, end - 1))?;
        let performed = {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| {
                received += data.len() as u64;
                if received > expected {
                    // Returning less than data.len() aborts the transfer.
                    return Ok(0);
                }
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform()
        };
        if let Err(e) = performed {
            // An error document can outgrow the range and trip the overrun
            // abort; the status line is already known by then.
            let code = easy.response_code().unwrap_or(0);
            if code >= 300 {
                return Err(FetchError::Http(code));
            }
            if e.is_write_error() && received > expected {
                return Err(FetchError::ShortRead { expected, received });
            }
            return Err(FetchError::Curl(e));
        }

        let code = easy.response_code()?;
        if !(200..300).contains(&code) {
            return Err(FetchError::Http(code));
        }
        if code != 206 {
            return Err(FetchError::InvalidRangeResponse(code));
        }
        if body.len() as u64 != expected {
            return Err(FetchError::ShortRead {
                expected,
                received: body.len() as u64,
            });
        }
        Ok(body)
    }
}
