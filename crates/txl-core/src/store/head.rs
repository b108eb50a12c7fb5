//! Parse HEAD response header lines into [`ObjectMeta`].

use crate::error::FetchError;

/// Size and validators of a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Total size in bytes (`Content-Length`).
    pub size: u64,
    /// `ETag` without surrounding quotes.
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

/// Parse collected header lines. When several responses were seen (redirects,
/// interim responses), only the headers after the last status line count.
pub(crate) fn parse_headers(lines: &[String]) -> Result<ObjectMeta, FetchError> {
    let mut content_length = None;
    let mut etag = None;
    let mut last_modified = None;

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.starts_with("HTTP/") {
            content_length = None;
            etag = None;
            last_modified = None;
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.parse::<u64>().ok();
            } else if name.eq_ignore_ascii_case("etag") {
                etag = Some(value.trim_matches('"').to_string());
            } else if name.eq_ignore_ascii_case("last-modified") {
                last_modified = Some(value.to_string());
            }
        }
    }

    Ok(ObjectMeta {
        size: content_length.ok_or(FetchError::MissingContentLength)?,
        etag,
        last_modified,
    })
}
