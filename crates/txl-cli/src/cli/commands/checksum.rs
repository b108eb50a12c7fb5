//! `txl checksum` – SHA-256 of a file.

use anyhow::Result;
use std::path::Path;
use txl_core::checksum;

/// Print `<hex digest>  <path>`, the `sha256sum` layout.
pub fn run_checksum(path: &Path) -> Result<()> {
    let digest = checksum::sha256_path(path)?;
    println!("{}  {}", digest, path.display());
    Ok(())
}
