//! `txl get` – resolve a short URL and download the transfer.

use anyhow::{bail, Context, Result};
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use txl_core::broker::BrokerClient;
use txl_core::checksum;
use txl_core::config::TxlConfig;
use txl_core::encrypt::SseCustomerKey;
use txl_core::progress::ProgressStats;
use txl_core::report::{format_bytes, TransferReport};
use txl_core::store::{ObjectStore, S3Client};
use txl_core::get_object;

#[derive(Debug, Default)]
pub struct GetArgs {
    pub short_url: Option<String>,
    pub output: Option<PathBuf>,
    pub log: Option<PathBuf>,
    pub decrypt: Option<String>,
    pub verbose: bool,
    pub sha256: bool,
}

pub fn run_get(cfg: &TxlConfig, args: GetArgs) -> Result<()> {
    let short_url = match args.short_url {
        Some(s) => s,
        None => read_short_url(io::stdin().lock())?,
    };

    let broker = BrokerClient::from_config(cfg);
    let creds = broker.download_credentials(&short_url)?;
    let output = args.output.unwrap_or_else(|| creds.local_file_name());

    let encryption = args
        .decrypt
        .as_deref()
        .map(|phrase| SseCustomerKey::for_object(phrase, &creds.bucket, &creds.object))
        .transpose()?;
    let object = Arc::new(creds.coordinates(&cfg.default_endpoint, encryption));
    let store: Arc<dyn ObjectStore> = Arc::new(S3Client::new(cfg.s3_settings()));
    let options = cfg.transfer_options();

    let (progress, ticker) = if args.verbose {
        let (tx, rx) = mpsc::channel();
        (Some(tx), Some(spawn_ticker(rx)))
    } else {
        (None, None)
    };

    let started = Instant::now();
    let result = get_object(store, object, &options, &output, progress);
    let elapsed = started.elapsed();
    // The writer dropped its sender when the run ended, so the ticker is done.
    if let Some(ticker) = ticker {
        let _ = ticker.join();
    }
    let summary = result.with_context(|| format!("download {}", output.display()))?;

    let report = TransferReport::download(&creds.bucket, &creds.object, summary.bytes_written, elapsed);
    tracing::info!("{}", report.log_line());
    if let Some(log) = &args.log {
        report.append_to(log)?;
    }
    println!("{}", report.summary_line(&output));

    if args.sha256 {
        let digest = checksum::sha256_path(&output)?;
        println!("{}  {}", digest, output.display());
    }
    Ok(())
}

/// Whole of `input`, trimmed. Pasted links usually end with a newline.
fn read_short_url<R: Read>(mut input: R) -> Result<String> {
    let mut buf = String::new();
    input
        .read_to_string(&mut buf)
        .context("read short url from stdin")?;
    let trimmed = buf.trim();
    if trimmed.is_empty() {
        bail!("no short url given");
    }
    Ok(trimmed.to_string())
}

/// One `.` per part written, then how far the run got and how fast.
fn spawn_ticker(progress: mpsc::Receiver<ProgressStats>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut out = io::stdout();
        let mut last = None;
        for stats in progress {
            let _ = write!(out, ".");
            let _ = out.flush();
            last = Some(stats);
        }
        if let Some(stats) = last {
            let _ = writeln!(out, " {}", ticker_tail(&stats));
        }
    })
}

fn ticker_tail(stats: &ProgressStats) -> String {
    format!(
        "{:.0}% at {}/s",
        stats.fraction() * 100.0,
        format_bytes(stats.bytes_per_sec() as u64)
    )
}
