//! `txl list` – transfers of an account, newest first.

use anyhow::Result;
use chrono::{DateTime, Local};
use txl_core::broker::{sort_newest_first, BrokerClient, Transfer};
use txl_core::config::TxlConfig;
use txl_core::report::format_bytes;

const MESSAGE_WIDTH: usize = 24;
const HEADERS: [&str; 6] = ["Url", "Size", "Expiry", "Encrypted", "Name", "Message"];

pub fn run_list(cfg: &TxlConfig, user: &str, password: &str) -> Result<()> {
    let broker = BrokerClient::from_config(cfg);
    let mut transfers = broker.list_transfers(user, password)?;
    if transfers.is_empty() {
        println!("No transfers.");
        return Ok(());
    }
    sort_newest_first(&mut transfers);
    print!("{}", render_table(&transfers));
    Ok(())
}

/// Columns padded to their widest cell and separated by `|`.
fn render_table(transfers: &[Transfer]) -> String {
    let rows: Vec<[String; 6]> = transfers
        .iter()
        .map(|t| {
            [
                t.link(),
                format_bytes(t.size),
                format_expiry(t),
                t.encrypted.to_string(),
                t.filename.clone(),
                truncate(&t.message, MESSAGE_WIDTH),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &HEADERS.map(String::from), &widths);
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row(out: &mut String, cells: &[String; 6], widths: &[usize; 6]) {
    let last = cells.len() - 1;
    for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
        if i == last {
            out.push_str(cell);
        } else {
            out.push_str(&format!("{:<width$} | ", cell, width = width));
        }
    }
    out.push('\n');
}

/// Local `YYYY-MM-DD HH:MM`, or `-` when the broker sent no usable expiry.
fn format_expiry(t: &Transfer) -> String {
    t.expiry_secs()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|utc| utc.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// At most `max` characters, the last three replaced by `...` when cut.
fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = if max > 3 { max - 3 } else { max };
    let mut t: String = s.chars().take(keep).collect();
    t.push_str("...");
    t
}
