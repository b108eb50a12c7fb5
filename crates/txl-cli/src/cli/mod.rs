//! CLI for TXL transfers.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use txl_core::config;

use commands::{run_checksum, run_completions, run_get, run_list, run_man, GetArgs};

/// Top-level CLI for the TXL transfer client.
#[derive(Debug, Parser)]
#[command(name = "txl", version)]
#[command(about = "TXL: command line client for TransferXL.com", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a transfer.
    #[command(after_help = "Examples:\n  txl get https://transferxl.com/<short-url>\n  \
                            txl get -d secret https://transferxl.com/<encrypted-short-url>")]
    Get {
        /// Short URL or full transfer link. Read from stdin when omitted.
        short_url: Option<String>,

        /// File for output (default: the transfer's file name).
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Append a `get,bucket,object,bytes,secs,rate` line to this file.
        #[arg(short, long, value_name = "FILE")]
        log: Option<PathBuf>,

        /// Decryption phrase for encrypted transfers.
        #[arg(short, long, value_name = "PHRASE")]
        decrypt: Option<String>,

        /// Print a dot for every part written.
        #[arg(short, long)]
        verbose: bool,

        /// Print the SHA-256 of the downloaded file.
        #[arg(long)]
        sha256: bool,
    },

    /// List the transfers of an account, newest first.
    List {
        /// User account.
        #[arg(short, long)]
        user: String,

        /// Password for the account.
        #[arg(short, long)]
        password: String,
    },

    /// Compute SHA-256 of a file (e.g. after download).
    Checksum {
        /// Path to the file.
        path: PathBuf,
    },

    /// Print shell completions to stdout.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print the man page to stdout.
    Man,
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Get {
                short_url,
                output,
                log,
                decrypt,
                verbose,
                sha256,
            } => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_get(
                    &cfg,
                    GetArgs {
                        short_url,
                        output,
                        log,
                        decrypt,
                        verbose,
                        sha256,
                    },
                )?;
            }
            CliCommand::List { user, password } => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_list(&cfg, &user, &password)?;
            }
            CliCommand::Checksum { path } => run_checksum(&path)?,
            CliCommand::Completions { shell } => run_completions(shell)?,
            CliCommand::Man => run_man()?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
