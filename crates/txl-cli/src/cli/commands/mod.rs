//! CLI command handlers, one file per command.

mod checksum;
mod completions;
mod get;
mod list;

pub use checksum::run_checksum;
pub use completions::{run_completions, run_man};
pub use get::{run_get, GetArgs};
pub use list::run_list;
