//! Viking CLI - command-line access to the context filesystem.
//!
//! See [`cli`] for the command set.

mod cli;
pub mod ui;

use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run()
}
