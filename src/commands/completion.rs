//! Shell completion generation.
use clap::CommandFactory as _;

use crate::cli::{Cli, CompletionOpts};

/// Print a completion script for the requested shell to stdout.
pub fn run(opts: &CompletionOpts) {
    let mut command = Cli::command();
    clap_complete::generate(opts.shell, &mut command, "devsync", &mut std::io::stdout());
}
