//! Workstation synchronisation engine binary entry point.
use clap::Parser;
use devsync_cli::{cancel, cli, commands, logging};

fn main() {
    enable_ansi_support::enable_ansi_support().ok(); // best-effort; no-op on non-Windows
    let args = cli::Cli::parse();
    let command_name = args.command_name();
    logging::init_subscriber(args.verbose, command_name);

    let cancel = cancel::CancelToken::new();
    {
        let handler_token = cancel.clone();
        ctrlc::set_handler(move || {
            handler_token.cancel("割り込みを受信しました (Ctrl-C)");
        })
        .ok();
    }

    let result = commands::dispatch(args, &cancel);

    if let Err(e) = result {
        eprintln!("\x1b[31mError: {e:#}\x1b[0m");
        std::process::exit(1);
    }
}
