// src/main.rs
//
// =============================================================================
// WF2WF: CLI ENTRY POINT
// =============================================================================

use clap::Parser;
use wf2wf::cli::{self, Cli};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli::run(cli) {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            log::error!("{e}");
            std::process::exit(e.exit_code());
        }
    }
}
