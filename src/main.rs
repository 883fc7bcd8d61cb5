use anyhow::Result;
use clap::Parser;
use substack_api::cli::{default_log_level, run, Args};

/// Logs go to stderr so stdout stays pure JSON.
/// Priority: RUST_LOG env var > quiet flag > verbose flag > default (warn)
fn init_tracing(args: &Args) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_log_level(args)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {}", e))
}

fn main() {
    use std::error::Error;
    let args = Args::parse();
    if let Err(e) = init_tracing(&args) {
        eprintln!("{:#}", e);
    }
    tracing::debug!(?args, "CLI arguments parsed");
    if let Err(e) = run(&args) {
        eprintln!("{}", e);
        if args.verbose > 0 {
            let mut source = e.source();
            while let Some(s) = source {
                eprintln!("  cause: {}", s);
                source = s.source();
            }
        }
        std::process::exit(e.exit_code());
    }
}
