use clap::Parser;
use tracing_subscriber::EnvFilter;

use moderar::cli::{self, Cli};

fn main() {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if let Err(err) = cli::execute(cli) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
