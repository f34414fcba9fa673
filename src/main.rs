use clap::Parser;
use skipwipe::cli::{self, Cli};
use skipwipe::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = cli::run(cli).await {
        eprintln!("Error: {}", error::user_friendly_message(&e));
        std::process::exit(error::exit_code(&e));
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
