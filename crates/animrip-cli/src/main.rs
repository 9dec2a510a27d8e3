use clap::Parser;

mod commands;

use commands::{dispatch, Cli};

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    if let Err(e) = dispatch(cli).await {
        eprintln!("fatal: {e:?}");
        std::process::exit(1);
    }
}
