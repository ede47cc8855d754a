use binlog_player::config::Args;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let args = Args::parse();
    let shutdown = binlog_player::shutdown_on_ctrl_c();

    if let Err(err) = binlog_player::run(args, shutdown).await {
        error!(error = %err, "binlog player exited with a fatal error");
        std::process::exit(1);
    }
}
