use anyhow::{Result, anyhow};
use tracing_subscriber::{EnvFilter, fmt};

/// RUST_LOG wins when set; otherwise our own crate logs at a level picked by
/// `-v` and dependencies stay at warn.
pub fn init(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,labelvol={level}")));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}
