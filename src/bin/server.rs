//! `tftpx-server`: binds the well-known TFTP port, drops root, and serves
//! RRQ/WRQ/DRQ requests out of a single directory until killed.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tftpx::config::{DEFAULT_PORT, DEFAULT_TIMEOUT_SECS, ServerConfig};
use tftpx::server::Server;

#[derive(Parser, Debug)]
#[command(name = "tftpx-server", about = "A lockstep TFTP server with a delete extension")]
struct Cli {
    /// UDP port to bind.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Directory served to clients; request filenames are resolved
    /// relative to it and may not escape it.
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// Per-block receive timeout, in seconds.
    #[arg(short, long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Enable debug-level logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServerConfig {
        port: cli.port,
        dir: cli.dir,
        timeout: Duration::from_secs(cli.timeout),
    };

    let server = Server::bind(config)?;
    tftpx::privsep::drop_privileges()?;

    tracing::info!(port = cli.port, "tftpx-server listening");
    server.run()?;
    Ok(())
}
