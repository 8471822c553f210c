//! `tftpx-client`: a one-shot upload/download/delete driver (§4.F/§6).
//!
//! Usage: `tftpx-client <upload|download|delete> <file> <server-ip>`

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use tftpx::client;
use tftpx::config::{DEFAULT_PORT, DEFAULT_TIMEOUT_SECS};

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Operation {
    Upload,
    Download,
    Delete,
}

#[derive(Parser, Debug)]
#[command(name = "tftpx-client", about = "A lockstep TFTP client with a delete extension")]
struct Cli {
    /// Operation to perform.
    operation: Operation,

    /// Path to the file (local source for upload, local destination for
    /// download, remote name for delete).
    file: PathBuf,

    /// Server address.
    server: IpAddr,

    /// Server UDP port.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Per-block receive timeout, in seconds.
    #[arg(short, long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Enable debug-level logging.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "transfer failed");
            eprintln!("tftpx-client: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let server = SocketAddr::new(cli.server, cli.port);
    let timeout = Duration::from_secs(cli.timeout);

    let remote_name = basename(&cli.file)?;
    client::validate_filename(&remote_name)?;

    match cli.operation {
        Operation::Upload => {
            client::upload(&cli.file, &remote_name, server, timeout)?;
        }
        Operation::Download => {
            if cli.file.exists() {
                anyhow::bail!("refusing to overwrite existing local file {:?}", cli.file);
            }
            client::download(&remote_name, &cli.file, server, timeout)?;
        }
        Operation::Delete => {
            client::delete(&remote_name, server, timeout)?;
        }
    }
    Ok(())
}

fn basename(path: &Path) -> anyhow::Result<String> {
    let name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("path has no filename component"))?
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("filename is not valid UTF-8"))?;
    Ok(name.to_string())
}
