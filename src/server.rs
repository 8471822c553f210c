//! The server dispatcher (§4.E): one well-known-port socket, one request
//! at a time. Each iteration blocks for the next RRQ/WRQ/DRQ, validates
//! it, and — if it passes — runs the transfer engine against a file
//! under the configured root directory before returning to the idle
//! wait. No TID renegotiation (§9): every reply to every peer goes out
//! from the same socket the request arrived on.

use std::fs::{self, File, OpenOptions};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::engine::{self, DEFAULT_TIMEOUT};
use crate::error::{Result, TftpError, TftpErrorCode};
use crate::packet::{self, Packet};
use crate::socket::DatagramEndpoint;

/// The running server: a bound endpoint plus the directory requests are
/// resolved against.
pub struct Server {
    endpoint: DatagramEndpoint,
    config: ServerConfig,
}

impl Server {
    /// Bind the configured port. Callers that need to run unprivileged
    /// should bind before calling `crate::privsep::drop_privileges`.
    pub fn bind(config: ServerConfig) -> Result<Self> {
        let endpoint = DatagramEndpoint::bind(config.port)?;
        Ok(Server { endpoint, config })
    }

    /// Serve requests forever. A zero-byte datagram, a recv error (e.g. the
    /// ICMP-port-unreachable-triggered error UDP servers see after a peer
    /// goes away), a malformed datagram, a rejected request, or a failed
    /// transfer are all logged and the dispatcher returns to waiting for
    /// the next request — §4.E step 2's "ignore on zero-byte or error
    /// results".
    pub fn run(&self) -> Result<()> {
        let mut buf = [0u8; packet::MAX_PACKET_SIZE];
        loop {
            if let Err(err) = self.endpoint.set_recv_timeout(None) {
                warn!(error = %err, "failed to clear recv timeout, continuing");
                continue;
            }
            let (len, peer) = match self.endpoint.recv(&mut buf) {
                Ok((0, _)) => continue,
                Ok(ok) => ok,
                Err(err) => {
                    warn!(error = %err, "recv failed, continuing");
                    continue;
                }
            };

            if let Err(err) = self.dispatch(&buf[..len], peer) {
                warn!(%peer, error = %err, "request failed");
            }
        }
    }

    fn dispatch(&self, datagram: &[u8], peer: SocketAddr) -> Result<()> {
        let request = match Packet::decode(datagram) {
            Ok(request) => request,
            Err(_) => {
                self.send_error(peer, TftpErrorCode::IllegalOperation, None);
                return Err(TftpError::Malformed("unparseable request"));
            }
        };

        let (opcode_name, filename, mode) = match &request {
            Packet::RRQ { filename, mode } => ("RRQ", filename, mode),
            Packet::WRQ { filename, mode } => ("WRQ", filename, mode),
            Packet::DRQ { filename, mode } => ("DRQ", filename, mode),
            _ => {
                self.send_error(peer, TftpErrorCode::IllegalOperation, Some("unexpected opcode"));
                return Err(TftpError::protocol(
                    TftpErrorCode::IllegalOperation,
                    "request was not RRQ/WRQ/DRQ",
                ));
            }
        };

        if !packet::is_octet_mode(mode) {
            let message = "Unsupported mode: Only 'octet' is allowed";
            self.send_error(peer, TftpErrorCode::Undefined, Some(message));
            return Err(TftpError::protocol(TftpErrorCode::Undefined, message));
        }

        let path = match resolve_path(&self.config.dir, filename) {
            Ok(path) => path,
            Err(err) => {
                self.send_error(peer, TftpErrorCode::AccessViolation, Some(&err.to_string()));
                return Err(TftpError::protocol(TftpErrorCode::AccessViolation, err));
            }
        };

        info!(%peer, op = opcode_name, path = %path.display(), "request accepted");

        let result = match request {
            Packet::RRQ { .. } => self.handle_rrq(&path, peer),
            Packet::WRQ { .. } => self.handle_wrq(&path, peer),
            Packet::DRQ { .. } => self.handle_drq(&path, peer),
            _ => unreachable!("filtered above"),
        };

        if let Err(ref err) = result {
            if let Some(code) = err.as_wire_code() {
                self.send_error(peer, code, Some(&err.to_string()));
            }
        }
        result
    }

    fn handle_rrq(&self, path: &Path, peer: SocketAddr) -> Result<()> {
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TftpError::protocol(TftpErrorCode::FileNotFound, "file not found"));
            }
            Err(e) => return Err(e.into()),
        };
        engine::run_send(&mut file, &self.endpoint, peer, self.timeout(), 1)
    }

    fn handle_wrq(&self, path: &Path, peer: SocketAddr) -> Result<()> {
        if path.exists() {
            return Err(TftpError::protocol(
                TftpErrorCode::FileAlreadyExists,
                "file already exists",
            ));
        }
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        self.endpoint.send(&Packet::ACK { block: 0 }.encode(), peer)?;
        let result = engine::run_recv(&mut file, &self.endpoint, peer, self.timeout(), 1);
        if result.is_err() {
            let _ = fs::remove_file(path);
        }
        result
    }

    fn handle_drq(&self, path: &Path, peer: SocketAddr) -> Result<()> {
        if !path.exists() {
            return Err(TftpError::protocol(TftpErrorCode::FileNotFound, "file not found"));
        }
        fs::remove_file(path)?;
        self.endpoint.send(&Packet::ACK { block: 0 }.encode(), peer)?;
        Ok(())
    }

    fn timeout(&self) -> std::time::Duration {
        if self.config.timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            self.config.timeout
        }
    }

    fn send_error(&self, peer: SocketAddr, code: TftpErrorCode, custom: Option<&str>) {
        let bytes = packet::encode_error(code, custom);
        let _ = self.endpoint.send(&bytes, peer);
    }
}

/// Resolve a request's raw filename into a path under `dir`, rejecting
/// anything that could escape it: absolute paths, `..` components, and
/// embedded NULs (§9 MUST — the original reference server has no such
/// check; this crate adds it as a hard requirement).
pub fn resolve_path(dir: &Path, filename: &[u8]) -> std::result::Result<PathBuf, &'static str> {
    if filename.contains(&0) {
        return Err("filename contains an embedded NUL");
    }
    let filename = std::str::from_utf8(filename).map_err(|_| "filename is not valid UTF-8")?;
    let requested = Path::new(filename);

    if requested.is_absolute() {
        return Err("absolute paths are not allowed");
    }
    if requested
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return Err("path traversal ('..') is not allowed");
    }

    Ok(dir.join(requested))
}
