//! Client-side per-opcode operations (§4.F): each function owns one
//! request/reply handshake and then, where applicable, hands off to the
//! transfer engine. The CLI binary only validates arguments and calls
//! into here.

use std::fs::{self, File, OpenOptions};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::engine;
use crate::error::{Result, TftpError, TftpErrorCode};
use crate::packet::{self, Packet, MAX_PACKET_SIZE};
use crate::socket::DatagramEndpoint;

/// Upload `local_path` to the server as `remote_name` (WRQ): send WRQ,
/// wait for ACK(0), then run the send loop from block 1.
pub fn upload(
    local_path: &Path,
    remote_name: &str,
    server: SocketAddr,
    timeout: Duration,
) -> Result<()> {
    let mut file = File::open(local_path)?;

    let endpoint = DatagramEndpoint::bind(0)?;
    endpoint.set_recv_timeout(Some(timeout))?;

    let request = Packet::WRQ {
        filename: remote_name.as_bytes().to_vec(),
        mode: packet::MODE_OCTET.as_bytes().to_vec(),
    }
    .encode();
    endpoint.send(&request, server)?;

    await_handshake_ack(&endpoint, server)?;
    engine::run_send(&mut file, &endpoint, server, timeout, 1)
}

/// Download `remote_name` from the server to `local_path` (RRQ): send
/// RRQ, then run the receive loop from block 1. The partial file is
/// removed if the transfer fails partway through.
pub fn download(
    remote_name: &str,
    local_path: &Path,
    server: SocketAddr,
    timeout: Duration,
) -> Result<()> {
    let endpoint = DatagramEndpoint::bind(0)?;
    endpoint.set_recv_timeout(Some(timeout))?;

    let request = Packet::RRQ {
        filename: remote_name.as_bytes().to_vec(),
        mode: packet::MODE_OCTET.as_bytes().to_vec(),
    }
    .encode();
    endpoint.send(&request, server)?;

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(local_path)?;

    let result = engine::run_recv(&mut file, &endpoint, server, timeout, 1);
    if result.is_err() {
        drop(file);
        let _ = fs::remove_file(local_path);
    }
    result
}

/// Delete `remote_name` on the server (DRQ): send DRQ, wait for ACK(0).
pub fn delete(remote_name: &str, server: SocketAddr, timeout: Duration) -> Result<()> {
    let endpoint = DatagramEndpoint::bind(0)?;
    endpoint.set_recv_timeout(Some(timeout))?;

    let request = Packet::DRQ {
        filename: remote_name.as_bytes().to_vec(),
        mode: packet::MODE_OCTET.as_bytes().to_vec(),
    }
    .encode();
    endpoint.send(&request, server)?;

    await_handshake_ack(&endpoint, server)
}

/// Wait for the ACK(0) that closes out a WRQ/DRQ handshake, or the ERROR
/// the server sends instead. This is a single attempt, not a retry loop:
/// the request itself is never resent if the wait times out or a stray
/// packet arrives, matching the reference client's `upload_request`/
/// `delete_request`, which both fail on the first bad `get_response`. The
/// per-block retry budget (§4.C) only applies once a transfer is under way.
fn await_handshake_ack(endpoint: &DatagramEndpoint, _peer: SocketAddr) -> Result<()> {
    let mut buf = [0u8; MAX_PACKET_SIZE];
    let (len, _from) = endpoint.recv(&mut buf)?;
    match Packet::decode(&buf[..len])? {
        Packet::ACK { block: 0 } => Ok(()),
        Packet::ERROR { code, message } => Err(TftpError::PeerError {
            code: TftpErrorCode::from_wire(code),
            message: String::from_utf8_lossy(&message).into_owned(),
        }),
        _ => Err(TftpError::protocol(
            TftpErrorCode::Undefined,
            "unexpected reply to handshake request",
        )),
    }
}

/// Validate a user-supplied filename argument (§6): non-empty, at most
/// 256 bytes, no embedded NUL. Shared by all three operations' CLI
/// entry points.
pub fn validate_filename(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(TftpError::protocol(TftpErrorCode::Undefined, "filename must not be empty"));
    }
    if name.len() > 256 {
        return Err(TftpError::protocol(
            TftpErrorCode::Undefined,
            "filename exceeds 256 bytes",
        ));
    }
    if name.as_bytes().contains(&0) {
        return Err(TftpError::protocol(
            TftpErrorCode::Undefined,
            "filename contains an embedded NUL",
        ));
    }
    Ok(())
}
