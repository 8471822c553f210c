//! End-to-end scenarios (§8 of the protocol spec) run against a real
//! server thread bound to an OS-assigned loopback port.

use std::fs;
use std::net::SocketAddr;
use std::thread;
use std::time::Duration;

use tempfile::tempdir;
use tftpx::config::ServerConfig;
use tftpx::error::{TftpError, TftpErrorCode};
use tftpx::server::Server;
use tftpx::{Packet, client, packet::MAX_PACKET_SIZE, socket::DatagramEndpoint};

/// Spin up a server rooted at `dir`, bound to `port` on loopback, and
/// return its address. The server thread runs for the rest of the test
/// process; each test uses its own temp directory and port so that's
/// fine. `Server` doesn't expose its bound port back out (the dispatcher
/// never needs it), so callers pick a free one with `free_port` first.
fn spawn_server_on(dir: &std::path::Path, port: u16) -> SocketAddr {
    let config = ServerConfig {
        port,
        dir: dir.to_path_buf(),
        timeout: Duration::from_millis(300),
    };
    let server = Server::bind(config).unwrap();
    thread::spawn(move || {
        let _ = server.run();
    });
    // Give the dispatcher a moment to reach its first blocking recv.
    thread::sleep(Duration::from_millis(50));
    SocketAddr::from(([127, 0, 0, 1], port))
}

fn free_port() -> u16 {
    let probe = DatagramEndpoint::bind(0).unwrap();
    probe.local_addr().unwrap().port()
}

#[test]
fn upload_then_download_round_trip() {
    let dir = tempdir().unwrap();
    let port = free_port();
    let server_addr = spawn_server_on(dir.path(), port);

    let local_src = dir.path().join("local_src.bin");
    fs::write(&local_src, b"abc").unwrap();

    client::upload(&local_src, "uploaded.bin", server_addr, Duration::from_millis(300)).unwrap();
    assert_eq!(fs::read(dir.path().join("uploaded.bin")).unwrap(), b"abc");

    let local_dst = dir.path().join("downloaded.bin");
    client::download(
        "uploaded.bin",
        &local_dst,
        server_addr,
        Duration::from_millis(300),
    )
    .unwrap();
    assert_eq!(fs::read(&local_dst).unwrap(), b"abc");
}

#[test]
fn download_of_missing_file_reports_file_not_found() {
    let dir = tempdir().unwrap();
    let port = free_port();
    let server_addr = spawn_server_on(dir.path(), port);

    let local_dst = dir.path().join("nope.bin");
    let err = client::download(
        "does-not-exist.bin",
        &local_dst,
        server_addr,
        Duration::from_millis(300),
    )
    .unwrap_err();

    match err {
        TftpError::PeerError { code, .. } => assert_eq!(code, TftpErrorCode::FileNotFound),
        other => panic!("expected PeerError(FileNotFound), got {other:?}"),
    }
    assert!(!local_dst.exists());
}

#[test]
fn rrq_with_unsupported_mode_is_rejected_as_undefined_error() {
    let dir = tempdir().unwrap();
    let port = free_port();
    let server_addr = spawn_server_on(dir.path(), port);

    let endpoint = DatagramEndpoint::bind(0).unwrap();
    endpoint
        .set_recv_timeout(Some(Duration::from_millis(300)))
        .unwrap();

    let request = Packet::RRQ {
        filename: b"whatever.bin".to_vec(),
        mode: b"netascii".to_vec(),
    }
    .encode();
    endpoint.send(&request, server_addr).unwrap();

    let mut buf = [0u8; MAX_PACKET_SIZE];
    let (len, _from) = endpoint.recv(&mut buf).unwrap();
    match Packet::decode(&buf[..len]).unwrap() {
        Packet::ERROR { code, message } => {
            assert_eq!(code, TftpErrorCode::Undefined as u16);
            assert_eq!(
                String::from_utf8(message).unwrap(),
                "Undefined error - Unsupported mode: Only 'octet' is allowed"
            );
        }
        other => panic!("expected ERROR, got {other:?}"),
    }
}

#[test]
fn upload_of_existing_file_is_rejected() {
    let dir = tempdir().unwrap();
    let port = free_port();
    let server_addr = spawn_server_on(dir.path(), port);

    fs::write(dir.path().join("taken.bin"), b"already here").unwrap();

    let local_src = dir.path().join("local.bin");
    fs::write(&local_src, b"new content").unwrap();

    let err = client::upload(&local_src, "taken.bin", server_addr, Duration::from_millis(300))
        .unwrap_err();

    match err {
        TftpError::PeerError { code, .. } => assert_eq!(code, TftpErrorCode::FileAlreadyExists),
        other => panic!("expected PeerError(FileAlreadyExists), got {other:?}"),
    }
    assert_eq!(
        fs::read(dir.path().join("taken.bin")).unwrap(),
        b"already here"
    );
}

#[test]
fn delete_removes_an_existing_file() {
    let dir = tempdir().unwrap();
    let port = free_port();
    let server_addr = spawn_server_on(dir.path(), port);

    let target = dir.path().join("remove_me.bin");
    fs::write(&target, b"bye").unwrap();

    client::delete("remove_me.bin", server_addr, Duration::from_millis(300)).unwrap();
    assert!(!target.exists());
}

#[test]
fn delete_of_missing_file_reports_file_not_found() {
    let dir = tempdir().unwrap();
    let port = free_port();
    let server_addr = spawn_server_on(dir.path(), port);

    let err = client::delete("ghost.bin", server_addr, Duration::from_millis(300)).unwrap_err();
    match err {
        TftpError::PeerError { code, .. } => assert_eq!(code, TftpErrorCode::FileNotFound),
        other => panic!("expected PeerError(FileNotFound), got {other:?}"),
    }
}

#[test]
fn large_file_spans_multiple_blocks() {
    let dir = tempdir().unwrap();
    let port = free_port();
    let server_addr = spawn_server_on(dir.path(), port);

    let data = vec![0x5Au8; 512 * 3 + 17];
    let local_src = dir.path().join("big.bin");
    fs::write(&local_src, &data).unwrap();

    client::upload(&local_src, "big.bin", server_addr, Duration::from_millis(300)).unwrap();

    let local_dst = dir.path().join("big_downloaded.bin");
    client::download(
        "big.bin",
        &local_dst,
        server_addr,
        Duration::from_millis(300),
    )
    .unwrap();

    assert_eq!(fs::read(&local_dst).unwrap(), data);
}
