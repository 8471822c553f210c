//! The transfer engine (§4.C): the state machine that drives one transfer
//! to completion over a lossy datagram channel. Both RRQ/WRQ handlers on
//! both peers share this engine; they differ only in which loop
//! (`run_send`/`run_recv`) they call and which `BlockSource`/`BlockSink`
//! they hand it.

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Result, TftpError, TftpErrorCode};
use crate::packet::{BLOCK_SIZE, MAX_PACKET_SIZE, Packet};
use crate::socket::DatagramEndpoint;

/// `retry_count <= MAX_RETRIES`; reaching it is terminal failure (§3
/// invariant 3). A recv timeout and a bad ACK/DATA both count against the
/// same counter — see DESIGN.md for why timeouts are retried rather than
/// failing the transfer outright.
pub const MAX_RETRIES: u8 = 3;

/// Per-block receive deadline (§3 `timeout_seconds`, default 5s).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Source side of a transfer: the engine reads up to `BLOCK_SIZE` bytes at
/// a time and can rewind by the last read's length to retransmit a block
/// verbatim after a bad ACK or a timeout.
pub trait BlockSource {
    fn read_block(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    fn rewind(&mut self, n: usize) -> io::Result<()>;
}

/// Sink side of a transfer: the engine writes each accepted block in
/// order.
pub trait BlockSink {
    fn write_block(&mut self, buf: &[u8]) -> io::Result<()>;
}

impl<T: Read + Seek> BlockSource for T {
    fn read_block(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        read_fully(self, buf)
    }

    fn rewind(&mut self, n: usize) -> io::Result<()> {
        self.seek(SeekFrom::Current(-(n as i64)))?;
        Ok(())
    }
}

impl<T: Write> BlockSink for T {
    fn write_block(&mut self, buf: &[u8]) -> io::Result<()> {
        self.write_all(buf)
    }
}

/// `Read::read` may return short of a full buffer even when more data is
/// available (pipes, some `Cursor` edge cases); a DATA block's length is
/// the transfer's end-of-file signal, so a short read must mean EOF, not
/// merely "the OS felt like it". Keep reading until `buf` fills or the
/// source is exhausted.
fn read_fully(source: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        match source.read(&mut buf[total..]) {
            Ok(0) => break,
            Ok(n) => total += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

fn peer_error(code: u16, message: Vec<u8>) -> TftpError {
    TftpError::PeerError {
        code: TftpErrorCode::from_wire(code),
        message: String::from_utf8_lossy(&message).into_owned(),
    }
}

/// Drive the send side of a transfer (server's RRQ handler, client's WRQ
/// handler). Precondition: the peer has already acknowledged the initial
/// handshake, and `endpoint` is addressed so that `send`/`recv` reach
/// `peer` — §4.C.
pub fn run_send(
    source: &mut impl BlockSource,
    endpoint: &DatagramEndpoint,
    peer: SocketAddr,
    timeout: Duration,
    start_block: u16,
) -> Result<()> {
    endpoint.set_recv_timeout(Some(timeout))?;

    let mut block = start_block;
    let mut retry: u8 = 0;
    let mut recv_buf = [0u8; MAX_PACKET_SIZE];
    let mut payload = vec![0u8; BLOCK_SIZE];

    loop {
        let n = source.read_block(&mut payload)?;

        endpoint.send(&crate::packet::encode_data(block, &payload[..n]), peer)?;

        match endpoint.recv(&mut recv_buf) {
            Err(TftpError::Io(e)) if is_timeout(&e) => {
                retry += 1;
                if retry >= MAX_RETRIES {
                    return Err(TftpError::RetriesExhausted(retry));
                }
                source.rewind(n)?;
                continue;
            }
            Err(e) => return Err(e),
            Ok((len, _from)) => match Packet::decode(&recv_buf[..len]) {
                Ok(Packet::ERROR { code, message }) => return Err(peer_error(code, message)),
                Ok(Packet::ACK { block: acked }) if acked == block => {
                    retry = 0;
                    if n < BLOCK_SIZE {
                        return Ok(());
                    }
                    block = block.wrapping_add(1);
                }
                _ => {
                    retry += 1;
                    if retry >= MAX_RETRIES {
                        return Err(TftpError::RetriesExhausted(retry));
                    }
                    source.rewind(n)?;
                }
            },
        }
    }
}

/// Drive the receive side of a transfer (client's RRQ handler, server's
/// WRQ handler). Precondition: the sender has been prompted (an RRQ was
/// sent, or a WRQ's initial ACK(0) has gone out) — §4.C.
pub fn run_recv(
    sink: &mut impl BlockSink,
    endpoint: &DatagramEndpoint,
    peer: SocketAddr,
    timeout: Duration,
    start_block: u16,
) -> Result<()> {
    endpoint.set_recv_timeout(Some(timeout))?;

    let mut expected = start_block;
    let mut retry: u8 = 0;
    let mut recv_buf = [0u8; MAX_PACKET_SIZE];

    loop {
        match endpoint.recv(&mut recv_buf) {
            Err(TftpError::Io(e)) if is_timeout(&e) => {
                retry += 1;
                if retry >= MAX_RETRIES {
                    return Err(TftpError::RetriesExhausted(retry));
                }
                continue;
            }
            Err(e) => return Err(e),
            Ok((len, _from)) => match Packet::decode(&recv_buf[..len]) {
                Ok(Packet::ERROR { code, message }) => return Err(peer_error(code, message)),
                Ok(Packet::DATA { block, payload }) if block == expected => {
                    sink.write_block(&payload)?;
                    endpoint.send(&Packet::ACK { block }.encode(), peer)?;
                    retry = 0;
                    let short = payload.len() < BLOCK_SIZE;
                    if short {
                        return Ok(());
                    }
                    expected = expected.wrapping_add(1);
                }
                Ok(Packet::DATA { block, .. }) if block == expected.wrapping_sub(1) => {
                    // The sender's retransmission of a block we already
                    // accepted — our ACK must have been lost. Re-ACK it
                    // without advancing.
                    endpoint.send(&Packet::ACK { block }.encode(), peer)?;
                    retry += 1;
                    if retry >= MAX_RETRIES {
                        return Err(TftpError::RetriesExhausted(retry));
                    }
                }
                _ => {
                    let prev = expected.wrapping_sub(1);
                    endpoint.send(&Packet::ACK { block: prev }.encode(), peer)?;
                    retry += 1;
                    if retry >= MAX_RETRIES {
                        return Err(TftpError::RetriesExhausted(retry));
                    }
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::mpsc;
    use std::thread;

    /// A loopback pair of endpoints addressed at each other, for exercising
    /// the two loops without a real network round trip's nondeterminism.
    fn loopback_pair() -> (DatagramEndpoint, SocketAddr, DatagramEndpoint, SocketAddr) {
        let a = DatagramEndpoint::bind(0).unwrap();
        let b = DatagramEndpoint::bind(0).unwrap();
        let a_addr = a.local_addr().unwrap();
        let b_addr = b.local_addr().unwrap();
        (a, b_addr, b, a_addr)
    }

    #[test]
    fn send_then_recv_small_file() {
        let (sender_ep, recv_addr, receiver_ep, send_addr) = loopback_pair();
        let data = b"abc".to_vec();
        let mut source = Cursor::new(data.clone());
        let mut sink: Vec<u8> = Vec::new();

        let (tx, rx) = mpsc::channel();
        let handle = thread::spawn(move || {
            let result = run_recv(
                &mut sink,
                &receiver_ep,
                send_addr,
                Duration::from_millis(500),
                1,
            );
            tx.send((result, sink)).unwrap();
        });

        run_send(
            &mut source,
            &sender_ep,
            recv_addr,
            Duration::from_millis(500),
            1,
        )
        .unwrap();

        handle.join().unwrap();
        let (result, sink) = rx.recv().unwrap();
        result.unwrap();
        assert_eq!(sink, data);
    }

    #[test]
    fn empty_file_completes_with_one_short_block() {
        let (sender_ep, recv_addr, receiver_ep, send_addr) = loopback_pair();
        let mut source = Cursor::new(Vec::<u8>::new());
        let mut sink: Vec<u8> = Vec::new();

        let handle = thread::spawn(move || {
            run_recv(
                &mut sink,
                &receiver_ep,
                send_addr,
                Duration::from_millis(500),
                1,
            )
            .map(|_| sink)
        });

        run_send(
            &mut source,
            &sender_ep,
            recv_addr,
            Duration::from_millis(500),
            1,
        )
        .unwrap();

        let sink = handle.join().unwrap().unwrap();
        assert!(sink.is_empty());
    }

    #[test]
    fn exact_multiple_of_block_size_forces_trailing_empty_block() {
        let (sender_ep, recv_addr, receiver_ep, send_addr) = loopback_pair();
        let data = vec![0x42u8; BLOCK_SIZE];
        let mut source = Cursor::new(data.clone());
        let mut sink: Vec<u8> = Vec::new();

        let handle = thread::spawn(move || {
            run_recv(
                &mut sink,
                &receiver_ep,
                send_addr,
                Duration::from_millis(500),
                1,
            )
            .map(|_| sink)
        });

        run_send(
            &mut source,
            &sender_ep,
            recv_addr,
            Duration::from_millis(500),
            1,
        )
        .unwrap();

        let sink = handle.join().unwrap().unwrap();
        assert_eq!(sink, data);
    }

    #[test]
    fn send_fails_after_three_unanswered_retries() {
        let sender_ep = DatagramEndpoint::bind(0).unwrap();
        // Nobody is listening at this address, so sends succeed (UDP is
        // connectionless) but no reply ever arrives.
        let dead_peer = DatagramEndpoint::bind(0).unwrap().local_addr().unwrap();
        let mut source = Cursor::new(b"xyz".to_vec());

        let err = run_send(
            &mut source,
            &sender_ep,
            dead_peer,
            Duration::from_millis(30),
            1,
        )
        .unwrap_err();

        match err {
            TftpError::RetriesExhausted(n) => assert_eq!(n, MAX_RETRIES),
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[test]
    fn recv_fails_after_three_unanswered_retries() {
        let receiver_ep = DatagramEndpoint::bind(0).unwrap();
        let dead_peer = DatagramEndpoint::bind(0).unwrap().local_addr().unwrap();
        let mut sink: Vec<u8> = Vec::new();

        let err = run_recv(
            &mut sink,
            &receiver_ep,
            dead_peer,
            Duration::from_millis(30),
            1,
        )
        .unwrap_err();

        match err {
            TftpError::RetriesExhausted(n) => assert_eq!(n, MAX_RETRIES),
            other => panic!("expected RetriesExhausted, got {other:?}"),
        }
    }

    #[test]
    fn sender_accepts_only_matching_ack_block() {
        // A stray ACK for the wrong block must not advance the sender; it
        // should be treated as a bad ACK and retried until the correct one
        // (or a real peer) shows up.
        let sender_ep = DatagramEndpoint::bind(0).unwrap();
        let stray_ep = DatagramEndpoint::bind(0).unwrap();
        let sender_addr = sender_ep.local_addr().unwrap();
        let stray_addr = stray_ep.local_addr().unwrap();

        let handle = thread::spawn(move || {
            // Reply with ACK(99) once, which never matches block 1.
            let mut buf = [0u8; MAX_PACKET_SIZE];
            let (_n, from) = stray_ep.recv(&mut buf).unwrap();
            stray_ep
                .send(&Packet::ACK { block: 99 }.encode(), from)
                .unwrap();
        });

        let mut source = Cursor::new(b"z".to_vec());
        let err = run_send(
            &mut source,
            &sender_ep,
            stray_addr,
            Duration::from_millis(30),
            1,
        )
        .unwrap_err();
        assert!(matches!(err, TftpError::RetriesExhausted(_)));
        handle.join().unwrap();
        let _ = sender_addr;
    }
}
