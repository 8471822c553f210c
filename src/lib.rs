//! A lockstep, stop-and-wait TFTP client/server pair with a non-standard
//! delete-request (DRQ) extension, sharing one transfer engine between
//! the two roles.
//!
//! The crate is organized the way the protocol spec splits the system:
//! [`packet`] is the wire codec, [`socket`] the blocking datagram
//! endpoint, [`engine`] the transfer state machine both peers drive,
//! [`error`] the shared error/error-code taxonomy, and [`server`] /
//! [`client`] the per-opcode request handlers for each role.

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod packet;
pub mod privsep;
pub mod server;
pub mod socket;

pub use error::{Result, TftpError, TftpErrorCode};
pub use packet::Packet;
