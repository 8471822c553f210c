use std::io;

use thiserror::Error;

/// The eight TFTP error codes carried on the wire in an ERROR packet.
///
/// Codes and messages follow the taxonomy both the client and the server
/// draw from when they turn a local failure into a packet the peer can
/// print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum TftpErrorCode {
    Undefined = 0,
    FileNotFound = 1,
    AccessViolation = 2,
    DiskFull = 3,
    IllegalOperation = 4,
    UnknownTransferId = 5,
    FileAlreadyExists = 6,
    NoSuchUser = 7,
}

impl TftpErrorCode {
    /// The canonical human-readable message for this code.
    pub fn message(self) -> &'static str {
        match self {
            TftpErrorCode::Undefined => "Undefined error",
            TftpErrorCode::FileNotFound => "File not found",
            TftpErrorCode::AccessViolation => "Access violation",
            TftpErrorCode::DiskFull => "Disk full or allocation exceeded",
            TftpErrorCode::IllegalOperation => "Illegal TFTP operation",
            TftpErrorCode::UnknownTransferId => "Unknown transfer ID",
            TftpErrorCode::FileAlreadyExists => "File already exists",
            TftpErrorCode::NoSuchUser => "No such user",
        }
    }

    /// Decode a code received off the wire. Anything outside 0..=7 collapses
    /// to `Undefined`, matching decode()'s "no variant" behavior for
    /// malformed packets rather than rejecting the whole datagram.
    pub fn from_wire(code: u16) -> Self {
        match code {
            0 => TftpErrorCode::Undefined,
            1 => TftpErrorCode::FileNotFound,
            2 => TftpErrorCode::AccessViolation,
            3 => TftpErrorCode::DiskFull,
            4 => TftpErrorCode::IllegalOperation,
            5 => TftpErrorCode::UnknownTransferId,
            6 => TftpErrorCode::FileAlreadyExists,
            7 => TftpErrorCode::NoSuchUser,
            _ => TftpErrorCode::Undefined,
        }
    }

    /// Map a filesystem I/O error to the wire code the spec assigns it:
    /// ENOSPC -> DiskFull, EACCES/EPERM -> AccessViolation, anything else
    /// -> Undefined.
    pub fn from_io_error(err: &io::Error) -> Self {
        if err.kind() == io::ErrorKind::PermissionDenied {
            return TftpErrorCode::AccessViolation;
        }
        // ENOSPC is 28 on both Linux and macOS; avoid pulling in libc for
        // one constant.
        #[cfg(unix)]
        const ENOSPC: i32 = 28;
        #[cfg(unix)]
        if err.raw_os_error() == Some(ENOSPC) {
            return TftpErrorCode::DiskFull;
        }
        TftpErrorCode::Undefined
    }
}

/// Crate-wide error type. Every fallible operation returns `Result<T>`
/// (this module's alias), so the caller never has to reach for a bespoke
/// `String` error.
#[derive(Debug, Error)]
pub enum TftpError {
    #[error("{code:?}: {message}")]
    Protocol {
        code: TftpErrorCode,
        message: String,
    },

    #[error("received ERROR {code:?}: {message}")]
    PeerError {
        code: TftpErrorCode,
        message: String,
    },

    #[error("timed out waiting for a reply")]
    Timeout,

    #[error("exhausted {0} retries")]
    RetriesExhausted(u8),

    #[error("malformed packet: {0}")]
    Malformed(&'static str),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl TftpError {
    pub fn protocol(code: TftpErrorCode, message: impl Into<String>) -> Self {
        TftpError::Protocol {
            code,
            message: message.into(),
        }
    }

    /// The wire error code this failure should be reported under, if any.
    /// `Timeout`/`RetriesExhausted`/`PeerError` never generate an outbound
    /// ERROR packet — §7 of the spec only emits one for packet-level and
    /// filesystem errors.
    pub fn as_wire_code(&self) -> Option<TftpErrorCode> {
        match self {
            TftpError::Protocol { code, .. } => Some(*code),
            TftpError::Malformed(_) => Some(TftpErrorCode::Undefined),
            TftpError::Io(e) => Some(TftpErrorCode::from_io_error(e)),
            TftpError::Timeout | TftpError::RetriesExhausted(_) | TftpError::PeerError { .. } => {
                None
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, TftpError>;
