//! Startup configuration (§6 of the protocol spec). The CLI surfaces
//! (`clap` structs) live in each binary; this module holds the
//! protocol-level defaults and the plain data the server resolves its
//! flags into. The client has no equivalent struct — its flags map
//! directly onto `client::upload`/`download`/`delete` arguments.

use std::path::PathBuf;
use std::time::Duration;

/// Well-known TFTP port.
pub const DEFAULT_PORT: u16 = 69;

/// Per-block receive deadline, in seconds (§3 `timeout_seconds`).
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Server-side settings resolved from CLI flags.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// UDP port to bind. Binding anything below 1024 on Unix requires the
    /// process to start privileged; `privsep` drops that privilege right
    /// after the bind succeeds.
    pub port: u16,
    /// Directory the server reads from / writes to. All filenames in
    /// requests are resolved relative to this directory (§6: "relative
    /// paths only, CWD").
    pub dir: PathBuf,
    /// Per-block receive timeout used once a transfer is under way. The
    /// dispatcher's idle wait for the next request has no timeout.
    pub timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            port: DEFAULT_PORT,
            dir: PathBuf::from("."),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}
