//! Drop root after binding the privileged TFTP port (§6: "binds
//! 0.0.0.0:69 (requires privilege), then drops to the invoking (sudo)
//! user via SUDO_USER / getpwuid").

#[cfg(unix)]
pub fn drop_privileges() -> crate::error::Result<()> {
    use nix::unistd::{self, Gid, Group, Uid, User};

    use crate::error::{TftpError, TftpErrorCode};

    let username = std::env::var("SUDO_USER").ok();

    let target = match username {
        Some(name) => User::from_name(&name)
            .map_err(io_err)?
            .ok_or_else(|| not_found(&name))?,
        None => {
            let uid = unistd::getuid();
            User::from_uid(uid)
                .map_err(io_err)?
                .ok_or_else(|| TftpError::protocol(
                    TftpErrorCode::Undefined,
                    "unable to retrieve user information",
                ))?
        }
    };

    let group = Group::from_gid(target.gid)
        .map_err(io_err)?
        .ok_or_else(|| {
            TftpError::protocol(TftpErrorCode::Undefined, "failed to get group information")
        })?;

    unistd::setgid(Gid::from_raw(group.gid.as_raw())).map_err(io_err)?;
    unistd::setuid(Uid::from_raw(target.uid.as_raw())).map_err(io_err)?;

    Ok(())
}

#[cfg(unix)]
fn io_err(e: nix::Error) -> crate::error::TftpError {
    crate::error::TftpError::Io(std::io::Error::from(e))
}

#[cfg(unix)]
fn not_found(name: &str) -> crate::error::TftpError {
    crate::error::TftpError::protocol(
        crate::error::TftpErrorCode::Undefined,
        format!("failed to get user information for '{name}'"),
    )
}

/// No privilege model to drop on non-Unix targets.
#[cfg(not(unix))]
pub fn drop_privileges() -> crate::error::Result<()> {
    Ok(())
}
