//! Socket addressing.
//!
//! A socket is named either by an explicit path or by a `{namespace, id}`
//! pair resolved to `<socket_root>/<namespace>_<id>`. On Windows the result
//! is turned into a named-pipe path.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ErrorCode, IpcError, Result};

/// Where a server listens / a client connects.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum SocketAddress {
    /// Explicit platform path.
    Path(PathBuf),
    /// Resolved against the socket root.
    Named { namespace: String, id: String },
}

impl SocketAddress {
    pub fn named(namespace: impl Into<String>, id: impl Into<String>) -> Self {
        SocketAddress::Named {
            namespace: namespace.into(),
            id: id.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let empty = match self {
            SocketAddress::Path(p) => p.as_os_str().is_empty(),
            SocketAddress::Named { namespace, id } => namespace.is_empty() || id.is_empty(),
        };
        if empty {
            return Err(IpcError::usage(
                ErrorCode::InvalidPath,
                "socket path, namespace and id must be non-empty",
            ));
        }
        Ok(())
    }

    /// Resolve to the platform socket path.
    pub fn resolve(&self, socket_root: &Path) -> Result<PathBuf> {
        self.validate()?;
        match self {
            SocketAddress::Path(p) => Ok(p.clone()),
            SocketAddress::Named { namespace, id } => {
                validate_socket_root(socket_root)?;
                Ok(platform_path(socket_root.join(format!("{namespace}_{id}"))))
            }
        }
    }
}

impl From<PathBuf> for SocketAddress {
    fn from(p: PathBuf) -> Self {
        SocketAddress::Path(p)
    }
}

impl From<&str> for SocketAddress {
    fn from(p: &str) -> Self {
        SocketAddress::Path(PathBuf::from(p))
    }
}

/// Platform temp directory.
pub fn default_socket_root() -> PathBuf {
    std::env::temp_dir()
}

pub fn validate_socket_root(root: &Path) -> Result<()> {
    if root.as_os_str().is_empty() {
        return Err(IpcError::usage(
            ErrorCode::InvalidSocketRoot,
            "socket root must be a non-empty path",
        ));
    }
    Ok(())
}

/// Prefix the resolved name with the pipe namespace. `Path::join` would
/// drop the prefix for an absolute root such as `C:\...`.
#[cfg(windows)]
fn platform_path(path: PathBuf) -> PathBuf {
    PathBuf::from(format!(r"\\?\pipe\{}", path.display()))
}

#[cfg(not(windows))]
fn platform_path(path: PathBuf) -> PathBuf {
    path
}

/// Remove a socket file left on disk. Windows deletes pipes on its own.
pub fn remove_socket_file(path: &Path) -> Result<()> {
    if cfg!(windows) {
        return Ok(());
    }
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
