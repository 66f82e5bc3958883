use std::path::PathBuf;

use serde::Deserialize;
use sockroute_core::address::{self, SocketAddress};
use sockroute_core::error::{IpcError, Result};
use sockroute_core::protocol::{Delimiter, DEFAULT_DELIMITER};

use crate::ipc::{ListenOptions, ServerOptions};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(IpcError::Config(format!(
                "unsupported config version: {} (expected 1)",
                self.version
            )));
        }

        self.server.validate()?;

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_delimiter")]
    pub delimiter: String,

    /// Defaults to the platform temp directory.
    #[serde(default)]
    pub socket_root: Option<PathBuf>,

    /// Either a path string or `{namespace, id}`.
    #[serde(default = "default_address")]
    pub address: SocketAddress,

    #[serde(default)]
    pub delete_socket_before_listening: bool,

    /// Channels created at startup.
    #[serde(default)]
    pub channels: Vec<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            delimiter: default_delimiter(),
            socket_root: None,
            address: default_address(),
            delete_socket_before_listening: false,
            channels: Vec::new(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        Delimiter::parse(&self.delimiter)
            .map_err(|e| IpcError::Config(format!("server.delimiter: {e} ({})", e.code())))?;
        if let Some(root) = &self.socket_root {
            address::validate_socket_root(root)
                .map_err(|e| IpcError::Config(format!("server.socket_root: {e}")))?;
        }
        self.address
            .validate()
            .map_err(|e| IpcError::Config(format!("server.address: {e}")))?;
        if self.channels.iter().any(String::is_empty) {
            return Err(IpcError::Config(
                "server.channels must not contain empty names".into(),
            ));
        }
        Ok(())
    }

    pub fn server_options(&self) -> ServerOptions {
        ServerOptions {
            delimiter: self.delimiter.clone(),
            socket_root: self
                .socket_root
                .clone()
                .unwrap_or_else(address::default_socket_root),
        }
    }

    pub fn listen_options(&self) -> ListenOptions {
        ListenOptions {
            delete_socket_before_listening: self.delete_socket_before_listening,
        }
    }
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

fn default_address() -> SocketAddress {
    SocketAddress::named("sockroute", "default")
}
