use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::RngCore;
use serde::Deserialize;

use crate::error::{Error, Result};

const SECRET_FILE: &str = ".session_secret";
const SECRET_BYTES: usize = 32;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    /// Validity window of issued tokens, in seconds.
    pub token_ttl_secs: u64,
}

impl ServerConfig {
    /// Reads a TOML config file. Keys left out keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        toml::from_str(&raw)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
    }

    pub fn socket_addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("formwork.db")
    }

    #[must_use]
    pub fn secret_path(&self) -> PathBuf {
        self.data_dir.join(SECRET_FILE)
    }

    #[must_use]
    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            token_ttl_secs: 300,
        }
    }
}

/// Generates a fresh platform secret and writes it hex-encoded to `path`.
pub fn write_secret(path: &Path) -> Result<Vec<u8>> {
    let mut bytes = vec![0u8; SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    fs::write(path, hex::encode(&bytes))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
            tracing::warn!("Failed to set permissions on {}: {e}", path.display());
        }
    }

    Ok(bytes)
}

/// Loads the platform secret written by [`write_secret`].
pub fn load_secret(path: &Path) -> Result<Vec<u8>> {
    let raw = fs::read_to_string(path)?;
    let bytes = hex::decode(raw.trim())
        .map_err(|e| Error::Config(format!("invalid secret in {}: {e}", path.display())))?;
    if bytes.len() < SECRET_BYTES {
        return Err(Error::Config(format!(
            "secret in {} is shorter than {SECRET_BYTES} bytes",
            path.display()
        )));
    }
    Ok(bytes)
}
