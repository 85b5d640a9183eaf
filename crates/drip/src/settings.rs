//! Runtime configuration, read from `config.toml` and `DRIP_*` environment
//! variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  pub host:               String,
  pub port:               u16,
  pub store_path:         PathBuf,
  /// Only required by `serve`.
  pub auth_username:      Option<String>,
  /// Argon2 PHC string; see `drip hash-password`.
  pub auth_password_hash: Option<String>,
}

impl Settings {
  /// Layer `path` (optional) under `DRIP_*` environment variables.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings: Settings = config::Config::builder()
      .set_default("host", "127.0.0.1")?
      .set_default("port", 8080)?
      .set_default("store_path", "drip.db")?
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("DRIP"))
      .build()
      .context("failed to read config file")?
      .try_deserialize()
      .context("failed to deserialise settings")?;

    Ok(Self {
      store_path: expand_tilde(&settings.store_path),
      ..settings
    })
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
