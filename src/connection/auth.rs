//! Per-host access tokens.
//!
//! Tokens are kept in memory and, when the store was opened from a file,
//! written back to that file on every change. Logging out just forgets the
//! token; there is no server-side revocation.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenSet {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

#[derive(Debug, Default)]
pub struct TokenStore {
    path: Option<PathBuf>,
    tokens: RwLock<HashMap<String, TokenSet>>,
}

impl TokenStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a file-backed store. A missing file is an empty store.
    pub fn load(path: &Path) -> Result<Self> {
        let tokens = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read token file: {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse token file: {}", path.display()))?
        } else {
            HashMap::new()
        };
        Ok(Self {
            path: Some(path.to_path_buf()),
            tokens: RwLock::new(tokens),
        })
    }

    /// Unexpired tokens for `host`.
    pub fn tokens_for(&self, host: &str) -> Option<TokenSet> {
        let tokens = self.tokens.read().unwrap_or_else(PoisonError::into_inner);
        tokens.get(host).filter(|t| !t.is_expired()).cloned()
    }

    /// Store tokens for `host`, or forget them with `None`.
    pub fn set_tokens_for(&self, host: &str, tokens: Option<TokenSet>) -> Result<()> {
        let snapshot = {
            let mut map = self.tokens.write().unwrap_or_else(PoisonError::into_inner);
            match tokens {
                Some(t) => {
                    map.insert(host.to_string(), t);
                }
                None => {
                    map.remove(host);
                }
            }
            map.clone()
        };
        tracing::debug!(host, "Updated stored tokens");
        self.persist(&snapshot)
    }

    fn persist(&self, tokens: &HashMap<String, TokenSet>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content =
            serde_json::to_string_pretty(tokens).context("Failed to serialize tokens")?;
        write_private(path, content.as_bytes())
            .with_context(|| format!("Failed to write token file: {}", path.display()))
    }
}

/// Write a file only the owner can read. An existing file is narrowed to
/// owner-only before it is rewritten.
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
        options.mode(0o600);
        if path.exists() {
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }
    }
    let mut file = options.open(path)?;
    file.write_all(content)?;
    file.flush()
}
