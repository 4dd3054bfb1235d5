//! Durable storage for the bearer token.
//!
//! Storage holds the token as a plain string. Older clients sometimes wrote a
//! serialized object instead; `normalize_stored_token` recovers the token
//! from those values so the session can rewrite them once at startup.

use parking_lot::Mutex;
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::client::extract_token;

/// Value written by clients that stringified an object instead of its token
const LEGACY_OBJECT_MARKER: &str = "[object Object]";

pub trait TokenStore: Send + Sync {
    /// Read the stored value, `None` when nothing is stored
    fn load(&self) -> io::Result<Option<String>>;

    fn save(&self, token: &str) -> io::Result<()>;

    /// Remove the stored value. Removing a missing value is not an error.
    fn clear(&self) -> io::Result<()>;
}

/// Token kept in a single file, e.g. `./data/token`.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let content = content.trim();
                Ok((!content.is_empty()).then(|| content.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save(&self, token: &str) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, token)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Process-local store. Clones share the same slot.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenStore {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(value.into()))),
        }
    }

    pub fn get(&self) -> Option<String> {
        self.slot.lock().clone()
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> io::Result<Option<String>> {
        Ok(self.slot.lock().clone())
    }

    fn save(&self, token: &str) -> io::Result<()> {
        *self.slot.lock() = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        *self.slot.lock() = None;
        Ok(())
    }
}

/// Turn a stored value into a plain token.
///
/// Values that look like serialized objects (leading `{` or `[`, or the
/// literal `[object Object]`) are parsed and searched for `data.token` or
/// `token`. When parsing fails or no token is found, the raw value is used.
pub fn normalize_stored_token(raw: &str) -> String {
    let trimmed = raw.trim();
    let looks_serialized =
        trimmed.starts_with('{') || trimmed.starts_with('[') || trimmed == LEGACY_OBJECT_MARKER;

    if !looks_serialized {
        return trimmed.to_string();
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) if value.is_object() => {
            extract_token(&value).unwrap_or_else(|| trimmed.to_string())
        }
        _ => trimmed.to_string(),
    }
}
