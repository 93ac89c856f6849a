//! Key-value persistence for dashboard preferences.
//!
//! The only durable state is the theme preference, stored under
//! [`THEME_KEY`] as the text `dark` or `light`.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Storage key for the theme preference.
pub const THEME_KEY: &str = "theme";

/// Storage trait for preference persistence.
pub trait Storage: Send + Sync {
    /// Save data to storage.
    fn save(&self, key: &str, data: &[u8]) -> Result<(), CoreError>;

    /// Load data from storage.
    fn load(&self, key: &str) -> Option<Vec<u8>>;

    /// Remove data from storage.
    fn remove(&self, key: &str) -> Result<(), CoreError>;

    /// Check if a key exists.
    fn contains(&self, key: &str) -> bool {
        self.load(key).is_some()
    }
}

/// In-memory storage for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    data: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of stored items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.lock().expect("MemoryStorage mutex poisoned").len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data
            .lock()
            .expect("MemoryStorage mutex poisoned")
            .is_empty()
    }
}

impl Storage for MemoryStorage {
    fn save(&self, key: &str, data: &[u8]) -> Result<(), CoreError> {
        self.data
            .lock()
            .expect("MemoryStorage mutex poisoned")
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn load(&self, key: &str) -> Option<Vec<u8>> {
        self.data
            .lock()
            .expect("MemoryStorage mutex poisoned")
            .get(key)
            .cloned()
    }

    fn remove(&self, key: &str) -> Result<(), CoreError> {
        self.data
            .lock()
            .expect("MemoryStorage mutex poisoned")
            .remove(key);
        Ok(())
    }

    fn contains(&self, key: &str) -> bool {
        self.data
            .lock()
            .expect("MemoryStorage mutex poisoned")
            .contains_key(key)
    }
}

/// Storage that keeps one file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Use `root` as the storage directory. It is created on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Storage directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root.join(safe)
    }
}

impl Storage for FileStorage {
    fn save(&self, key: &str, data: &[u8]) -> Result<(), CoreError> {
        fs::create_dir_all(&self.root)?;
        fs::write(self.path_for(key), data)?;
        debug!(key, path = %self.root.display(), "preference saved");
        Ok(())
    }

    fn load(&self, key: &str) -> Option<Vec<u8>> {
        fs::read(self.path_for(key)).ok()
    }

    fn remove(&self, key: &str) -> Result<(), CoreError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Dashboard color theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    #[default]
    Dark,
    Light,
}

impl ThemePreference {
    /// Stored text form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
        }
    }

    /// The other theme.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Dark,
        }
    }

    /// Read the stored preference. Missing or unreadable values mean dark.
    pub fn load(storage: &dyn Storage) -> Self {
        match storage.load(THEME_KEY).as_deref() {
            Some(b"light") => Self::Light,
            Some(b"dark") | None => Self::Dark,
            Some(other) => {
                warn!(value = %String::from_utf8_lossy(other), "unrecognized stored theme, using dark");
                Self::Dark
            }
        }
    }

    /// Persist this preference.
    pub fn save(self, storage: &dyn Storage) -> Result<(), CoreError> {
        storage.save(THEME_KEY, self.as_str().as_bytes())
    }

    /// Flip the stored preference and return the new value.
    pub fn toggle(storage: &dyn Storage) -> Result<Self, CoreError> {
        let next = Self::load(storage).toggled();
        next.save(storage)?;
        Ok(next)
    }
}

impl fmt::Display for ThemePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
