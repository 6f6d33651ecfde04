//! Key-value persistence for session material
//!
//! Modeled on a browser's local storage: string keys, string values, every
//! key independently readable and removable, synchronous access. A missing
//! key is a normal "logged out" condition, not an error.
//!
//! `FileStore` keeps the whole map in memory and rewrites a JSON file on
//! every mutation with temp-file + rename, so a crash never leaves a
//! half-written file behind.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// In-process store; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// JSON file store with owner-only permissions.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`. A missing file is an empty store; the file
    /// is created on the first write.
    pub fn open(path: PathBuf) -> Result<Self> {
        let entries = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::Storage(format!("reading {}: {e}", path.display())))?;
            let entries: HashMap<String, String> = serde_json::from_str(&contents)
                .map_err(|e| Error::Storage(format!("parsing {}: {e}", path.display())))?;
            info!(path = %path.display(), keys = entries.len(), "opened session store");
            entries
        } else {
            info!(path = %path.display(), "session store not found, starting empty");
            HashMap::new()
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        entries.insert(key.to_string(), value.to_string());
        write_atomic(&self.path, &entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            write_atomic(&self.path, &entries)?;
        }
        Ok(())
    }
}

/// Write the map next to `path` and rename it into place (0600 on unix).
fn write_atomic(path: &Path, entries: &HashMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(entries)
        .map_err(|e| Error::Storage(format!("serializing session store: {e}")))?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)
        .map_err(|e| Error::Storage(format!("creating {}: {e}", dir.display())))?;

    let tmp_path = dir.join(format!(".session.tmp.{}", std::process::id()));
    let written = write_owner_only(&tmp_path, json.as_bytes()).and_then(|()| {
        std::fs::rename(&tmp_path, path)
            .map_err(|e| Error::Storage(format!("renaming temp session file: {e}")))
    });
    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }

    debug!(path = %path.display(), "persisted session store");
    Ok(())
}

/// Create `path` with 0600 from the start, so the secrets are never
/// readable under the process umask.
fn write_owner_only(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(path)
        .map_err(|e| Error::Storage(format!("creating temp session file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))
            .map_err(|e| Error::Storage(format!("setting session file permissions: {e}")))?;
    }

    file.write_all(contents)
        .and_then(|()| file.sync_all())
        .map_err(|e| Error::Storage(format!("writing temp session file: {e}")))
}
