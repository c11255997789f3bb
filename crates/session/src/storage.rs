//! Durable token storage backends
//!
//! A storage backend is a small named-slot store shared by every console
//! instance ("tab") of the same origin:
//! - `MemoryStorage`: in-process origin with a change feed between tabs
//! - `FileStorage`: one plain-text file per slot, durable across restarts,
//!   with a change feed driven by watching the directory

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;

use crate::SessionError;

const EVENT_CAPACITY: usize = 64;

/// Identifies one tab of a storage origin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TabId(pub u64);

/// Change to a storage slot, delivered to the other tabs of the origin
#[derive(Debug, Clone, PartialEq)]
pub struct StorageEvent {
    pub key: String,
    /// New value, `None` when the slot was removed
    pub new_value: Option<String>,
    /// Tab that performed the write
    pub source: TabId,
}

/// Named-slot storage holding plain-text values.
pub trait SessionStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, SessionError>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), SessionError>;

    fn remove_item(&self, key: &str) -> Result<(), SessionError>;

    /// Feed of writes made by other tabs, if the backend has one.
    fn subscribe(&self) -> Option<StorageWatcher> {
        None
    }
}

/// Receives storage events written by other tabs.
pub struct StorageWatcher {
    rx: broadcast::Receiver<StorageEvent>,
    tab: TabId,
    /// Keeps a file system watcher alive as long as the feed is read
    file_watcher: Option<notify::RecommendedWatcher>,
}

impl std::fmt::Debug for StorageWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageWatcher")
            .field("tab", &self.tab)
            .field("watches_files", &self.file_watcher.is_some())
            .finish()
    }
}

impl StorageWatcher {
    /// Next event from another tab, or `None` once the origin is gone.
    pub async fn next(&mut self) -> Option<StorageEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.source == self.tab => continue,
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Storage watcher lagged behind, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

struct Origin {
    items: Mutex<HashMap<String, String>>,
    events: broadcast::Sender<StorageEvent>,
    next_tab: AtomicU64,
}

impl Origin {
    fn open_tab(self: &Arc<Self>) -> MemoryStorage {
        let tab = TabId(self.next_tab.fetch_add(1, Ordering::SeqCst));
        MemoryStorage {
            origin: Arc::clone(self),
            tab,
        }
    }

    fn publish(&self, event: StorageEvent) {
        // No receivers simply means no other tab is listening
        let _ = self.events.send(event);
    }
}

/// In-memory storage for one tab of a shared origin.
pub struct MemoryStorage {
    origin: Arc<Origin>,
    tab: TabId,
}

impl MemoryStorage {
    /// Storage for the first tab of a fresh origin
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let origin = Arc::new(Origin {
            items: Mutex::new(HashMap::new()),
            events,
            next_tab: AtomicU64::new(0),
        });
        origin.open_tab()
    }

    /// Storage for another tab of the same origin
    pub fn sibling(&self) -> Self {
        self.origin.open_tab()
    }

    pub fn tab_id(&self) -> TabId {
        self.tab
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStorage")
            .field("tab", &self.tab)
            .finish_non_exhaustive()
    }
}

impl SessionStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, SessionError> {
        let items = self
            .origin
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), SessionError> {
        let previous = self
            .origin
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());

        // Rewriting the same value is not a change
        if previous.as_deref() != Some(value) {
            self.origin.publish(StorageEvent {
                key: key.to_string(),
                new_value: Some(value.to_string()),
                source: self.tab,
            });
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), SessionError> {
        let previous = self
            .origin
            .items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);

        if previous.is_some() {
            self.origin.publish(StorageEvent {
                key: key.to_string(),
                new_value: None,
                source: self.tab,
            });
        }
        Ok(())
    }

    fn subscribe(&self) -> Option<StorageWatcher> {
        Some(StorageWatcher {
            rx: self.origin.events.subscribe(),
            tab: self.tab,
            file_watcher: None,
        })
    }
}

/// Source recorded on events read back from disk: the writer is another
/// process, or another handle on the same directory.
pub const EXTERNAL_WRITER: TabId = TabId(u64::MAX);

static NEXT_FILE_TAB: AtomicU64 = AtomicU64::new(0);

/// File-backed storage: each slot is a file named after its key.
///
/// Writes go through a hidden temporary file and a rename, so a watcher
/// never reads a half-written token. Values this handle wrote or read last
/// are remembered per key; the change feed only reports values that differ.
#[derive(Clone)]
pub struct FileStorage {
    dir: PathBuf,
    tab: TabId,
    last_seen: Arc<Mutex<HashMap<String, Option<String>>>>,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            tab: TabId(NEXT_FILE_TAB.fetch_add(1, Ordering::SeqCst)),
            last_seen: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn slot_path(&self, key: &str) -> Result<PathBuf, SessionError> {
        if !is_valid_key(key) {
            return Err(SessionError::Storage(format!(
                "Invalid storage key: {:?}",
                key
            )));
        }
        Ok(self.dir.join(key))
    }

    fn remember(&self, key: &str, value: Option<&str>) {
        self.last_seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.map(str::to_string));
    }
}

impl std::fmt::Debug for FileStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStorage")
            .field("dir", &self.dir)
            .field("tab", &self.tab)
            .finish_non_exhaustive()
    }
}

fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !key.starts_with('.')
}

fn read_slot(path: &Path) -> Result<Option<String>, SessionError> {
    match std::fs::read_to_string(path) {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl SessionStorage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, SessionError> {
        let value = read_slot(&self.slot_path(key)?)?;
        self.remember(key, value.as_deref());
        Ok(value)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), SessionError> {
        let path = self.slot_path(key)?;
        std::fs::create_dir_all(&self.dir)?;
        self.remember(key, Some(value));

        // Owner-only from creation on: the token is never readable by others
        let staging = self.dir.join(format!(".{}.tmp", key));
        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&staging)?;
        #[cfg(unix)]
        {
            // A stale staging file keeps its old mode
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
        }
        file.write_all(value.as_bytes())?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&staging, &path)?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), SessionError> {
        let path = self.slot_path(key)?;
        self.remember(key, None);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Watch the directory for slots changed by other handles.
    fn subscribe(&self) -> Option<StorageWatcher> {
        use notify::{RecursiveMode, Watcher};

        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            tracing::warn!(error = %e, dir = %self.dir.display(), "Failed to create session directory, storage sync disabled");
            return None;
        }

        let (events, rx) = broadcast::channel(EVENT_CAPACITY);
        let dir = self.dir.clone();
        let last_seen = Arc::clone(&self.last_seen);

        let watcher = notify::recommended_watcher(move |event: notify::Result<notify::Event>| {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, "Session directory watch error");
                    return;
                }
            };

            if !matches!(
                event.kind,
                notify::EventKind::Modify(_)
                    | notify::EventKind::Create(_)
                    | notify::EventKind::Remove(_)
            ) {
                return;
            }

            for path in &event.paths {
                let Some(key) = path.file_name().and_then(|name| name.to_str()) else {
                    continue;
                };
                if !is_valid_key(key) {
                    continue;
                }

                let value = match read_slot(&dir.join(key)) {
                    Ok(value) => value,
                    Err(e) => {
                        tracing::warn!(error = %e, key = %key, "Failed to re-read session slot");
                        continue;
                    }
                };

                {
                    let mut last_seen = last_seen.lock().unwrap_or_else(PoisonError::into_inner);
                    if last_seen.get(key) == Some(&value) {
                        continue;
                    }
                    last_seen.insert(key.to_string(), value.clone());
                }

                tracing::debug!(key = %key, present = value.is_some(), "Session slot changed on disk");
                // No receivers simply means nobody is listening
                let _ = events.send(StorageEvent {
                    key: key.to_string(),
                    new_value: value,
                    source: EXTERNAL_WRITER,
                });
            }
        });

        let mut watcher = match watcher {
            Ok(watcher) => watcher,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to create session directory watcher, storage sync disabled");
                return None;
            }
        };

        if let Err(e) = watcher.watch(&self.dir, RecursiveMode::NonRecursive) {
            tracing::warn!(error = %e, dir = %self.dir.display(), "Failed to watch session directory, storage sync disabled");
            return None;
        }

        Some(StorageWatcher {
            rx,
            tab: self.tab,
            file_watcher: Some(watcher),
        })
    }
}
