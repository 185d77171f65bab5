//! Local event queue storage.
//!
//! The interactor only depends on the [`EventStore`] trait; the store owns
//! serialization of concurrent access. Two implementations ship with the
//! crate: an in-memory store, and a crash-resilient file store that logs
//! events and deletions to append-only JSONL files.

use fs2::FileExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{ErrorCode, FlagwireError, Result};
use crate::event::types::Event;

/// Ordered persistence for queued events.
///
/// Insertion order must be preserved: `events()` returns the queue oldest
/// first, and a send consumes from the front.
pub trait EventStore: Send + Sync {
    /// Append a single event to the queue.
    fn add(&self, event: Event) -> Result<()>;

    /// Append a batch of events as one operation.
    fn add_all(&self, events: Vec<Event>) -> Result<()>;

    /// All queued events, oldest first.
    fn events(&self) -> Result<Vec<Event>>;

    /// Remove the events with the given ids. Unknown ids are ignored.
    fn delete(&self, ids: &[String]) -> Result<()>;
}

/// In-memory [`EventStore`] backed by a mutex-guarded vector.
#[derive(Default)]
pub struct InMemoryEventStore {
    events: Mutex<Vec<Event>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventStore for InMemoryEventStore {
    fn add(&self, event: Event) -> Result<()> {
        self.events.lock().push(event);
        Ok(())
    }

    fn add_all(&self, events: Vec<Event>) -> Result<()> {
        self.events.lock().extend(events);
        Ok(())
    }

    fn events(&self) -> Result<Vec<Event>> {
        Ok(self.events.lock().clone())
    }

    fn delete(&self, ids: &[String]) -> Result<()> {
        self.events.lock().retain(|e| !ids.contains(&e.id));
        Ok(())
    }
}

/// Deletion record appended to the log when events are removed.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRecord {
    deleted_ids: Vec<String>,
}

/// Crash-resilient [`EventStore`] using an append-only JSONL log.
///
/// Events and deletion records are appended to the current log file and
/// synced to disk; a mutex-guarded in-memory mirror serves reads. On
/// startup all log files in the storage directory are replayed, oldest
/// session first, so events queued before a crash survive. [`compact`]
/// rewrites the log with only live events.
///
/// [`compact`]: FileEventStore::compact
pub struct FileEventStore {
    storage_path: PathBuf,
    current_log_file: PathBuf,
    lock_file_path: PathBuf,
    state: Mutex<Vec<Event>>,
}

impl FileEventStore {
    /// Open a store rooted at `storage_path`, replaying any existing logs.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or existing logs
    /// cannot be read.
    pub fn new(storage_path: impl Into<PathBuf>) -> Result<Self> {
        let storage_path = storage_path.into();
        fs::create_dir_all(&storage_path).map_err(|e| {
            FlagwireError::with_source(
                ErrorCode::StorageWriteError,
                format!(
                    "Failed to create event storage directory: {}",
                    storage_path.display()
                ),
                e,
            )
        })?;

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let random_suffix: u32 = rand::random();
        let log_file_name = format!("flagwire-events-{}-{:08x}.jsonl", timestamp, random_suffix);
        let current_log_file = storage_path.join(log_file_name);
        let lock_file_path = storage_path.join("flagwire-events.lock");

        let store = Self {
            storage_path,
            current_log_file,
            lock_file_path,
            state: Mutex::new(Vec::new()),
        };

        let recovered = store.replay()?;
        if !recovered.is_empty() {
            tracing::info!(count = recovered.len(), "Recovered queued events from disk");
        }
        *store.state.lock() = recovered;

        Ok(store)
    }

    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    /// Rewrite the log so it contains only the currently queued events.
    ///
    /// Old session files are removed; replayed deletions no longer take up
    /// space afterwards.
    pub fn compact(&self) -> Result<()> {
        let state = self.state.lock();
        let _lock = self.acquire_lock()?;

        let log_files = self.log_files()?;
        for log_file in &log_files {
            if log_file != &self.current_log_file {
                if let Err(e) = fs::remove_file(log_file) {
                    tracing::warn!(file = %log_file.display(), error = %e, "Failed to remove old log file");
                }
            }
        }

        let mut file = File::create(&self.current_log_file).map_err(|e| {
            FlagwireError::with_source(
                ErrorCode::StorageWriteError,
                "Failed to rewrite event log",
                e,
            )
        })?;

        for event in state.iter() {
            let line = serde_json::to_string(event).map_err(|e| {
                FlagwireError::with_source(
                    ErrorCode::StorageWriteError,
                    "Failed to serialize event",
                    e,
                )
            })?;
            writeln!(file, "{}", line).map_err(|e| {
                FlagwireError::with_source(ErrorCode::StorageWriteError, "Failed to write event", e)
            })?;
        }

        file.sync_all().map_err(|e| {
            FlagwireError::with_source(ErrorCode::StorageWriteError, "Failed to sync event log", e)
        })?;

        tracing::debug!(live = state.len(), "Compacted event log");

        Ok(())
    }

    fn append_lines(&self, lines: &[String]) -> Result<()> {
        let _lock = self.acquire_lock()?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.current_log_file)
            .map_err(|e| {
                FlagwireError::with_source(
                    ErrorCode::StorageWriteError,
                    format!(
                        "Failed to open event log file: {}",
                        self.current_log_file.display()
                    ),
                    e,
                )
            })?;

        for line in lines {
            writeln!(file, "{}", line).map_err(|e| {
                FlagwireError::with_source(ErrorCode::StorageWriteError, "Failed to write event", e)
            })?;
        }

        file.sync_all().map_err(|e| {
            FlagwireError::with_source(ErrorCode::StorageWriteError, "Failed to sync event log", e)
        })
    }

    fn acquire_lock(&self) -> Result<File> {
        let lock_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_file_path)
            .map_err(|e| {
                FlagwireError::with_source(
                    ErrorCode::StorageWriteError,
                    "Failed to open lock file",
                    e,
                )
            })?;

        lock_file.lock_exclusive().map_err(|e| {
            FlagwireError::with_source(
                ErrorCode::StorageWriteError,
                "Failed to acquire file lock",
                e,
            )
        })?;

        Ok(lock_file)
    }

    /// All log files in the storage directory, oldest session first.
    fn log_files(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.storage_path).map_err(|e| {
            FlagwireError::with_source(
                ErrorCode::StorageReadError,
                "Failed to read event storage directory",
                e,
            )
        })?;

        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "jsonl"))
            .collect();
        // File names start with a millisecond timestamp, so lexicographic
        // order matches session order.
        files.sort();
        Ok(files)
    }

    fn replay(&self) -> Result<Vec<Event>> {
        let _lock = self.acquire_lock()?;

        let mut events: Vec<Event> = Vec::new();
        for path in self.log_files()? {
            self.replay_file(&path, &mut events)?;
        }
        Ok(events)
    }

    fn replay_file(&self, path: &Path, events: &mut Vec<Event>) -> Result<()> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(FlagwireError::with_source(
                    ErrorCode::StorageReadError,
                    format!("Failed to open event log file: {}", path.display()),
                    e,
                ));
            }
        };

        let reader = BufReader::new(file);
        for line in reader.lines() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read line from event log");
                    continue;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            if let Ok(event) = serde_json::from_str::<Event>(&line) {
                events.push(event);
                continue;
            }

            if let Ok(record) = serde_json::from_str::<DeleteRecord>(&line) {
                events.retain(|e| !record.deleted_ids.contains(&e.id));
            }
        }

        Ok(())
    }
}

impl EventStore for FileEventStore {
    fn add(&self, event: Event) -> Result<()> {
        self.add_all(vec![event])
    }

    fn add_all(&self, events: Vec<Event>) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let mut state = self.state.lock();

        let lines = events
            .iter()
            .map(|event| {
                serde_json::to_string(event).map_err(|e| {
                    FlagwireError::with_source(
                        ErrorCode::StorageWriteError,
                        "Failed to serialize event",
                        e,
                    )
                })
            })
            .collect::<Result<Vec<String>>>()?;

        self.append_lines(&lines)?;
        state.extend(events);
        Ok(())
    }

    fn events(&self) -> Result<Vec<Event>> {
        Ok(self.state.lock().clone())
    }

    fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut state = self.state.lock();

        let record = DeleteRecord {
            deleted_ids: ids.to_vec(),
        };
        let line = serde_json::to_string(&record).map_err(|e| {
            FlagwireError::with_source(
                ErrorCode::StorageDeleteError,
                "Failed to serialize delete record",
                e,
            )
        })?;

        self.append_lines(&[line])?;
        state.retain(|e| !ids.contains(&e.id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::types::{EventPayload, GoalEvent, User};
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn goal_event(id: &str) -> Event {
        Event::new(
            id,
            EventPayload::Goal(GoalEvent {
                timestamp: 1_700_000_000,
                goal_id: "checkout".to_string(),
                value: 1.0,
                user: User::new("user-1"),
                tag: "ios".to_string(),
                sdk_version: "0.1.0".to_string(),
                metadata: HashMap::new(),
            }),
        )
    }

    #[test]
    fn test_in_memory_preserves_insertion_order() {
        let store = InMemoryEventStore::new();
        store.add(goal_event("a")).unwrap();
        store
            .add_all(vec![goal_event("b"), goal_event("c")])
            .unwrap();

        let ids: Vec<String> = store
            .events()
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_in_memory_delete_ignores_unknown_ids() {
        let store = InMemoryEventStore::new();
        store.add(goal_event("a")).unwrap();
        store.delete(&["a".to_string(), "missing".to_string()]).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_store_replays_events_across_instances() {
        let temp_dir = TempDir::new().unwrap();

        {
            let store = FileEventStore::new(temp_dir.path()).unwrap();
            store.add(goal_event("a")).unwrap();
            store.add(goal_event("b")).unwrap();
        }

        let store = FileEventStore::new(temp_dir.path()).unwrap();
        let ids: Vec<String> = store
            .events()
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_file_store_replays_deletions() {
        let temp_dir = TempDir::new().unwrap();

        {
            let store = FileEventStore::new(temp_dir.path()).unwrap();
            store
                .add_all(vec![goal_event("a"), goal_event("b")])
                .unwrap();
            store.delete(&["a".to_string()]).unwrap();
        }

        let store = FileEventStore::new(temp_dir.path()).unwrap();
        let ids: Vec<String> = store
            .events()
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn test_file_store_compact_drops_dead_records() {
        let temp_dir = TempDir::new().unwrap();

        let store = FileEventStore::new(temp_dir.path()).unwrap();
        store
            .add_all(vec![goal_event("a"), goal_event("b")])
            .unwrap();
        store.delete(&["a".to_string()]).unwrap();
        store.compact().unwrap();

        let store = FileEventStore::new(temp_dir.path()).unwrap();
        let ids: Vec<String> = store
            .events()
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec!["b"]);
    }
}
