//! Durable-storage bridge for reload continuity.
//!
//! The current [`Room`] snapshot is mirrored to a [`SnapshotStore`] so a page
//! reload (or process restart) can restore room membership before the first
//! authoritative refresh arrives. The mirror is disposable cache, never a
//! source of truth: every storage failure is logged and swallowed, and
//! absent or malformed content is simply a cache miss.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::error::WordSpyError;
use crate::protocol::Room;

/// Storage key under which the serialized room snapshot lives.
pub const ROOM_SNAPSHOT_KEY: &str = "room";

/// Best-effort durable key-value storage (browser localStorage, a settings
/// file, …). Any call may fail; callers of this trait must treat failures as
/// cache misses.
pub trait SnapshotStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<String>, WordSpyError>;
    fn set(&self, key: &str, value: &str) -> Result<(), WordSpyError>;
    fn remove(&self, key: &str) -> Result<(), WordSpyError>;
}

/// Mirrors the room snapshot into a [`SnapshotStore`] under a fixed key.
///
/// All methods are infallible from the caller's perspective: persistence is
/// an optimization, not a correctness requirement.
#[derive(Clone)]
pub struct RoomCache {
    store: Arc<dyn SnapshotStore>,
}

impl RoomCache {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self { store }
    }

    /// Serialize and store the room snapshot.
    pub fn save(&self, room: &Room) {
        let json = match serde_json::to_string(room) {
            Ok(json) => json,
            Err(e) => {
                warn!("failed to serialize room snapshot: {e}");
                return;
            }
        };
        if let Err(e) = self.store.set(ROOM_SNAPSHOT_KEY, &json) {
            warn!("failed to persist room snapshot: {e}");
        }
    }

    /// Load the last stored room snapshot, if present and parseable.
    pub fn load(&self) -> Option<Room> {
        let json = match self.store.get(ROOM_SNAPSHOT_KEY) {
            Ok(Some(json)) => json,
            Ok(None) => return None,
            Err(e) => {
                warn!("failed to read room snapshot: {e}");
                return None;
            }
        };
        match serde_json::from_str(&json) {
            Ok(room) => Some(room),
            Err(e) => {
                warn!("stored room snapshot is malformed, ignoring: {e}");
                None
            }
        }
    }

    /// Drop the stored snapshot.
    pub fn clear(&self) {
        if let Err(e) = self.store.remove(ROOM_SNAPSHOT_KEY) {
            warn!("failed to remove room snapshot: {e}");
        } else {
            debug!("room snapshot cleared from storage");
        }
    }
}

impl std::fmt::Debug for RoomCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomCache").finish_non_exhaustive()
    }
}

/// In-memory [`SnapshotStore`] for tests and embedders without a durable
/// backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, WordSpyError> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), WordSpyError> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), WordSpyError> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::protocol::RoomStatus;

    fn sample_room() -> Room {
        Room {
            room_code: "ABCD".into(),
            room_id: "r-1".into(),
            status: RoomStatus::Lobby,
            players: vec![],
        }
    }

    /// Store whose every operation fails, for exercising the swallow path.
    struct BrokenStore;

    impl SnapshotStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, WordSpyError> {
            Err(WordSpyError::Storage("read refused".into()))
        }
        fn set(&self, _key: &str, _value: &str) -> Result<(), WordSpyError> {
            Err(WordSpyError::Storage("write refused".into()))
        }
        fn remove(&self, _key: &str) -> Result<(), WordSpyError> {
            Err(WordSpyError::Storage("remove refused".into()))
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let cache = RoomCache::new(Arc::new(MemoryStore::new()));
        cache.save(&sample_room());
        let loaded = cache.load().unwrap();
        assert_eq!(loaded.room_code, "ABCD");
    }

    #[test]
    fn load_from_empty_store_is_none() {
        let cache = RoomCache::new(Arc::new(MemoryStore::new()));
        assert!(cache.load().is_none());
    }

    #[test]
    fn malformed_snapshot_is_cache_miss() {
        let store = Arc::new(MemoryStore::new());
        store.set(ROOM_SNAPSHOT_KEY, "{not json").unwrap();
        let cache = RoomCache::new(store);
        assert!(cache.load().is_none());
    }

    #[test]
    fn clear_removes_snapshot() {
        let store = Arc::new(MemoryStore::new());
        let cache = RoomCache::new(Arc::clone(&store) as Arc<dyn SnapshotStore>);
        cache.save(&sample_room());
        cache.clear();
        assert!(store.get(ROOM_SNAPSHOT_KEY).unwrap().is_none());
    }

    #[test]
    fn storage_failures_never_propagate() {
        let cache = RoomCache::new(Arc::new(BrokenStore));
        cache.save(&sample_room()); // must not panic
        assert!(cache.load().is_none());
        cache.clear(); // must not panic
    }
}
