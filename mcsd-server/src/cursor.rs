//! Cursor Store (§4.C): per-source `lastUpdated` timestamp map, persisted
//! as JSON.

use std::collections::HashMap;
use std::path::PathBuf;

use tokio::sync::Mutex;
use tracing::warn;

pub struct CursorStore {
    path: Option<PathBuf>,
    cursors: Mutex<HashMap<String, String>>,
}

impl CursorStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path, cursors: Mutex::new(HashMap::new()) }
    }

    /// Load the cursor file at startup. An absent file is not an error
    /// (§4.C) — it just means every source starts in delta-less mode.
    pub async fn load(&self) {
        let Some(path) = &self.path else { return };
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<HashMap<String, String>>(&content) {
                Ok(parsed) => {
                    *self.cursors.lock().await = parsed;
                }
                Err(e) => warn!(path = %path.display(), error = %e, "failed to parse cursor file"),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to read cursor file"),
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.cursors.lock().await.get(key).cloned()
    }

    pub async fn set(&self, key: String, timestamp: String) {
        self.cursors.lock().await.insert(key, timestamp);
    }

    pub async fn delete(&self, key: &str) {
        self.cursors.lock().await.remove(key);
    }

    /// Persist the current map. Write failures are logged, never returned
    /// as an error to the caller (§4.C, §7): a crash or failed write just
    /// means the next run redoes the window, which is safe because applies
    /// are idempotent via `_source` conditionals (§9).
    pub async fn save(&self) {
        let Some(path) = &self.path else { return };
        let snapshot = self.cursors.lock().await.clone();
        let serialized = match serde_json::to_string_pretty(&snapshot) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed to serialize cursor state");
                return;
            }
        };
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(path = %parent.display(), error = %e, "failed to create cursor directory");
                return;
            }
        }
        if let Err(e) = std::fs::write(path, serialized) {
            warn!(path = %path.display(), error = %e, "failed to write cursor file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn absent_file_is_not_an_error() {
        let store = CursorStore::new(Some(PathBuf::from("/tmp/does-not-exist-mcsd-cursor.json")));
        store.load().await;
        assert_eq!(store.get("https://example.com").await, None);
    }

    #[tokio::test]
    async fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cursor.json");

        let store = CursorStore::new(Some(path.clone()));
        store.set("https://a.example".to_string(), "2024-01-01T00:00:00.000000000Z".to_string()).await;
        store.save().await;

        let reloaded = CursorStore::new(Some(path));
        reloaded.load().await;
        assert_eq!(
            reloaded.get("https://a.example").await,
            Some("2024-01-01T00:00:00.000000000Z".to_string())
        );
    }

    #[tokio::test]
    async fn delete_removes_forced_full_snapshot_key() {
        let store = CursorStore::new(None);
        store.set("k".to_string(), "v".to_string()).await;
        store.delete("k").await;
        assert_eq!(store.get("k").await, None);
    }
}
