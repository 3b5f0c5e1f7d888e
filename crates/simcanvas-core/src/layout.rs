//! Persisted split-ratio preference.
//!
//! The preference lives in a small JSON file (`{"splitRatio": 60}`). Other
//! processes writing the same file are picked up through [`LayoutWatcher`].

use std::path::{Path, PathBuf};

use notify::{EventKind, RecursiveMode, Watcher};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::config::DEFAULT_SPLIT_RATIO;
use crate::error::Result;
use crate::observe::{Listeners, SubscriptionId};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutPreference {
    pub split_ratio: f64,
}

impl Default for LayoutPreference {
    fn default() -> Self {
        Self {
            split_ratio: DEFAULT_SPLIT_RATIO,
        }
    }
}

pub fn clamp_ratio(ratio: f64) -> f64 {
    if ratio.is_nan() {
        DEFAULT_SPLIT_RATIO
    } else {
        ratio.clamp(0.0, 100.0)
    }
}

/// Read the preference file. `None` when missing or unreadable.
fn read_preference(path: &Path) -> Option<LayoutPreference> {
    let data = match std::fs::read_to_string(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!(path = %path.display(), %e, "Failed to read layout preference");
            return None;
        }
    };
    match serde_json::from_str::<LayoutPreference>(&data) {
        Ok(pref) => Some(LayoutPreference {
            split_ratio: clamp_ratio(pref.split_ratio),
        }),
        Err(e) => {
            warn!(path = %path.display(), %e, "Ignoring corrupt layout preference");
            None
        }
    }
}

/// Holds the split ratio and writes it through to disk on every change.
pub struct LayoutStore {
    path: PathBuf,
    default_ratio: f64,
    preference: LayoutPreference,
    listeners: Listeners<LayoutPreference>,
}

impl LayoutStore {
    pub fn open(path: PathBuf, default_ratio: f64) -> Self {
        let default_ratio = clamp_ratio(default_ratio);
        let preference = read_preference(&path).unwrap_or(LayoutPreference {
            split_ratio: default_ratio,
        });
        debug!(path = %path.display(), split_ratio = preference.split_ratio, "Opened layout store");
        Self {
            path,
            default_ratio,
            preference,
            listeners: Listeners::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn split_ratio(&self) -> f64 {
        self.preference.split_ratio
    }

    /// Clamp into `0..=100`, persist, and notify. Returns the stored value.
    pub fn set_split_ratio(&mut self, ratio: f64) -> Result<f64> {
        let preference = LayoutPreference {
            split_ratio: clamp_ratio(ratio),
        };
        self.persist(&preference)?;
        self.preference = preference;
        self.listeners.notify(&self.preference);
        Ok(self.preference.split_ratio)
    }

    /// Re-read the file, e.g. after another process wrote it.
    /// Returns true when the value changed.
    pub fn reload(&mut self) -> bool {
        let preference = read_preference(&self.path).unwrap_or(LayoutPreference {
            split_ratio: self.default_ratio,
        });
        if preference == self.preference {
            return false;
        }
        self.preference = preference;
        self.listeners.notify(&self.preference);
        true
    }

    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&LayoutPreference) + Send + 'static,
    ) -> SubscriptionId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    fn persist(&self, preference: &LayoutPreference) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string(preference)?;
        // Atomic write: write to temp then rename
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, data.as_bytes())?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// A preference change written by another process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutChange {
    pub preference: LayoutPreference,
}

/// Watches the preference file and emits change events.
pub struct LayoutWatcher {
    _watcher: notify::RecommendedWatcher,
}

impl LayoutWatcher {
    /// Start watching the preference file at `path`.
    /// Returns the watcher and a receiver for change events.
    pub fn start(path: PathBuf) -> anyhow::Result<(Self, broadcast::Receiver<LayoutChange>)> {
        let (tx, change_rx) = broadcast::channel(16);

        let path_clone = path.clone();
        let file_name = path.file_name().map(|n| n.to_os_string());

        let mut watcher =
            notify::recommended_watcher(move |res: std::result::Result<notify::Event, notify::Error>| {
                match res {
                    Ok(event) => {
                        if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                            return;
                        }
                        let ours = event
                            .paths
                            .iter()
                            .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                        if !ours {
                            return;
                        }
                        if let Some(preference) = read_preference(&path_clone) {
                            debug!(split_ratio = preference.split_ratio, "Layout preference changed");
                            let _ = tx.send(LayoutChange { preference });
                        }
                    }
                    Err(e) => {
                        error!(%e, "Layout preference watch error");
                    }
                }
            })?;

        // Watch the parent directory to catch the temp-file rename
        let watch_path = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&watch_path)?;

        watcher.watch(&watch_path, RecursiveMode::NonRecursive)?;
        info!(path = %path.display(), "Layout preference watcher started");

        Ok((Self { _watcher: watcher }, change_rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_default_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = LayoutStore::open(dir.path().join("layout-storage.json"), 60.0);
        assert_eq!(store.split_ratio(), 60.0);
    }

    #[test]
    fn test_set_persists_across_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout-storage.json");

        let mut store = LayoutStore::open(path.clone(), 60.0);
        assert_eq!(store.set_split_ratio(35.5).unwrap(), 35.5);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw, r#"{"splitRatio":35.5}"#);

        let reopened = LayoutStore::open(path, 60.0);
        assert_eq!(reopened.split_ratio(), 35.5);
    }

    #[test]
    fn test_set_clamps() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = LayoutStore::open(dir.path().join("l.json"), 60.0);
        assert_eq!(store.set_split_ratio(150.0).unwrap(), 100.0);
        assert_eq!(store.set_split_ratio(-3.0).unwrap(), 0.0);
    }

    #[test]
    fn test_corrupt_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("l.json");
        std::fs::write(&path, "garbage").unwrap();
        let store = LayoutStore::open(path, 55.0);
        assert_eq!(store.split_ratio(), 55.0);
    }

    #[test]
    fn test_reload_notifies_on_external_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("l.json");
        let mut store = LayoutStore::open(path.clone(), 60.0);

        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        store.subscribe(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!store.reload());
        std::fs::write(&path, r#"{"splitRatio":20}"#).unwrap();
        assert!(store.reload());
        assert_eq!(store.split_ratio(), 20.0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_watcher_detects_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout-storage.json");

        let mut reader = LayoutStore::open(path.clone(), 60.0);
        let (_watcher, mut rx) = LayoutWatcher::start(path.clone()).unwrap();

        let mut writer = LayoutStore::open(path, 60.0);
        writer.set_split_ratio(42.0).unwrap();

        // The reader picks up the write whether or not the event arrives.
        assert!(reader.reload());
        assert_eq!(reader.split_ratio(), 42.0);

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv()).await;

        if let Ok(Ok(change)) = result {
            assert_eq!(change.preference.split_ratio, 42.0);
            assert!(!reader.reload());
        }
        // Note: On some CI environments the file watcher may not trigger,
        // so we don't assert failure here.
    }
}
