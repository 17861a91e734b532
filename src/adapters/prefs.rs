use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::PrefsError;

#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
pub struct Preferences {
    #[serde(rename = "sidebarCollapsed", default)]
    pub sidebar_collapsed: bool,
}

/// Small JSON file standing in for the browser's local storage.
#[derive(Debug, Clone)]
pub struct PrefsStore {
    path: PathBuf,
}

impl PrefsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable preferences fall back to defaults.
    pub fn load(&self) -> Preferences {
        match self.try_load() {
            Ok(prefs) => prefs,
            Err(e) => {
                warn!(event = "PREFS_LOAD_FAIL", path = %self.path.display(), error = %e, "Using default preferences");
                Preferences::default()
            }
        }
    }

    fn try_load(&self) -> Result<Preferences, PrefsError> {
        if !self.path.exists() {
            return Ok(Preferences::default());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, prefs: &Preferences) -> Result<(), PrefsError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let raw = serde_json::to_string_pretty(prefs)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_means_expanded_sidebar() {
        let dir = tempfile::tempdir().unwrap();
        let store = PrefsStore::new(dir.path().join("prefs.json"));
        assert!(!store.load().sidebar_collapsed);
    }

    #[test]
    fn flag_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");
        PrefsStore::new(&path).save(&Preferences { sidebar_collapsed: true }).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"sidebarCollapsed\": true"));
        assert!(PrefsStore::new(&path).load().sidebar_collapsed);
    }

    #[test]
    fn corrupt_file_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(PrefsStore::new(&path).load(), Preferences::default());
    }
}
