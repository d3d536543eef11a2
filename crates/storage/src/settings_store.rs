use std::path::{Path, PathBuf};

use common::error::AlertError;
use common::models::Settings;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Flat JSON settings file with a lazily loaded in-memory cache.
///
/// Updates replace the whole object. Persisting is best effort: a failed
/// write is logged and the cached value still takes effect.
pub struct SettingsStore {
    path: PathBuf,
    cache: RwLock<Option<Settings>>,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RwLock::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self) -> Settings {
        if let Some(ref settings) = *self.cache.read().await {
            return settings.clone();
        }

        let mut cache = self.cache.write().await;
        if let Some(ref settings) = *cache {
            return settings.clone();
        }
        let loaded = load(&self.path).await;
        *cache = Some(loaded.clone());
        loaded
    }

    pub async fn update(&self, settings: Settings) -> Result<Settings, AlertError> {
        settings.validate()?;
        *self.cache.write().await = Some(settings.clone());
        persist(&self.path, &settings).await;
        Ok(settings)
    }

    /// Read-modify-write on the current settings.
    pub async fn modify<F>(&self, change: F) -> Result<Settings, AlertError>
    where
        F: FnOnce(&mut Settings),
    {
        let mut settings = self.get().await;
        change(&mut settings);
        self.update(settings).await
    }
}

async fn load(path: &Path) -> Settings {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) => {
            info!("No settings at {} ({}), using defaults", path.display(), e);
            return Settings::default();
        }
    };

    match serde_json::from_str::<Settings>(&raw) {
        Ok(settings) if settings.validate().is_ok() => {
            debug!("Loaded settings from {}", path.display());
            settings
        }
        Ok(settings) => {
            warn!("Ignoring invalid settings in {}: {:?}", path.display(), settings);
            Settings::default()
        }
        Err(e) => {
            warn!("Failed to parse {}: {}. Using defaults", path.display(), e);
            Settings::default()
        }
    }
}

async fn persist(path: &Path, settings: &Settings) {
    let body = match serde_json::to_string_pretty(settings) {
        Ok(body) => body,
        Err(e) => {
            warn!("Failed to serialize settings: {}", e);
            return;
        }
    };

    if let Err(e) = tokio::fs::write(path, body).await {
        warn!("Failed to persist settings to {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::models::{FilterMode, SideMode};

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("relay-settings-{}.json", uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let store = SettingsStore::new(temp_path());
        assert_eq!(store.get().await, Settings::default());
    }

    #[tokio::test]
    async fn test_update_persists_wholesale() {
        let path = temp_path();
        let store = SettingsStore::new(&path);
        assert_eq!(store.path(), path.as_path());

        let wanted = Settings {
            capital: 25_000.0,
            risk_pct: 0.5,
            side: SideMode::Long,
            filter_mode: FilterMode::EnterAndWait,
            cooldown_minutes: 5,
        };
        store.update(wanted.clone()).await.unwrap();

        let reopened = SettingsStore::new(&path);
        assert_eq!(reopened.get().await, wanted);

        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_invalid_update_rejected() {
        let store = SettingsStore::new(temp_path());
        let result = store
            .modify(|s| s.capital = -1.0)
            .await;

        assert!(matches!(result, Err(AlertError::Configuration(_))));
        assert_eq!(store.get().await, Settings::default());
    }

    #[tokio::test]
    async fn test_failed_write_still_updates_cache() {
        let path = std::env::temp_dir()
            .join(format!("missing-{}", uuid::Uuid::new_v4()))
            .join("settings.json");
        let store = SettingsStore::new(&path);

        let updated = store.modify(|s| s.cooldown_minutes = 90).await.unwrap();

        assert_eq!(updated.cooldown_minutes, 90);
        assert_eq!(store.get().await.cooldown_minutes, 90);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_corrupt_file_falls_back_to_defaults() {
        let path = temp_path();
        std::fs::write(&path, "capital=oops").unwrap();

        let store = SettingsStore::new(&path);
        assert_eq!(store.get().await, Settings::default());

        let _ = std::fs::remove_file(path);
    }
}
