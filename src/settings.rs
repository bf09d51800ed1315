//! Durable settings persistence
//!
//! A [`SettingsStore`] owns the canonical settings file, its error log and
//! the legacy migration source. Saves go through a temporary sibling file
//! that must parse back before it atomically replaces the settings file, so
//! a concurrent reader never observes a half-written file. All failures
//! degrade to defaults or no-ops; they are appended to `error.log` and never
//! surface to callers.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::constants::config;

/// Application settings persisted across restarts.
///
/// Unknown fields in the file are ignored and missing fields take defaults,
/// so configs written by older or newer versions still load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Index into the current screen list, or None when no screen is blocked
    #[serde(default)]
    pub blocked_screen_index: Option<usize>,

    /// Toggle hotkey in "Control,Alt,B" form
    #[serde(default)]
    pub hotkey: Option<String>,
}

/// Failure categories recorded in the error log.
///
/// These never cross the public store API; callers always get a default
/// value or a completed no-op.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to create settings directory {}", path.display())]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read settings file")]
    Read(#[source] io::Error),
    #[error("failed to parse settings file")]
    Parse(#[source] serde_json::Error),
    #[error("failed to write settings file")]
    Write(#[source] io::Error),
    #[error("settings failed validation before write")]
    Validate(#[source] serde_json::Error),
    #[error("failed to copy legacy settings")]
    MigrationCopy(#[source] io::Error),
    #[error("migrated settings failed validation")]
    MigrationValidate(#[source] serde_json::Error),
}

/// Filesystem locations used by a [`SettingsStore`].
#[derive(Debug, Clone)]
pub struct SettingsPaths {
    /// Directory holding the settings file and error log
    pub dir: PathBuf,
    pub settings_file: PathBuf,
    pub error_log: PathBuf,
    /// One-time migration source from older releases
    pub legacy_settings: PathBuf,
}

impl SettingsPaths {
    /// Canonical per-user locations: `<config root>/Mouse-Guard/settings.json`
    /// with the legacy file next to the executable.
    pub fn default_locations() -> Self {
        let mut dir = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        dir.push(config::APP_DIR);
        let legacy_settings = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
            .join(config::SETTINGS_FILENAME);
        Self {
            settings_file: dir.join(config::SETTINGS_FILENAME),
            error_log: dir.join(config::ERROR_LOG_FILENAME),
            dir,
            legacy_settings,
        }
    }
}

/// Atomic, self-healing persistence for one settings location.
///
/// Load, save and migrate are serialized under one internal lock, so
/// concurrent callers in the same process never interleave a read with a
/// write. Across processes the atomic rename is the only safety net (last
/// writer wins).
pub struct SettingsStore {
    paths: SettingsPaths,
    lock: Mutex<()>,
}

impl SettingsStore {
    pub fn new(paths: SettingsPaths) -> Self {
        Self {
            paths,
            lock: Mutex::new(()),
        }
    }

    /// Store at the canonical per-user location.
    pub fn open_default() -> Self {
        Self::new(SettingsPaths::default_locations())
    }

    pub fn settings_file_path(&self) -> &Path {
        &self.paths.settings_file
    }

    pub fn error_log_path(&self) -> &Path {
        &self.paths.error_log
    }

    pub fn old_settings_path(&self) -> &Path {
        &self.paths.legacy_settings
    }

    /// Idempotently create the settings directory. Failures are logged and
    /// swallowed.
    pub fn ensure_directory(&self) {
        if let Err(err) = self.try_ensure_directory() {
            self.record(&err);
        }
    }

    /// Load the persisted record, or `T::default()` when the file is absent,
    /// unreadable or corrupt. Runs the legacy migration first when the
    /// settings file does not exist yet.
    pub fn load<T>(&self) -> T
    where
        T: DeserializeOwned + Default,
    {
        self.load_or_else(T::default)
    }

    /// Like [`load`](Self::load), with an explicit default constructor.
    pub fn load_or_else<T, F>(&self, default: F) -> T
    where
        T: DeserializeOwned,
        F: FnOnce() -> T,
    {
        let _guard = self.guard();
        if !self.paths.settings_file.exists() && self.paths.legacy_settings.exists() {
            if let Err(err) = self.migrate_locked() {
                self.record(&err);
            }
        }
        if !self.paths.settings_file.exists() {
            return default();
        }
        match self.read_locked() {
            Ok(value) => value,
            Err(err) => {
                self.record(&err);
                default()
            }
        }
    }

    /// Persist `value` atomically. The serialized text is written to a
    /// `.tmp` sibling, parsed back for well-formedness and only then renamed
    /// over the settings file; on any failure the temp file is removed and
    /// the previous settings file is left untouched.
    pub fn save<T: Serialize>(&self, value: &T) {
        let _guard = self.guard();
        if let Err(err) = self.save_locked(value) {
            self.record(&err);
        }
    }

    /// One-time copy of the legacy settings file into the canonical
    /// location. A no-op when the settings file already exists or no legacy
    /// file is present; an invalid copy is deleted again so the next load
    /// falls back to defaults.
    pub fn migrate_old_settings(&self) {
        let _guard = self.guard();
        if let Err(err) = self.migrate_locked() {
            self.record(&err);
        }
    }

    /// Best-effort timestamped append to the error log. Logging failures are
    /// swallowed; logging must never be the source of a crash.
    pub fn log_error(&self, message: &str, cause: Option<&(dyn std::error::Error + 'static)>) {
        let _ = self.try_ensure_directory();
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let line = match cause {
            Some(cause) => format!("[{timestamp}] {message}: {cause}\n"),
            None => format!("[{timestamp}] {message}\n"),
        };
        let _ = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.paths.error_log)
            .and_then(|mut file| file.write_all(line.as_bytes()));
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // A poisoned lock only means another caller panicked mid-operation;
        // the store itself holds no state behind the mutex.
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, err: &StoreError) {
        warn!(error = %err, cause = ?std::error::Error::source(err), "settings store operation failed");
        self.log_error(&err.to_string(), std::error::Error::source(err));
    }

    fn try_ensure_directory(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.paths.dir).map_err(|source| StoreError::DirectoryCreate {
            path: self.paths.dir.clone(),
            source,
        })
    }

    fn read_locked<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        let text = fs::read_to_string(&self.paths.settings_file).map_err(StoreError::Read)?;
        serde_json::from_str(&text).map_err(StoreError::Parse)
    }

    fn save_locked<T: Serialize>(&self, value: &T) -> Result<(), StoreError> {
        self.try_ensure_directory()?;
        let text = serde_json::to_string_pretty(value)
            .map_err(|err| StoreError::Write(io::Error::other(err)))?;
        let tmp = self.tmp_path();
        let result = fs::write(&tmp, &text)
            .map_err(StoreError::Write)
            .and_then(|()| Self::check_well_formed(&tmp).map_err(StoreError::Validate))
            .and_then(|()| {
                fs::rename(&tmp, &self.paths.settings_file).map_err(StoreError::Write)
            });
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }

    fn migrate_locked(&self) -> Result<(), StoreError> {
        // Copy-if-absent: never overwrite an existing settings file
        if self.paths.settings_file.exists() || !self.paths.legacy_settings.exists() {
            return Ok(());
        }
        self.try_ensure_directory()?;
        fs::copy(&self.paths.legacy_settings, &self.paths.settings_file)
            .map_err(StoreError::MigrationCopy)?;
        if let Err(err) = Self::check_well_formed(&self.paths.settings_file) {
            let _ = fs::remove_file(&self.paths.settings_file);
            return Err(StoreError::MigrationValidate(err));
        }
        info!(
            from = %self.paths.legacy_settings.display(),
            to = %self.paths.settings_file.display(),
            "migrated legacy settings"
        );
        Ok(())
    }

    /// Parse the bytes that actually reached the disk, not the in-memory
    /// serialization.
    fn check_well_formed(path: &Path) -> Result<(), serde_json::Error> {
        let text = fs::read_to_string(path).map_err(serde_json::Error::io)?;
        serde_json::from_str::<serde_json::Value>(&text).map(|_| ())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.paths.settings_file.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct TestSettings {
        #[serde(default)]
        value: String,
    }

    /// Store rooted in a fresh temp dir; the legacy file lives in a sibling
    /// "install" directory like the real executable-adjacent location.
    fn test_store() -> (TempDir, SettingsStore) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = tmp.path().join("Mouse-Guard");
        let paths = SettingsPaths {
            settings_file: dir.join(config::SETTINGS_FILENAME),
            error_log: dir.join(config::ERROR_LOG_FILENAME),
            dir,
            legacy_settings: tmp.path().join("install").join(config::SETTINGS_FILENAME),
        };
        (tmp, SettingsStore::new(paths))
    }

    fn write_legacy(store: &SettingsStore, contents: &str) {
        let legacy = store.old_settings_path();
        fs::create_dir_all(legacy.parent().unwrap()).unwrap();
        fs::write(legacy, contents).unwrap();
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let (_tmp, store) = test_store();
        store.save(&TestSettings {
            value: "x".to_string(),
        });
        let loaded: TestSettings = store.load();
        assert_eq!(loaded.value, "x");
    }

    #[test]
    fn test_load_returns_default_when_file_missing() {
        let (_tmp, store) = test_store();
        let loaded: TestSettings = store.load();
        assert_eq!(loaded, TestSettings::default());
    }

    #[test]
    fn test_load_or_else_uses_supplied_default() {
        let (_tmp, store) = test_store();
        let loaded: TestSettings = store.load_or_else(|| TestSettings {
            value: "fallback".to_string(),
        });
        assert_eq!(loaded.value, "fallback");
    }

    #[test]
    fn test_corrupt_file_degrades_to_default_and_logs() {
        let (_tmp, store) = test_store();
        store.ensure_directory();
        fs::write(store.settings_file_path(), "{ not valid json ]").unwrap();

        let loaded: TestSettings = store.load();
        assert_eq!(loaded, TestSettings::default());

        let log = fs::read_to_string(store.error_log_path()).expect("error log written");
        assert!(log.contains("failed to parse settings file"));
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let (_tmp, store) = test_store();
        store.save(&TestSettings {
            value: "atomic".to_string(),
        });
        assert!(store.settings_file_path().exists());
        assert!(!store.tmp_path().exists());
    }

    #[test]
    fn test_save_overwrites_previous_value() {
        let (_tmp, store) = test_store();
        store.save(&TestSettings {
            value: "first".to_string(),
        });
        store.save(&TestSettings {
            value: "second".to_string(),
        });
        let loaded: TestSettings = store.load();
        assert_eq!(loaded.value, "second");
    }

    #[test]
    fn test_migration_copies_legacy_file() {
        let (_tmp, store) = test_store();
        write_legacy(&store, r#"{"value":"migrated"}"#);

        store.migrate_old_settings();

        assert!(store.settings_file_path().exists());
        let loaded: TestSettings = store.load();
        assert_eq!(loaded.value, "migrated");
        // Migration copies; it does not remove the legacy file
        assert!(store.old_settings_path().exists());
    }

    #[test]
    fn test_migration_never_overwrites_existing_settings() {
        let (_tmp, store) = test_store();
        store.save(&TestSettings {
            value: "current".to_string(),
        });
        write_legacy(&store, r#"{"value":"stale"}"#);

        store.migrate_old_settings();

        let loaded: TestSettings = store.load();
        assert_eq!(loaded.value, "current");
    }

    #[test]
    fn test_migration_is_idempotent() {
        let (_tmp, store) = test_store();
        write_legacy(&store, r#"{"value":"once"}"#);

        store.migrate_old_settings();
        store.migrate_old_settings();

        let loaded: TestSettings = store.load();
        assert_eq!(loaded.value, "once");
    }

    #[test]
    fn test_invalid_legacy_copy_is_deleted() {
        let (_tmp, store) = test_store();
        write_legacy(&store, "{ invalid json ]");

        store.migrate_old_settings();

        assert!(
            !store.settings_file_path().exists(),
            "invalid migrated file must be deleted"
        );
        let loaded: TestSettings = store.load();
        assert_eq!(loaded, TestSettings::default());

        let log = fs::read_to_string(store.error_log_path()).expect("error log written");
        assert!(log.contains("migrated settings failed validation"));
    }

    #[test]
    fn test_load_runs_migration_first() {
        let (_tmp, store) = test_store();
        write_legacy(&store, r#"{"value":"implicit"}"#);

        // No explicit migrate call; load must pick the legacy file up
        let loaded: TestSettings = store.load();
        assert_eq!(loaded.value, "implicit");
        assert!(store.settings_file_path().exists());
    }

    #[test]
    fn test_unknown_and_missing_fields_tolerated() {
        let (_tmp, store) = test_store();
        store.ensure_directory();
        fs::write(
            store.settings_file_path(),
            r#"{"value":"kept","extra_field":123}"#,
        )
        .unwrap();
        let loaded: TestSettings = store.load();
        assert_eq!(loaded.value, "kept");

        fs::write(store.settings_file_path(), "{}").unwrap();
        let loaded: TestSettings = store.load();
        assert_eq!(loaded, TestSettings::default());
    }

    #[test]
    fn test_ensure_directory_is_idempotent() {
        let (_tmp, store) = test_store();
        store.ensure_directory();
        store.ensure_directory();
        assert!(store.settings_file_path().parent().unwrap().is_dir());
    }

    #[test]
    fn test_concurrent_save_and_load_do_not_corrupt() {
        let (_tmp, store) = test_store();

        std::thread::scope(|scope| {
            for thread_id in 0..5usize {
                let store = &store;
                scope.spawn(move || {
                    for iteration in 0..10usize {
                        store.save(&TestSettings {
                            value: format!("thread-{thread_id}-iteration-{iteration}"),
                        });
                        // Any successful parse proves no torn write was observed
                        let _: TestSettings = store.load();
                    }
                });
            }
        });

        let final_settings: TestSettings = store.load();
        assert!(final_settings.value.starts_with("thread-"));
        assert!(!store.tmp_path().exists());
    }

    #[test]
    fn test_log_error_without_cause() {
        let (_tmp, store) = test_store();
        store.log_error("something happened", None);
        let log = fs::read_to_string(store.error_log_path()).unwrap();
        assert!(log.contains("something happened"));
        assert!(log.starts_with('['));
    }

    #[test]
    fn test_default_locations_shape() {
        let paths = SettingsPaths::default_locations();
        assert!(paths.settings_file.ends_with("Mouse-Guard/settings.json"));
        assert!(paths.error_log.ends_with("Mouse-Guard/error.log"));
        assert!(paths.legacy_settings.ends_with("settings.json"));
    }

    #[test]
    fn test_app_settings_serde_defaults() {
        let parsed: AppSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, AppSettings::default());

        let parsed: AppSettings =
            serde_json::from_str(r#"{"blocked_screen_index":2,"hotkey":"Control,Alt,B"}"#)
                .unwrap();
        assert_eq!(parsed.blocked_screen_index, Some(2));
        assert_eq!(parsed.hotkey.as_deref(), Some("Control,Alt,B"));
    }
}
