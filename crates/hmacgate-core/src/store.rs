//! Hot-reloadable configuration store.
//!
//! [`ConfigStore`] holds named [`Configuration`] snapshots. Every read hands
//! out a clone, and every reload replaces the whole map in one step under the
//! store lock, so a reader never observes a half-replaced map and a rejected
//! reload leaves the previous snapshot active.
//!
//! # Examples
//!
//! ```
//! use hmacgate_core::{ConfigFormat, ConfigStore};
//!
//! let store = ConfigStore::new();
//! assert_eq!(store.get_default().authorization_scheme, "HMAC");
//!
//! store
//!     .load_from_str(
//!         r#"{"configurations":[{"name":"api","authorizationScheme":"API"}]}"#,
//!         ConfigFormat::Json,
//!     )
//!     .unwrap();
//! assert_eq!(store.get("api").unwrap().authorization_scheme, "API");
//! assert!(store.contains("Default"));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info};

use crate::config::{Configuration, DEFAULT_CONFIGURATION_NAME};
use crate::document::{ConfigDocument, ConfigFormat, build_configuration_map};
use crate::error::{ConfigError, ConfigResult};
use crate::watcher::{DEFAULT_DEBOUNCE, FileWatch};

/// Callback receiving every reload failure, including those of background
/// watch-triggered reloads that have no caller to return an error to.
pub type ErrorHandler = Arc<dyn Fn(&ConfigError) + Send + Sync>;

/// Thread-safe store of named configuration snapshots.
///
/// Cloning the store yields another handle to the same state. The file watch,
/// if any, is torn down when the last handle is dropped.
#[derive(Clone)]
pub struct ConfigStore {
    inner: Arc<StoreInner>,
}

pub(crate) struct StoreInner {
    state: Mutex<StoreState>,
    error_handler: RwLock<Option<ErrorHandler>>,
    debounce: Duration,
}

#[derive(Debug, Default)]
struct StoreState {
    configurations: HashMap<String, Configuration>,
    watch: Option<FileWatch>,
}

impl StoreState {
    /// Populate the default configuration if it has not been created yet.
    fn ensure_defaults(&mut self) {
        if !self.configurations.contains_key(DEFAULT_CONFIGURATION_NAME) {
            debug!("Creating default configuration");
            self.configurations.insert(
                DEFAULT_CONFIGURATION_NAME.to_owned(),
                Configuration::default(),
            );
        }
    }
}

impl fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ConfigStore")
            .field("configurations", &state.configurations.len())
            .field("watch", &state.watch)
            .field("debounce", &self.inner.debounce)
            .finish_non_exhaustive()
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore {
    /// Create an empty store. The default configuration is created on first access.
    #[must_use]
    pub fn new() -> Self {
        Self::with_debounce(DEFAULT_DEBOUNCE)
    }

    /// Create an empty store whose file watch waits `debounce` of quiet time
    /// before reloading.
    #[must_use]
    pub fn with_debounce(debounce: Duration) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(StoreState::default()),
                error_handler: RwLock::new(None),
                debounce,
            }),
        }
    }

    /// Install the callback that receives reload failures.
    pub fn set_error_handler<F>(&self, handler: F)
    where
        F: Fn(&ConfigError) + Send + Sync + 'static,
    {
        *self.inner.error_handler.write() = Some(Arc::new(handler));
    }

    /// A copy of the default configuration.
    #[must_use]
    pub fn get_default(&self) -> Configuration {
        let mut state = self.inner.state.lock();
        state.ensure_defaults();
        state.configurations[DEFAULT_CONFIGURATION_NAME].clone()
    }

    /// A copy of the configuration called `name`, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Configuration> {
        let mut state = self.inner.state.lock();
        state.ensure_defaults();
        state.configurations.get(name).cloned()
    }

    /// Whether a configuration called `name` is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        let mut state = self.inner.state.lock();
        state.ensure_defaults();
        state.configurations.contains_key(name)
    }

    /// Names of all stored configurations, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut state = self.inner.state.lock();
        state.ensure_defaults();
        let mut names: Vec<String> = state.configurations.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Replace the contents with a single default configuration.
    pub fn set_defaults(&self) {
        let mut map = HashMap::with_capacity(1);
        map.insert(
            DEFAULT_CONFIGURATION_NAME.to_owned(),
            Configuration::default(),
        );
        self.inner.state.lock().configurations = map;
    }

    /// Replace the contents with configurations parsed from `text`.
    pub fn load_from_str(&self, text: &str, format: ConfigFormat) -> ConfigResult<()> {
        let parsed = format.parse(text).and_then(build_configuration_map);
        self.inner.commit(parsed, &format!("{format} string"))
    }

    /// Replace the contents with the configurations of an already parsed
    /// document, such as a section embedded in a larger application config.
    pub fn load_from_section(&self, document: ConfigDocument) -> ConfigResult<()> {
        self.inner
            .commit(build_configuration_map(document), "configuration section")
    }

    /// Replace the contents with configurations read from `path`. The format is
    /// chosen by file extension.
    pub fn load_from_file(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        let parsed = read_file(path);
        self.inner.commit(parsed, &path.display().to_string())
    }

    /// Load `path` and keep reloading it whenever it changes on disk.
    ///
    /// A burst of create/change/rename/delete events triggers one reload after
    /// the quiet period. A rename re-targets the watch at the new path; while
    /// the file is deleted, reloads are suppressed until it is recreated. Any
    /// previous watch is replaced.
    pub fn load_from_file_and_watch(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        self.load_from_file(path)?;

        let watch = FileWatch::start(path, Arc::downgrade(&self.inner), self.inner.debounce)
            .inspect_err(|e| self.inner.report(e))?;

        let mut state = self.inner.state.lock();
        if let Some(mut previous) = state.watch.replace(watch) {
            previous.cancel();
        }
        Ok(())
    }

    /// Stop watching the configuration file, if a watch is active.
    pub fn stop_watching(&self) {
        let mut state = self.inner.state.lock();
        if let Some(mut watch) = state.watch.take() {
            watch.cancel();
        }
    }

    /// Whether a file watch is active.
    #[must_use]
    pub fn is_watching(&self) -> bool {
        self.inner.state.lock().watch.is_some()
    }

    /// The file currently watched, following renames.
    #[must_use]
    pub fn watched_path(&self) -> Option<PathBuf> {
        self.inner.state.lock().watch.as_ref().map(FileWatch::path)
    }
}

impl StoreInner {
    /// Swap in a parsed map, or report the failure and keep the current one.
    fn commit(
        &self,
        parsed: ConfigResult<HashMap<String, Configuration>>,
        source: &str,
    ) -> ConfigResult<()> {
        match parsed {
            Ok(map) => {
                let count = map.len();
                self.state.lock().configurations = map;
                info!(source, configurations = count, "Configuration reloaded");
                Ok(())
            }
            Err(e) => {
                error!(source, error = %e, "Configuration reload rejected; keeping current configuration");
                self.report(&e);
                Err(e)
            }
        }
    }

    fn report(&self, error: &ConfigError) {
        let handler = self.error_handler.read().clone();
        if let Some(handler) = handler {
            handler(error);
        }
    }

    /// Reload triggered by the file watch once events have settled.
    ///
    /// `cancelled` is the flag of the watch that fired; it is checked under the
    /// store lock so a stopped or replaced watch never commits.
    pub(crate) fn reload_from_watch(&self, path: &Path, renamed: bool, cancelled: &AtomicBool) {
        if !path.exists() {
            debug!(path = %path.display(), "Watched configuration is missing; reload suppressed");
            return;
        }

        let parsed = read_file(path);

        let mut state = self.state.lock();
        if cancelled.load(Ordering::Acquire) {
            return;
        }
        let Some(watch) = state.watch.as_mut() else {
            return;
        };
        if renamed {
            watch.ensure_watching(path);
        }
        match parsed {
            Ok(map) => {
                let count = map.len();
                state.configurations = map;
                info!(path = %path.display(), configurations = count, "Configuration reloaded from watched file");
            }
            Err(e) => {
                drop(state);
                error!(path = %path.display(), error = %e, "Watched configuration reload rejected; keeping current configuration");
                self.report(&e);
            }
        }
    }
}

impl Drop for StoreInner {
    fn drop(&mut self) {
        if let Some(mut watch) = self.state.get_mut().watch.take() {
            watch.cancel();
        }
    }
}

fn read_file(path: &Path) -> ConfigResult<HashMap<String, Configuration>> {
    let format = ConfigFormat::from_path(path)?;
    let text = std::fs::read_to_string(path)?;
    build_configuration_map(format.parse(&text)?)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    use super::*;

    const TWO_CONFIGS: &str = r#"{
        "configurations": [
            {"name": "Default", "authorizationScheme": "DEF"},
            {"name": "api", "authorizationScheme": "API", "headers": ["X-Api"]}
        ]
    }"#;

    fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(25));
        }
        condition()
    }

    #[test]
    fn test_should_create_default_on_first_access() {
        let store = ConfigStore::new();
        assert!(store.contains(DEFAULT_CONFIGURATION_NAME));
        assert_eq!(store.get_default(), Configuration::default());
        assert!(store.get("missing").is_none());
        assert_eq!(store.names(), vec![DEFAULT_CONFIGURATION_NAME]);
    }

    #[test]
    fn test_should_return_deep_copies() {
        let store = ConfigStore::new();
        let mut copy = store.get_default();
        copy.add_header("X-Mutated");
        copy.authorization_scheme = "CHANGED".to_owned();

        let fresh = store.get_default();
        assert!(fresh.headers.is_empty());
        assert_eq!(fresh.authorization_scheme, "HMAC");
    }

    #[test]
    fn test_should_replace_entire_map_on_reload() {
        let store = ConfigStore::new();
        store.load_from_str(TWO_CONFIGS, ConfigFormat::Json).unwrap();
        assert_eq!(store.get("api").unwrap().headers, vec!["X-Api"]);
        assert_eq!(store.get_default().authorization_scheme, "DEF");

        store
            .load_from_str(r#"{"configurations":[{"name":"other"}]}"#, ConfigFormat::Json)
            .unwrap();
        assert!(!store.contains("api"));
        assert!(store.contains("other"));
        // Synthesized because the new source has no default entry.
        assert_eq!(store.get_default().authorization_scheme, "HMAC");
    }

    #[test]
    fn test_should_keep_previous_snapshot_on_failed_reload() {
        let store = ConfigStore::new();
        store.load_from_str(TWO_CONFIGS, ConfigFormat::Json).unwrap();
        let before = store.get("api").unwrap();

        let result = store.load_from_str(
            r#"{"configurations":[{"name":"api"},{"name":"api"}]}"#,
            ConfigFormat::Json,
        );
        assert!(matches!(result, Err(ConfigError::DuplicateName(_))));
        assert_eq!(store.get("api").unwrap(), before);

        assert!(store.load_from_str("<broken", ConfigFormat::Xml).is_err());
        assert_eq!(store.get("api").unwrap(), before);
    }

    #[test]
    fn test_should_report_failures_to_error_handler() {
        let store = ConfigStore::new();
        let failures = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&failures);
        store.set_error_handler(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let _ = store.load_from_str("{", ConfigFormat::Json);
        let _ = store.load_from_file("/definitely/not/here.json");
        assert_eq!(failures.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_should_load_from_section() {
        let store = ConfigStore::new();
        let document = crate::document::parse_json(TWO_CONFIGS).unwrap();
        store.load_from_section(document).unwrap();
        assert_eq!(store.names(), vec!["Default", "api"]);
    }

    #[test]
    fn test_should_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hmac.json");
        std::fs::write(&path, TWO_CONFIGS).unwrap();

        let store = ConfigStore::new();
        store.load_from_file(&path).unwrap();
        assert!(store.contains("api"));

        let bad = dir.path().join("hmac.yaml");
        std::fs::write(&bad, "x: y").unwrap();
        assert!(matches!(
            store.load_from_file(&bad),
            Err(ConfigError::UnsupportedFormat(_))
        ));
        assert!(store.contains("api"));
    }

    #[test]
    fn test_should_reset_to_defaults() {
        let store = ConfigStore::new();
        store.load_from_str(TWO_CONFIGS, ConfigFormat::Json).unwrap();
        store.set_defaults();
        assert_eq!(store.names(), vec![DEFAULT_CONFIGURATION_NAME]);
        assert_eq!(store.get_default(), Configuration::default());
    }

    #[test]
    fn test_should_serve_readers_during_reloads() {
        let store = ConfigStore::new();
        store.load_from_str(TWO_CONFIGS, ConfigFormat::Json).unwrap();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        // Either snapshot is acceptable; a missing default is not.
                        let config = store.get_default();
                        assert!(config.authorization_scheme == "DEF"
                            || config.authorization_scheme == "HMAC");
                    }
                })
            })
            .collect();

        for i in 0..100 {
            let text = if i % 2 == 0 {
                r#"{"configurations":[{"name":"x"}]}"#
            } else {
                TWO_CONFIGS
            };
            store.load_from_str(text, ConfigFormat::Json).unwrap();
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[test]
    fn test_should_reload_when_watched_file_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hmac.json");
        std::fs::write(&path, TWO_CONFIGS).unwrap();

        let store = ConfigStore::with_debounce(Duration::from_millis(100));
        store.load_from_file_and_watch(&path).unwrap();
        assert!(store.is_watching());

        std::fs::write(
            &path,
            r#"{"configurations":[{"name":"api","authorizationScheme":"V2"}]}"#,
        )
        .unwrap();

        assert!(wait_until(Duration::from_secs(10), || {
            store.get("api").is_some_and(|c| c.authorization_scheme == "V2")
        }));

        store.stop_watching();
        assert!(!store.is_watching());
        assert!(store.watched_path().is_none());
    }

    #[test]
    fn test_should_not_reload_after_watch_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hmac.json");
        std::fs::write(&path, TWO_CONFIGS).unwrap();

        let store = ConfigStore::with_debounce(Duration::from_millis(50));
        store.load_from_file_and_watch(&path).unwrap();
        store.stop_watching();

        std::fs::write(&path, r#"{"configurations":[{"name":"late"}]}"#).unwrap();
        std::thread::sleep(Duration::from_millis(500));
        assert!(!store.contains("late"));
        assert!(store.contains("api"));
    }
}
