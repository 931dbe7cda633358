use std::path::PathBuf;
use std::time::Duration;

use crate::error::StoreResult;
use crate::query::DEFAULT_DEBOUNCE;
use crate::repository::RepositoryOptions;
use crate::store::Store;
use crate::window::WindowConfig;

const APP_NAME: &str = "jobtrack";
const DB_FILE: &str = "jobtrack.db";

/// Runtime settings, resolved once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_path: PathBuf,
    pub seed_defaults: bool,
    pub debounce: Duration,
    pub window: WindowConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_path: default_path(),
            seed_defaults: true,
            debounce: DEFAULT_DEBOUNCE,
            window: WindowConfig::default(),
        }
    }
}

impl Config {
    /// Overlay explicit settings on the defaults. `None` keeps the default.
    pub fn resolve(data_path: Option<PathBuf>, no_seed: bool, debounce_ms: Option<u64>) -> Self {
        let defaults = Self::default();
        Self {
            data_path: data_path.unwrap_or(defaults.data_path),
            seed_defaults: !no_seed,
            debounce: debounce_ms.map(Duration::from_millis).unwrap_or(defaults.debounce),
            window: defaults.window,
        }
    }

    pub fn repository_options(&self) -> RepositoryOptions {
        RepositoryOptions {
            seed_defaults: self.seed_defaults,
        }
    }

    /// Open the store at `data_path` and make sure its schema exists.
    pub fn open_store(&self) -> StoreResult<Store> {
        let store = Store::open(&self.data_path)?;
        store.init()?;
        Ok(store)
    }
}

/// Platform data directory, or the working directory when none is known.
pub fn default_path() -> PathBuf {
    match directories::ProjectDirs::from("", "", APP_NAME) {
        Some(dirs) => dirs.data_dir().join(DB_FILE),
        None => PathBuf::from(DB_FILE),
    }
}
