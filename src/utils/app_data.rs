use crate::query::{ChainedLoadLineResolver, FileLoadLineResolver, MapLoadLineResolver};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "pevfind";
const CONFIG_FILE: &str = "config.json";

/// Application configuration stored in the app data directory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Walker threads; 0 uses the number of CPU cores
    #[serde(default)]
    pub scan_threads: usize,

    /// Named command-line fragments for `--loadline NAME`
    #[serde(default)]
    pub loadlines: BTreeMap<String, String>,
}

impl AppConfig {
    /// Load config from the app data directory, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&get_config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(config_path).context("Failed to read config file")?;
        let config: AppConfig =
            serde_json::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Get the effective walker thread count (resolves 0 to CPU count)
    pub fn effective_scan_threads(&self) -> usize {
        if self.scan_threads == 0 {
            num_cpus()
        } else {
            self.scan_threads
        }
    }

    /// Configured loadlines first, then files relative to `base_dir`
    pub fn loadline_resolver(&self, base_dir: &Path) -> ChainedLoadLineResolver {
        ChainedLoadLineResolver::new()
            .with(MapLoadLineResolver::new(&self.loadlines))
            .with(FileLoadLineResolver::new(base_dir))
    }
}

/// Get the number of CPUs available
fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Get the path to the config file
pub fn get_config_path() -> Result<PathBuf> {
    let app_dir = get_app_data_dir()?;
    Ok(app_dir.join(CONFIG_FILE))
}

/// Get the application data directory
pub fn get_app_data_dir() -> Result<PathBuf> {
    let base = if cfg!(target_os = "macos") {
        dirs::home_dir().map(|h| h.join("Library").join("Application Support"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
    } else {
        // Linux/Unix: use XDG_DATA_HOME or ~/.local/share
        dirs::data_dir()
    };

    let base = base.context("Could not determine app data directory")?;
    let app_dir = base.join(APP_NAME);

    fs::create_dir_all(&app_dir)?;
    Ok(app_dir)
}
