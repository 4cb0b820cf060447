//! Where configuration records come from.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::{info, warn};

use crate::error::Result;
use crate::tools::lock;

use super::PlaybackConfig;

/// Seam to the external settings store.
pub trait ConfigSource: Send + Sync {
    /// Read the current record. Validation happens in the caller.
    fn load(&self) -> Result<PlaybackConfig>;
}

impl<T: ConfigSource + ?Sized> ConfigSource for Box<T> {
    fn load(&self) -> Result<PlaybackConfig> {
        (**self).load()
    }
}

/// JSON file on disk. A missing file reads as the defaults.
#[derive(Debug, Clone)]
pub struct JsonConfigFile {
    path: PathBuf,
}

impl JsonConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `config` as pretty-printed JSON, creating parent directories.
    pub fn save(&self, config: &PlaybackConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, json)?;
        info!("saved configuration to {}", self.path.display());
        Ok(())
    }
}

impl ConfigSource for JsonConfigFile {
    fn load(&self) -> Result<PlaybackConfig> {
        if !self.path.exists() {
            info!(
                "no configuration at {}, using defaults",
                self.path.display()
            );
            return Ok(PlaybackConfig::default());
        }
        let raw = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// In-memory record that can be swapped at runtime.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<Mutex<PlaybackConfig>>,
}

impl SharedConfig {
    pub fn new(config: PlaybackConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(config)),
        }
    }

    pub fn set(&self, config: PlaybackConfig) {
        *lock(&self.inner) = config;
    }

    pub fn update(&self, apply: impl FnOnce(&mut PlaybackConfig)) {
        apply(&mut lock(&self.inner));
    }

    pub fn get(&self) -> PlaybackConfig {
        lock(&self.inner).clone()
    }
}

impl ConfigSource for SharedConfig {
    fn load(&self) -> Result<PlaybackConfig> {
        Ok(self.get())
    }
}

/// Load and validate, falling back to the defaults on any problem.
pub fn load_initial(source: &dyn ConfigSource) -> PlaybackConfig {
    match source.load().and_then(|config| config.validate().map(|_| config)) {
        Ok(config) => config,
        Err(err) => {
            warn!("config: {}; using defaults", err);
            PlaybackConfig::default()
        }
    }
}

/// Load and validate, keeping `previous` on any problem.
///
/// Returns the record to apply and whether it came from the source.
pub fn reload_or_keep(
    source: &dyn ConfigSource,
    previous: &PlaybackConfig,
) -> (PlaybackConfig, bool) {
    match source.load().and_then(|config| config.validate().map(|_| config)) {
        Ok(config) => (config, true),
        Err(err) => {
            warn!("config: {}; keeping previous configuration", err);
            (previous.clone(), false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::Waveform;

    #[test]
    fn missing_file_reads_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = JsonConfigFile::new(dir.path().join("absent.json"));
        assert_eq!(source.load().expect("load"), PlaybackConfig::default());
    }

    #[test]
    fn saved_file_loads_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = JsonConfigFile::new(dir.path().join("nested").join("progress.json"));
        let config = PlaybackConfig {
            waveform_type: Waveform::Pulse,
            volume: 0.9,
            ..PlaybackConfig::default()
        };
        source.save(&config).expect("save");
        assert_eq!(source.load().expect("load"), config);
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("progress.json");
        fs::write(&path, "{ not json").expect("write");
        let source = JsonConfigFile::new(&path);
        assert!(source.load().is_err());
        assert_eq!(load_initial(&source), PlaybackConfig::default());
    }

    #[test]
    fn invalid_reload_keeps_previous() {
        let previous = PlaybackConfig {
            volume: 0.8,
            ..PlaybackConfig::default()
        };
        let source = SharedConfig::new(PlaybackConfig {
            target_min_freq: 300.0,
            target_max_freq: 1200.0,
            volume: 0.33,
            ..PlaybackConfig::default()
        });
        let (applied, fresh) = reload_or_keep(&source, &previous);
        assert!(!fresh);
        assert_eq!(applied, previous);

        source.update(|config| config.volume = 0.3);
        let (applied, fresh) = reload_or_keep(&source, &previous);
        assert!(fresh);
        assert_eq!(applied.volume, 0.3);
        assert_eq!(applied.target_min_freq, 300.0);
    }
}
