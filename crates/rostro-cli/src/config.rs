use anyhow::{Context, Result};
use rostro_core::registry::{RegistryConfig, DEFAULT_BASE_URL};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Optional settings file; every key may be omitted.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub pacing_ms: Option<u64>,
    pub capture_dir: Option<PathBuf>,
    pub camera_enabled: Option<bool>,
}

/// CLI configuration: config file, then `ROSTRO_*` environment overrides.
#[derive(Debug, Clone)]
pub struct Config {
    /// Registry service base endpoint (default: http://127.0.0.1:8000/api).
    pub base_url: String,
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
    /// Delay between a comparison answer and showing it, in milliseconds.
    pub pacing_ms: u64,
    /// Where normalized captures are written before upload.
    pub capture_dir: PathBuf,
    /// Whether `--camera` acquisitions are permitted.
    pub camera_enabled: bool,
}

impl Config {
    /// Load from `ROSTRO_CONFIG` (or the XDG config path) and the environment.
    pub fn load() -> Result<Self> {
        let file = match std::env::var_os("ROSTRO_CONFIG") {
            Some(path) => read_file(Path::new(&path))?,
            None => match default_config_path() {
                Some(path) if path.exists() => read_file(&path)?,
                _ => FileConfig::default(),
            },
        };
        Ok(Self::resolve(file, |key| std::env::var(key).ok()))
    }

    /// Merge a parsed file with environment lookups; the environment wins.
    pub fn resolve(file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let parsed = |key: &str| env(key).and_then(|v| v.parse::<u64>().ok());

        Self {
            base_url: env("ROSTRO_BASE_URL")
                .or(file.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            timeout_secs: parsed("ROSTRO_TIMEOUT_SECS")
                .or(file.timeout_secs)
                .unwrap_or(30),
            pacing_ms: parsed("ROSTRO_PACING_MS").or(file.pacing_ms).unwrap_or(1000),
            capture_dir: env("ROSTRO_CAPTURE_DIR")
                .map(PathBuf::from)
                .or(file.capture_dir)
                .unwrap_or_else(|| std::env::temp_dir().join("rostro")),
            camera_enabled: env("ROSTRO_CAMERA_ENABLED")
                .map(|v| v != "0" && v != "false")
                .or(file.camera_enabled)
                .unwrap_or(true),
        }
    }

    pub fn registry(&self) -> RegistryConfig {
        RegistryConfig {
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            ..RegistryConfig::default()
        }
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

fn read_file(path: &Path) -> Result<FileConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read config file {}", path.display()))?;
    let file = toml::from_str(&text)
        .with_context(|| format!("invalid config file {}", path.display()))?;
    tracing::debug!(path = %path.display(), "config file loaded");
    Ok(file)
}

fn default_config_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))?;
    Some(base.join("rostro").join("config.toml"))
}
