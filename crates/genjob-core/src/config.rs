use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Retry policy parameters (`[retry]` in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per remote call (including the first).
    pub max_attempts: u32,
    /// Delay in seconds before the second attempt (e.g. 1.0 = 1s).
    pub initial_delay_secs: f64,
    /// Multiplier applied to the delay after each further failure.
    pub backoff_multiplier: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_secs: 1.0,
            backoff_multiplier: 2.0,
            max_delay_secs: 60,
        }
    }
}

/// Status polling parameters (`[poll]` in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Seconds between two status requests.
    pub interval_secs: u64,
    /// Give up after this many seconds of polling; 0 disables the limit.
    pub max_wait_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            max_wait_secs: 30 * 60,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn max_wait(&self) -> Option<Duration> {
        (self.max_wait_secs > 0).then(|| Duration::from_secs(self.max_wait_secs))
    }
}

/// Where the logo catalog and its assets live (`[catalog]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// JSON catalog file. Relative paths resolve against the working directory.
    pub path: PathBuf,
    /// Directory that fetched logos are written into.
    pub assets_dir: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("assets/catalog.json"),
            assets_dir: PathBuf::from("assets/logos"),
        }
    }
}

/// Optional base URL overrides per provider (`[providers]`), mainly for proxies and tests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderUrls {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openai: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashscope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fish_audio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_image: Option<String>,
}

/// Global configuration loaded from `~/.config/genjob/config.toml`.
///
/// API keys are never stored here; each provider reads its own environment variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenjobConfig {
    /// Per-request HTTP timeout in seconds (artifact downloads included).
    pub http_timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub providers: ProviderUrls,
}

impl Default for GenjobConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: 300,
            retry: RetryConfig::default(),
            poll: PollConfig::default(),
            catalog: CatalogConfig::default(),
            providers: ProviderUrls::default(),
        }
    }
}

impl GenjobConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs.max(1))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("genjob")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<GenjobConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = GenjobConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml).with_context(|| format!("write {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let cfg: GenjobConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}
