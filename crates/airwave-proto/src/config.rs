use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::platform;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub stations: StationsConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process tables seeded from the station file.
    #[default]
    Local,
    /// Hosted backend-as-a-service reached over HTTP.
    Rest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,
    /// Base URL of the hosted backend, e.g. `https://xyz.example.co`.
    #[serde(default)]
    pub url: String,
    /// Public (anonymous) API key sent with every request.
    #[serde(default)]
    pub anon_key: String,
    /// How often the station table is polled for changes.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Where the OAuth provider sends the browser after sign-in.
    #[serde(default = "default_redirect_url")]
    pub redirect_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_volume")]
    pub default_volume: f32,
    /// Seconds without audio before a connecting stream is marked failed.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_sleep_presets")]
    pub sleep_presets_mins: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationsConfig {
    /// TOML station file used to seed the local backend.
    #[serde(default = "default_seed_toml")]
    pub seed_toml: PathBuf,
    /// Optional m3u playlist, used when the TOML file is missing.
    #[serde(default)]
    pub seed_m3u: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Volume and last station.
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,
    /// Persisted auth tokens for the hosted backend.
    #[serde(default = "default_auth_file")]
    pub auth_file: PathBuf,
    /// Snapshot of the local backend's tables.
    #[serde(default = "default_local_db")]
    pub local_db: PathBuf,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            url: String::new(),
            anon_key: String::new(),
            poll_interval_secs: default_poll_interval(),
            redirect_url: default_redirect_url(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
            connect_timeout_secs: default_connect_timeout(),
            sleep_presets_mins: default_sleep_presets(),
        }
    }
}

impl Default for StationsConfig {
    fn default() -> Self {
        Self {
            seed_toml: default_seed_toml(),
            seed_m3u: String::new(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            session_file: default_session_file(),
            auth_file: default_auth_file(),
            local_db: default_local_db(),
        }
    }
}

fn default_poll_interval() -> u64 {
    15
}

fn default_redirect_url() -> String {
    "http://localhost:3000/".to_string()
}

fn default_volume() -> f32 {
    0.8
}

fn default_connect_timeout() -> u64 {
    15
}

fn default_sleep_presets() -> Vec<u32> {
    vec![5, 15, 30, 45, 60, 90]
}

fn default_seed_toml() -> PathBuf {
    platform::config_dir().join("stations.toml")
}

fn default_session_file() -> PathBuf {
    platform::data_dir().join("session.json")
}

fn default_auth_file() -> PathBuf {
    platform::data_dir().join("auth.json")
}

fn default_local_db() -> PathBuf {
    platform::data_dir().join("local-db.json")
}

impl Config {
    /// Load `config.toml`, writing the defaults on first run, then apply
    /// environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }

    /// `AIRWAVE_BACKEND_URL` switches to the hosted backend; `AIRWAVE_ANON_KEY`
    /// supplies its key.
    pub fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("AIRWAVE_BACKEND_URL").filter(|u| !u.trim().is_empty()) {
            self.backend.url = url.trim().trim_end_matches('/').to_string();
            self.backend.kind = BackendKind::Rest;
        }
        if let Some(key) = var("AIRWAVE_ANON_KEY") {
            self.backend.anon_key = key;
        }
    }

    pub fn sleep_presets(&self) -> Vec<u32> {
        let mut presets: Vec<u32> = self
            .player
            .sleep_presets_mins
            .iter()
            .copied()
            .filter(|m| *m > 0)
            .collect();
        presets.sort_unstable();
        presets.dedup();
        presets
    }
}
