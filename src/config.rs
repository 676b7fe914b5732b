//! TOML configuration for speedledger.
//!
//! A layered model with compiled-in defaults: an explicit `--config` path
//! wins, then the `SPEEDLEDGER_CONFIG` environment variable, then
//! `./speedledger.toml`, then defaults. The resulting struct is built once
//! at startup and passed by reference into the run controller and sync
//! components; nothing reads ambient process state afterwards.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::identity::IpSourceKind;

/// Result of configuration resolution: the effective config plus any
/// diagnostics that occurred before a tracing subscriber existed. Callers
/// emit them once logging is up so a broken config file never degrades to
/// defaults silently.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: Config,
    pub warnings: Vec<String>,
}

impl ResolvedConfig {
    /// Log the deferred warnings; call after the subscriber is installed.
    pub fn emit_warnings(&self) {
        for warning in &self.warnings {
            tracing::warn!("{warning}");
        }
    }
}

/// Root configuration for a speedledger process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub remote: RemoteConfig,
    pub identity: IdentityConfig,
    pub geolocation: GeoConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Resolve the effective configuration.
    ///
    /// An explicit `--config` path must load or the process errors out;
    /// the environment variable and the conventional cwd file fall back to
    /// defaults, recording a warning for the caller to emit once logging
    /// is initialized.
    pub fn resolve(explicit: Option<&Path>) -> Result<ResolvedConfig> {
        let mut warnings = Vec::new();

        if let Some(path) = explicit {
            return Ok(ResolvedConfig {
                config: Self::load(path)?,
                warnings,
            });
        }

        if let Ok(env_path) = std::env::var("SPEEDLEDGER_CONFIG") {
            let path = Path::new(&env_path);
            match Self::load(path) {
                Ok(config) => return Ok(ResolvedConfig { config, warnings }),
                Err(e) => warnings.push(format!(
                    "SPEEDLEDGER_CONFIG set but {} could not be loaded ({e:#}); trying fallback",
                    path.display()
                )),
            }
        }

        let cwd_path = Path::new("speedledger.toml");
        if cwd_path.exists() {
            match Self::load(cwd_path) {
                Ok(config) => return Ok(ResolvedConfig { config, warnings }),
                Err(e) => warnings.push(format!(
                    "{} exists but could not be loaded ({e:#}); using defaults",
                    cwd_path.display()
                )),
            }
        }

        Ok(ResolvedConfig {
            config: Self::default(),
            warnings,
        })
    }

    /// Credentials sanity check for commands that talk to the remote store.
    pub fn require_remote_credentials(&self) -> Result<()> {
        let r = &self.remote;
        if r.app_key.is_empty() || r.app_secret.is_empty() || r.refresh_token.is_empty() {
            anyhow::bail!(
                "remote store credentials missing: set [remote] app_key, app_secret \
                 and refresh_token in the config file"
            );
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Local file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the ledger, log, and lock files.
    pub data_dir: PathBuf,
    /// Ledger file name (one measurement record per line).
    pub ledger_file: String,
    /// Diagnostic log file name.
    pub log_file: String,
    /// Advisory run-lock file name.
    pub lock_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            ledger_file: "speed_tests.txt".to_string(),
            log_file: "speedledger.log".to_string(),
            lock_file: "speedledger.lock".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(&self.ledger_file)
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(&self.log_file)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join(&self.lock_file)
    }
}

// ---------------------------------------------------------------------------
// Remote store
// ---------------------------------------------------------------------------

/// Remote store root, gate marker, and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Root prefix under which the gate marker and mirrors live.
    pub root: String,
    /// Gate marker file name; its presence under `root` permits a run.
    pub gate_file: String,
    pub app_key: String,
    pub app_secret: String,
    pub refresh_token: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            root: "/internet_speed".to_string(),
            gate_file: "keep_running.txt".to_string(),
            app_key: String::new(),
            app_secret: String::new(),
            refresh_token: String::new(),
        }
    }
}

impl RemoteConfig {
    pub fn gate_path(&self) -> String {
        format!("{}/{}", self.root.trim_end_matches('/'), self.gate_file)
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Public-IP discovery variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// `"http-echo"` (default) or `"local-interface"`.
    pub source: IpSourceKind,
    /// Plain-text echo endpoint used by the `http-echo` variant.
    pub echo_url: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            source: IpSourceKind::HttpEcho,
            echo_url: "https://api.ipify.org".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Geolocation
// ---------------------------------------------------------------------------

/// Optional geolocation capability; disabled while `token` is empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeoConfig {
    pub token: String,
    pub api_base: String,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base: "https://ipinfo.io".to_string(),
        }
    }
}

impl GeoConfig {
    pub fn enabled(&self) -> bool {
        !self.token.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Diagnostic log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum tracing level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "debug".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
