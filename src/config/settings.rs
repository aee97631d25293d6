//! TOML-based configuration for isotika.
//!
//! Supports a config file (isotika.toml) with environment variable expansion.
//!
//! Example configuration:
//! ```toml
//! [worker]
//! runtime = "java"
//! artifact = "${HOME}/jars/tika-server-1.5.jar"
//! jvm_args = ["-Djava.net.preferIPv4Stack=true", "-Xmx1g"]
//! preferred_port = 9998
//! startup_timeout_ms = 120000
//!
//! [worker.env]
//! TIKA_CONFIG = "${HOME}/tika-config.xml"
//!
//! [request]
//! timeout_ms = 10000
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::worker::protocol::CSV_MEDIA_TYPE;

/// Flag that makes the JVM prefer IPv4 when resolving `localhost`.
pub const PREFER_IPV4_FLAG: &str = "-Djava.net.preferIPv4Stack=true";

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Worker process configuration.
    pub worker: WorkerSettings,

    /// Request path configuration.
    pub request: RequestSettings,
}

/// Worker process configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Runtime used to launch the artifact (`java` on the PATH by default).
    pub runtime: String,

    /// Path to the worker jar (supports ${ENV_VAR} expansion).
    pub artifact: Option<String>,

    /// Worker version, used to build conventional jar file names.
    pub version: String,

    /// Use the jar embedded at build time.
    pub embedded: bool,

    /// Arguments placed before `-jar`.
    pub jvm_args: Vec<String>,

    /// Arguments placed after `-p <port>`.
    pub extra_args: Vec<String>,

    /// Extra environment for the worker (values support ${ENV_VAR} expansion).
    pub env: BTreeMap<String, String>,

    /// Loopback address the worker is reached on.
    pub host: String,

    /// First port tried when allocating.
    pub preferred_port: u16,

    /// Highest port the allocator may hand out.
    pub max_port: u16,

    /// Delay between readiness probes.
    pub ready_poll_interval_ms: u64,

    /// Time budget for a single readiness probe.
    pub probe_timeout_ms: u64,

    /// Ceiling on the whole startup.
    pub startup_timeout_ms: u64,

    /// How long to wait for the killed worker to be reaped.
    pub stop_timeout_ms: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            runtime: "java".to_string(),
            artifact: None,
            version: "1.5".to_string(),
            embedded: false,
            jvm_args: vec![PREFER_IPV4_FLAG.to_string()],
            extra_args: Vec::new(),
            env: BTreeMap::new(),
            host: "127.0.0.1".to_string(),
            preferred_port: 9998,
            max_port: u16::MAX,
            ready_poll_interval_ms: 100,
            probe_timeout_ms: 1_000,
            startup_timeout_ms: 120_000,
            stop_timeout_ms: 5_000,
        }
    }
}

impl WorkerSettings {
    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ready_poll_interval_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_millis(self.startup_timeout_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Conventional jar file name for the configured version.
    pub fn artifact_file_name(&self) -> String {
        format!("tika-server-{}.jar", self.version)
    }

    /// Configured artifact path with environment variables expanded.
    pub fn resolved_artifact(&self) -> Result<Option<PathBuf>, SettingsError> {
        self.artifact
            .as_deref()
            .map(|path| expand_env_vars(path).map(PathBuf::from))
            .transpose()
    }

    /// Worker environment with values expanded.
    pub fn resolved_env(&self) -> Result<Vec<(String, String)>, SettingsError> {
        self.env
            .iter()
            .map(|(k, v)| Ok((k.clone(), expand_env_vars(v)?)))
            .collect()
    }
}

/// Request path configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RequestSettings {
    /// Time envelope for one metadata request.
    pub timeout_ms: u64,

    /// Value of the `Accept` header.
    pub accept: String,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            accept: CSV_MEDIA_TYPE.to_string(),
        }
    }
}

impl RequestSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `ISOTIKA_CONFIG`
    /// 2. `./isotika.toml`
    /// 3. `~/.config/isotika/config.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("ISOTIKA_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("isotika.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("isotika").join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Reject settings the supervisor cannot work with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let worker = &self.worker;
        if worker.runtime.trim().is_empty() {
            return Err(SettingsError::InvalidConfig(
                "worker.runtime must not be empty".to_string(),
            ));
        }
        if worker.preferred_port == 0 || worker.preferred_port > worker.max_port {
            return Err(SettingsError::InvalidConfig(format!(
                "worker.preferred_port {} must be in 1..={}",
                worker.preferred_port, worker.max_port
            )));
        }
        if worker.host.parse::<std::net::IpAddr>().is_err() {
            return Err(SettingsError::InvalidConfig(format!(
                "worker.host {:?} must be an IP address",
                worker.host
            )));
        }
        if worker.ready_poll_interval_ms == 0 {
            return Err(SettingsError::InvalidConfig(
                "worker.ready_poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.request.timeout_ms == 0 {
            return Err(SettingsError::InvalidConfig(
                "request.timeout_ms must be positive".to_string(),
            ));
        }
        worker.resolved_env()?;
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let mut var_name = String::new();
        if chars.peek() == Some(&'{') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == '}' {
                    break;
                }
                var_name.push(ch);
            }
        } else {
            while let Some(&ch) = chars.peek() {
                if ch.is_alphanumeric() || ch == '_' {
                    var_name.push(ch);
                    chars.next();
                } else {
                    break;
                }
            }
            if var_name.is_empty() {
                // Just a lone $, keep it
                result.push('$');
                continue;
            }
        }

        let value =
            env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name.clone()))?;
        result.push_str(&value);
    }

    Ok(result)
}
