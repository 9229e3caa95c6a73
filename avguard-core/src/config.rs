use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, anyhow, ensure};
use serde::{Deserialize, Serialize};

/// EICAR anti-malware test file signature.
pub const EICAR_SIGNATURE: &str =
    r"X5O!P%@AP[4\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*";

/// Names a config file to load instead of the default lookup.
pub const CONFIG_PATH_ENV: &str = "AVGUARD_CONFIG_PATH";
/// Inline JSON configuration.
pub const CONFIG_JSON_ENV: &str = "AVGUARD_CONFIG_JSON";

/// Files probed, in order, relative to the working directory.
const DEFAULT_FILES: &[&str] = &[
    "avguard.toml",
    "avguard.json",
    "config/avguard.toml",
    "config/avguard.json",
];

/// Upper bound for `debounce_window_ms`.
pub const MAX_DEBOUNCE_WINDOW_MS: u64 = 60_000;
pub const MAX_IO_WORKER_THREADS: usize = 64;

/// Where the effective guard configuration came from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum GuardConfigSource {
    #[default]
    Default,
    /// Path given by the caller, e.g. `avguardctl --config`.
    Explicit(PathBuf),
    EnvPath(PathBuf),
    EnvInline,
    /// One of the default files.
    File(PathBuf),
}

impl fmt::Display for GuardConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardConfigSource::Default => f.write_str("built-in defaults"),
            GuardConfigSource::Explicit(path) | GuardConfigSource::File(path) => {
                write!(f, "{}", path.display())
            }
            GuardConfigSource::EnvPath(path) => {
                write!(f, "${CONFIG_PATH_ENV} ({})", path.display())
            }
            GuardConfigSource::EnvInline => write!(f, "${CONFIG_JSON_ENV}"),
        }
    }
}

/// Serialization format of a config document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
    /// Unknown extension: TOML is tried first, then JSON.
    Detect,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml" | "tml") => ConfigFormat::Toml,
            Some("json") => ConfigFormat::Json,
            _ => ConfigFormat::Detect,
        }
    }
}

/// Top-level settings for the scan-state core.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Quiescence window (ms) a snapshot burst must go quiet for before the
    /// classified state is delivered to observers. Lower values make the UI
    /// react faster at the cost of more re-renders during busy scans.
    pub debounce_window_ms: u64,
    /// Worker threads in the I/O pool that runs engine requests.
    pub io_worker_threads: usize,
    /// Thread name prefix for the I/O pool.
    pub io_thread_name: String,
    /// Settings for the in-process simulated engine.
    pub simulator: SimulatorConfig,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            debounce_window_ms: 500,
            io_worker_threads: 2,
            io_thread_name: "avguard-io".to_string(),
            simulator: SimulatorConfig::default(),
        }
    }
}

/// Tuning for [`crate::engine::SimulatedEngine`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Artificial delay (ms) spent on every file, so progress is observable.
    pub per_file_delay_ms: u64,
    /// Byte patterns that mark a file as infected.
    pub signatures: Vec<String>,
    /// Only this many leading bytes of each file are inspected.
    pub max_file_bytes: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            per_file_delay_ms: 25,
            signatures: vec![EICAR_SIGNATURE.to_string()],
            max_file_bytes: 1024 * 1024,
        }
    }
}

impl SimulatorConfig {
    pub fn per_file_delay(&self) -> Duration {
        Duration::from_millis(self.per_file_delay_ms)
    }
}

impl GuardConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }

    /// Resolve and validate the effective configuration.
    ///
    /// `explicit` wins when given. Otherwise `$AVGUARD_CONFIG_PATH`, then
    /// `$AVGUARD_CONFIG_JSON`, then the first default file in the working
    /// directory, then the built-in defaults. Blank variables are ignored.
    pub fn load(
        explicit: Option<&Path>,
    ) -> anyhow::Result<(Self, GuardConfigSource)> {
        Self::resolve(explicit, |key| env::var(key).ok(), Path::new("."))
    }

    fn resolve<F>(
        explicit: Option<&Path>,
        lookup: F,
        base_dir: &Path,
    ) -> anyhow::Result<(Self, GuardConfigSource)>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let (config, source) = if let Some(path) = explicit {
            (Self::read(path)?, GuardConfigSource::Explicit(path.to_path_buf()))
        } else if let Some(path) = var(CONFIG_PATH_ENV) {
            let path = PathBuf::from(path);
            (Self::read(&path)?, GuardConfigSource::EnvPath(path))
        } else if let Some(raw) = var(CONFIG_JSON_ENV) {
            let config = Self::parse(&raw, ConfigFormat::Json)
                .with_context(|| format!("failed to parse ${CONFIG_JSON_ENV}"))?;
            (config, GuardConfigSource::EnvInline)
        } else if let Some(path) = DEFAULT_FILES
            .iter()
            .map(|name| base_dir.join(name))
            .find(|path| path.is_file())
        {
            (Self::read(&path)?, GuardConfigSource::File(path))
        } else {
            (Self::default(), GuardConfigSource::Default)
        };

        config
            .validate()
            .with_context(|| format!("invalid guard config from {source}"))?;
        Ok((config, source))
    }

    /// Read a config file, picking the format from its extension.
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&contents, ConfigFormat::from_path(path))
            .with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn parse(contents: &str, format: ConfigFormat) -> anyhow::Result<Self> {
        match format {
            ConfigFormat::Toml => Ok(toml::from_str(contents)?),
            ConfigFormat::Json => Ok(serde_json::from_str(contents)?),
            ConfigFormat::Detect => toml::from_str(contents).or_else(|toml_err| {
                serde_json::from_str(contents).map_err(|json_err| {
                    anyhow!("not TOML ({toml_err}) and not JSON ({json_err})")
                })
            }),
        }
    }

    /// Reject settings the gateway and synthesizer cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            self.debounce_window_ms <= MAX_DEBOUNCE_WINDOW_MS,
            "debounce_window_ms must be at most {MAX_DEBOUNCE_WINDOW_MS}, got {}",
            self.debounce_window_ms
        );
        ensure!(
            (1..=MAX_IO_WORKER_THREADS).contains(&self.io_worker_threads),
            "io_worker_threads must be between 1 and {MAX_IO_WORKER_THREADS}, got {}",
            self.io_worker_threads
        );
        ensure!(
            !self.io_thread_name.trim().is_empty(),
            "io_thread_name must not be empty"
        );
        ensure!(
            self.simulator.max_file_bytes > 0,
            "simulator.max_file_bytes must be positive"
        );
        Ok(())
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        toml::to_string_pretty(self).context("failed to render guard config")
    }
}
