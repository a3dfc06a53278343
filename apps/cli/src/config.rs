use std::{env, fmt, fs, io, path, time::Duration};

use gatecheck::{ProbeConfig, ProbeTarget};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Targets written into a freshly created config file
const PRESET_TARGETS: &str = include_str!("../presets/targets.toml");

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {}: {source}", path.display())]
    ReadFailed { path: path::PathBuf, source: io::Error },
    #[error("failed to write {}: {source}", path.display())]
    WriteFailed { path: path::PathBuf, source: io::Error },
    #[error("failed to parse {}: {source}", path.display())]
    ParseFailed { path: path::PathBuf, source: toml::de::Error },
    #[error("failed to serialize configuration: {0}")]
    SerializeFailed(#[from] toml::ser::Error),
    #[error("invalid preset targets: {0}")]
    PresetInvalid(#[source] toml::de::Error),
    #[error("no configuration directory available (set XDG_CONFIG_HOME or pass --config)")]
    ConfigPathUnavailable,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache_file: CacheFile,
    pub probe: ProbeConfig,
}

/// Persistent verdict cache shared between runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheFile {
    /// Enables the file store when set (and `probe.cache` is on)
    pub path: Option<path::PathBuf>,
    /// Entries older than this are probed again
    pub ttl_secs: Option<u64>,
}

impl CacheFile {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }
}

#[derive(Deserialize)]
struct Preset {
    targets: Vec<ProbeTarget>,
}

/// Parse the targets shipped with the binary
pub fn preset_targets() -> Result<Vec<ProbeTarget>, Error> {
    let preset: Preset = toml::from_str(PRESET_TARGETS).map_err(Error::PresetInvalid)?;
    Ok(preset.targets)
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/gatecheck/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, Error> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(Error::ConfigPathUnavailable);
    };

    Ok(path.join("gatecheck/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);
        let write_title_2 = write_title_indented(2);
        let write_2 = write_indented(2);

        let probe = &self.probe;

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Fleet")?;
        write_1(f, "Control API", &probe.fleet.api_base())?;
        write_1(f, "Authorization", &if probe.fleet.authorization.is_empty() { "none" } else { "set" })?;
        write_1(f, "Start Timeout (ms)", &probe.fleet.start_timeout_ms)?;
        write_1(f, "Stop Timeout (ms)", &probe.fleet.stop_timeout_ms)?;

        write_title_1(f, "Probing")?;
        write_1(f, "Request Timeout (ms)", &probe.request_timeout_ms)?;
        write_1(f, "Retries", &probe.retries)?;
        write_1(f, "Retry Delay (ms)", &probe.retry_delay_ms)?;
        write_1(f, "Concurrency", &probe.concurrency)?;
        write_1(f, "Start Delay (ms)", &probe.start_delay_ms)?;
        write_1(f, "Per Node Allowance (ms)", &probe.per_node_allowance_ms)?;
        write_1(f, "Max Redirects", &probe.max_redirects)?;

        write_title_1(f, "Cache")?;
        write_1(f, "Enabled", &probe.cache)?;
        write_1(f, "Trust Cached Failures", &!probe.disable_failed_cache)?;
        match &self.cache_file.path {
            Some(path) => write_1(f, "File", &path.display())?,
            None => write_1(f, "File", &"in-memory")?,
        }
        if let Some(ttl) = self.cache_file.ttl_secs {
            write_1(f, "TTL (s)", &ttl)?;
        }

        write_title_1(f, "Targets")?;
        for target in &probe.targets {
            write_title_2(f, &target.name)?;
            write_2(f, "URL", &target.url)?;
            write_2(f, "Flag", &target.flag)?;
            write_2(f, "Tag", &target.tag.trim())?;
            write_2(f, "Rules", &target.rules.len())?;
            if let Some(verification) = &target.verification {
                write_2(f, "Verification Steps", &verification.steps.len())?;
            }
        }

        Ok(())
    }
}

impl Config {
    /// Default options with the shipped targets
    pub fn with_presets() -> Result<Self, Error> {
        let mut config = Self::default();
        config.probe.targets = preset_targets()?;
        Ok(config)
    }

    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/gatecheck/config.toml
    ///  or the specified path, with the preset targets, if one does not exist
    ///
    /// ```rust,ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, Error> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| Error::ReadFailed { path: config_path.clone(), source })?;
            toml::from_str(raw_string.as_str()).map_err(|source| Error::ParseFailed { path: config_path, source })
        } else {
            let config = Self::with_presets()?;
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), Error> {
        let config_str: String = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|source| Error::WriteFailed { path: parent.to_path_buf(), source })?;
        }

        fs::write(path, config_str).map_err(|source| Error::WriteFailed { path: path.to_path_buf(), source })
    }
}
