use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_BASE_URL;

const DEFAULT_ENV_PREFIX: &str = "ZUTUBE";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            timeout: default_timeout(),
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    format!("zutube/{}", crate::VERSION)
}

fn default_timeout() -> Duration {
    Duration::from_secs(20)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AuthConfig {
    /// Check a restored token against the server before trusting it.
    #[serde(default)]
    pub validate_on_start: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PlayerConfig {
    /// argv with `%URL%` replaced by the media URL. Empty opens the system browser.
    #[serde(default)]
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `off` or an empty string disables logging.
    #[serde(default = "default_log_file")]
    pub file: Option<PathBuf>,
}

impl LogConfig {
    pub fn file_path(&self) -> Option<&Path> {
        let path = self.file.as_deref()?;
        let raw = path.to_string_lossy();
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("off") || raw.eq_ignore_ascii_case("none") {
            None
        } else {
            Some(path)
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_file() -> Option<PathBuf> {
    dirs::cache_dir().map(|dir| dir.join("zutube").join("zutube.log"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StorageConfig {
    /// Defaults to `state.db` next to the config file.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config_file: Option<PathBuf>,
    pub env_prefix: Option<String>,
}

pub fn load(options: LoadOptions) -> Result<Config> {
    let mut cfg = Config::default();

    if let Some(path) = options.config_file.as_ref() {
        if path.exists() {
            let from_file = read_config_file(path)?;
            cfg = merge_config(cfg, from_file);
        }
    } else if let Some(default_path) = default_config_path() {
        if default_path.exists() {
            let from_file = read_config_file(&default_path)?;
            cfg = merge_config(cfg, from_file);
        }
    }

    let prefix = options.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
    apply_env(&mut cfg, prefix);

    Ok(cfg)
}

fn read_config_file(path: &Path) -> Result<Config> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("config: failed to read {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&data)
        .with_context(|| format!("config: failed to parse {}", path.display()))?;
    Ok(config)
}

fn merge_config(mut base: Config, other: Config) -> Config {
    if !other.api.base_url.trim().is_empty() {
        base.api.base_url = other.api.base_url;
    }
    if !other.api.user_agent.trim().is_empty() {
        base.api.user_agent = other.api.user_agent;
    }
    if !other.api.timeout.is_zero() {
        base.api.timeout = other.api.timeout;
    }

    base.auth.validate_on_start = other.auth.validate_on_start;

    if !other.player.command.is_empty() {
        base.player.command = other.player.command;
    }

    if !other.log.level.trim().is_empty() {
        base.log.level = other.log.level;
    }
    if other.log.file.is_some() {
        base.log.file = other.log.file;
    }

    if other.storage.path.is_some() {
        base.storage.path = other.storage.path;
    }

    base
}

/// Applies `<PREFIX>_SECTION__FIELD` variables on top of `cfg`. Only variables
/// that are actually set take effect; unparsable values are ignored.
fn apply_env(cfg: &mut Config, prefix: &str) {
    let mut map: HashMap<String, String> = HashMap::new();
    let upper_prefix = format!("{}_", prefix.to_uppercase());

    for (key, value) in env::vars() {
        if let Some(stripped) = key.strip_prefix(&upper_prefix) {
            let normalized = stripped.to_ascii_lowercase().replace("__", ".");
            map.insert(normalized, value);
        }
    }

    for (key, value) in map {
        apply_env_value(cfg, &key, value);
    }
}

fn apply_env_value(cfg: &mut Config, key: &str, value: String) {
    match key {
        "api.base_url" => cfg.api.base_url = value,
        "api.user_agent" => cfg.api.user_agent = value,
        "api.timeout" => {
            if let Ok(duration) = humantime::parse_duration(&value) {
                cfg.api.timeout = duration;
            }
        }
        "auth.validate_on_start" => cfg.auth.validate_on_start = parse_flag(&value),
        "player.command" => {
            cfg.player.command = value
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        "log.level" => cfg.log.level = value,
        "log.file" => cfg.log.file = Some(PathBuf::from(value)),
        "storage.path" => cfg.storage.path = Some(PathBuf::from(value)),
        _ => {}
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

pub fn default_path() -> Option<PathBuf> {
    default_config_path()
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("zutube").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::tempdir;

    fn isolated(prefix: &str, file: Option<PathBuf>) -> LoadOptions {
        LoadOptions {
            config_file: file,
            env_prefix: Some(prefix.into()),
        }
    }

    #[test]
    fn load_defaults_without_files() {
        let dir = tempdir().unwrap();
        let cfg = load(isolated("ZUTUBE_T1", Some(dir.path().join("absent.yaml")))).unwrap();
        assert_eq!(cfg.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.api.timeout, Duration::from_secs(20));
        assert!(!cfg.auth.validate_on_start);
        assert!(cfg.player.command.is_empty());
        assert_eq!(cfg.log.level, "info");
    }

    #[test]
    fn file_values_override_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "api:\n  base_url: https://videos.example.com/api\n  timeout: 5s\n\
             auth:\n  validate_on_start: true\n\
             player:\n  command: [mpv, \"%URL%\"]\n",
        )
        .unwrap();

        let cfg = load(isolated("ZUTUBE_T2", Some(path))).unwrap();
        assert_eq!(cfg.api.base_url, "https://videos.example.com/api");
        assert_eq!(cfg.api.timeout, Duration::from_secs(5));
        assert_eq!(cfg.api.user_agent, default_user_agent());
        assert!(cfg.auth.validate_on_start);
        assert_eq!(cfg.player.command, vec!["mpv", "%URL%"]);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "api: [not, a, map]\n").unwrap();
        assert!(load(isolated("ZUTUBE_T3", Some(path))).is_err());
    }

    #[test]
    fn log_file_can_be_switched_off() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "log:\n  file: \"off\"\n").unwrap();
        let cfg = load(isolated("ZUTUBE_T5", Some(path.clone()))).unwrap();
        assert!(cfg.log.file_path().is_none());

        fs::write(&path, "log:\n  file: \"\"\n").unwrap();
        let cfg = load(isolated("ZUTUBE_T5", Some(path.clone()))).unwrap();
        assert!(cfg.log.file_path().is_none());

        let custom = dir.path().join("zutube.log");
        fs::write(&path, format!("log:\n  file: {}\n", custom.display())).unwrap();
        let cfg = load(isolated("ZUTUBE_T5", Some(path))).unwrap();
        assert_eq!(cfg.log.file_path(), Some(custom.as_path()));
    }

    #[test]
    fn env_overrides() {
        let dir = tempdir().unwrap();
        env::set_var("ZUTUBE_T4_API__BASE_URL", "http://10.0.0.2:5000/api");
        env::set_var("ZUTUBE_T4_AUTH__VALIDATE_ON_START", "yes");
        env::set_var("ZUTUBE_T4_API__TIMEOUT", "not a duration");
        let cfg = load(isolated("ZUTUBE_T4", Some(dir.path().join("absent.yaml")))).unwrap();
        env::remove_var("ZUTUBE_T4_API__BASE_URL");
        env::remove_var("ZUTUBE_T4_AUTH__VALIDATE_ON_START");
        env::remove_var("ZUTUBE_T4_API__TIMEOUT");

        assert_eq!(cfg.api.base_url, "http://10.0.0.2:5000/api");
        assert!(cfg.auth.validate_on_start);
        assert_eq!(cfg.api.timeout, default_timeout());
    }
}
