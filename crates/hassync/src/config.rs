//! CLI-owned configuration: TOML profiles and translation to
//! `hassync_core::EngineConfig`.
//!
//! Core never sees these types -- it receives a pre-built `EngineConfig`.
//! Precedence per setting: CLI flag > environment > profile > default.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use hassync_core::{EngineConfig, ReconnectConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── TOML config structs ──────────────────────────────────────────────

/// CLI-owned TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name (used when --profile is not specified).
    pub default_profile: Option<String>,

    /// Named instance profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            profiles: HashMap::new(),
        }
    }
}

/// One named Home Assistant instance.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Profile {
    /// WebSocket URL, e.g. "ws://homeassistant.local:8123/api/websocket".
    pub url: String,

    /// Long-lived access token (plaintext -- prefer token_env).
    pub token: Option<String>,

    /// Environment variable name containing the access token.
    pub token_env: Option<String>,

    /// Snapshot refresh cadence in seconds; 0 disables it.
    pub refresh_interval: Option<u64>,

    /// Reconnect automatically after transport loss.
    pub auto_reconnect: Option<bool>,

    /// Emit alert lines per entity state change.
    pub notifications: Option<bool>,

    /// First reconnect delay in seconds.
    pub reconnect_initial_secs: Option<u64>,

    /// Backoff cap in seconds.
    pub reconnect_max_secs: Option<u64>,

    /// Give up after this many consecutive failed attempts.
    pub reconnect_max_retries: Option<u32>,
}

// ── Config file path ─────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "hassync", "hassync")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        })
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("hassync");
    p
}

// ── Config loading ───────────────────────────────────────────────────

/// Load the full Config from file + environment.
pub fn load_config() -> Result<Config, CliError> {
    let path = config_path();

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("HASSYNC_CONFIG_").split("_"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), CliError> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(&path, toml_str)?;
    Ok(())
}

// ── Profile resolution ───────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build an `EngineConfig` from config file, profile, and CLI overrides.
pub fn resolve_engine_config(global: &GlobalOpts) -> Result<EngineConfig, CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);

    if let Some(profile) = cfg.profiles.get(&profile_name) {
        return resolve_profile(profile, &profile_name, global);
    }

    // No profile -- flags / env vars alone.
    let url_str = global.url.as_deref().ok_or_else(|| CliError::NoConfig {
        path: config_path().display().to_string(),
    })?;
    let url = parse_ws_url(url_str)?;

    let token = global.token.clone().ok_or(CliError::NoToken {
        profile: profile_name,
    })?;

    Ok(EngineConfig {
        url,
        access_token: SecretString::from(token),
        ..EngineConfig::default()
    })
}

/// Translate a `Profile` + global flags into an `EngineConfig`.
///
/// This is the single boundary where CLI config types cross into core types.
pub fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    global: &GlobalOpts,
) -> Result<EngineConfig, CliError> {
    let url_str = global.url.as_deref().unwrap_or(&profile.url);
    let url = parse_ws_url(url_str)?;

    let token = resolve_token(profile, profile_name, global)?;

    let defaults = EngineConfig::default();
    let reconnect_defaults = ReconnectConfig::default();

    Ok(EngineConfig {
        url,
        access_token: token,
        refresh_interval_secs: profile
            .refresh_interval
            .unwrap_or(defaults.refresh_interval_secs),
        auto_reconnect: profile.auto_reconnect.unwrap_or(defaults.auto_reconnect),
        notifications_enabled: profile
            .notifications
            .unwrap_or(defaults.notifications_enabled),
        reconnect: ReconnectConfig {
            initial_delay: profile
                .reconnect_initial_secs
                .map_or(reconnect_defaults.initial_delay, Duration::from_secs),
            max_delay: profile
                .reconnect_max_secs
                .map_or(reconnect_defaults.max_delay, Duration::from_secs),
            max_retries: profile.reconnect_max_retries,
        },
        handshake_timeout: defaults.handshake_timeout,
    })
}

fn parse_ws_url(url_str: &str) -> Result<url::Url, CliError> {
    let url: url::Url = url_str.parse().map_err(|_| CliError::Validation {
        field: "url".into(),
        reason: format!("invalid URL: {url_str}"),
    })?;

    if !matches!(url.scheme(), "ws" | "wss") {
        return Err(CliError::Validation {
            field: "url".into(),
            reason: format!("expected a ws:// or wss:// URL, got '{}'", url.scheme()),
        });
    }

    Ok(url)
}

// ── Token resolution ─────────────────────────────────────────────────

/// Resolve the access token from the credential chain:
/// flag (or HASSYNC_TOKEN via clap) > profile's token_env > plaintext.
fn resolve_token(
    profile: &Profile,
    profile_name: &str,
    global: &GlobalOpts,
) -> Result<SecretString, CliError> {
    if let Some(ref token) = global.token {
        return Ok(SecretString::from(token.clone()));
    }

    if let Some(ref env_name) = profile.token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    if let Some(ref token) = profile.token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(CliError::NoToken {
        profile: profile_name.into(),
    })
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn global_opts() -> GlobalOpts {
        GlobalOpts {
            profile: None,
            url: None,
            token: None,
            timeout: 30,
            verbose: 0,
        }
    }

    fn profile() -> Profile {
        Profile {
            url: "ws://hass.lan:8123/api/websocket".into(),
            token: Some("file-token".into()),
            ..Profile::default()
        }
    }

    #[test]
    fn default_config_names_the_default_profile() {
        let cfg = Config::default();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn profile_name_prefers_the_flag() {
        let mut global = global_opts();
        global.profile = Some("lab".into());
        assert_eq!(active_profile_name(&global, &Config::default()), "lab");
        assert_eq!(active_profile_name(&global_opts(), &Config::default()), "default");
    }

    #[test]
    fn profile_parses_from_toml() {
        let cfg: Config = toml::from_str(
            r#"
            default_profile = "home"

            [profiles.home]
            url = "wss://hass.example.org/api/websocket"
            token_env = "HASS_TOKEN"
            refresh_interval = 60
            auto_reconnect = false
            "#,
        )
        .unwrap();

        let profile = &cfg.profiles["home"];
        assert_eq!(profile.url, "wss://hass.example.org/api/websocket");
        assert_eq!(profile.token_env.as_deref(), Some("HASS_TOKEN"));
        assert_eq!(profile.refresh_interval, Some(60));
        assert_eq!(profile.auto_reconnect, Some(false));
    }

    #[test]
    fn flag_url_overrides_the_profile() {
        let mut global = global_opts();
        global.url = Some("ws://other.lan:8123/api/websocket".into());

        let config = resolve_profile(&profile(), "default", &global).unwrap();
        assert_eq!(config.url.host_str(), Some("other.lan"));
    }

    #[test]
    fn flag_token_beats_the_plaintext_token() {
        let mut global = global_opts();
        global.token = Some("flag-token".into());

        let config = resolve_profile(&profile(), "default", &global).unwrap();
        assert_eq!(config.access_token.expose_secret(), "flag-token");

        let config = resolve_profile(&profile(), "default", &global_opts()).unwrap();
        assert_eq!(config.access_token.expose_secret(), "file-token");
    }

    #[test]
    fn profile_overrides_map_into_engine_config() {
        let profile = Profile {
            refresh_interval: Some(0),
            notifications: Some(false),
            reconnect_initial_secs: Some(2),
            reconnect_max_retries: Some(5),
            ..profile()
        };

        let config = resolve_profile(&profile, "default", &global_opts()).unwrap();
        assert_eq!(config.refresh_interval_secs, 0);
        assert!(config.refresh_interval().is_none());
        assert!(!config.notifications_enabled);
        assert_eq!(config.reconnect.initial_delay, Duration::from_secs(2));
        assert_eq!(config.reconnect.max_delay, Duration::from_secs(60));
        assert_eq!(config.reconnect.max_retries, Some(5));
    }

    #[test]
    fn non_websocket_urls_are_rejected() {
        let err = parse_ws_url("http://hass.lan:8123").unwrap_err();
        assert!(matches!(err, CliError::Validation { .. }));

        let profile = Profile {
            url: "not a url".into(),
            ..profile()
        };
        assert!(resolve_profile(&profile, "default", &global_opts()).is_err());
    }

    #[test]
    fn config_round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut cfg = Config::default();
        cfg.profiles.insert("home".into(), profile());
        std::fs::write(&path, toml::to_string_pretty(&cfg).unwrap()).unwrap();

        let loaded: Config = Figment::new().merge(Toml::file(&path)).extract().unwrap();
        assert_eq!(loaded.profiles["home"].url, profile().url);
        assert_eq!(loaded.profiles["home"].token.as_deref(), Some("file-token"));
    }

    #[test]
    fn missing_token_is_a_dedicated_error() {
        let profile = Profile {
            token: None,
            ..profile()
        };
        let err = resolve_profile(&profile, "home", &global_opts()).unwrap_err();
        assert!(matches!(err, CliError::NoToken { ref profile } if profile == "home"));
    }
}
