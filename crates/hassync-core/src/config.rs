// ── Engine configuration ──
//
// Describes *how* to reach and mirror one Home Assistant instance.
// Plain data, never touches disk -- the CLI (or any other consumer)
// builds an `EngineConfig` and hands it in. Values like the refresh
// interval are taken as given; bounding them to a sane range is the
// caller's job.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::connection::ReconnectConfig;

/// Configuration for one sync engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// WebSocket endpoint, e.g. `wss://hass.example.org/api/websocket`.
    pub url: Url,

    /// Long-lived access token presented in the auth handshake.
    pub access_token: SecretString,

    /// How often to re-request a full snapshot while live (seconds).
    /// Compensates for missed events. 0 = never.
    pub refresh_interval_secs: u64,

    /// Reconnect automatically after transport loss.
    pub auto_reconnect: bool,

    /// Emit an alert notification per entity state change.
    pub notifications_enabled: bool,

    /// Backoff policy when `auto_reconnect` is on.
    pub reconnect: ReconnectConfig,

    /// Budget for the auth + bootstrap handshake. A remote that never
    /// answers would otherwise park the state machine forever; expiry
    /// counts as a transport failure and follows the reconnect policy.
    pub handshake_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: "ws://homeassistant.local:8123/api/websocket"
                .parse()
                .expect("literal URL"),
            access_token: SecretString::from(String::new()),
            refresh_interval_secs: 30,
            auto_reconnect: true,
            notifications_enabled: true,
            reconnect: ReconnectConfig::default(),
            handshake_timeout: Duration::from_secs(30),
        }
    }
}

impl EngineConfig {
    /// Refresh interval as a `Duration`, `None` when disabled.
    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0).then(|| Duration::from_secs(self.refresh_interval_secs))
    }
}
