// ── Connection lifecycle ──
//
// State machine for the single remote connection. The session task in
// `engine` drives the transitions; observers watch two channels: the
// raw `ConnectionState` and the user-facing `SyncStatus` projection,
// recomputed together on every transition.

use std::time::Duration;

use tokio::sync::watch;

// ── ConnectionState ──────────────────────────────────────────────────

/// Where the connection currently is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authenticating,
    Syncing,
    Live,
    Reconnecting { attempt: u32 },
}

// ── SyncStatus ───────────────────────────────────────────────────────

/// User-facing projection of the connection state plus last error
/// context. Credential rejection, transport failures, and reconnect
/// waits are errors; everything else is not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
    pub message: String,
    pub is_error: bool,
}

impl SyncStatus {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_error: true,
        }
    }
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Backoff policy for reconnection attempts.
///
/// Exponential: `delay = min(initial * 2^attempt, max)`. Deterministic
/// (no jitter) so status messages and tests can state the exact delay.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 5s.
    pub initial_delay: Duration,

    /// Upper bound on the backoff delay. Default: 60s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            max_retries: None,
        }
    }
}

impl ReconnectConfig {
    /// Delay before reconnection attempt number `attempt` (0-based).
    #[allow(clippy::cast_possible_wrap, clippy::as_conversions)]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_secs_f64() * 2.0_f64.powi(attempt.min(i32::MAX as u32) as i32);
        Duration::from_secs_f64(base.min(self.max_delay.as_secs_f64()))
    }
}

// ── ConnectionManager ────────────────────────────────────────────────

/// Owns the connection's observable state.
///
/// Every transition recomputes both channels atomically from the
/// session task, the only writer. Reconnect policy decisions (whether
/// to retry, how long to wait) are read from here as well, so the
/// session loop stays free of policy constants.
pub struct ConnectionManager {
    state: watch::Sender<ConnectionState>,
    status: watch::Sender<SyncStatus>,
    reconnect: ReconnectConfig,
    auto_reconnect: bool,
}

impl ConnectionManager {
    pub fn new(auto_reconnect: bool, reconnect: ReconnectConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (status, _) = watch::channel(SyncStatus::ok("Disconnected."));

        Self {
            state,
            status,
            reconnect,
            auto_reconnect,
        }
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn auto_reconnect(&self) -> bool {
        self.auto_reconnect
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        self.reconnect.backoff(attempt)
    }

    pub fn retries_exhausted(&self, attempt: u32) -> bool {
        self.reconnect.max_retries.is_some_and(|max| attempt >= max)
    }

    // ── Transitions ──────────────────────────────────────────────────

    pub fn connecting(&self) {
        self.publish(
            ConnectionState::Connecting,
            SyncStatus::ok("Connecting to Home Assistant..."),
        );
    }

    pub fn authenticating(&self) {
        self.publish(
            ConnectionState::Authenticating,
            SyncStatus::ok("WebSocket connected, authenticating..."),
        );
    }

    pub fn syncing(&self) {
        self.publish(
            ConnectionState::Syncing,
            SyncStatus::ok("Authentication successful, loading entities..."),
        );
    }

    pub fn live(&self, entity_count: usize) {
        self.publish(
            ConnectionState::Live,
            SyncStatus::ok(format!(
                "Connected to Home Assistant ({entity_count} entities)"
            )),
        );
    }

    /// Transport loss with auto-reconnect: one backoff wait is pending.
    pub fn reconnecting(&self, attempt: u32, delay: Duration, reason: &str) {
        self.publish(
            ConnectionState::Reconnecting { attempt },
            SyncStatus::error(format!(
                "{reason}. Retrying in {} seconds...",
                delay.as_secs()
            )),
        );
    }

    /// Credential rejected. Terminal: a bad token will not become valid
    /// by retrying, so this is reported, never retried.
    pub fn auth_rejected(&self, detail: Option<&str>) {
        let message = match detail {
            Some(d) => format!("Authentication failed: {d}. Please check your access token."),
            None => "Authentication failed. Please check your access token.".to_owned(),
        };
        self.publish(ConnectionState::Disconnected, SyncStatus::error(message));
    }

    /// Transport loss with auto-reconnect disabled.
    pub fn closed(&self, reason: &str) {
        self.publish(
            ConnectionState::Disconnected,
            SyncStatus::error(format!("Connection closed: {reason}")),
        );
    }

    /// Retry cap reached.
    pub fn gave_up(&self, attempts: u32) {
        self.publish(
            ConnectionState::Disconnected,
            SyncStatus::error(format!(
                "Gave up reconnecting after {attempts} attempts"
            )),
        );
    }

    /// Caller-initiated teardown.
    pub fn disconnected(&self) {
        self.publish(ConnectionState::Disconnected, SyncStatus::ok("Disconnected."));
    }

    fn publish(&self, state: ConnectionState, status: SyncStatus) {
        // `send_replace` stores the value even with zero receivers;
        // plain `send` would drop the transition on the floor.
        self.state.send_replace(state);
        self.status.send_replace(status);
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(5));
        assert_eq!(config.max_delay, Duration::from_secs(60));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let config = ReconnectConfig::default();
        assert_eq!(config.backoff(0), Duration::from_secs(5));
        assert_eq!(config.backoff(1), Duration::from_secs(10));
        assert_eq!(config.backoff(2), Duration::from_secs(20));
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig::default();
        assert_eq!(config.backoff(4), Duration::from_secs(60));
        assert_eq!(config.backoff(30), Duration::from_secs(60));
    }

    #[test]
    fn transitions_publish_state_and_status_together() {
        let manager = ConnectionManager::new(true, ReconnectConfig::default());
        let mut state_rx = manager.subscribe_state();
        let mut status_rx = manager.subscribe_status();

        manager.connecting();
        assert_eq!(*state_rx.borrow_and_update(), ConnectionState::Connecting);
        assert!(!status_rx.borrow_and_update().is_error);

        manager.authenticating();
        assert_eq!(*state_rx.borrow_and_update(), ConnectionState::Authenticating);

        manager.syncing();
        assert_eq!(*state_rx.borrow_and_update(), ConnectionState::Syncing);

        manager.live(12);
        assert_eq!(*state_rx.borrow_and_update(), ConnectionState::Live);
        let status = status_rx.borrow_and_update().clone();
        assert!(!status.is_error);
        assert!(status.message.contains("12 entities"));
    }

    #[test]
    fn auth_rejection_is_terminal_and_an_error() {
        let manager = ConnectionManager::new(true, ReconnectConfig::default());
        manager.auth_rejected(Some("Invalid access token"));

        assert_eq!(manager.state(), ConnectionState::Disconnected);
        let status = manager.subscribe_status().borrow().clone();
        assert!(status.is_error);
        assert!(status.message.contains("check your access token"));
    }

    #[test]
    fn reconnecting_reports_delay_in_seconds() {
        let manager = ConnectionManager::new(true, ReconnectConfig::default());
        manager.reconnecting(0, Duration::from_secs(5), "Connection closed");

        assert_eq!(
            manager.state(),
            ConnectionState::Reconnecting { attempt: 0 }
        );
        let status = manager.subscribe_status().borrow().clone();
        assert!(status.is_error);
        assert!(status.message.contains("Retrying in 5 seconds"));
    }

    #[test]
    fn transitions_land_with_zero_subscribers() {
        let manager = ConnectionManager::new(true, ReconnectConfig::default());

        // No receiver exists yet; the transition must still be stored.
        manager.connecting();
        assert_eq!(manager.state(), ConnectionState::Connecting);

        manager.live(3);
        assert_eq!(manager.state(), ConnectionState::Live);

        // A late subscriber sees the latest value immediately.
        let status = manager.subscribe_status().borrow().clone();
        assert!(status.message.contains("3 entities"));
    }

    #[test]
    fn retry_cap_is_honored() {
        let unbounded = ConnectionManager::new(true, ReconnectConfig::default());
        assert!(!unbounded.retries_exhausted(1_000_000));

        let bounded = ConnectionManager::new(
            true,
            ReconnectConfig {
                max_retries: Some(3),
                ..ReconnectConfig::default()
            },
        );
        assert!(!bounded.retries_exhausted(2));
        assert!(bounded.retries_exhausted(3));
    }
}
