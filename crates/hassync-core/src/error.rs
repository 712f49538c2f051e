// ── Core error types ──
//
// What callers of the sync engine can see. Transport and protocol
// failures inside the event loop never surface here -- they feed the
// `SyncStatus` channel and the reconnect policy instead. These errors
// cover direct caller invocations only.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The engine is not running (never connected, or torn down), so
    /// the command could not even be queued.
    #[error("Engine disconnected")]
    Disconnected,

    /// The remote rejected the configured credential.
    #[error("Authentication rejected: {message}")]
    AuthRejected { message: String },

    /// Socket-level failure establishing or using the connection.
    #[error("Transport failure: {reason}")]
    Transport { reason: String },

    /// Wire-layer error (encode/decode, connect).
    #[error(transparent)]
    Protocol(#[from] hassync_api::Error),

    /// Invalid engine configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },
}
