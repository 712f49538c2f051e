use thiserror::Error;

/// Top-level error type for the `hassync-api` crate.
///
/// Covers the wire layer only: connecting, encoding, and decoding.
/// `hassync-core` maps these into user-facing sync status.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// WebSocket connection failed (DNS failure, refused, TLS, upgrade).
    #[error("WebSocket connection failed: {0}")]
    Connect(String),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The transport channel pair was dropped before the send completed.
    #[error("Transport channel closed")]
    ChannelClosed,

    // ── Protocol ────────────────────────────────────────────────────
    /// A frame could not be decoded: unparsable payload or missing
    /// required fields for its declared type.
    #[error("Malformed frame: {reason}")]
    MalformedFrame { reason: String },

    /// A client frame could not be serialized.
    #[error("Frame encoding failed: {0}")]
    Encode(String),
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::ChannelClosed)
    }
}
