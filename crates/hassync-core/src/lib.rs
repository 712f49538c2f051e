// hassync-core: connection lifecycle and state-synchronization engine
// sitting between hassync-api and consumers (CLI, observers).

pub mod config;
pub mod connection;
pub mod correlate;
pub mod engine;
pub mod error;
pub mod model;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::EngineConfig;
pub use connection::{ConnectionState, ReconnectConfig, SyncStatus};
pub use correlate::{RequestCorrelator, RequestKind};
pub use engine::{Alert, SyncEngine};
pub use error::SyncError;
pub use model::{Entity, EntityId};
pub use store::{DomainView, EntityStore};
