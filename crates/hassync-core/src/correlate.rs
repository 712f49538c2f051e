// ── Request correlation ──
//
// The protocol is request/response over one multiplexed socket: every
// client request carries an id and the matching `result` frame echoes
// it. Ids come from a monotonic counter scoped to one connection; the
// engine builds a fresh correlator per session, so uniqueness is
// structural rather than random.

use std::collections::HashMap;

/// Logical operation a pending request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Full `get_states` snapshot (bootstrap or periodic refresh).
    BootstrapSnapshot,
    /// Caller-initiated `call_service`.
    UserCommand,
}

/// Issues request ids and matches responses back to their operation.
#[derive(Debug, Default)]
pub struct RequestCorrelator {
    next_id: u64,
    pending: HashMap<u64, RequestKind>,
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id (starting at 1) and track it as pending.
    pub fn register(&mut self, kind: RequestKind) -> u64 {
        self.next_id += 1;
        self.pending.insert(self.next_id, kind);
        self.next_id
    }

    /// Match a response id to its request, removing the entry.
    ///
    /// `None` for ids never registered (or already resolved): the remote
    /// may emit unsolicited results, so this is a no-op for the caller,
    /// not an error.
    pub fn resolve(&mut self, id: u64) -> Option<RequestKind> {
        self.pending.remove(&id)
    }

    /// Drop all pending entries. Called on disconnect -- outstanding
    /// requests are discarded, never resolved.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_start_at_one_and_increase() {
        let mut correlator = RequestCorrelator::new();
        assert_eq!(correlator.register(RequestKind::BootstrapSnapshot), 1);
        assert_eq!(correlator.register(RequestKind::UserCommand), 2);
        assert_eq!(correlator.register(RequestKind::UserCommand), 3);
    }

    #[test]
    fn resolve_returns_kind_and_removes_entry() {
        let mut correlator = RequestCorrelator::new();
        let id = correlator.register(RequestKind::BootstrapSnapshot);

        assert_eq!(correlator.resolve(id), Some(RequestKind::BootstrapSnapshot));
        assert_eq!(correlator.resolve(id), None);
    }

    #[test]
    fn resolve_unknown_id_leaves_other_entries_alone() {
        let mut correlator = RequestCorrelator::new();
        let id = correlator.register(RequestKind::UserCommand);

        assert_eq!(correlator.resolve(9999), None);
        assert_eq!(correlator.pending_count(), 1);
        assert_eq!(correlator.resolve(id), Some(RequestKind::UserCommand));
    }

    #[test]
    fn clear_drops_all_pending() {
        let mut correlator = RequestCorrelator::new();
        correlator.register(RequestKind::BootstrapSnapshot);
        correlator.register(RequestKind::UserCommand);

        correlator.clear();
        assert_eq!(correlator.pending_count(), 0);
        assert_eq!(correlator.resolve(1), None);
    }
}
