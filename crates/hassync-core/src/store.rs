// ── Domain-partitioned entity store ──
//
// Holds the local mirror of the remote entity registry. Writes come
// exclusively from the engine's session task; reads are shared with any
// number of observers through immutable snapshots broadcast on a
// `watch` channel, so readers never observe a partially-applied update.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::watch;

use hassync_api::frame::EntityState;

use crate::model::{Entity, EntityId};

/// Read-only grouped view: domain -> entity id -> entity.
///
/// The domain keys are always recomputed from each entity's own id, so
/// the grouping cannot drift from the ids it contains.
pub type DomainView = BTreeMap<String, BTreeMap<EntityId, Arc<Entity>>>;

/// In-memory mirror of the remote entity registry.
pub struct EntityStore {
    by_id: DashMap<EntityId, Arc<Entity>>,
    snapshot: watch::Sender<Arc<DomainView>>,
    last_snapshot_at: watch::Sender<Option<DateTime<Utc>>>,
}

impl EntityStore {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(DomainView::new()));
        let (last_snapshot_at, _) = watch::channel(None);

        Self {
            by_id: DashMap::new(),
            snapshot,
            last_snapshot_at,
        }
    }

    // ── Mutation (session task only) ─────────────────────────────────

    /// Replace the entire mirror with a full snapshot.
    ///
    /// After this call every entity in the store came from `states`;
    /// anything previously present is gone.
    pub fn load_snapshot(&self, states: Vec<EntityState>) {
        self.by_id.clear();
        for state in states {
            let entity = Entity::from(state);
            self.by_id.insert(entity.entity_id.clone(), Arc::new(entity));
        }

        self.publish_view();
        // Stored even with zero receivers, like the view channel.
        self.last_snapshot_at.send_replace(Some(Utc::now()));
    }

    /// Upsert one entity, replacing its state and attributes wholesale.
    ///
    /// An id never seen before creates its domain bucket on the next
    /// published view; there is no separate "create" path.
    pub fn apply_patch(
        &self,
        entity_id: EntityId,
        state: String,
        attributes: serde_json::Map<String, Value>,
    ) {
        let entity = Entity {
            entity_id: entity_id.clone(),
            state,
            attributes,
        };
        self.by_id.insert(entity_id, Arc::new(entity));
        self.publish_view();
    }

    // ── Read access ──────────────────────────────────────────────────

    /// Current grouped view (cheap `Arc` clone, immutable).
    pub fn snapshot(&self) -> Arc<DomainView> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to view changes. Every mutation publishes a fresh
    /// `Arc<DomainView>`; this is the entity-change signal observers
    /// consume.
    pub fn subscribe(&self) -> watch::Receiver<Arc<DomainView>> {
        self.snapshot.subscribe()
    }

    /// Look up a single entity by id.
    pub fn get(&self, id: &EntityId) -> Option<Arc<Entity>> {
        self.by_id.get(id).map(|r| Arc::clone(r.value()))
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// When the last full snapshot landed, or `None` before bootstrap.
    pub fn last_snapshot_at(&self) -> Option<DateTime<Utc>> {
        *self.last_snapshot_at.borrow()
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Regroup the flat index by each entity's derived domain and
    /// broadcast the new view.
    fn publish_view(&self) {
        let mut view = DomainView::new();
        for entry in &self.by_id {
            let entity = Arc::clone(entry.value());
            view.entry(entity.domain().to_owned())
                .or_default()
                .insert(entry.key().clone(), entity);
        }
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(view));
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────────
