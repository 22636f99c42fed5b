//! Pending-sync queue entries.
//!
//! Every offline-capable change is captured as an immutable [`Mutation`]
//! snapshot wrapped in a [`PendingSyncItem`]. Items are replayed against the
//! remote store in [`replay_order`].

use crate::{EntityId, ObservationFields, WalkFields, WalkPatch};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Kind of entity a queued mutation targets.
///
/// Declaration order is replay order: walks before observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Walk,
    Observation,
}

/// What a queued mutation does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncAction {
    Create,
    Update,
}

/// Payload snapshot taken at enqueue time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Mutation {
    WalkCreate {
        walk: WalkFields,
    },
    WalkUpdate {
        patch: WalkPatch,
    },
    ObservationCreate {
        walk_id: EntityId,
        observation: ObservationFields,
    },
}

impl Mutation {
    pub fn entity_type(&self) -> EntityType {
        match self {
            Mutation::WalkCreate { .. } | Mutation::WalkUpdate { .. } => EntityType::Walk,
            Mutation::ObservationCreate { .. } => EntityType::Observation,
        }
    }

    pub fn action(&self) -> SyncAction {
        match self {
            Mutation::WalkCreate { .. } | Mutation::ObservationCreate { .. } => SyncAction::Create,
            Mutation::WalkUpdate { .. } => SyncAction::Update,
        }
    }
}

/// Identity of a queue entry, independent of its position in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueueKey {
    pub entity_type: EntityType,
    pub action: SyncAction,
    pub entity_id: EntityId,
    pub seq: u64,
}

impl fmt::Display for QueueKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}/{:?} {} #{}",
            self.entity_type, self.action, self.entity_id, self.seq
        )
    }
}

/// One queued mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingSyncItem {
    /// Per-device enqueue sequence, unique among live entries
    pub seq: u64,
    /// The entity the snapshot describes
    pub entity_id: EntityId,
    pub mutation: Mutation,
    pub enqueued_at: DateTime<Utc>,
    /// Remote calls attempted for this entry
    #[serde(default)]
    pub attempts: u32,
    /// How many of those attempts the remote store rejected
    #[serde(default)]
    pub rejections: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl PendingSyncItem {
    pub fn new(seq: u64, entity_id: EntityId, mutation: Mutation, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            seq,
            entity_id,
            mutation,
            enqueued_at,
            attempts: 0,
            rejections: 0,
            last_error: None,
        }
    }

    pub fn entity_type(&self) -> EntityType {
        self.mutation.entity_type()
    }

    pub fn action(&self) -> SyncAction {
        self.mutation.action()
    }

    pub fn key(&self) -> QueueKey {
        QueueKey {
            entity_type: self.entity_type(),
            action: self.action(),
            entity_id: self.entity_id.clone(),
            seq: self.seq,
        }
    }

    /// Storage key of this entry in the queue collection.
    pub fn storage_key(&self) -> String {
        storage_key(self.seq)
    }

    /// Whether this entry references `id`, either as its own entity or as the
    /// parent walk of an observation.
    pub fn references(&self, id: &EntityId) -> bool {
        if &self.entity_id == id {
            return true;
        }
        match &self.mutation {
            Mutation::ObservationCreate { walk_id, .. } => walk_id == id,
            _ => false,
        }
    }

    /// Replay ordering: entity type, then enqueue time, then sequence.
    pub fn replay_cmp(&self, other: &Self) -> Ordering {
        self.entity_type()
            .cmp(&other.entity_type())
            .then_with(|| self.enqueued_at.cmp(&other.enqueued_at))
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Zero-padded so lexical key order matches sequence order.
pub fn storage_key(seq: u64) -> String {
    format!("{seq:020}")
}

/// Sort queue entries into the order a sync pass replays them.
pub fn replay_order(mut items: Vec<PendingSyncItem>) -> Vec<PendingSyncItem> {
    items.sort_by(PendingSyncItem::replay_cmp);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Location;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn walk_create(seq: u64, secs: i64) -> PendingSyncItem {
        PendingSyncItem::new(
            seq,
            EntityId::provisional(format!("tmp_w{seq}")),
            Mutation::WalkCreate {
                walk: WalkFields::new("ana", "Loop", at(secs)),
            },
            at(secs),
        )
    }

    fn observation_create(seq: u64, secs: i64, walk: &str) -> PendingSyncItem {
        PendingSyncItem::new(
            seq,
            EntityId::provisional(format!("tmp_o{seq}")),
            Mutation::ObservationCreate {
                walk_id: EntityId::provisional(walk),
                observation: ObservationFields::new(
                    "ana",
                    "heron",
                    "bird",
                    Location::new(51.0, -1.0),
                    at(secs),
                ),
            },
            at(secs),
        )
    }

    #[test]
    fn walks_replay_before_observations() {
        let ordered = replay_order(vec![
            observation_create(1, 0, "tmp_w2"),
            walk_create(2, 50),
            observation_create(3, 10, "tmp_w2"),
            walk_create(4, 5),
        ]);
        let seqs: Vec<_> = ordered.iter().map(|i| i.seq).collect();
        assert_eq!(seqs, vec![4, 2, 1, 3]);
    }

    #[test]
    fn equal_timestamps_fall_back_to_sequence() {
        let ordered = replay_order(vec![walk_create(9, 0), walk_create(3, 0)]);
        assert_eq!(ordered[0].seq, 3);
        assert_eq!(ordered[1].seq, 9);
    }

    #[test]
    fn entity_type_and_action_follow_mutation() {
        let item = observation_create(1, 0, "tmp_w1");
        assert_eq!(item.entity_type(), EntityType::Observation);
        assert_eq!(item.action(), SyncAction::Create);

        let update = PendingSyncItem::new(
            2,
            EntityId::permanent("w_1"),
            Mutation::WalkUpdate {
                patch: WalkPatch::default(),
            },
            at(0),
        );
        assert_eq!(update.key().action, SyncAction::Update);
    }

    #[test]
    fn references_parent_walk() {
        let item = observation_create(1, 0, "tmp_w1");
        assert!(item.references(&EntityId::provisional("tmp_w1")));
        assert!(item.references(&EntityId::provisional("tmp_o1")));
        assert!(!item.references(&EntityId::provisional("tmp_w2")));
    }

    #[test]
    fn storage_keys_sort_numerically() {
        assert!(storage_key(9) < storage_key(10));
    }

    #[test]
    fn mutation_serialization_is_tagged() {
        let item = walk_create(1, 0);
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["mutation"]["type"], "walkCreate");

        let parsed: PendingSyncItem = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, item);
    }
}
