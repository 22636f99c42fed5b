//! Identifier reconciliation.
//!
//! During a sync pass every successful walk create adds a
//! provisional→permanent entry to a [`ReconciliationMap`]. At commit the map
//! is applied to stored walks and observations, and to queue entries that are
//! still pending, so later passes see permanent ids without re-deriving them.
//! Its entries are also stored as id aliases, so a provisional id a producer
//! still holds keeps resolving after the pass.

use crate::{EntityId, Mutation, Observation, PendingSyncItem, Walk};
use std::collections::HashMap;

/// Provisional walk id → permanent walk id, for one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationMap {
    walks: HashMap<String, String>,
}

impl ReconciliationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a map from (provisional, permanent) pairs of created walks.
    pub fn from_created<I, P, R>(created: I) -> Self
    where
        I: IntoIterator<Item = (P, R)>,
        P: Into<String>,
        R: Into<String>,
    {
        Self {
            walks: created
                .into_iter()
                .map(|(p, r)| (p.into(), r.into()))
                .collect(),
        }
    }

    pub fn record(&mut self, provisional: impl Into<String>, permanent: impl Into<String>) {
        self.walks.insert(provisional.into(), permanent.into());
    }

    pub fn len(&self) -> usize {
        self.walks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.walks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.walks.iter().map(|(p, r)| (p.as_str(), r.as_str()))
    }

    /// The permanent id `id` refers to right now, if it has one.
    pub fn resolve(&self, id: &EntityId) -> Option<String> {
        match id {
            EntityId::Permanent(value) => Some(value.clone()),
            EntityId::Provisional(value) => self.walks.get(value).cloned(),
        }
    }

    /// The permanent replacement for a reconciled provisional id.
    pub fn rewrite(&self, id: &EntityId) -> Option<EntityId> {
        match id {
            EntityId::Provisional(value) => self.walks.get(value).cloned().map(EntityId::Permanent),
            EntityId::Permanent(_) => None,
        }
    }

    /// Rewrite a stored walk's id. Returns true if it changed.
    pub fn rewrite_walk(&self, walk: &mut Walk) -> bool {
        match self.rewrite(&walk.id) {
            Some(id) => {
                walk.id = id;
                true
            }
            None => false,
        }
    }

    /// Rewrite a stored observation's parent walk id. Returns true if it changed.
    pub fn rewrite_observation(&self, observation: &mut Observation) -> bool {
        match self.rewrite(&observation.walk_id) {
            Some(id) => {
                observation.walk_id = id;
                true
            }
            None => false,
        }
    }

    /// Rewrite walk references inside a still-queued entry.
    ///
    /// Walk entries get their target id rewritten; observation entries get
    /// their parent walk id rewritten. Returns true if anything changed.
    pub fn rewrite_pending(&self, item: &mut PendingSyncItem) -> bool {
        match &mut item.mutation {
            Mutation::WalkCreate { .. } | Mutation::WalkUpdate { .. } => {
                match self.rewrite(&item.entity_id) {
                    Some(id) => {
                        item.entity_id = id;
                        true
                    }
                    None => false,
                }
            }
            Mutation::ObservationCreate { walk_id, .. } => match self.rewrite(walk_id) {
                Some(id) => {
                    *walk_id = id;
                    true
                }
                None => false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Location, ObservationFields, WalkFields, WalkPatch};
    use chrono::{TimeZone, Utc};

    fn observation_on(walk_id: EntityId) -> Observation {
        Observation {
            id: EntityId::provisional("tmp_a"),
            walk_id,
            fields: ObservationFields::new(
                "ana",
                "heron",
                "bird",
                Location::new(51.0, -1.0),
                Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            ),
            pending_sync: true,
        }
    }

    #[test]
    fn resolves_permanent_and_reconciled_ids() {
        let map = ReconciliationMap::from_created([("tmp_1", "w_42")]);

        assert_eq!(map.resolve(&EntityId::permanent("w_7")), Some("w_7".into()));
        assert_eq!(
            map.resolve(&EntityId::provisional("tmp_1")),
            Some("w_42".into())
        );
        assert_eq!(map.resolve(&EntityId::provisional("tmp_2")), None);
    }

    #[test]
    fn rewrites_walk_and_observation() {
        let map = ReconciliationMap::from_created([("tmp_1", "w_42")]);

        let mut walk = Walk {
            id: EntityId::provisional("tmp_1"),
            fields: WalkFields::new("ana", "Forest loop", Utc::now()),
            pending_sync: true,
        };
        assert!(map.rewrite_walk(&mut walk));
        assert_eq!(walk.id, EntityId::permanent("w_42"));
        assert!(!map.rewrite_walk(&mut walk));

        let mut observation = observation_on(EntityId::provisional("tmp_1"));
        assert!(map.rewrite_observation(&mut observation));
        assert_eq!(observation.walk_id, EntityId::permanent("w_42"));

        let mut unrelated = observation_on(EntityId::provisional("tmp_9"));
        assert!(!map.rewrite_observation(&mut unrelated));
    }

    #[test]
    fn rewrites_pending_entries() {
        let map = ReconciliationMap::from_created([("tmp_1", "w_42")]);
        let now = Utc::now();

        let mut update = PendingSyncItem::new(
            5,
            EntityId::provisional("tmp_1"),
            Mutation::WalkUpdate {
                patch: WalkPatch::append_points(Vec::new()),
            },
            now,
        );
        assert!(map.rewrite_pending(&mut update));
        assert_eq!(update.entity_id, EntityId::permanent("w_42"));

        let observation = observation_on(EntityId::provisional("tmp_1"));
        let mut create = PendingSyncItem::new(
            6,
            observation.id.clone(),
            Mutation::ObservationCreate {
                walk_id: observation.walk_id.clone(),
                observation: observation.fields.clone(),
            },
            now,
        );
        assert!(map.rewrite_pending(&mut create));
        assert_eq!(create.entity_id, EntityId::provisional("tmp_a"));
        assert!(matches!(
            create.mutation,
            Mutation::ObservationCreate { ref walk_id, .. } if *walk_id == EntityId::permanent("w_42")
        ));
    }
}
