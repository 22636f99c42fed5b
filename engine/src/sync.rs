//! The sync engine.
//!
//! [`SyncEngine`] owns the pending-sync queue. Producers append to it through
//! the `enqueue_*` methods, which write the local record and the queue entry
//! in one batch. [`SyncEngine::run_sync_pass`] replays the queue against the
//! remote store in three phases:
//!
//! 1. **Snapshot**: read and order the queue under the store lock.
//! 2. **Replay**: one remote call at a time, with the lock released. Results
//!    are collected in memory; nothing is written yet.
//! 3. **Commit**: re-read the queue under the lock and apply every removal,
//!    id rewrite and bookkeeping update in a single [`WriteBatch`].
//!
//! Entries enqueued while a pass is replaying are left alone by its commit and
//! picked up by the next pass.
//!
//! Every reconciled provisional id is kept as an alias of its permanent id, so
//! the handle returned by an `enqueue_*` call stays usable after a pass has
//! re-keyed the entity.

use crate::{
    config::SyncConfig,
    connectivity::ConnectivityMonitor,
    error::{RemoteError, Result},
    queue::{self, EntityType, QueueKey, SyncAction},
    reconcile::ReconciliationMap,
    remote::RemoteStore,
    store::{get_record, list_records, Collection, DurableStore, WriteBatch},
    EntityId, Error, Mutation, Observation, ObservationFields, PendingSyncItem, Walk, WalkFields,
    WalkPatch,
};
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::Notify;

// ============================================================================
// Pass results
// ============================================================================

/// Why a queue entry did not sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFailure {
    pub seq: u64,
    pub entity_type: EntityType,
    pub action: SyncAction,
    pub entity_id: EntityId,
    pub error: RemoteError,
}

/// Summary of one sync pass.
///
/// A pass with failures is still a completed pass; see
/// [`SyncReport::is_partial_failure`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Entries for which a remote call was made (or would have been, had the
    /// device stayed online)
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Entries left untouched because a walk they depend on has no permanent id yet
    pub skipped: usize,
    /// Entries moved to the dead letters by this pass
    pub dead_lettered: usize,
    pub failures: Vec<ItemFailure>,
}

impl SyncReport {
    pub fn is_partial_failure(&self) -> bool {
        self.failed > 0
    }
}

/// Result of asking for a sync pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SyncOutcome {
    /// The pass ran to completion and its results were committed.
    Completed(SyncReport),
    /// Another pass was already running; this request was a no-op.
    Coalesced,
}

impl SyncOutcome {
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::Completed(report) => Some(report),
            SyncOutcome::Coalesced => None,
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Offline-first mutation queue and replay engine.
pub struct SyncEngine<S, R> {
    store: Mutex<S>,
    remote: R,
    connectivity: ConnectivityMonitor,
    config: SyncConfig,
    in_flight: AtomicBool,
    next_seq: AtomicU64,
    enqueued: Notify,
}

impl<S: DurableStore, R: RemoteStore> SyncEngine<S, R> {
    /// Create an engine over an existing store.
    ///
    /// Fails with [`Error::StoreCorruption`] if the queue cannot be decoded.
    pub fn new(
        store: S,
        remote: R,
        connectivity: ConnectivityMonitor,
        config: SyncConfig,
    ) -> Result<Self> {
        let queued: Vec<PendingSyncItem> = list_records(&store, Collection::PendingSync)?;
        let dead: Vec<PendingSyncItem> = list_records(&store, Collection::DeadLetters)?;
        let last_seq = queued.iter().chain(&dead).map(|item| item.seq).max().unwrap_or(0);

        tracing::debug!(
            pending = queued.len(),
            dead_letters = dead.len(),
            "Sync engine opened"
        );

        Ok(Self {
            store: Mutex::new(store),
            remote,
            connectivity,
            config,
            in_flight: AtomicBool::new(false),
            next_seq: AtomicU64::new(last_seq + 1),
            enqueued: Notify::new(),
        })
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// Whether a pass is currently replaying.
    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Resolves once something has been enqueued since the last call.
    pub(crate) async fn enqueued(&self) {
        self.enqueued.notified().await
    }

    fn allocate_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::SeqCst)
    }

    // ========================================================================
    // Producers
    // ========================================================================

    /// Record a new walk locally and queue its creation.
    pub fn enqueue_walk_create(&self, walk: WalkFields) -> Result<EntityId> {
        walk.validate()?;

        let id = EntityId::new_provisional();
        let item = PendingSyncItem::new(
            self.allocate_seq(),
            id.clone(),
            Mutation::WalkCreate { walk: walk.clone() },
            Utc::now(),
        );
        let record = Walk {
            id: id.clone(),
            fields: walk,
            pending_sync: true,
        };

        let mut batch = WriteBatch::new();
        batch.put_record(Collection::Walks, id.storage_key(), &record)?;
        batch.put_record(Collection::PendingSync, item.storage_key(), &item)?;
        self.store.lock().apply(batch)?;

        tracing::debug!(seq = item.seq, walk = %id, "Queued walk create");
        self.enqueued.notify_one();
        Ok(id)
    }

    /// Apply a partial update to a local walk and queue it.
    pub fn enqueue_walk_update(&self, id: &EntityId, patch: WalkPatch) -> Result<()> {
        patch.validate()?;

        let mut store = self.store.lock();
        let id = resolve_alias(&*store, id)?;
        let mut walk: Walk = get_record(&*store, Collection::Walks, &id.storage_key())?
            .ok_or_else(|| Error::RecordNotFound(id.to_string()))?;
        patch.apply_to(&mut walk.fields);
        walk.fields.validate()?;
        walk.pending_sync = true;

        let item = PendingSyncItem::new(
            self.allocate_seq(),
            id.clone(),
            Mutation::WalkUpdate { patch },
            Utc::now(),
        );

        let mut batch = WriteBatch::new();
        batch.put_record(Collection::Walks, id.storage_key(), &walk)?;
        batch.put_record(Collection::PendingSync, item.storage_key(), &item)?;
        store.apply(batch)?;
        drop(store);

        tracing::debug!(seq = item.seq, walk = %id, "Queued walk update");
        self.enqueued.notify_one();
        Ok(())
    }

    /// Record a new observation under a local walk and queue its creation.
    pub fn enqueue_observation_create(
        &self,
        walk_id: &EntityId,
        observation: ObservationFields,
    ) -> Result<EntityId> {
        observation.validate()?;

        let mut store = self.store.lock();
        let walk_id = resolve_alias(&*store, walk_id)?;
        if store.get(Collection::Walks, &walk_id.storage_key())?.is_none() {
            return Err(Error::RecordNotFound(walk_id.to_string()));
        }

        let id = EntityId::new_provisional();
        let item = PendingSyncItem::new(
            self.allocate_seq(),
            id.clone(),
            Mutation::ObservationCreate {
                walk_id: walk_id.clone(),
                observation: observation.clone(),
            },
            Utc::now(),
        );
        let record = Observation {
            id: id.clone(),
            walk_id: walk_id.clone(),
            fields: observation,
            pending_sync: true,
        };

        let mut batch = WriteBatch::new();
        batch.put_record(Collection::Observations, id.storage_key(), &record)?;
        batch.put_record(Collection::PendingSync, item.storage_key(), &item)?;
        store.apply(batch)?;
        drop(store);

        tracing::debug!(seq = item.seq, observation = %id, walk = %walk_id, "Queued observation create");
        self.enqueued.notify_one();
        Ok(id)
    }

    /// Number of entries waiting to sync. Dead letters are not counted.
    pub fn pending_count(&self) -> Result<usize> {
        self.store.lock().count(Collection::PendingSync)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// The id an entity is stored under now: the permanent id once a pass
    /// has reconciled it, otherwise `id` itself.
    pub fn resolve_id(&self, id: &EntityId) -> Result<EntityId> {
        resolve_alias(&*self.store.lock(), id)
    }

    pub fn walk(&self, id: &EntityId) -> Result<Option<Walk>> {
        let store = self.store.lock();
        let id = resolve_alias(&*store, id)?;
        get_record(&*store, Collection::Walks, &id.storage_key())
    }

    pub fn walks(&self) -> Result<Vec<Walk>> {
        list_records(&*self.store.lock(), Collection::Walks)
    }

    pub fn observation(&self, id: &EntityId) -> Result<Option<Observation>> {
        let store = self.store.lock();
        let id = resolve_alias(&*store, id)?;
        get_record(&*store, Collection::Observations, &id.storage_key())
    }

    /// Observations recorded under `walk_id`, in storage key order.
    pub fn observations_for_walk(&self, walk_id: &EntityId) -> Result<Vec<Observation>> {
        let store = self.store.lock();
        let target = serde_json::to_value(resolve_alias(&*store, walk_id)?)?;
        store
            .list(Collection::Observations, &|value| value.get("walkId") == Some(&target))?
            .into_iter()
            .map(|value| serde_json::from_value(value).map_err(Error::from))
            .collect()
    }

    /// Queue entries in replay order.
    pub fn pending_items(&self) -> Result<Vec<PendingSyncItem>> {
        let items = list_records(&*self.store.lock(), Collection::PendingSync)?;
        Ok(queue::replay_order(items))
    }

    /// Entries parked after too many rejections, in sequence order.
    pub fn dead_letters(&self) -> Result<Vec<PendingSyncItem>> {
        list_records(&*self.store.lock(), Collection::DeadLetters)
    }

    // ========================================================================
    // Dead letters
    // ========================================================================

    /// Move a dead letter back into the queue with its rejection count reset.
    ///
    /// It keeps its original enqueue time and therefore its replay position.
    /// Requeueing a walk create also requeues the entries parked with it.
    pub fn requeue_dead_letter(&self, seq: u64) -> Result<()> {
        let key = queue::storage_key(seq);
        let mut store = self.store.lock();
        let item: PendingSyncItem = get_record(&*store, Collection::DeadLetters, &key)?
            .ok_or(Error::DeadLetterNotFound(seq))?;

        let mut batch = WriteBatch::new();
        let mut requeued = 0;
        for mut entry in list_records::<PendingSyncItem, _>(&*store, Collection::DeadLetters)? {
            if entry.seq != seq && !depends_on(&entry, &item) {
                continue;
            }
            entry.rejections = 0;
            entry.last_error = None;
            batch.remove(Collection::DeadLetters, entry.storage_key());
            batch.put_record(Collection::PendingSync, entry.storage_key(), &entry)?;
            requeued += 1;
        }
        store.apply(batch)?;
        drop(store);

        tracing::info!(seq, entity = %item.entity_id, requeued, "Requeued dead letter");
        self.enqueued.notify_one();
        Ok(())
    }

    /// Drop a dead letter for good. The local record stays, with
    /// `pending_sync` cleared once nothing else targets it.
    ///
    /// Discarding a walk create also drops every queued or parked entry that
    /// depends on it, since none of them could ever sync.
    pub fn discard_dead_letter(&self, seq: u64) -> Result<()> {
        let key = queue::storage_key(seq);
        let mut store = self.store.lock();
        let item: PendingSyncItem = get_record(&*store, Collection::DeadLetters, &key)?
            .ok_or(Error::DeadLetterNotFound(seq))?;

        let mut batch = WriteBatch::new();
        let mut discarded = Vec::new();
        let mut remaining = Vec::new();
        for collection in [Collection::PendingSync, Collection::DeadLetters] {
            for entry in list_records::<PendingSyncItem, _>(&*store, collection)? {
                if entry.seq == seq || depends_on(&entry, &item) {
                    batch.remove(collection, entry.storage_key());
                    discarded.push(entry);
                } else {
                    remaining.push(entry);
                }
            }
        }

        for entry in &discarded {
            let still_pending = targets_any(&remaining, entry.entity_type(), &entry.entity_id);
            let entity_key = entry.entity_id.storage_key();
            match entry.entity_type() {
                EntityType::Walk => {
                    if let Some(mut walk) = get_record::<Walk, _>(&*store, Collection::Walks, &entity_key)? {
                        walk.pending_sync = still_pending;
                        batch.put_record(Collection::Walks, entity_key, &walk)?;
                    }
                }
                EntityType::Observation => {
                    if let Some(mut observation) =
                        get_record::<Observation, _>(&*store, Collection::Observations, &entity_key)?
                    {
                        observation.pending_sync = still_pending;
                        batch.put_record(Collection::Observations, entity_key, &observation)?;
                    }
                }
            }
        }
        store.apply(batch)?;

        tracing::warn!(
            seq,
            entity = %item.entity_id,
            discarded = discarded.len(),
            "Discarded dead letter"
        );
        Ok(())
    }

    // ========================================================================
    // Sync pass
    // ========================================================================

    /// Replay the queue against the remote store and commit the results.
    ///
    /// Remote failures are reported in the returned [`SyncReport`] and the
    /// affected entries stay queued. Only [`Error::Offline`] and store
    /// failures are returned as errors; a store failure commits nothing.
    pub async fn run_sync_pass(&self) -> Result<SyncOutcome> {
        if !self.connectivity.is_online() {
            tracing::debug!("Sync pass refused while offline");
            return Err(Error::Offline);
        }
        let Some(_guard) = PassGuard::acquire(&self.in_flight) else {
            tracing::debug!("Sync pass already running, request coalesced");
            return Ok(SyncOutcome::Coalesced);
        };

        let started = Instant::now();
        let items = {
            let store = self.store.lock();
            queue::replay_order(list_records(&*store, Collection::PendingSync)?)
        };
        if items.is_empty() {
            return Ok(SyncOutcome::Completed(SyncReport::default()));
        }

        let mut pass = Pass::default();
        for item in &items {
            self.replay(item, &mut pass).await;
        }

        self.commit(&mut pass)?;

        let report = pass.report;
        tracing::info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            dead_lettered = report.dead_lettered,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Sync pass complete"
        );
        Ok(SyncOutcome::Completed(report))
    }

    async fn replay(&self, item: &PendingSyncItem, pass: &mut Pass) {
        if pass.blocked.contains(&item.entity_id) {
            pass.skip(item, "an earlier entry for this entity did not sync");
            return;
        }

        match &item.mutation {
            Mutation::WalkCreate { walk } => {
                if !self.still_online(item, pass) {
                    return;
                }
                match self.remote.create_walk(item.entity_id.as_str(), walk).await {
                    Ok(permanent) => {
                        if let EntityId::Provisional(provisional) = &item.entity_id {
                            pass.ids.record(provisional.clone(), permanent.clone());
                        }
                        pass.succeed(item);
                        if let Some(completion) = WalkPatch::completion_of(walk) {
                            self.complete_created_walk(permanent, completion, pass).await;
                        }
                    }
                    Err(error) => pass.fail(item, error),
                }
            }
            Mutation::WalkUpdate { patch } => {
                let Some(target) = pass.ids.resolve(&item.entity_id) else {
                    pass.skip(item, "walk has no permanent id yet");
                    return;
                };
                if !self.still_online(item, pass) {
                    return;
                }
                match self.remote.update_walk(&target, patch).await {
                    Ok(()) => pass.succeed(item),
                    Err(error) => pass.fail(item, error),
                }
            }
            Mutation::ObservationCreate {
                walk_id,
                observation,
            } => {
                let Some(parent) = pass.ids.resolve(walk_id) else {
                    pass.skip(item, "parent walk has no permanent id yet");
                    return;
                };
                if !self.still_online(item, pass) {
                    return;
                }
                match self
                    .remote
                    .create_observation(item.entity_id.as_str(), &parent, observation)
                    .await
                {
                    Ok(permanent) => {
                        if let EntityId::Provisional(provisional) = &item.entity_id {
                            pass.observations.insert(provisional.clone(), permanent);
                        }
                        pass.succeed(item);
                    }
                    Err(error) => pass.fail(item, error),
                }
            }
        }
    }

    /// Connectivity can drop while a pass is replaying. Entries reached after
    /// that are failed without a remote call.
    fn still_online(&self, item: &PendingSyncItem, pass: &mut Pass) -> bool {
        if self.connectivity.is_online() {
            return true;
        }
        pass.fail(
            item,
            RemoteError::Unavailable("connectivity lost during sync pass".into()),
        );
        false
    }

    /// Send the end-of-walk fields of a walk that was created already
    /// completed. On failure they are queued as an update at commit.
    async fn complete_created_walk(&self, walk_id: String, completion: WalkPatch, pass: &mut Pass) {
        match self.remote.update_walk(&walk_id, &completion).await {
            Ok(()) => tracing::debug!(walk = %walk_id, "Sent completion for created walk"),
            Err(error) => {
                tracing::warn!(walk = %walk_id, %error, "Completion update failed, queued for retry");
                pass.follow_ups.push((walk_id, completion));
            }
        }
    }

    fn commit(&self, pass: &mut Pass) -> Result<()> {
        let mut store = self.store.lock();
        let queued: Vec<PendingSyncItem> = list_records(&*store, Collection::PendingSync)?;
        let mut dead: Vec<PendingSyncItem> = list_records(&*store, Collection::DeadLetters)?;
        let mut batch = WriteBatch::new();
        let mut remaining = Vec::with_capacity(queued.len());

        for mut item in queued {
            let key = item.key();
            if pass.succeeded.contains(&key) {
                batch.remove(Collection::PendingSync, item.storage_key());
                continue;
            }

            let mut changed = false;
            if let Some(error) = pass.failed.get(&key) {
                item.attempts += 1;
                if error.is_rejection() {
                    item.rejections += 1;
                }
                item.last_error = Some(error.to_string());
                changed = true;

                if self.config.is_exhausted(item.rejections) {
                    tracing::warn!(
                        seq = item.seq,
                        entity = %item.entity_id,
                        rejections = item.rejections,
                        "Moving entry to dead letters"
                    );
                    pass.ids.rewrite_pending(&mut item);
                    batch.remove(Collection::PendingSync, item.storage_key());
                    batch.put_record(Collection::DeadLetters, item.storage_key(), &item)?;
                    pass.report.dead_lettered += 1;
                    dead.push(item);
                    continue;
                }
            }

            changed |= pass.ids.rewrite_pending(&mut item);
            if changed {
                batch.put_record(Collection::PendingSync, item.storage_key(), &item)?;
            }
            remaining.push(item);
        }

        // Entries that depend on a parked walk create would be skipped forever.
        let parked: Vec<PendingSyncItem> = dead
            .iter()
            .filter(|item| matches!(item.mutation, Mutation::WalkCreate { .. }))
            .cloned()
            .collect();
        if !parked.is_empty() {
            let (stranded, kept): (Vec<_>, Vec<_>) = remaining
                .into_iter()
                .partition(|item| parked.iter().any(|parent| depends_on(item, parent)));
            remaining = kept;
            for mut item in stranded {
                tracing::warn!(
                    seq = item.seq,
                    entity = %item.entity_id,
                    "Moving entry to dead letters with its walk"
                );
                item.last_error = Some("walk create is in the dead letters".into());
                batch.remove(Collection::PendingSync, item.storage_key());
                batch.put_record(Collection::DeadLetters, item.storage_key(), &item)?;
                pass.report.dead_lettered += 1;
                dead.push(item);
            }
        }

        for item in dead.iter_mut() {
            if pass.ids.rewrite_pending(item) {
                batch.put_record(Collection::DeadLetters, item.storage_key(), &*item)?;
            }
        }

        for (walk_id, completion) in pass.follow_ups.drain(..) {
            let item = PendingSyncItem::new(
                self.allocate_seq(),
                EntityId::permanent(walk_id),
                Mutation::WalkUpdate { patch: completion },
                Utc::now(),
            );
            batch.put_record(Collection::PendingSync, item.storage_key(), &item)?;
            remaining.push(item);
        }

        if !pass.ids.is_empty() || !pass.observations.is_empty() {
            let aliases = pass
                .ids
                .iter()
                .chain(pass.observations.iter().map(|(p, r)| (p.as_str(), r.as_str())));
            for (provisional, permanent) in aliases {
                batch.put_record(Collection::IdAliases, provisional, &EntityId::permanent(permanent))?;
            }
        }

        let live: Vec<&PendingSyncItem> = remaining.iter().chain(&dead).collect();

        for mut walk in list_records::<Walk, _>(&*store, Collection::Walks)? {
            let old_key = walk.id.storage_key();
            let rekeyed = pass.ids.rewrite_walk(&mut walk);
            let pending = live
                .iter()
                .any(|item| targets(item, EntityType::Walk, &walk.id));
            let flag_changed = walk.pending_sync != pending;
            walk.pending_sync = pending;

            if rekeyed {
                batch.remove(Collection::Walks, old_key);
            }
            if rekeyed || flag_changed {
                batch.put_record(Collection::Walks, walk.id.storage_key(), &walk)?;
            }
        }

        for mut observation in list_records::<Observation, _>(&*store, Collection::Observations)? {
            let old_key = observation.id.storage_key();
            let mut rekeyed = false;
            if let EntityId::Provisional(provisional) = &observation.id {
                if let Some(permanent) = pass.observations.get(provisional) {
                    observation.id = EntityId::permanent(permanent.clone());
                    rekeyed = true;
                }
            }
            let parent_changed = pass.ids.rewrite_observation(&mut observation);
            let pending = live
                .iter()
                .any(|item| targets(item, EntityType::Observation, &observation.id));
            let flag_changed = observation.pending_sync != pending;
            observation.pending_sync = pending;

            if rekeyed {
                batch.remove(Collection::Observations, old_key);
            }
            if rekeyed || parent_changed || flag_changed {
                batch.put_record(
                    Collection::Observations,
                    observation.id.storage_key(),
                    &observation,
                )?;
            }
        }

        tracing::debug!(writes = batch.len(), reconciled = pass.ids.len(), "Committing sync pass");
        store.apply(batch)
    }
}

/// Whether `item` is a mutation of the entity `(entity_type, id)` itself.
fn targets(item: &PendingSyncItem, entity_type: EntityType, id: &EntityId) -> bool {
    item.entity_type() == entity_type && &item.entity_id == id
}

fn targets_any(items: &[PendingSyncItem], entity_type: EntityType, id: &EntityId) -> bool {
    items.iter().any(|item| targets(item, entity_type, id))
}

/// Whether `item` can only sync after the walk create `parent` has.
fn depends_on(item: &PendingSyncItem, parent: &PendingSyncItem) -> bool {
    matches!(parent.mutation, Mutation::WalkCreate { .. })
        && item.seq != parent.seq
        && item.references(&parent.entity_id)
}

/// Follow a reconciled provisional id to its permanent id.
fn resolve_alias<S: DurableStore + ?Sized>(store: &S, id: &EntityId) -> Result<EntityId> {
    match id {
        EntityId::Provisional(value) => {
            Ok(get_record(store, Collection::IdAliases, value)?.unwrap_or_else(|| id.clone()))
        }
        EntityId::Permanent(_) => Ok(id.clone()),
    }
}

/// In-memory results of the replay phase.
#[derive(Default)]
struct Pass {
    ids: ReconciliationMap,
    /// Provisional observation id → permanent id
    observations: HashMap<String, String>,
    succeeded: HashSet<QueueKey>,
    failed: HashMap<QueueKey, RemoteError>,
    /// Entities with an entry that failed or was skipped this pass
    blocked: HashSet<EntityId>,
    /// Completion updates to queue for walks created this pass
    follow_ups: Vec<(String, WalkPatch)>,
    report: SyncReport,
}

impl Pass {
    fn succeed(&mut self, item: &PendingSyncItem) {
        tracing::debug!(seq = item.seq, entity = %item.entity_id, action = ?item.action(), "Synced entry");
        self.report.attempted += 1;
        self.report.succeeded += 1;
        self.succeeded.insert(item.key());
    }

    fn fail(&mut self, item: &PendingSyncItem, error: RemoteError) {
        tracing::warn!(seq = item.seq, entity = %item.entity_id, %error, "Entry failed to sync");
        self.report.attempted += 1;
        self.report.failed += 1;
        self.report.failures.push(ItemFailure {
            seq: item.seq,
            entity_type: item.entity_type(),
            action: item.action(),
            entity_id: item.entity_id.clone(),
            error: error.clone(),
        });
        self.blocked.insert(item.entity_id.clone());
        self.failed.insert(item.key(), error);
    }

    fn skip(&mut self, item: &PendingSyncItem, reason: &str) {
        tracing::warn!(seq = item.seq, entity = %item.entity_id, reason, "Entry skipped");
        self.report.skipped += 1;
        self.blocked.insert(item.entity_id.clone());
    }
}

/// Holds the in-flight flag for the duration of a pass.
struct PassGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> PassGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
