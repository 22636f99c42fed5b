//! In-process [`RemoteStore`].
//!
//! Behaves like the reference server: ids are assigned on create, a repeated
//! client reference returns the id assigned the first time, and an
//! observation under an unknown walk is rejected. Failures can be scripted
//! per call, which makes it the backend of choice for tests and demos.

use crate::{
    error::RemoteError,
    remote::{RemoteResult, RemoteStore},
    ObservationFields, WalkFields, WalkPatch,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

/// A call received by a [`MemoryRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    CreateWalk { client_ref: String },
    UpdateWalk { id: String },
    CreateObservation { client_ref: String, walk_id: String },
}

/// Selects the calls a scripted failure applies to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FailOn {
    CreateWalk(String),
    UpdateWalk(String),
    CreateObservation(String),
}

#[derive(Debug, Default)]
struct State {
    next_walk: u64,
    next_observation: u64,
    walks: HashMap<String, WalkFields>,
    observations: HashMap<String, (String, ObservationFields)>,
    client_refs: HashMap<String, String>,
    calls: Vec<RemoteCall>,
    failures: HashMap<FailOn, RemoteError>,
    outage: Option<RemoteError>,
}

/// Remote store kept entirely in memory.
#[derive(Debug)]
pub struct MemoryRemote {
    state: Mutex<State>,
    latency: Duration,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    /// Ids start at `w_1` and `o_1`.
    pub fn new() -> Self {
        Self::starting_at(1, 1)
    }

    /// Ids start at `w_{walk}` and `o_{observation}`.
    pub fn starting_at(walk: u64, observation: u64) -> Self {
        Self {
            state: Mutex::new(State {
                next_walk: walk,
                next_observation: observation,
                ..State::default()
            }),
            latency: Duration::ZERO,
        }
    }

    /// Delay every call by `latency` before it is handled.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail matching calls with `error` until [`clear_failures`](Self::clear_failures).
    pub fn fail_on(&self, target: FailOn, error: RemoteError) {
        self.state.lock().failures.insert(target, error);
    }

    /// Fail every call with `error`, or stop doing so with `None`.
    pub fn set_outage(&self, error: Option<RemoteError>) {
        self.state.lock().outage = error;
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.failures.clear();
        state.outage = None;
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state.lock().calls.clone()
    }

    pub fn walk(&self, id: &str) -> Option<WalkFields> {
        self.state.lock().walks.get(id).cloned()
    }

    pub fn walk_count(&self) -> usize {
        self.state.lock().walks.len()
    }

    /// Parent walk id and fields of an observation.
    pub fn observation(&self, id: &str) -> Option<(String, ObservationFields)> {
        self.state.lock().observations.get(id).cloned()
    }

    pub fn observation_count(&self) -> usize {
        self.state.lock().observations.len()
    }

    async fn delay(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

impl State {
    fn scripted(&self, target: FailOn) -> RemoteResult<()> {
        if let Some(error) = &self.outage {
            return Err(error.clone());
        }
        match self.failures.get(&target) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn create_walk(&self, client_ref: &str, walk: &WalkFields) -> RemoteResult<String> {
        self.delay().await;
        let mut state = self.state.lock();
        state.calls.push(RemoteCall::CreateWalk {
            client_ref: client_ref.to_string(),
        });
        state.scripted(FailOn::CreateWalk(client_ref.to_string()))?;

        if let Some(id) = state.client_refs.get(client_ref) {
            return Ok(id.clone());
        }
        let id = format!("w_{}", state.next_walk);
        state.next_walk += 1;
        state.walks.insert(id.clone(), walk.clone());
        state.client_refs.insert(client_ref.to_string(), id.clone());
        Ok(id)
    }

    async fn update_walk(&self, id: &str, patch: &WalkPatch) -> RemoteResult<()> {
        self.delay().await;
        let mut state = self.state.lock();
        state.calls.push(RemoteCall::UpdateWalk { id: id.to_string() });
        state.scripted(FailOn::UpdateWalk(id.to_string()))?;

        let walk = state
            .walks
            .get_mut(id)
            .ok_or_else(|| RemoteError::Rejected(format!("walk not found: {id}")))?;
        patch.apply_to(walk);
        Ok(())
    }

    async fn create_observation(
        &self,
        client_ref: &str,
        walk_id: &str,
        observation: &ObservationFields,
    ) -> RemoteResult<String> {
        self.delay().await;
        let mut state = self.state.lock();
        state.calls.push(RemoteCall::CreateObservation {
            client_ref: client_ref.to_string(),
            walk_id: walk_id.to_string(),
        });
        state.scripted(FailOn::CreateObservation(client_ref.to_string()))?;

        if let Some(id) = state.client_refs.get(client_ref) {
            return Ok(id.clone());
        }
        if !state.walks.contains_key(walk_id) {
            return Err(RemoteError::Rejected(format!("walk not found: {walk_id}")));
        }
        let id = format!("o_{}", state.next_observation);
        state.next_observation += 1;
        state
            .observations
            .insert(id.clone(), (walk_id.to_string(), observation.clone()));
        state.client_refs.insert(client_ref.to_string(), id.clone());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Location;
    use chrono::Utc;

    fn walk() -> WalkFields {
        WalkFields::new("ana", "Forest loop", Utc::now())
    }

    #[tokio::test]
    async fn create_is_idempotent_by_client_ref() {
        let remote = MemoryRemote::starting_at(42, 7);
        let first = remote.create_walk("tmp_1", &walk()).await.unwrap();
        let again = remote.create_walk("tmp_1", &walk()).await.unwrap();

        assert_eq!(first, "w_42");
        assert_eq!(again, "w_42");
        assert_eq!(remote.walk_count(), 1);
        assert_eq!(remote.calls().len(), 2);
    }

    #[tokio::test]
    async fn observation_under_unknown_walk_is_rejected() {
        let remote = MemoryRemote::new();
        let observation =
            ObservationFields::new("ana", "Oak", "plant", Location::new(51.0, 0.0), Utc::now());

        let err = remote
            .create_observation("tmp_a", "w_9", &observation)
            .await
            .unwrap_err();
        assert!(err.is_rejection());
        assert_eq!(remote.observation_count(), 0);
    }

    #[tokio::test]
    async fn scripted_failures_until_cleared() {
        let remote = MemoryRemote::new();
        remote.fail_on(
            FailOn::CreateWalk("tmp_1".into()),
            RemoteError::Unavailable("503".into()),
        );

        assert!(remote.create_walk("tmp_1", &walk()).await.is_err());
        assert!(remote.create_walk("tmp_2", &walk()).await.is_ok());

        remote.clear_failures();
        assert!(remote.create_walk("tmp_1", &walk()).await.is_ok());
    }

    #[tokio::test]
    async fn outage_fails_everything() {
        let remote = MemoryRemote::new();
        remote.set_outage(Some(RemoteError::Unavailable("down".into())));
        assert!(remote.update_walk("w_1", &WalkPatch::default()).await.is_err());

        remote.set_outage(None);
        let err = remote.update_walk("w_1", &WalkPatch::default()).await.unwrap_err();
        assert_eq!(err, RemoteError::Rejected("walk not found: w_1".into()));
    }
}
