//! # Trailsync Engine
//!
//! Offline-first mutation queue and sync engine for a nature-walk journal.
//!
//! Walks and observations are recorded on the device first. Every change is
//! written to the local store together with a queued snapshot of the
//! mutation, so the app keeps working with no network at all. When the
//! device is online the engine replays the queue against the remote store,
//! swaps provisional ids for the permanent ids the backend assigns, and
//! prunes what went through.
//!
//! ## Design Principles
//!
//! - **Local first**: producers never wait on the network
//! - **Order preserving**: walks replay before observations, each type in
//!   enqueue order
//! - **Partial failure is normal**: one bad entry never blocks the rest
//! - **Atomic commit**: a pass's results land in the store all at once or
//!   not at all
//!
//! ## Core Concepts
//!
//! ### Identifiers
//!
//! An [`EntityId`] is either `Provisional` (minted on the device, `tmp_…`)
//! or `Permanent` (assigned by the backend). Provisional ids are never sent
//! to the backend as references to other entities.
//!
//! ### Queue
//!
//! Each [`PendingSyncItem`] holds a [`Mutation`] snapshot taken at enqueue
//! time. Entries are only removed once the remote store accepted them, or
//! moved to the dead letters after too many rejections (see [`SyncConfig`]).
//!
//! ### Sync pass
//!
//! [`SyncEngine::run_sync_pass`] replays the queue one entry at a time and
//! returns a [`SyncReport`]. Remote failures are counted, never raised.
//! Entries that depend on a walk without a permanent id are skipped and stay
//! queued. [`spawn_auto_sync`] runs passes on reconnect, on enqueue and on a
//! timer.
//!
//! ## Quick Start
//!
//! ```rust
//! use trailsync_engine::{
//!     ConnectivityMonitor, MemoryRemote, MemoryStore, SyncConfig, SyncEngine, WalkFields,
//! };
//! use chrono::Utc;
//!
//! # tokio_test();
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn tokio_test() {
//! // 1. Wire the engine to its collaborators
//! let connectivity = ConnectivityMonitor::new(false);
//! let engine = SyncEngine::new(
//!     MemoryStore::new(),
//!     MemoryRemote::new(),
//!     connectivity.clone(),
//!     SyncConfig::default(),
//! )
//! .unwrap();
//!
//! // 2. Record a walk while offline
//! let id = engine
//!     .enqueue_walk_create(WalkFields::new("ana", "Forest loop", Utc::now()))
//!     .unwrap();
//! assert!(id.is_provisional());
//! assert_eq!(engine.pending_count().unwrap(), 1);
//!
//! // 3. Come back online and sync
//! connectivity.set_online(true);
//! let outcome = engine.run_sync_pass().await.unwrap();
//! assert_eq!(outcome.report().unwrap().succeeded, 1);
//! assert_eq!(engine.pending_count().unwrap(), 0);
//! # }
//! ```
//!
//! ## Persistence
//!
//! [`FileStore`] keeps the store in a versioned JSON snapshot file
//! ([`StoreSnapshot`]). [`MemoryStore`] is the in-process equivalent.
//! [`HttpRemoteStore`] talks to the reference server; [`MemoryRemote`]
//! stands in for it in tests.

pub mod config;
pub mod connectivity;
pub mod error;
pub mod http;
pub mod id;
pub mod memory_remote;
pub mod model;
pub mod queue;
pub mod reconcile;
pub mod remote;
pub mod scheduler;
pub mod snapshot;
pub mod store;
pub mod sync;

// Re-export main types at crate root
pub use config::SyncConfig;
pub use connectivity::{ConnectivityMonitor, OnlineTransitions};
pub use error::{Error, RemoteError, Result};
pub use http::HttpRemoteStore;
pub use id::EntityId;
pub use memory_remote::{FailOn, MemoryRemote, RemoteCall};
pub use model::{
    Location, MediaRef, Observation, ObservationFields, PathPoint, Walk, WalkFields, WalkPatch,
    WeatherSnapshot,
};
pub use queue::{EntityType, Mutation, PendingSyncItem, QueueKey, SyncAction};
pub use reconcile::ReconciliationMap;
pub use remote::{RemoteResult, RemoteStore};
pub use scheduler::{spawn_auto_sync, AutoSync, Trigger};
pub use snapshot::{FileStore, StoreSnapshot, SNAPSHOT_FORMAT_VERSION};
pub use store::{Collection, DurableStore, MemoryStore, WriteBatch};
pub use sync::{ItemFailure, SyncEngine, SyncOutcome, SyncReport};
