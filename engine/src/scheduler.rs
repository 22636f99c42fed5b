//! Automatic sync triggers.
//!
//! A background task runs a pass whenever connectivity comes back, something
//! is enqueued, or the periodic timer fires, provided the device is online.
//! Triggers that arrive during a pass are coalesced by the engine.

use crate::{remote::RemoteStore, store::DurableStore, Error, SyncEngine, SyncOutcome};
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// What woke the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Reconnected,
    Enqueued,
    Timer,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trigger::Reconnected => "reconnected",
            Trigger::Enqueued => "enqueued",
            Trigger::Timer => "timer",
        })
    }
}

/// Handle to the background sync task. Dropping it stops the task.
#[derive(Debug)]
pub struct AutoSync {
    handle: JoinHandle<()>,
}

impl AutoSync {
    pub fn stop(self) {}

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for AutoSync {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Start running passes for `engine` in the background.
pub fn spawn_auto_sync<S, R>(engine: Arc<SyncEngine<S, R>>) -> AutoSync
where
    S: DurableStore + 'static,
    R: RemoteStore + 'static,
{
    let mut transitions = engine.connectivity().transitions();
    let period = engine.config().sync_interval;

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let trigger = tokio::select! {
                edge = transitions.next() => match edge {
                    Some(()) => Trigger::Reconnected,
                    None => break,
                },
                _ = engine.enqueued() => Trigger::Enqueued,
                _ = ticker.tick() => Trigger::Timer,
            };

            if !engine.connectivity().is_online() {
                tracing::trace!(%trigger, "Offline, trigger ignored");
                continue;
            }

            match engine.run_sync_pass().await {
                Ok(SyncOutcome::Completed(report)) if report.is_partial_failure() => {
                    tracing::warn!(%trigger, failed = report.failed, "Automatic sync pass left failures queued");
                }
                Ok(SyncOutcome::Completed(_)) => {
                    tracing::debug!(%trigger, "Automatic sync pass finished");
                }
                Ok(SyncOutcome::Coalesced) | Err(Error::Offline) => {}
                Err(error) => {
                    tracing::error!(%trigger, %error, "Automatic sync pass aborted");
                }
            }
        }
    });

    AutoSync { handle }
}
