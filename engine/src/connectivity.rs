//! Connectivity monitor.
//!
//! The host platform reports reachability through [`ConnectivityMonitor::set_online`];
//! the monitor keeps the current value and tells subscribers about
//! offline→online edges. It never retries anything itself.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Shared online/offline state.
///
/// Cheap to clone; all clones observe the same state.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    state: Arc<watch::Sender<Link>>,
}

/// Current reachability plus a count of reconnects, so that a quick
/// offline→online flip is never lost to watch-channel coalescing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Link {
    online: bool,
    reconnects: u64,
}

impl ConnectivityMonitor {
    pub fn new(online: bool) -> Self {
        let (state, _) = watch::channel(Link {
            online,
            reconnects: 0,
        });
        Self {
            state: Arc::new(state),
        }
    }

    pub fn is_online(&self) -> bool {
        self.state.borrow().online
    }

    /// Record the current connectivity. Returns true if it changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.state.send_if_modified(|link| {
            if link.online == online {
                return false;
            }
            link.online = online;
            if online {
                link.reconnects += 1;
            }
            true
        });
        if changed {
            if online {
                tracing::info!("Connectivity restored");
            } else {
                tracing::info!("Connectivity lost");
            }
        }
        changed
    }

    /// Stream of offline→online transitions observed from now on.
    pub fn transitions(&self) -> OnlineTransitions {
        let rx = self.state.subscribe();
        let seen = rx.borrow().reconnects;
        OnlineTransitions { rx, seen }
    }

    /// Run `handler` on every offline→online transition.
    ///
    /// The returned task ends when every monitor clone has been dropped.
    pub fn on_online_transition<F, Fut>(&self, mut handler: F) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut transitions = self.transitions();
        tokio::spawn(async move {
            while transitions.next().await.is_some() {
                handler().await;
            }
        })
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Edge-triggered view of a [`ConnectivityMonitor`].
#[derive(Debug)]
pub struct OnlineTransitions {
    rx: watch::Receiver<Link>,
    seen: u64,
}

impl OnlineTransitions {
    /// Wait for the next offline→online edge.
    ///
    /// Several edges that happen before the caller gets here are reported
    /// once. Returns `None` once the monitor is gone.
    pub async fn next(&mut self) -> Option<()> {
        loop {
            self.rx.changed().await.ok()?;
            let reconnects = self.rx.borrow_and_update().reconnects;
            if reconnects > self.seen {
                self.seen = reconnects;
                return Some(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn reports_current_state() {
        let monitor = ConnectivityMonitor::new(false);
        assert!(!monitor.is_online());
        assert!(monitor.set_online(true));
        assert!(monitor.is_online());
        assert!(!monitor.set_online(true));
    }

    #[tokio::test]
    async fn only_offline_to_online_edges_are_reported() {
        let monitor = ConnectivityMonitor::new(true);
        let mut transitions = monitor.transitions();

        monitor.set_online(false);
        monitor.set_online(true);

        tokio::time::timeout(Duration::from_secs(1), transitions.next())
            .await
            .expect("transition not reported")
            .unwrap();

        monitor.set_online(false);
        let nothing = tokio::time::timeout(Duration::from_millis(50), transitions.next()).await;
        assert!(nothing.is_err());
    }

    #[tokio::test]
    async fn handler_runs_on_transition() {
        let monitor = ConnectivityMonitor::new(false);
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let counted = calls.clone();
        let _task = monitor.on_online_transition(move || {
            let counted = counted.clone();
            let tx = tx.clone();
            async move {
                counted.fetch_add(1, Ordering::SeqCst);
                let _ = tx.send(());
            }
        });

        monitor.set_online(true);
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stream_ends_when_monitor_dropped() {
        let monitor = ConnectivityMonitor::new(false);
        let mut transitions = monitor.transitions();
        drop(monitor);
        assert!(transitions.next().await.is_none());
    }
}
