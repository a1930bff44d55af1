//! services/guard/src/adapters/connectivity.rs
//!
//! Tracks whether the device can reach the network.
//!
//! Two signals are combined: a passive link flag, updated by link events and a
//! background watcher, and an active probe that calls the backend's health
//! endpoint with a short timeout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use patrol_core::ports::{ConnectivityProbe, PatrolApi};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A change of the network link reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Online,
    Offline,
}

pub struct ConnectivityMonitor {
    api: Arc<dyn PatrolApi>,
    probe_timeout: Duration,
    link: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    /// The link starts out as up.
    pub fn new(api: Arc<dyn PatrolApi>, probe_timeout: Duration) -> Self {
        let (link, _) = watch::channel(true);
        Self {
            api,
            probe_timeout,
            link,
        }
    }

    pub fn handle_event(&self, event: LinkEvent) {
        let online = event == LinkEvent::Online;
        let changed = self.link.send_if_modified(|current| {
            let changed = *current != online;
            *current = online;
            changed
        });
        if changed {
            if online {
                info!("Network link up");
            } else {
                warn!("Network link down");
            }
        }
    }

    /// Receives every change of the link flag.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.link.subscribe()
    }

    /// Periodically tries a TCP connection to `addr` and feeds the result in
    /// as link events until `cancel` fires.
    pub fn spawn_link_watcher(
        self: &Arc<Self>,
        addr: String,
        every: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Link watcher stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let connect = TcpStream::connect(addr.as_str());
                        let reachable = matches!(
                            tokio::time::timeout(monitor.probe_timeout, connect).await,
                            Ok(Ok(_))
                        );
                        monitor.handle_event(if reachable {
                            LinkEvent::Online
                        } else {
                            LinkEvent::Offline
                        });
                    }
                }
            }
        })
    }
}

#[async_trait]
impl ConnectivityProbe for ConnectivityMonitor {
    fn is_online(&self) -> bool {
        *self.link.borrow()
    }

    async fn probe(&self) -> bool {
        if !self.is_online() {
            return false;
        }
        match tokio::time::timeout(self.probe_timeout, self.api.health()).await {
            Ok(Ok(healthy)) => healthy,
            Ok(Err(e)) => {
                debug!("Connectivity probe failed: {}", e);
                false
            }
            Err(_) => {
                debug!("Connectivity probe timed out");
                false
            }
        }
    }
}
