//! services/guard/src/adapters/server_status.rs
//!
//! Polls the backend's health endpoint on a fixed interval and publishes the
//! last known status to the scan workflow.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use patrol_core::domain::ServerStatus;
use patrol_core::ports::{PatrolApi, ServerStatusSource};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub struct ServerStatusPoller {
    status: watch::Sender<ServerStatus>,
}

impl Default for ServerStatusPoller {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerStatusPoller {
    /// Starts as offline and never checked.
    pub fn new() -> Self {
        let (status, _) = watch::channel(ServerStatus::default());
        Self { status }
    }

    pub fn subscribe(&self) -> watch::Receiver<ServerStatus> {
        self.status.subscribe()
    }

    /// Runs one health check and records the result. Errors count as offline.
    pub async fn check_now(&self, api: &dyn PatrolApi) -> ServerStatus {
        let online = match api.health().await {
            Ok(healthy) => healthy,
            Err(e) => {
                debug!("Server health check failed: {}", e);
                false
            }
        };
        let next = ServerStatus {
            online,
            last_checked: Some(Utc::now()),
        };
        let previous = self.status.send_replace(next);
        if previous.online != online || previous.last_checked.is_none() {
            if online {
                info!("Server is online");
            } else {
                warn!("Server is offline");
            }
        }
        next
    }

    /// Checks every `every`, starting one interval from now, until `cancel`
    /// fires. Callers run `check_now` first for the startup check.
    pub fn spawn(
        self: &Arc<Self>,
        api: Arc<dyn PatrolApi>,
        every: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let poller = Arc::clone(self);
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + every;
            let mut ticker = tokio::time::interval_at(start, every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Server status poller stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        poller.check_now(api.as_ref()).await;
                    }
                }
            }
        })
    }
}

impl ServerStatusSource for ServerStatusPoller {
    fn server_status(&self) -> ServerStatus {
        *self.status.borrow()
    }
}
