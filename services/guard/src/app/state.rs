//! services/guard/src/app/state.rs
//!
//! Defines the client's shared state: every adapter, wired once at startup
//! and handed to the commands.

use std::sync::Arc;

use patrol_core::ports::{FeedbackSink, PatrolApi, SessionStore};
use patrol_core::ScanPorts;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapters::{ConnectivityMonitor, HttpPatrolApi, LocalStore, ServerStatusPoller};
use crate::config::Config;
use crate::error::GuardError;

//=========================================================================================
// AppContext (Shared Across All Commands)
//=========================================================================================

/// The shared client state, created once at startup.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<Config>,
    pub store: Arc<LocalStore>,
    pub api: Arc<dyn PatrolApi>,
    pub connectivity: Arc<ConnectivityMonitor>,
    pub server_status: Arc<ServerStatusPoller>,
    pub feedback: Arc<dyn FeedbackSink>,
    /// Stops every background task started by `start_background`.
    pub shutdown: CancellationToken,
}

impl AppContext {
    /// Opens local storage and builds the HTTP, connectivity and status adapters.
    pub async fn build(
        config: Arc<Config>,
        feedback: Arc<dyn FeedbackSink>,
    ) -> Result<Self, GuardError> {
        let store = Arc::new(LocalStore::open(&config.data_dir).await?);
        let session: Arc<dyn SessionStore> = store.clone();
        let api: Arc<dyn PatrolApi> = Arc::new(HttpPatrolApi::new(
            config.api_base_url.clone(),
            config.api_timeout,
            config.probe_timeout,
            session,
        )?);
        let connectivity = Arc::new(ConnectivityMonitor::new(api.clone(), config.probe_timeout));
        info!(
            api = %config.api_base_url,
            data_dir = %config.data_dir.display(),
            "Client initialized"
        );

        Ok(Self {
            config,
            store,
            api,
            connectivity,
            server_status: Arc::new(ServerStatusPoller::new()),
            feedback,
            shutdown: CancellationToken::new(),
        })
    }

    /// Runs the startup server check, then starts the server poller and the
    /// link watcher.
    pub async fn start_background(&self) -> Vec<JoinHandle<()>> {
        self.server_status.check_now(self.api.as_ref()).await;

        let mut handles = vec![self.server_status.spawn(
            self.api.clone(),
            self.config.server_check_interval,
            self.shutdown.child_token(),
        )];
        match self.config.api_socket_addr() {
            Some(addr) => handles.push(self.connectivity.spawn_link_watcher(
                addr,
                self.config.link_check_interval,
                self.shutdown.child_token(),
            )),
            None => warn!("API address has no host and port; link watcher disabled"),
        }
        handles
    }

    /// Cancels the background tasks and waits for them to finish.
    pub async fn stop_background(&self, handles: Vec<JoinHandle<()>>) {
        self.shutdown.cancel();
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                warn!("Background task ended abnormally: {}", e);
            }
        }
    }

    /// The collaborators of a scan session.
    pub fn scan_ports(&self) -> ScanPorts {
        ScanPorts {
            api: self.api.clone(),
            connectivity: self.connectivity.clone(),
            server_status: self.server_status.clone(),
            session: self.store.clone(),
            progress: self.store.clone(),
            feedback: self.feedback.clone(),
        }
    }
}
