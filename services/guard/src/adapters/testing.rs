//! In-memory `PatrolApi` used by the adapter tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use patrol_core::domain::{NewPatrolRecord, RecordPage, RecordQuery, UserProfile};
use patrol_core::ports::{PatrolApi, PortError, PortResult};

pub struct StubApi {
    healthy: AtomicBool,
    failing: AtomicBool,
    health_calls: AtomicUsize,
    delay: Option<Duration>,
}

impl StubApi {
    pub fn healthy(healthy: bool) -> Self {
        Self {
            healthy: AtomicBool::new(healthy),
            failing: AtomicBool::new(false),
            health_calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PatrolApi for StubApi {
    async fn login(&self, _username: &str, _password: &str) -> PortResult<UserProfile> {
        Err(PortError::Unauthorized)
    }

    async fn health(&self) -> PortResult<bool> {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(PortError::Unreachable("connection refused".to_string()));
        }
        Ok(self.healthy.load(Ordering::SeqCst))
    }

    async fn create_record(&self, _record: &NewPatrolRecord) -> PortResult<()> {
        Ok(())
    }

    async fn list_records(&self, _query: &RecordQuery) -> PortResult<RecordPage> {
        Ok(RecordPage::default())
    }

    async fn fetch_image(&self, image_id: &str) -> PortResult<Vec<u8>> {
        Err(PortError::NotFound(image_id.to_string()))
    }
}
