//! crates/patrol_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the patrol client's core logic.
//! These traits form the boundary of the hexagonal architecture, keeping the
//! scan workflow and reports independent of HTTP, the filesystem and the
//! terminal.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::domain::{
    NewPatrolRecord, RecordPage, RecordQuery, ScannedPoints, ServerStatus, UserProfile,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// Failure of any port call, independent of the HTTP or storage backend behind it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Request timed out")]
    Timeout,
    #[error("Server unreachable: {0}")]
    Unreachable(String),
    /// A 422 response; carries the first field-level complaint.
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },
    #[error("Server responded with status {status}")]
    Http { status: u16 },
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The remote patrol REST API.
#[async_trait]
pub trait PatrolApi: Send + Sync {
    /// Legacy query-string login (`GET /users`).
    async fn login(&self, username: &str, password: &str) -> PortResult<UserProfile>;

    /// `true` when `/health` answers with a success status.
    async fn health(&self) -> PortResult<bool>;

    /// Submits a freshly scanned record.
    async fn create_record(&self, record: &NewPatrolRecord) -> PortResult<()>;

    async fn list_records(&self, query: &RecordQuery) -> PortResult<RecordPage>;

    /// Raw bytes of the image attached to a record.
    async fn fetch_image(&self, image_id: &str) -> PortResult<Vec<u8>>;
}

/// Network reachability as seen from the device.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// The passive link flag, fed by link up/down events.
    fn is_online(&self) -> bool;

    /// Actively checks reachability of the backend with a short timeout.
    async fn probe(&self) -> bool;
}

/// Source of the periodically polled server status.
pub trait ServerStatusSource: Send + Sync {
    fn server_status(&self) -> ServerStatus;
}

/// Device-local login state.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn current_user(&self) -> PortResult<Option<UserProfile>>;

    async fn auth_token(&self) -> PortResult<Option<String>>;

    async fn save_login(&self, user: &UserProfile, token: Option<&str>) -> PortResult<()>;

    /// Forgets the user, the token and the patrol progress.
    async fn clear_session(&self) -> PortResult<()>;
}

/// Device-local patrol progress.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn load_points(&self) -> PortResult<ScannedPoints>;

    async fn save_points(&self, points: &ScannedPoints) -> PortResult<()>;

    async fn clear_points(&self) -> PortResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
    Warning,
    Info,
}

/// Audio, haptic and toast feedback.
pub trait FeedbackSink: Send + Sync {
    fn play_success(&self);

    fn play_error(&self);

    /// Vibration pattern in milliseconds (on, off, on, ...).
    fn vibrate(&self, pattern: &[u64]);

    fn toast(&self, level: NoticeLevel, message: &str);

    fn show_success(&self, message: &str) {
        self.play_success();
        self.vibrate(&[200]);
        self.toast(NoticeLevel::Success, message);
    }

    fn show_error(&self, message: &str) {
        self.play_error();
        self.vibrate(&[100, 50, 100]);
        self.toast(NoticeLevel::Error, message);
    }

    fn show_info(&self, message: &str) {
        self.toast(NoticeLevel::Info, message);
    }

    fn show_warning(&self, message: &str) {
        self.toast(NoticeLevel::Warning, message);
    }
}

/// Raw decoded strings coming out of a capture device.
pub type CodeStream = Pin<Box<dyn Stream<Item = String> + Send>>;
