//! crates/patrol_core/src/scan.rs
//!
//! The scan workflow: turns raw decoded QR strings into patrol records.
//!
//! Session state is an explicit `ScanState` value changed only through
//! `ScanState::apply`, so every transition of
//! `initial -> loading -> {success | error | noInternet} -> initial`
//! is visible in one place. `ScanController` drives the checks and the
//! submission around it.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::domain::{NewPatrolRecord, PointId, ScannedPoints, TOTAL_PATROL_POINTS};
use crate::points::{self, PointError};
use crate::ports::{
    ConnectivityProbe, FeedbackSink, PatrolApi, PortError, PortResult, ProgressStore,
    ServerStatusSource, SessionStore,
};

/// Repeats of the same raw code inside this window are ignored.
pub const SCAN_DEBOUNCE: Duration = Duration::from_millis(5000);

/// Delay before the second chime that marks a completed patrol.
pub const COMPLETION_CHIME_DELAY: Duration = Duration::from_millis(500);

//=========================================================================================
// State and Reducer
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScanStatus {
    Initial,
    Loading,
    Success,
    Error,
    NoInternet,
}

/// Everything that can move a scan session between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEvent {
    /// A new point passed local checks and is about to be submitted.
    Started,
    WentOffline,
    Rejected,
    Recorded(PointId),
    /// The result dialog was closed (by the user or a timeout).
    Dismissed,
    ConnectivityRestored,
    /// Capture was re-activated.
    Resumed,
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanState {
    pub status: ScanStatus,
    /// Whether incoming codes are processed at all.
    pub scanning: bool,
    pub scanned: ScannedPoints,
}

impl ScanState {
    pub fn new(scanned: ScannedPoints) -> Self {
        Self {
            status: ScanStatus::Initial,
            scanning: true,
            scanned,
        }
    }

    /// The single reducer for scan sessions.
    pub fn apply(&mut self, event: ScanEvent) {
        match event {
            ScanEvent::Started => {
                self.status = ScanStatus::Loading;
                self.scanning = false;
            }
            ScanEvent::WentOffline => self.status = ScanStatus::NoInternet,
            ScanEvent::Rejected => self.status = ScanStatus::Error,
            ScanEvent::Recorded(point) => {
                self.scanned.insert(point);
                self.status = ScanStatus::Success;
            }
            ScanEvent::Dismissed => match self.status {
                ScanStatus::Success => self.status = ScanStatus::Initial,
                ScanStatus::Error => {
                    self.status = ScanStatus::Initial;
                    self.scanning = true;
                }
                _ => {}
            },
            ScanEvent::ConnectivityRestored => {
                if self.status == ScanStatus::NoInternet {
                    self.status = ScanStatus::Initial;
                    self.scanning = true;
                }
            }
            ScanEvent::Resumed => {
                if self.status == ScanStatus::Initial {
                    self.scanning = true;
                }
            }
            ScanEvent::Reset => self.scanned.clear(),
        }
    }
}

//=========================================================================================
// Outcomes
//=========================================================================================

/// Why a scan did not produce a record. The `Display` text is what the guard sees.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanFailure {
    #[error("INVALID QR CODE\nPlease scan a numeric patrol point")]
    InvalidFormat,
    #[error("INVALID QR CODE\nPoint {0} is not on this patrol route")]
    UnknownPoint(String),
    #[error("No Internet Connection\nPlease check your connection and try again")]
    Offline,
    #[error("Server Offline\nPlease try again later")]
    ServerUnreachable,
    #[error("User not authenticated\nPlease log in again")]
    Unauthenticated,
    #[error("Invalid user data\nPlease log in again")]
    MissingGuardName,
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },
    #[error("SERVER ERROR ({0})\nScan not recorded")]
    ServerStatus(u16),
    #[error("SERVER ERROR\nScan not recorded")]
    Server,
    /// Anything unexpected while processing; details go to the log only.
    #[error("SCAN FAILED\nCould not process patrol point")]
    Internal(String),
}

impl From<PointError> for ScanFailure {
    fn from(err: PointError) -> Self {
        match err {
            PointError::NotNumeric(_) => Self::InvalidFormat,
            PointError::OutOfRange(point) => Self::UnknownPoint(point),
        }
    }
}

impl From<PortError> for ScanFailure {
    /// Maps a failed submission onto what the guard is told.
    fn from(err: PortError) -> Self {
        match err {
            PortError::Validation { field, message } => Self::Validation { field, message },
            PortError::Unauthorized => Self::Unauthenticated,
            PortError::Http { status } => Self::ServerStatus(status),
            PortError::NotFound(_) => Self::ServerStatus(404),
            PortError::Timeout | PortError::Unreachable(_) | PortError::Unexpected(_) => {
                Self::Server
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Same raw code as the last accepted one, inside the debounce window.
    Debounced,
    AlreadyScanned(PointId),
    Recorded {
        point: PointId,
        progress: usize,
        completed: bool,
    },
    Failed {
        failure: ScanFailure,
        point: Option<PointId>,
    },
}

impl ScanOutcome {
    /// Silent outcomes show no dialog and give no feedback.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::Debounced | Self::AlreadyScanned(_))
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Whether the caller should switch the capture device off.
    pub fn stop_capture(&self) -> bool {
        matches!(self, Self::AlreadyScanned(_) | Self::Recorded { .. })
    }

    pub fn point(&self) -> Option<PointId> {
        match self {
            Self::Debounced => None,
            Self::AlreadyScanned(point) => Some(*point),
            Self::Recorded { point, .. } => Some(*point),
            Self::Failed { point, .. } => *point,
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::Debounced => "Code already processed".to_string(),
            Self::AlreadyScanned(point) => format!("Point {point} already scanned"),
            Self::Recorded {
                point,
                progress,
                completed,
            } => {
                let mut message = format!(
                    "Point {point}: SUCCESSFULLY RECORDED\n\nProgress: {progress}/{TOTAL_PATROL_POINTS} points"
                );
                if *completed {
                    message.push_str("\n\nALL PATROL POINTS COMPLETED!");
                }
                message
            }
            Self::Failed { failure, .. } => failure.to_string(),
        }
    }
}

//=========================================================================================
// Controller
//=========================================================================================

/// The collaborators a scan session talks to.
#[derive(Clone)]
pub struct ScanPorts {
    pub api: Arc<dyn PatrolApi>,
    pub connectivity: Arc<dyn ConnectivityProbe>,
    pub server_status: Arc<dyn ServerStatusSource>,
    pub session: Arc<dyn SessionStore>,
    pub progress: Arc<dyn ProgressStore>,
    pub feedback: Arc<dyn FeedbackSink>,
}

pub struct ScanController {
    ports: ScanPorts,
    state: ScanState,
    last_accepted: Option<(String, Instant)>,
}

impl ScanController {
    /// Creates a controller, restoring the persisted patrol progress.
    pub async fn new(ports: ScanPorts) -> PortResult<Self> {
        let scanned = ports.progress.load_points().await?;
        info!(restored = scanned.len(), "Scan session ready");
        Ok(Self {
            ports,
            state: ScanState::new(scanned),
            last_accepted: None,
        })
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    pub fn status(&self) -> ScanStatus {
        self.state.status
    }

    pub fn is_scanning(&self) -> bool {
        self.state.scanning
    }

    pub fn scanned_points(&self) -> &ScannedPoints {
        &self.state.scanned
    }

    /// Entry point for every decoded code.
    ///
    /// Returns `None` when the session is not accepting codes (a submission is
    /// in flight or scanning is suspended).
    pub async fn handle_scan(&mut self, raw: &str) -> Option<ScanOutcome> {
        if self.state.status == ScanStatus::Loading || !self.state.scanning {
            debug!(code = raw, status = ?self.state.status, "Scan ignored while not scanning");
            return None;
        }
        Some(self.process_code(raw).await)
    }

    async fn process_code(&mut self, raw: &str) -> ScanOutcome {
        let now = Instant::now();
        if let Some((code, at)) = &self.last_accepted {
            if code == raw && now.duration_since(*at) < SCAN_DEBOUNCE {
                debug!(code = raw, "Scan debounced");
                return ScanOutcome::Debounced;
            }
        }

        let point = match points::parse_point(raw) {
            Ok(point) => point,
            Err(err) => {
                warn!(code = raw, "Rejected scan: {}", err);
                self.ports.feedback.play_error();
                return ScanOutcome::Failed {
                    failure: err.into(),
                    point: None,
                };
            }
        };

        if self.state.scanned.contains(point) {
            debug!(%point, "Point already scanned");
            return ScanOutcome::AlreadyScanned(point);
        }

        self.state.apply(ScanEvent::Started);
        match self.submit(point).await {
            Ok(()) => self.finish_recorded(raw, point, now).await,
            Err(failure) => {
                if self.state.status == ScanStatus::Loading {
                    let event = match failure {
                        ScanFailure::Offline => ScanEvent::WentOffline,
                        _ => ScanEvent::Rejected,
                    };
                    self.state.apply(event);
                }
                self.ports.feedback.play_error();
                ScanOutcome::Failed {
                    failure,
                    point: Some(point),
                }
            }
        }
    }

    /// Remote checks and the submission itself.
    async fn submit(&self, point: PointId) -> Result<(), ScanFailure> {
        let connectivity = &self.ports.connectivity;
        if !connectivity.probe().await || !connectivity.is_online() {
            warn!(%point, "No connectivity, scan not submitted");
            return Err(ScanFailure::Offline);
        }

        if !self.ports.server_status.server_status().online {
            warn!(%point, "Server reported offline, scan not submitted");
            return Err(ScanFailure::ServerUnreachable);
        }

        let user = self
            .ports
            .session
            .current_user()
            .await
            .map_err(|e| ScanFailure::Internal(e.to_string()))?
            .ok_or(ScanFailure::Unauthenticated)?;
        let guard_name = user.guard_name().ok_or(ScanFailure::MissingGuardName)?;

        let record = NewPatrolRecord::for_scan(point, guard_name, Utc::now());
        info!(id = %record.id, %point, guard = %record.guardname, "Submitting patrol record");
        self.ports.api.create_record(&record).await.map_err(|e| {
            error!(%point, "Failed to record scan: {}", e);
            ScanFailure::from(e)
        })
    }

    async fn finish_recorded(&mut self, raw: &str, point: PointId, now: Instant) -> ScanOutcome {
        self.state.apply(ScanEvent::Recorded(point));
        self.last_accepted = Some((raw.to_string(), now));

        if let Err(e) = self.ports.progress.save_points(&self.state.scanned).await {
            error!(%point, "Recorded scan but failed to persist progress: {}", e);
            self.state.apply(ScanEvent::Rejected);
            self.ports.feedback.play_error();
            return ScanOutcome::Failed {
                failure: ScanFailure::Internal(e.to_string()),
                point: Some(point),
            };
        }

        let progress = self.state.scanned.len();
        let completed = self.state.scanned.is_complete();
        self.ports.feedback.play_success();
        if completed {
            info!("All patrol points completed");
            let feedback = Arc::clone(&self.ports.feedback);
            tokio::spawn(async move {
                tokio::time::sleep(COMPLETION_CHIME_DELAY).await;
                feedback.play_success();
            });
        }

        ScanOutcome::Recorded {
            point,
            progress,
            completed,
        }
    }

    /// Closes the result dialog.
    pub fn dismiss(&mut self) {
        self.state.apply(ScanEvent::Dismissed);
    }

    /// Re-enables scanning after the capture device is switched back on.
    pub fn resume_scanning(&mut self) {
        self.state.apply(ScanEvent::Resumed);
    }

    /// Probes again after a `noInternet` outcome. Returns `true` when back online.
    pub async fn retry_connectivity(&mut self) -> bool {
        let connectivity = &self.ports.connectivity;
        if connectivity.probe().await && connectivity.is_online() {
            self.state.apply(ScanEvent::ConnectivityRestored);
            self.ports.feedback.show_success("Internet connection restored");
            true
        } else {
            self.ports.feedback.show_error("Still no internet connection");
            false
        }
    }

    /// Starts a new patrol: forgets every scanned point, locally and on disk.
    pub async fn reset_progress(&mut self) -> PortResult<()> {
        self.state.apply(ScanEvent::Reset);
        self.ports.progress.clear_points().await?;
        info!("Patrol progress reset");
        self.ports
            .feedback
            .show_info("Patrol progress reset. Ready to start a new patrol.");
        Ok(())
    }
}
