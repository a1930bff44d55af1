pub mod domain;
pub mod points;
pub mod ports;
pub mod records;
pub mod report;
pub mod scan;

#[cfg(test)]
mod testing;

pub use domain::{
    FilterOptions, NewPatrolRecord, PatrolRecord, PointId, RecordPage, RecordQuery,
    ScannedPoints, ServerStatus, UserProfile, TOTAL_PATROL_POINTS,
};
pub use ports::{
    CodeStream, ConnectivityProbe, FeedbackSink, NoticeLevel, PatrolApi, PortError, PortResult,
    ProgressStore, ServerStatusSource, SessionStore,
};
pub use report::{PatrolReport, PointGroups};
pub use scan::{ScanController, ScanFailure, ScanOutcome, ScanPorts, ScanStatus};
