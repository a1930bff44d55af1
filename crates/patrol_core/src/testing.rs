//! In-memory port implementations shared by the unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{
    NewPatrolRecord, PatrolRecord, RecordPage, RecordQuery, ScannedPoints, ServerStatus,
    UserProfile,
};
use crate::ports::{
    ConnectivityProbe, FeedbackSink, NoticeLevel, PatrolApi, PortError, PortResult,
    ProgressStore, ServerStatusSource, SessionStore,
};

pub fn record(id: &str, point: &str, guard: &str, time: i64) -> PatrolRecord {
    PatrolRecord {
        id: id.to_string(),
        point: point.to_string(),
        guardname: guard.to_string(),
        time,
        servertime: time,
        imageid: String::new(),
        note: String::new(),
    }
}

pub fn guard(name: &str) -> UserProfile {
    UserProfile {
        user_id: 1,
        guard_name: name.to_string(),
        email: None,
        uid: "uid-1".to_string(),
        permissions: vec!["scan".to_string()],
        updated_at: 0,
        actions: Vec::new(),
    }
}

#[derive(Default)]
pub struct FakeApi {
    records: Mutex<Vec<PatrolRecord>>,
    created: Mutex<Vec<NewPatrolRecord>>,
    queries: Mutex<Vec<RecordQuery>>,
    submit_error: Mutex<Option<PortError>>,
    image: Mutex<Vec<u8>>,
}

impl FakeApi {
    pub fn set_records(&self, records: Vec<PatrolRecord>) {
        *self.records.lock().unwrap() = records;
    }

    pub fn set_image(&self, bytes: Vec<u8>) {
        *self.image.lock().unwrap() = bytes;
    }

    pub fn fail_submissions(&self, error: PortError) {
        *self.submit_error.lock().unwrap() = Some(error);
    }

    pub fn created(&self) -> Vec<NewPatrolRecord> {
        self.created.lock().unwrap().clone()
    }

    pub fn list_queries(&self) -> Vec<RecordQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl PatrolApi for FakeApi {
    async fn login(&self, _username: &str, _password: &str) -> PortResult<UserProfile> {
        Ok(guard("Test Guard"))
    }

    async fn health(&self) -> PortResult<bool> {
        Ok(true)
    }

    async fn create_record(&self, record: &NewPatrolRecord) -> PortResult<()> {
        if let Some(error) = self.submit_error.lock().unwrap().clone() {
            return Err(error);
        }
        self.created.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn list_records(&self, query: &RecordQuery) -> PortResult<RecordPage> {
        self.queries.lock().unwrap().push(query.clone());
        let records = self.records.lock().unwrap();
        let limit = query.limit as usize;
        let start = (query.page as usize - 1) * limit;
        let page: Vec<_> = records.iter().skip(start).take(limit).cloned().collect();
        Ok(RecordPage {
            records: page,
            total: records.len() as u64,
            total_pages: records.len().div_ceil(limit) as u32,
            current_page: Some(query.page),
            page_size: Some(query.limit),
        })
    }

    async fn fetch_image(&self, _image_id: &str) -> PortResult<Vec<u8>> {
        Ok(self.image.lock().unwrap().clone())
    }
}

pub struct FakeConnectivity {
    pub link_up: AtomicBool,
    pub reachable: AtomicBool,
}

impl Default for FakeConnectivity {
    fn default() -> Self {
        Self {
            link_up: AtomicBool::new(true),
            reachable: AtomicBool::new(true),
        }
    }
}

#[async_trait]
impl ConnectivityProbe for FakeConnectivity {
    fn is_online(&self) -> bool {
        self.link_up.load(Ordering::SeqCst)
    }

    async fn probe(&self) -> bool {
        self.is_online() && self.reachable.load(Ordering::SeqCst)
    }
}

pub struct FakeServerStatus(pub AtomicBool);

impl Default for FakeServerStatus {
    fn default() -> Self {
        Self(AtomicBool::new(true))
    }
}

impl ServerStatusSource for FakeServerStatus {
    fn server_status(&self) -> ServerStatus {
        ServerStatus {
            online: self.0.load(Ordering::SeqCst),
            last_checked: None,
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub user: Mutex<Option<UserProfile>>,
    pub token: Mutex<Option<String>>,
    pub points: Mutex<Option<ScannedPoints>>,
    pub fail_saves: AtomicBool,
}

impl MemoryStore {
    pub fn with_user(user: UserProfile) -> Self {
        let store = Self::default();
        *store.user.lock().unwrap() = Some(user);
        store
    }

    pub fn persisted(&self) -> Option<ScannedPoints> {
        self.points.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn current_user(&self) -> PortResult<Option<UserProfile>> {
        Ok(self.user.lock().unwrap().clone())
    }

    async fn auth_token(&self) -> PortResult<Option<String>> {
        Ok(self.token.lock().unwrap().clone())
    }

    async fn save_login(&self, user: &UserProfile, token: Option<&str>) -> PortResult<()> {
        *self.user.lock().unwrap() = Some(user.clone());
        *self.token.lock().unwrap() = token.map(str::to_string);
        Ok(())
    }

    async fn clear_session(&self) -> PortResult<()> {
        *self.user.lock().unwrap() = None;
        *self.token.lock().unwrap() = None;
        *self.points.lock().unwrap() = None;
        Ok(())
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn load_points(&self) -> PortResult<ScannedPoints> {
        Ok(self.persisted().unwrap_or_default())
    }

    async fn save_points(&self, points: &ScannedPoints) -> PortResult<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("disk full".to_string()));
        }
        *self.points.lock().unwrap() = Some(points.clone());
        Ok(())
    }

    async fn clear_points(&self) -> PortResult<()> {
        *self.points.lock().unwrap() = None;
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingFeedback {
    events: Mutex<Vec<String>>,
}

impl RecordingFeedback {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events().iter().filter(|e| e.as_str() == event).count()
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl FeedbackSink for RecordingFeedback {
    fn play_success(&self) {
        self.push("success".to_string());
    }

    fn play_error(&self) {
        self.push("error".to_string());
    }

    fn vibrate(&self, pattern: &[u64]) {
        self.push(format!("vibrate {pattern:?}"));
    }

    fn toast(&self, level: NoticeLevel, message: &str) {
        self.push(format!("{level:?}: {message}"));
    }
}
