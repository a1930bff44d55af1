//! services/guard/src/adapters/store.rs
//!
//! Device-local storage for the signed-in guard and patrol progress.
//!
//! Everything lives in one small key/value JSON file inside the data
//! directory. Values are strings; structured values are stored as JSON text
//! under their key and are validated on read, one key at a time.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use patrol_core::domain::{ScannedPoints, UserProfile};
use patrol_core::ports::{PortError, PortResult, ProgressStore, SessionStore};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::GuardError;

pub const STORAGE_FILE: &str = "storage.json";

pub const AUTH_TOKEN_KEY: &str = "auth_token";
pub const USER_DATA_KEY: &str = "user_data";
pub const SCANNED_POINTS_KEY: &str = "scanned_points";

type Entries = BTreeMap<String, String>;

/// File-backed implementation of `SessionStore` and `ProgressStore`.
pub struct LocalStore {
    path: PathBuf,
    entries: Mutex<Entries>,
}

impl LocalStore {
    /// Opens (or creates) the store in `data_dir`.
    pub async fn open(data_dir: &Path) -> Result<Self, GuardError> {
        tokio::fs::create_dir_all(data_dir).await?;
        let path = data_dir.join(STORAGE_FILE);
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Entries>(&bytes) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), "Ignoring unreadable storage file: {}", e);
                    Entries::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Entries::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), keys = entries.len(), "Local store opened");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().await.get(key).cloned()
    }

    /// Applies `change` and writes the whole file back.
    async fn update(&self, change: impl FnOnce(&mut Entries)) -> PortResult<()> {
        let mut entries = self.entries.lock().await;
        let mut next = entries.clone();
        change(&mut next);
        persist(&self.path, &next).await?;
        *entries = next;
        Ok(())
    }

    /// Reads a JSON value stored under `key`, removing it when it is malformed.
    async fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> PortResult<Option<T>> {
        let Some(raw) = self.get(key).await else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key, "Discarding malformed stored value: {}", e);
                self.update(|entries| {
                    entries.remove(key);
                })
                .await?;
                Ok(None)
            }
        }
    }
}

/// Replaces the file through a temporary sibling and a rename.
async fn persist(path: &Path, entries: &Entries) -> PortResult<()> {
    let json = serde_json::to_vec_pretty(entries)
        .map_err(|e| PortError::Unexpected(format!("Failed to encode storage: {}", e)))?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| PortError::Unexpected(format!("Failed to write {}: {}", tmp.display(), e)))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| PortError::Unexpected(format!("Failed to replace {}: {}", path.display(), e)))
}

fn encode<T: serde::Serialize>(value: &T) -> PortResult<String> {
    serde_json::to_string(value)
        .map_err(|e| PortError::Unexpected(format!("Failed to encode value: {}", e)))
}

//=========================================================================================
// Port Implementations
//=========================================================================================

#[async_trait]
impl SessionStore for LocalStore {
    async fn current_user(&self) -> PortResult<Option<UserProfile>> {
        self.get_json(USER_DATA_KEY).await
    }

    async fn auth_token(&self) -> PortResult<Option<String>> {
        Ok(self.get(AUTH_TOKEN_KEY).await.filter(|t| !t.is_empty()))
    }

    async fn save_login(&self, user: &UserProfile, token: Option<&str>) -> PortResult<()> {
        let user_json = encode(user)?;
        let token = token.map(str::to_string);
        self.update(move |entries| {
            entries.insert(USER_DATA_KEY.to_string(), user_json);
            match token {
                Some(token) => entries.insert(AUTH_TOKEN_KEY.to_string(), token),
                None => entries.remove(AUTH_TOKEN_KEY),
            };
        })
        .await?;
        info!(guard = %user.guard_name, "Session saved");
        Ok(())
    }

    async fn clear_session(&self) -> PortResult<()> {
        self.update(|entries| {
            for key in [AUTH_TOKEN_KEY, USER_DATA_KEY, SCANNED_POINTS_KEY] {
                entries.remove(key);
            }
        })
        .await?;
        info!("Session cleared");
        Ok(())
    }
}

#[async_trait]
impl ProgressStore for LocalStore {
    async fn load_points(&self) -> PortResult<ScannedPoints> {
        Ok(self
            .get_json::<ScannedPoints>(SCANNED_POINTS_KEY)
            .await?
            .unwrap_or_default())
    }

    async fn save_points(&self, points: &ScannedPoints) -> PortResult<()> {
        let json = encode(points)?;
        self.update(move |entries| {
            entries.insert(SCANNED_POINTS_KEY.to_string(), json);
        })
        .await
    }

    async fn clear_points(&self) -> PortResult<()> {
        self.update(|entries| {
            entries.remove(SCANNED_POINTS_KEY);
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patrol_core::domain::PointId;

    fn guard() -> UserProfile {
        serde_json::from_value(serde_json::json!({
            "userId": 7,
            "guardName": "Omar",
            "uid": "u-7",
            "permissions": ["scan"],
            "updatedAt": 1700000000
        }))
        .unwrap()
    }

    fn points(ids: &[u8]) -> ScannedPoints {
        ids.iter().filter_map(|&n| PointId::new(n)).collect()
    }

    #[tokio::test]
    async fn survives_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = LocalStore::open(dir.path()).await.unwrap();
            store.save_login(&guard(), Some("tok")).await.unwrap();
            store.save_points(&points(&[3, 1])).await.unwrap();
        }

        let store = LocalStore::open(dir.path()).await.unwrap();
        assert_eq!(store.current_user().await.unwrap(), Some(guard()));
        assert_eq!(store.auth_token().await.unwrap().as_deref(), Some("tok"));
        assert_eq!(store.load_points().await.unwrap(), points(&[1, 3]));

        let raw: Entries =
            serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(raw[SCANNED_POINTS_KEY], r#"["1","3"]"#);
    }

    #[tokio::test]
    async fn clearing_the_session_forgets_progress() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).await.unwrap();
        store.save_login(&guard(), Some("tok")).await.unwrap();
        store.save_points(&points(&[5])).await.unwrap();

        store.clear_session().await.unwrap();
        assert_eq!(store.current_user().await.unwrap(), None);
        assert_eq!(store.auth_token().await.unwrap(), None);
        assert!(store.load_points().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn damaged_values_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(STORAGE_FILE),
            r#"{"scanned_points": "[\"2\", \"99\", \"x\"]", "user_data": "{not json"}"#,
        )
        .unwrap();

        let store = LocalStore::open(dir.path()).await.unwrap();
        assert_eq!(store.load_points().await.unwrap(), points(&[2]));
        assert_eq!(store.current_user().await.unwrap(), None);
        assert!(store.get(USER_DATA_KEY).await.is_none());
    }

    #[tokio::test]
    async fn unreadable_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(STORAGE_FILE), "garbage").unwrap();
        let store = LocalStore::open(dir.path()).await.unwrap();
        assert!(store.load_points().await.unwrap().is_empty());
        store.clear_points().await.unwrap();
    }
}
