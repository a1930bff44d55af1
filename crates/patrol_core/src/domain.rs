//! crates/patrol_core/src/domain.rs
//!
//! Defines the core data structures for the patrol client.
//! Wire-level quirks (timestamps sent as strings, lenient persisted sets) are
//! absorbed here so the rest of the crate works with plain typed values.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::points::{self, PointError};

/// Number of fixed checkpoints on a patrol route.
pub const TOTAL_PATROL_POINTS: u8 = 12;

/// Default page size for the logs view.
pub const DEFAULT_PAGE_LIMIT: u32 = 20;

/// Largest page the records endpoint will serve.
pub const MAX_PAGE_LIMIT: u32 = 100;

//=========================================================================================
// Patrol Points
//=========================================================================================

/// A checkpoint id guaranteed to lie in `1..=TOTAL_PATROL_POINTS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PointId(u8);

impl PointId {
    pub fn new(number: u8) -> Option<Self> {
        (1..=TOTAL_PATROL_POINTS)
            .contains(&number)
            .then_some(Self(number))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// Every point of the route, in ascending order.
    pub fn all() -> impl Iterator<Item = PointId> {
        (1..=TOTAL_PATROL_POINTS).map(PointId)
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PointId {
    type Err = PointError;

    /// Parses a raw or normalised code such as `"007"` or `"7"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        points::parse_point(s)
    }
}

impl Serialize for PointId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PointId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// The set of points completed in the current patrol.
///
/// Persisted as a JSON array of strings. Entries that no longer parse as a
/// route point are dropped on load rather than failing the whole set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ScannedPoints(BTreeSet<PointId>);

impl ScannedPoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, point: PointId) -> bool {
        self.0.contains(&point)
    }

    /// Returns `true` when the point was not yet present.
    pub fn insert(&mut self, point: PointId) -> bool {
        self.0.insert(point)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.0.len() == usize::from(TOTAL_PATROL_POINTS)
    }

    pub fn iter(&self) -> impl Iterator<Item = PointId> + '_ {
        self.0.iter().copied()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl FromIterator<PointId> for ScannedPoints {
    fn from_iter<I: IntoIterator<Item = PointId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<String>> for ScannedPoints {
    fn from(raw: Vec<String>) -> Self {
        raw.iter().filter_map(|s| s.parse().ok()).collect()
    }
}

impl From<ScannedPoints> for Vec<String> {
    fn from(points: ScannedPoints) -> Self {
        points.0.iter().map(ToString::to_string).collect()
    }
}

//=========================================================================================
// Patrol Records
//=========================================================================================

/// One scan event as stored by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatrolRecord {
    pub id: String,
    pub point: String,
    pub guardname: String,
    /// Unix seconds.
    #[serde(deserialize_with = "lenient_timestamp")]
    pub time: i64,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub servertime: i64,
    #[serde(default)]
    pub imageid: String,
    #[serde(default)]
    pub note: String,
}

impl PatrolRecord {
    pub fn has_note(&self) -> bool {
        !self.note.trim().is_empty()
    }
}

/// The payload posted when a guard scans a point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPatrolRecord {
    pub id: Uuid,
    pub point: PointId,
    pub guardname: String,
    #[serde(serialize_with = "decimal_string")]
    pub time: i64,
    #[serde(serialize_with = "decimal_string")]
    pub servertime: i64,
    pub imageid: String,
    pub note: String,
}

impl NewPatrolRecord {
    /// Builds the record for a scan made at `now` by `guard_name`.
    pub fn for_scan(point: PointId, guard_name: &str, now: DateTime<Utc>) -> Self {
        let timestamp = now.timestamp();
        Self {
            id: Uuid::new_v4(),
            point,
            guardname: guard_name.trim().to_string(),
            time: timestamp,
            servertime: timestamp,
            imageid: image_id(now),
            note: String::new(),
        }
    }
}

/// `img-<unix millis>-<9 lowercase alphanumerics>`
fn image_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("img-{}-{}", now.timestamp_millis(), &suffix[..9])
}

fn decimal_string<S: Serializer>(value: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

fn lenient_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
        Null(()),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Int(v) => v,
        Raw::Float(v) => v as i64,
        Raw::Text(s) => s.trim().parse().unwrap_or(0),
        Raw::Null(()) => 0,
    })
}

/// One page of records as returned by the list endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordPage {
    pub records: Vec<PatrolRecord>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub current_page: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

//=========================================================================================
// Queries
//=========================================================================================

/// Ephemeral filters scoping record retrieval.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOptions {
    pub point: Option<String>,
    pub guard_name: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub has_notes: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordQuery {
    pub page: u32,
    pub limit: u32,
    pub filter: FilterOptions,
}

impl RecordQuery {
    pub fn new(page: u32, limit: u32, filter: FilterOptions) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_LIMIT),
            filter,
        }
    }

    /// Query-string pairs in the names the records endpoint expects.
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
        ];
        let filter = &self.filter;
        if let Some(point) = filter.point.as_deref().filter(|p| !p.is_empty()) {
            params.push(("point", point.to_string()));
        }
        if let Some(name) = filter.guard_name.as_deref().filter(|n| !n.is_empty()) {
            params.push(("guardname", name.to_string()));
        }
        if let Some(start) = filter.start_date {
            params.push(("start_date", start.timestamp().to_string()));
        }
        if let Some(end) = filter.end_date {
            params.push(("end_date", end.timestamp().to_string()));
        }
        if let Some(has_notes) = filter.has_notes {
            params.push(("has_notes", has_notes.to_string()));
        }
        params
    }
}

impl Default for RecordQuery {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_LIMIT, FilterOptions::default())
    }
}

//=========================================================================================
// Users and Status
//=========================================================================================

/// The authenticated guard, as returned by the login endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: i64,
    pub guard_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub updated_at: i64,
    #[serde(default)]
    pub actions: Vec<String>,
}

impl UserProfile {
    /// The trimmed guard name, if it is not blank.
    pub fn guard_name(&self) -> Option<&str> {
        let name = self.guard_name.trim();
        (!name.is_empty()).then_some(name)
    }
}

/// Last known reachability of the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ServerStatus {
    pub online: bool,
    pub last_checked: Option<DateTime<Utc>>,
}
