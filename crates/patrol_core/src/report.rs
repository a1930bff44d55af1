//! crates/patrol_core/src/report.rs
//!
//! Pure aggregation over fetched patrol records: per-point columns with
//! delay flags, summaries and distributions. No state, no I/O.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Days, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::Serialize;

use crate::domain::{PatrolRecord, PointId};
use crate::points::{normalize_code, point_label, point_name};

/// A scan more than this long after the previous one at the same point is late.
pub const DELAY_THRESHOLD_MINUTES: i64 = 100;

/// Records per route point, always keyed by every point `1..=12`.
pub type PointGroups = BTreeMap<PointId, Vec<PatrolRecord>>;

/// Groups records by point, oldest first. Records for points outside the
/// route are dropped.
pub fn group_by_point(records: &[PatrolRecord]) -> PointGroups {
    let mut groups: PointGroups = PointId::all().map(|p| (p, Vec::new())).collect();
    for record in records {
        if let Ok(point) = record.point.trim().parse::<PointId>() {
            groups.entry(point).or_default().push(record.clone());
        }
    }
    for group in groups.values_mut() {
        group.sort_by_key(|r| r.time);
    }
    groups
}

/// `true` when `records[index]` came more than 100 minutes after the entry
/// before it. The first entry is never delayed.
pub fn is_delayed_entry(records: &[PatrolRecord], index: usize) -> bool {
    if index == 0 || index >= records.len() {
        return false;
    }
    let gap_seconds = records[index].time.saturating_sub(records[index - 1].time);
    gap_seconds > DELAY_THRESHOLD_MINUTES * 60
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub total_scans: usize,
    pub unique_points: usize,
    pub unique_guards: usize,
}

pub fn summarize(records: &[PatrolRecord]) -> ReportSummary {
    let points: BTreeSet<String> = records.iter().map(|r| normalize_code(r.point.trim())).collect();
    let guards: BTreeSet<&str> = records.iter().map(|r| r.guardname.as_str()).collect();
    ReportSummary {
        total_scans: records.len(),
        unique_points: points.len(),
        unique_guards: guards.len(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionItem {
    pub label: String,
    pub count: usize,
    pub percentage: f64,
}

/// Scans per point, labelled `Point N`, busiest first.
pub fn point_distribution(records: &[PatrolRecord]) -> Vec<DistributionItem> {
    distribution(records.iter().map(|r| point_label(&r.point)), records.len())
}

/// Scans per guard, busiest first.
pub fn guard_distribution(records: &[PatrolRecord]) -> Vec<DistributionItem> {
    distribution(records.iter().map(|r| r.guardname.clone()), records.len())
}

fn distribution(labels: impl Iterator<Item = String>, total: usize) -> Vec<DistributionItem> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for label in labels {
        *counts.entry(label).or_default() += 1;
    }
    let mut items: Vec<_> = counts
        .into_iter()
        .map(|(label, count)| DistributionItem {
            label,
            count,
            percentage: count as f64 / total as f64 * 100.0,
        })
        .collect();
    // Stable sort keeps equal counts in label order.
    items.sort_by(|a, b| b.count.cmp(&a.count));
    items
}

//=========================================================================================
// Formatting
//=========================================================================================

/// `HH:MM` of a unix timestamp in the given zone.
pub fn format_clock_in<Tz: TimeZone>(timestamp: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match tz.timestamp_opt(timestamp, 0).single() {
        Some(at) => at.format("%H:%M").to_string(),
        None => "--:--".to_string(),
    }
}

/// `HH:MM` in local time.
pub fn format_clock(timestamp: i64) -> String {
    format_clock_in(timestamp, &Local)
}

/// `YYYY/MM/DD`
pub fn format_day(day: NaiveDate) -> String {
    day.format("%Y/%m/%d").to_string()
}

//=========================================================================================
// Report Artifact
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportRange {
    /// From midnight seven days before `now` to the last second of `now`'s day,
    /// on `now`'s calendar.
    pub fn default_for<Tz: TimeZone>(now: &DateTime<Tz>) -> Self {
        let tz = now.timezone();
        let today = now.date_naive();
        let week_ago = today.checked_sub_days(Days::new(7)).unwrap_or(today);
        let start = local_instant(&tz, week_ago.and_time(NaiveTime::MIN), true);
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        let end = local_instant(&tz, today.and_time(end_of_day), false);
        Self { start, end }
    }

    pub fn label_in<Tz: TimeZone>(&self, tz: &Tz) -> String
    where
        Tz::Offset: std::fmt::Display,
    {
        let fmt = |at: DateTime<Utc>| {
            let local = at.with_timezone(tz);
            format!("{} {}", format_day(local.date_naive()), local.format("%H:%M"))
        };
        format!("{} - {}", fmt(self.start), fmt(self.end))
    }
}

/// Resolves a wall-clock time, falling back to UTC inside DST gaps.
fn local_instant<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime, earliest: bool) -> DateTime<Utc> {
    let resolved = tz.from_local_datetime(&naive);
    let picked = if earliest {
        resolved.earliest()
    } else {
        resolved.latest()
    };
    picked
        .map(|at| at.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub id: String,
    pub guardname: String,
    pub time: i64,
    pub clock: String,
    pub delayed: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub note: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PointColumn {
    pub point: PointId,
    pub name: String,
    pub entries: Vec<ReportEntry>,
}

/// Everything a supervisor's patrol report shows.
#[derive(Debug, Clone, Serialize)]
pub struct PatrolReport {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<ReportRange>,
    pub summary: ReportSummary,
    pub points: Vec<PointColumn>,
    pub point_distribution: Vec<DistributionItem>,
    pub guard_distribution: Vec<DistributionItem>,
}

impl PatrolReport {
    pub fn build(title: &str, records: &[PatrolRecord], range: Option<ReportRange>) -> Self {
        Self::build_in(title, records, range, &Local)
    }

    /// Builds the report rendering clock times in `tz`.
    pub fn build_in<Tz: TimeZone>(
        title: &str,
        records: &[PatrolRecord],
        range: Option<ReportRange>,
        tz: &Tz,
    ) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        let points = group_by_point(records)
            .into_iter()
            .map(|(point, group)| {
                let entries = group
                    .iter()
                    .enumerate()
                    .map(|(i, r)| ReportEntry {
                        id: r.id.clone(),
                        guardname: r.guardname.clone(),
                        time: r.time,
                        clock: format_clock_in(r.time, tz),
                        delayed: is_delayed_entry(&group, i),
                        note: r.note.clone(),
                    })
                    .collect();
                PointColumn {
                    point,
                    name: point_name(&point.to_string()),
                    entries,
                }
            })
            .collect();

        Self {
            title: title.to_string(),
            range,
            summary: summarize(records),
            points,
            point_distribution: point_distribution(records),
            guard_distribution: guard_distribution(records),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::record;

    const T: i64 = 1_700_000_000;

    #[test]
    fn groups_always_cover_every_point() {
        let groups = group_by_point(&[]);
        let keys: Vec<String> = groups.keys().map(ToString::to_string).collect();
        let expected: Vec<String> = (1..=12).map(|n| n.to_string()).collect();
        assert_eq!(keys, expected);
        assert!(groups.values().all(Vec::is_empty));
    }

    #[test]
    fn groups_normalize_and_sort() {
        let records = vec![
            record("b", "03", "g", T + 60),
            record("a", "3", "g", T),
            record("x", "13", "g", T),
            record("y", "gate", "g", T),
        ];
        let groups = group_by_point(&records);
        let three = &groups[&PointId::new(3).unwrap()];
        assert_eq!(three.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(groups.values().map(Vec::len).sum::<usize>(), 2);
    }

    #[test]
    fn delay_flags_follow_the_100_minute_rule() {
        let late = vec![record("a", "1", "g", T), record("b", "1", "g", T + 110 * 60)];
        assert!(!is_delayed_entry(&late, 0));
        assert!(is_delayed_entry(&late, 1));

        let on_time = vec![record("a", "1", "g", T), record("b", "1", "g", T + 90 * 60)];
        assert!(!is_delayed_entry(&on_time, 1));

        let boundary = vec![record("a", "1", "g", T), record("b", "1", "g", T + 100 * 60)];
        assert!(!is_delayed_entry(&boundary, 1));
        assert!(!is_delayed_entry(&boundary, 7));
    }

    #[test]
    fn extreme_timestamps_do_not_overflow_the_gap() {
        let records = vec![record("a", "1", "g", i64::MIN), record("b", "1", "g", 1)];
        assert!(is_delayed_entry(&records, 1));

        let backwards = vec![record("a", "1", "g", i64::MAX), record("b", "1", "g", -1)];
        assert!(!is_delayed_entry(&backwards, 1));
    }

    #[test]
    fn distributions_are_sorted_by_count() {
        let records = vec![
            record("1", "2", "Omar", T),
            record("2", "02", "Ahmed", T),
            record("3", "5", "Ahmed", T),
            record("4", "2", "Ahmed", T),
        ];
        let points = point_distribution(&records);
        assert_eq!(points[0].label, "Point 2");
        assert_eq!(points[0].count, 3);
        assert!((points[0].percentage - 75.0).abs() < f64::EPSILON);
        assert_eq!(points[1].label, "Point 5");

        let guards = guard_distribution(&records);
        assert_eq!(guards[0].label, "Ahmed");
        assert_eq!(guards[0].count, 3);

        assert_eq!(
            summarize(&records),
            ReportSummary {
                total_scans: 4,
                unique_points: 2,
                unique_guards: 2
            }
        );
        assert!(point_distribution(&[]).is_empty());
    }

    #[test]
    fn default_range_spans_the_last_week() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 14, 20, 0).unwrap();
        let range = ReportRange::default_for(&now);
        assert_eq!(range.start, Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap());
        assert_eq!(range.end, Utc.with_ymd_and_hms(2024, 3, 15, 23, 59, 59).unwrap());
        assert_eq!(range.label_in(&Utc), "2024/03/08 00:00 - 2024/03/15 23:59");
    }

    #[test]
    fn report_marks_late_entries() {
        let records = vec![
            record("a", "1", "Omar", T),
            record("b", "1", "Omar", T + 110 * 60),
            record("c", "4", "Ahmed", T + 30),
        ];
        let report = PatrolReport::build_in("Guard", &records, None, &Utc);
        assert_eq!(report.points.len(), 12);
        let first = &report.points[0];
        assert_eq!(first.name, point_name("1"));
        assert_eq!(
            first.entries.iter().map(|e| e.delayed).collect::<Vec<_>>(),
            vec![false, true]
        );
        assert_eq!(first.entries[0].clock, format_clock_in(T, &Utc));
        assert_eq!(report.summary.total_scans, 3);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["points"][3]["point"], "4");
        assert!(json.get("range").is_none());
    }
}
