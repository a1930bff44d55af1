//! crates/patrol_core/src/points.rs
//!
//! Validation and normalisation of scanned point codes, plus the site labels
//! printed for each checkpoint.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::PointId;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PointError {
    #[error("'{0}' is not a numeric point code")]
    NotNumeric(String),
    #[error("point {0} is not part of the patrol route")]
    OutOfRange(String),
}

fn numeric_code() -> &'static Regex {
    static CODE: OnceLock<Regex> = OnceLock::new();
    // ASCII digits only; `\d` would also accept other scripts' digits.
    CODE.get_or_init(|| Regex::new(r"^[0-9]+$").expect("static pattern is valid"))
}

/// `true` when the code consists only of ASCII digits.
pub fn is_numeric_code(code: &str) -> bool {
    numeric_code().is_match(code)
}

/// Strips leading zeros from a numeric code (`"007"` becomes `"7"`, `"000"`
/// becomes `"0"`). Non-numeric codes are returned unchanged.
///
/// Works on the digits directly, so arbitrarily long codes never overflow.
pub fn normalize_code(code: &str) -> String {
    if !is_numeric_code(code) {
        return code.to_string();
    }
    let trimmed = code.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Validates, normalises and range-checks a scanned code.
pub fn parse_point(code: &str) -> Result<PointId, PointError> {
    if !is_numeric_code(code) {
        return Err(PointError::NotNumeric(code.to_string()));
    }
    let normalized = normalize_code(code);
    normalized
        .parse::<u8>()
        .ok()
        .and_then(PointId::new)
        .ok_or(PointError::OutOfRange(normalized))
}

/// Site label for a point as stored on records (`"03"` and `"3"` agree).
pub fn point_name(point: &str) -> String {
    let normalized = normalize_code(point.trim());
    let name = match normalized.as_str() {
        "1" => "محطه مياه",
        "2" => "غرفة محول",
        "3" => "غرفة طلمبات",
        "4" => "م كيماويات",
        "5" => "م تانكات",
        "6" => "المعمل",
        "7" => "الصبه",
        "8" => "المنشر",
        "9" => "م البلوكات",
        "10" => "المقصات",
        "11" => "البسكول",
        "12" => "ش خلفى",
        _ => return point_label(&normalized),
    };
    name.to_string()
}

/// The neutral `Point N` label used in distributions.
pub fn point_label(point: &str) -> String {
    format!("Point {}", normalize_code(point.trim()))
}
