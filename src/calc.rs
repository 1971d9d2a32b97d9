pub mod attendance;
pub mod grades;
pub mod recap;
pub mod student;

use serde::{Serialize, Serializer};

pub use attendance::{effective_days, summarize_attendance, AttendanceReport};
pub use grades::{summarize_grades, GradeReport, GradeReportOptions};
pub use recap::daily_recap;
pub use student::summarize_student;

/// Shown wherever a statistic has nothing to be computed from.
pub const PLACEHOLDER: &str = "-";

/// Half-up 1-decimal rounding: `Int(10*x + 0.5) / 10`.
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

pub fn format_1_decimal(x: f64) -> String {
    format!("{:.1}", round_off_1_decimal(x))
}

/// `round1(numer / denom * 100)`, or 0 when the denominator is zero.
pub fn percentage(numer: u64, denom: u64) -> f64 {
    if denom == 0 {
        return 0.0;
    }
    round_off_1_decimal(100.0 * (numer as f64) / (denom as f64))
}

/// Outcome of a report computation. `Empty` is the expected "no data"
/// business condition and is distinct from an all-zero report.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Report<T> {
    Empty { reason: EmptyReason },
    Ready(T),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyReason {
    NoAttendanceInRange,
    NoAssessmentsForClass,
    NoRows,
}

/// Statistics over the recorded values of one column. Values that are not
/// recorded (or not finite) are left out of every figure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnStats {
    pub scored_count: usize,
    pub not_recorded_count: usize,
    #[serde(serialize_with = "serialize_average")]
    pub average: Option<f64>,
    #[serde(serialize_with = "serialize_extreme")]
    pub max: Option<f64>,
    #[serde(serialize_with = "serialize_extreme")]
    pub min: Option<f64>,
}

impl ColumnStats {
    pub fn average_display(&self) -> String {
        self.average
            .map(format_1_decimal)
            .unwrap_or_else(|| PLACEHOLDER.to_string())
    }
}

pub fn column_stats<I>(scores: I) -> ColumnStats
where
    I: IntoIterator<Item = Option<f64>>,
{
    let mut sum = 0.0_f64;
    let mut scored_count: usize = 0;
    let mut not_recorded_count: usize = 0;
    let mut max: Option<f64> = None;
    let mut min: Option<f64> = None;

    for s in scores {
        match s {
            Some(v) if v.is_finite() => {
                scored_count += 1;
                sum += v;
                max = Some(max.map_or(v, |m| m.max(v)));
                min = Some(min.map_or(v, |m| m.min(v)));
            }
            _ => not_recorded_count += 1,
        }
    }

    // Rounding happens on display; the float mean is kept inside [min, max].
    let average = match (min, max) {
        (Some(lo), Some(hi)) if scored_count > 0 => {
            Some((sum / (scored_count as f64)).clamp(lo, hi))
        }
        _ => None,
    };

    ColumnStats {
        scored_count,
        not_recorded_count,
        average,
        max,
        min,
    }
}

/// Render a raw score the way the front end prints numbers: integral
/// values without a fractional part (`80`), others as-is (`92.5`).
pub fn format_score(v: f64) -> String {
    format!("{}", v)
}

fn serialize_average<S: Serializer>(v: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
    match v {
        Some(v) => s.serialize_str(&format_1_decimal(*v)),
        None => s.serialize_str(PLACEHOLDER),
    }
}

fn serialize_extreme<S: Serializer>(v: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
    match v {
        Some(v) => s.serialize_f64(*v),
        None => s.serialize_str(PLACEHOLDER),
    }
}
