use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use super::{percentage, EmptyReason, Report};
use crate::model::{AttendanceRecord, AttendanceStatus, Student};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub present: u32,
    pub sick: u32,
    pub excused: u32,
    pub absent: u32,
}

impl StatusCounts {
    pub fn bump(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Present => self.present += 1,
            AttendanceStatus::Sick => self.sick += 1,
            AttendanceStatus::Excused => self.excused += 1,
            AttendanceStatus::Absent => self.absent += 1,
        }
    }

    pub fn get(&self, status: AttendanceStatus) -> u32 {
        match status {
            AttendanceStatus::Present => self.present,
            AttendanceStatus::Sick => self.sick,
            AttendanceStatus::Excused => self.excused,
            AttendanceStatus::Absent => self.absent,
        }
    }

    pub fn not_present(&self) -> u32 {
        self.sick + self.excused + self.absent
    }

    pub fn total(&self) -> u32 {
        self.present + self.not_present()
    }

    fn add(&mut self, other: &StatusCounts) {
        self.present += other.present;
        self.sick += other.sick;
        self.excused += other.excused;
        self.absent += other.absent;
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRow {
    pub student_id: String,
    pub name: String,
    #[serde(flatten)]
    pub counts: StatusCounts,
    pub attendance_percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub effective_day_count: usize,
    pub student_count: usize,
    pub record_count: usize,
    pub total_present: u32,
    pub total_absent_or_other: u32,
    pub average_presence_percentage: f64,
    pub status_totals: StatusCounts,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceReport {
    pub rows: Vec<AttendanceRow>,
    pub summary: AttendanceSummary,
}

/// Distinct dates on which at least one record exists. Days with no
/// attendance taken at all never enter the percentage denominator.
pub fn effective_days(records: &[AttendanceRecord]) -> BTreeSet<NaiveDate> {
    records.iter().map(|r| r.date).collect()
}

/// Per-student status counts over `records`. Only records dated inside
/// `scope_days` count, and a repeated (date, student) pair counts once with
/// the last record winning. No records at all yields the empty marker.
pub fn summarize_attendance(
    records: &[AttendanceRecord],
    students: &[Student],
    scope_days: &BTreeSet<NaiveDate>,
) -> Report<AttendanceReport> {
    if records.is_empty() {
        return Report::Empty {
            reason: EmptyReason::NoAttendanceInRange,
        };
    }

    let mut latest: HashMap<(NaiveDate, &str), Option<AttendanceStatus>> = HashMap::new();
    let mut skipped_out_of_scope = 0_usize;
    for r in records {
        if !scope_days.contains(&r.date) {
            skipped_out_of_scope += 1;
            continue;
        }
        latest.insert((r.date, r.student_id.as_str()), r.status);
    }

    let mut counts: HashMap<&str, StatusCounts> = students
        .iter()
        .map(|s| (s.id.as_str(), StatusCounts::default()))
        .collect();

    let mut skipped_unknown_student = 0_usize;
    let mut skipped_bad_status = 0_usize;
    for ((_, student_id), status) in &latest {
        let Some(row) = counts.get_mut(student_id) else {
            skipped_unknown_student += 1;
            continue;
        };
        match status {
            Some(status) => row.bump(*status),
            None => skipped_bad_status += 1,
        }
    }
    let duplicates = records.len() - skipped_out_of_scope - latest.len();
    if skipped_unknown_student + skipped_bad_status + skipped_out_of_scope + duplicates > 0 {
        tracing::debug!(
            skipped_unknown_student,
            skipped_bad_status,
            skipped_out_of_scope,
            duplicates,
            "attendance records left out of summary"
        );
    }

    let day_count = scope_days.len();
    let mut totals = StatusCounts::default();
    let rows: Vec<AttendanceRow> = students
        .iter()
        .map(|s| {
            let c = counts.get(s.id.as_str()).copied().unwrap_or_default();
            totals.add(&c);
            AttendanceRow {
                student_id: s.id.clone(),
                name: s.name.clone(),
                counts: c,
                attendance_percentage: percentage(u64::from(c.present), day_count as u64),
            }
        })
        .collect();

    let average_presence_percentage = percentage(
        u64::from(totals.present),
        (students.len() as u64) * (day_count as u64),
    );

    Report::Ready(AttendanceReport {
        rows,
        summary: AttendanceSummary {
            effective_day_count: day_count,
            student_count: students.len(),
            record_count: records.len(),
            total_present: totals.present,
            total_absent_or_other: totals.not_present(),
            average_presence_percentage,
            status_totals: totals,
        },
    })
}
