use chrono::NaiveDate;
use serde::Serialize;

use super::attendance::StatusCounts;
use crate::model::{AttendanceRecord, Class, Student};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRecap {
    pub class_id: String,
    pub name: String,
    pub student_count: usize,
    pub recapped: bool,
    pub counts: StatusCounts,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyRecap {
    pub date: NaiveDate,
    pub classes: Vec<ClassRecap>,
    pub class_count: usize,
    pub recapped_class_count: usize,
    pub recap_percentage: u32,
    pub total_present: u32,
    pub total_not_present: u32,
}

/// Per-class progress for one day. A class counts as recapped once any
/// attendance record exists for it on that day.
pub fn daily_recap(
    date: NaiveDate,
    classes: &[Class],
    students: &[Student],
    records: &[AttendanceRecord],
) -> DailyRecap {
    let day_records: Vec<&AttendanceRecord> = records.iter().filter(|r| r.date == date).collect();

    let mut total = StatusCounts::default();
    for r in &day_records {
        if let Some(status) = r.status {
            total.bump(status);
        }
    }

    let rows: Vec<ClassRecap> = classes
        .iter()
        .map(|c| {
            let mut counts = StatusCounts::default();
            let mut recapped = false;
            for r in day_records.iter().filter(|r| r.class_id == c.id) {
                recapped = true;
                if let Some(status) = r.status {
                    counts.bump(status);
                }
            }
            ClassRecap {
                class_id: c.id.clone(),
                name: c.name.clone(),
                student_count: students.iter().filter(|s| s.class_id == c.id).count(),
                recapped,
                counts,
            }
        })
        .collect();

    let recapped_class_count = rows.iter().filter(|r| r.recapped).count();
    let recap_percentage = if classes.is_empty() {
        0
    } else {
        ((100.0 * recapped_class_count as f64) / (classes.len() as f64)).round() as u32
    };

    DailyRecap {
        date,
        class_count: classes.len(),
        recapped_class_count,
        recap_percentage,
        total_present: total.present,
        total_not_present: total.not_present(),
        classes: rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttendanceStatus;

    fn class(id: &str) -> Class {
        Class {
            id: id.to_string(),
            name: id.to_uppercase(),
        }
    }

    fn rec(class_id: &str, student_id: &str, status: Option<AttendanceStatus>) -> AttendanceRecord {
        AttendanceRecord {
            student_id: student_id.to_string(),
            class_id: class_id.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 8, 4).expect("date"),
            status,
            note: String::new(),
        }
    }

    #[test]
    fn one_of_three_classes_recapped() {
        let today = NaiveDate::from_ymd_opt(2025, 8, 4).expect("date");
        let classes = vec![class("a"), class("b"), class("c")];
        let records = vec![
            rec("a", "s1", Some(AttendanceStatus::Present)),
            rec("a", "s2", Some(AttendanceStatus::Sick)),
            rec("a", "s3", None),
        ];
        let recap = daily_recap(today, &classes, &[], &records);
        assert_eq!(recap.recapped_class_count, 1);
        assert_eq!(recap.recap_percentage, 33);
        assert_eq!(recap.total_present, 1);
        assert_eq!(recap.total_not_present, 1);
        assert!(recap.classes[0].recapped);
        assert!(!recap.classes[1].recapped);
    }

    #[test]
    fn no_classes_is_zero_percent() {
        let today = NaiveDate::from_ymd_opt(2025, 8, 4).expect("date");
        let recap = daily_recap(today, &[], &[], &[]);
        assert_eq!(recap.recap_percentage, 0);
        assert_eq!(recap.class_count, 0);
    }
}
