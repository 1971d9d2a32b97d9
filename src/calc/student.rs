use chrono::NaiveDate;
use serde::Serialize;

use super::attendance::StatusCounts;
use crate::model::{Assessment, AssessmentType, AttendanceRecord, Class, GradeRecord, Student};

const UNKNOWN_CLASS: &str = "N/A";
const UNKNOWN_TYPE: &str = "Penilaian";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentGradeLine {
    pub assessment_id: String,
    pub label: String,
    pub date: NaiveDate,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentReport {
    pub student: Student,
    pub class_name: String,
    pub attendance: StatusCounts,
    pub has_attendance: bool,
    pub grades: Vec<StudentGradeLine>,
}

/// Individual report card: attendance totals over every record of the
/// student plus the list of recorded grades.
pub fn summarize_student(
    student: &Student,
    classes: &[Class],
    attendance: &[AttendanceRecord],
    grades: &[GradeRecord],
    assessments: &[Assessment],
    assessment_types: &[AssessmentType],
) -> StudentReport {
    let mut counts = StatusCounts::default();
    for r in attendance.iter().filter(|r| r.student_id == student.id) {
        if let Some(status) = r.status {
            counts.bump(status);
        }
    }

    let lines: Vec<StudentGradeLine> = grades
        .iter()
        .filter(|g| g.student_id == student.id && g.score.is_finite())
        .filter_map(|g| {
            let a = assessments.iter().find(|a| a.id == g.assessment_id)?;
            let type_name = assessment_types
                .iter()
                .find(|t| t.id == a.assessment_type_id)
                .map(|t| t.name.as_str())
                .unwrap_or(UNKNOWN_TYPE);
            Some(StudentGradeLine {
                assessment_id: a.id.clone(),
                label: format!("{}: {}", type_name, a.title),
                date: a.date,
                score: g.score,
            })
        })
        .collect();

    let class_name = classes
        .iter()
        .find(|c| c.id == student.class_id)
        .map(|c| c.name.clone())
        .unwrap_or_else(|| UNKNOWN_CLASS.to_string());

    StudentReport {
        student: student.clone(),
        class_name,
        has_attendance: counts.total() > 0,
        attendance: counts,
        grades: lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AttendanceStatus;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("date")
    }

    fn fixture_student() -> Student {
        Student {
            id: "s1".to_string(),
            name: "Ani".to_string(),
            nis: "1001".to_string(),
            gender: Some("P".to_string()),
            date_of_birth: None,
            class_id: "c1".to_string(),
        }
    }

    #[test]
    fn totals_and_grade_lines() {
        let student = fixture_student();
        let classes = vec![Class {
            id: "c1".to_string(),
            name: "VII A".to_string(),
        }];
        let attendance = vec![
            AttendanceRecord {
                student_id: "s1".to_string(),
                class_id: "c1".to_string(),
                date: date("2025-08-01"),
                status: Some(AttendanceStatus::Present),
                note: String::new(),
            },
            AttendanceRecord {
                student_id: "s1".to_string(),
                class_id: "c1".to_string(),
                date: date("2025-08-02"),
                status: Some(AttendanceStatus::Excused),
                note: "acara keluarga".to_string(),
            },
            AttendanceRecord {
                student_id: "s2".to_string(),
                class_id: "c1".to_string(),
                date: date("2025-08-02"),
                status: Some(AttendanceStatus::Absent),
                note: String::new(),
            },
        ];
        let assessments = vec![Assessment {
            id: "a1".to_string(),
            class_id: "c1".to_string(),
            assessment_type_id: "missing".to_string(),
            title: "Bab 1".to_string(),
            date: date("2025-08-05"),
        }];
        let grades = vec![
            GradeRecord {
                student_id: "s1".to_string(),
                assessment_id: "a1".to_string(),
                score: 88.0,
            },
            GradeRecord {
                student_id: "s1".to_string(),
                assessment_id: "deleted".to_string(),
                score: 10.0,
            },
        ];

        let report = summarize_student(&student, &classes, &attendance, &grades, &assessments, &[]);
        assert_eq!(report.class_name, "VII A");
        assert_eq!(report.attendance.present, 1);
        assert_eq!(report.attendance.excused, 1);
        assert_eq!(report.attendance.absent, 0);
        assert!(report.has_attendance);
        assert_eq!(report.grades.len(), 1);
        assert_eq!(report.grades[0].label, "Penilaian: Bab 1");
    }

    #[test]
    fn no_records_reports_no_attendance() {
        let report = summarize_student(&fixture_student(), &[], &[], &[], &[], &[]);
        assert!(!report.has_attendance);
        assert_eq!(report.class_name, "N/A");
        assert!(report.grades.is_empty());
    }
}
