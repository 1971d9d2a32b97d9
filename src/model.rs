use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Attendance status recorded for one student on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Sick,
    Excused,
    Absent,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 4] = [
        AttendanceStatus::Present,
        AttendanceStatus::Sick,
        AttendanceStatus::Excused,
        AttendanceStatus::Absent,
    ];

    /// Accepts the canonical names as well as the labels the front end
    /// writes (`Hadir`, `Sakit`, `Izin`, `Alfa`). Case-insensitive.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "present" | "hadir" => Some(Self::Present),
            "sick" | "sakit" => Some(Self::Sick),
            "excused" | "izin" => Some(Self::Excused),
            "absent" | "alfa" => Some(Self::Absent),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Present => "Present",
            Self::Sick => "Sick",
            Self::Excused => "Excused",
            Self::Absent => "Absent",
        }
    }

    /// Column label used in exported reports.
    pub fn label(self) -> &'static str {
        match self {
            Self::Present => "Hadir",
            Self::Sick => "Sakit",
            Self::Excused => "Izin",
            Self::Absent => "Alfa",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub nis: String,
    pub gender: Option<String>,
    pub date_of_birth: Option<String>,
    pub class_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentType {
    pub id: String,
    pub name: String,
    pub max_score: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub id: String,
    pub class_id: String,
    pub assessment_type_id: String,
    pub title: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub student_id: String,
    pub class_id: String,
    pub date: NaiveDate,
    /// `None` when storage held a value outside the four known statuses.
    pub status: Option<AttendanceStatus>,
    pub note: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRecord {
    pub student_id: String,
    pub assessment_id: String,
    pub score: f64,
}
