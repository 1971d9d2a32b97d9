use std::collections::HashMap;

use serde::{Serialize, Serializer};

use super::{column_stats, format_score, ColumnStats, EmptyReason, Report};
use crate::model::{Assessment, AssessmentType, GradeRecord, Student};

pub const HEADER_NIS: &str = "NIS";
pub const HEADER_NAME: &str = "Nama Siswa";
pub const HEADER_AVERAGE: &str = "Rata-Rata";

/// One gradebook cell. Serializes to the display value: text as-is,
/// scores as numbers, missing scores as an empty string.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Score(f64),
    Empty,
}

impl Cell {
    pub fn render(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Score(v) => format_score(*v),
            Cell::Empty => String::new(),
        }
    }

    pub fn score(&self) -> Option<f64> {
        match self {
            Cell::Score(v) => Some(*v),
            _ => None,
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Text(v) => s.serialize_str(v),
            Cell::Score(v) => s.serialize_f64(*v),
            Cell::Empty => s.serialize_str(""),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GradeReportOptions {
    /// Type name used in a column label when the assessment's type is unknown.
    pub unknown_type_label: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeReport {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    pub stats: Vec<ColumnStats>,
    pub assessments: Vec<Assessment>,
}

impl GradeReport {
    pub fn rendered_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|r| r.iter().map(Cell::render).collect())
            .collect()
    }
}

pub fn column_label(
    assessment: &Assessment,
    types: &[AssessmentType],
    options: &GradeReportOptions,
) -> String {
    let type_name = types
        .iter()
        .find(|t| t.id == assessment.assessment_type_id)
        .map(|t| t.name.as_str())
        .unwrap_or(options.unknown_type_label.as_str());
    format!("{}: {}", type_name, assessment.title)
}

/// Grade grid for one class. A class without assessments yields the
/// empty marker rather than a grid with no score columns.
pub fn summarize_grades(
    students: &[Student],
    assessments: &[Assessment],
    grades: &[GradeRecord],
    assessment_types: &[AssessmentType],
    options: &GradeReportOptions,
) -> Report<GradeReport> {
    if assessments.is_empty() {
        return Report::Empty {
            reason: EmptyReason::NoAssessmentsForClass,
        };
    }
    let mut ordered: Vec<Assessment> = assessments.to_vec();
    // Stable: equal dates keep their input order.
    ordered.sort_by_key(|a| a.date);

    let mut score_by_pair: HashMap<(&str, &str), Option<f64>> = HashMap::new();
    for g in grades {
        let value = g.score.is_finite().then_some(g.score);
        score_by_pair.insert((g.student_id.as_str(), g.assessment_id.as_str()), value);
    }

    let mut headers: Vec<String> = Vec::with_capacity(ordered.len() + 3);
    headers.push(HEADER_NIS.to_string());
    headers.push(HEADER_NAME.to_string());
    headers.extend(
        ordered
            .iter()
            .map(|a| column_label(a, assessment_types, options)),
    );
    headers.push(HEADER_AVERAGE.to_string());

    let rows: Vec<Vec<Cell>> = students
        .iter()
        .map(|s| {
            let scores: Vec<Option<f64>> = ordered
                .iter()
                .map(|a| {
                    score_by_pair
                        .get(&(s.id.as_str(), a.id.as_str()))
                        .copied()
                        .flatten()
                })
                .collect();
            let mut row: Vec<Cell> = Vec::with_capacity(scores.len() + 3);
            row.push(Cell::Text(s.nis.clone()));
            row.push(Cell::Text(s.name.clone()));
            row.extend(scores.iter().map(|v| v.map(Cell::Score).unwrap_or(Cell::Empty)));
            row.push(Cell::Text(column_stats(scores).average_display()));
            row
        })
        .collect();

    let stats: Vec<ColumnStats> = (0..ordered.len())
        .map(|i| column_stats(rows.iter().map(|r| r[i + 2].score())))
        .collect();

    tracing::debug!(
        students = students.len(),
        assessments = ordered.len(),
        grades = grades.len(),
        "grade summary built"
    );

    Report::Ready(GradeReport {
        headers,
        rows,
        stats,
        assessments: ordered,
    })
}
