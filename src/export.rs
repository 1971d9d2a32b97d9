use crate::calc::{format_1_decimal, AttendanceReport, GradeReport};
use crate::model::AttendanceStatus;

pub const CSV_MIME: &str = "text/csv;charset=utf-8;";
pub const ATTENDANCE_CSV_NAME: &str = "laporan_kehadiran.csv";
pub const GRADES_CSV_NAME: &str = "laporan_nilai.csv";

const DELIMITER: char = ',';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quoting {
    /// Wrap a field only when it holds the delimiter, a quote, or a line break.
    Minimal,
    /// Wrap every field.
    Always,
}

impl Quoting {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "minimal" => Some(Self::Minimal),
            "always" => Some(Self::Always),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Always => "always",
        }
    }
}

fn needs_quotes(field: &str) -> bool {
    field.contains(DELIMITER) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

fn push_field(out: &mut String, field: &str, quoting: Quoting) {
    if quoting == Quoting::Always || needs_quotes(field) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

fn push_row<S: AsRef<str>>(out: &mut String, row: &[S], quoting: Quoting) {
    for (i, field) in row.iter().enumerate() {
        if i > 0 {
            out.push(DELIMITER);
        }
        push_field(out, field.as_ref(), quoting);
    }
}

/// Header row first, then data rows, joined with `\n` and no trailing
/// newline. The header row is always minimally quoted; `quoting` applies to
/// data rows.
pub fn encode_delimited<H, R>(headers: &[H], rows: &[Vec<R>], quoting: Quoting) -> String
where
    H: AsRef<str>,
    R: AsRef<str>,
{
    let mut out = String::new();
    push_row(&mut out, headers, Quoting::Minimal);
    for row in rows {
        out.push('\n');
        push_row(&mut out, row, quoting);
    }
    out
}

pub fn attendance_headers() -> Vec<String> {
    let mut headers = vec!["Nama Siswa".to_string()];
    headers.extend(AttendanceStatus::ALL.iter().map(|s| s.label().to_string()));
    headers.push("Kehadiran (%)".to_string());
    headers
}

pub fn attendance_table(report: &AttendanceReport) -> Vec<Vec<String>> {
    let no_days = report.summary.effective_day_count == 0;
    report
        .rows
        .iter()
        .map(|r| {
            let mut row = vec![r.name.clone()];
            row.extend(
                AttendanceStatus::ALL
                    .iter()
                    .map(|s| r.counts.get(*s).to_string()),
            );
            row.push(if no_days {
                "0".to_string()
            } else {
                format_1_decimal(r.attendance_percentage)
            });
            row
        })
        .collect()
}

pub fn attendance_csv(report: &AttendanceReport, quoting: Quoting) -> String {
    encode_delimited(&attendance_headers(), &attendance_table(report), quoting)
}

/// Grade rows are quoted unconditionally.
pub fn grades_csv(report: &GradeReport) -> String {
    encode_delimited(&report.headers, &report.rendered_rows(), Quoting::Always)
}
