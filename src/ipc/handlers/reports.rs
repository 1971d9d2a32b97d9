use crate::calc::{
    self, AttendanceReport, EmptyReason, GradeReport, GradeReportOptions, Report,
};
use crate::db::{self, Snapshot};
use crate::export;
use crate::ipc::error::HandlerError;
use crate::ipc::handlers::setup::{load_report_settings, ReportSettings};
use crate::ipc::helpers::{optional_date, optional_str, required_str, today, with_conn};
use crate::ipc::types::{AppState, Request};
use crate::period::{self, DateRange, ReportPeriod};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AttendanceModel {
    period: DateRange,
    class_id: Option<String>,
    #[serde(flatten)]
    report: AttendanceReport,
}

fn to_json<T: Serialize>(value: T) -> Result<serde_json::Value, HandlerError> {
    serde_json::to_value(value).map_err(|e| HandlerError::DbQuery(e.into()))
}

fn resolve_range(
    params: &serde_json::Value,
    settings: &ReportSettings,
) -> Result<DateRange, HandlerError> {
    let start = optional_date(params, "startDate")?;
    let end = optional_date(params, "endDate")?;
    let period = match optional_str(params, "period")? {
        Some(raw) => ReportPeriod::parse(&raw)
            .ok_or_else(|| HandlerError::bad_params(format!("unknown period {:?}", raw)))?,
        // Explicit bounds without a period name read as a custom range.
        None if start.is_some() || end.is_some() => ReportPeriod::Custom,
        None => settings.default_period,
    };
    let custom = start.zip(end);
    period::resolve(period, today(params)?, custom)
        .map_err(|e| HandlerError::bad_params(e.to_string()))
}

fn build_attendance(
    conn: &Connection,
    params: &serde_json::Value,
    settings: &ReportSettings,
) -> Result<Report<AttendanceModel>, HandlerError> {
    let range = resolve_range(params, settings)?;
    let class_id = optional_str(params, "classId")?;
    if let Some(class_id) = class_id.as_deref() {
        if !db::class_exists(conn, class_id)? {
            return Err(HandlerError::NotFound("class"));
        }
    }

    let records = db::attendance_in_range(conn, range.start, range.end, class_id.as_deref())?;
    let present: HashSet<&str> = records.iter().map(|r| r.student_id.as_str()).collect();
    let students: Vec<_> = db::list_students(conn, class_id.as_deref())?
        .into_iter()
        .filter(|s| present.contains(s.id.as_str()))
        .collect();
    let scope_days = calc::effective_days(&records);
    let report = match calc::summarize_attendance(&records, &students, &scope_days) {
        Report::Ready(r) => r,
        Report::Empty { reason } => return Ok(Report::Empty { reason }),
    };
    tracing::debug!(
        start = %range.start,
        end = %range.end,
        records = records.len(),
        rows = report.rows.len(),
        "attendance report built"
    );
    Ok(Report::Ready(AttendanceModel {
        period: range,
        class_id,
        report,
    }))
}

fn build_grades(
    conn: &Connection,
    params: &serde_json::Value,
    settings: &ReportSettings,
) -> Result<Report<GradeReport>, HandlerError> {
    let class_id = required_str(params, "classId")?;
    let snapshot: Snapshot = db::load_snapshot(conn)?;
    if snapshot.class(&class_id).is_none() {
        return Err(HandlerError::NotFound("class"));
    }
    let assessments = snapshot.assessments_in_class(&class_id);
    let ids: Vec<String> = assessments.iter().map(|a| a.id.clone()).collect();
    let grades = db::grades_for_assessments(conn, &ids)?;
    let options = GradeReportOptions {
        unknown_type_label: settings.unknown_type_label.clone(),
    };
    Ok(calc::summarize_grades(
        &snapshot.students_in_class(&class_id),
        &assessments,
        &grades,
        &snapshot.assessment_types,
        &options,
    ))
}

fn reports_attendance_model(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerError> {
    let settings = load_report_settings(conn)?;
    to_json(build_attendance(conn, params, &settings)?)
}

fn reports_grade_model(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerError> {
    let settings = load_report_settings(conn)?;
    to_json(build_grades(conn, params, &settings)?)
}

fn reports_student_model(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerError> {
    let student_id = required_str(params, "studentId")?;
    let snapshot = db::load_snapshot(conn)?;
    let student = snapshot
        .student(&student_id)
        .ok_or(HandlerError::NotFound("student"))?;
    let attendance = db::attendance_for_student(conn, &student_id)?;
    let grades = db::grades_for_student(conn, &student_id)?;
    let report = calc::summarize_student(
        student,
        &snapshot.classes,
        &attendance,
        &grades,
        &snapshot.assessments,
        &snapshot.assessment_types,
    );
    to_json(report)
}

fn reports_daily_recap_model(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerError> {
    let date = match optional_date(params, "date")? {
        Some(d) => d,
        None => today(params)?,
    };
    let snapshot = db::load_snapshot(conn)?;
    let records = db::attendance_in_range(conn, date, date, None)?;
    let recap = calc::daily_recap(date, &snapshot.classes, &snapshot.students, &records);
    to_json(recap)
}

fn csv_file(file_name: &str, content: String) -> serde_json::Value {
    json!({
        "status": "ready",
        "fileName": file_name,
        "mimeType": export::CSV_MIME,
        "content": content
    })
}

fn empty(reason: EmptyReason) -> Result<serde_json::Value, HandlerError> {
    to_json(Report::<()>::Empty { reason })
}

fn export_attendance_csv(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerError> {
    let settings = load_report_settings(conn)?;
    let model = match build_attendance(conn, params, &settings)? {
        Report::Ready(m) => m,
        Report::Empty { reason } => return empty(reason),
    };
    if model.report.rows.is_empty() {
        return empty(EmptyReason::NoRows);
    }
    let content = export::attendance_csv(&model.report, settings.csv_quoting);
    tracing::info!(rows = model.report.rows.len(), "attendance csv exported");
    Ok(csv_file(export::ATTENDANCE_CSV_NAME, content))
}

fn export_grades_csv(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerError> {
    let settings = load_report_settings(conn)?;
    let report = match build_grades(conn, params, &settings)? {
        Report::Ready(r) => r,
        Report::Empty { reason } => return empty(reason),
    };
    if report.rows.is_empty() {
        return empty(EmptyReason::NoRows);
    }
    let content = export::grades_csv(&report);
    tracing::info!(rows = report.rows.len(), "grades csv exported");
    Ok(csv_file(export::GRADES_CSV_NAME, content))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handler: fn(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerError> =
        match req.method.as_str() {
            "reports.attendanceModel" => reports_attendance_model,
            "reports.gradeModel" => reports_grade_model,
            "reports.studentModel" => reports_student_model,
            "reports.dailyRecapModel" => reports_daily_recap_model,
            "export.attendanceCsv" => export_attendance_csv,
            "export.gradesCsv" => export_grades_csv,
            _ => return None,
        };
    Some(with_conn(state, req, handler))
}
