use crate::db;
use crate::ipc::error::HandlerError;
use crate::ipc::handlers::setup::load_attendance_settings;
use crate::ipc::helpers::{entries, optional_str, required_date, required_str, with_conn};
use crate::ipc::types::{AppState, Request};
use crate::model::{AttendanceRecord, AttendanceStatus};
use rusqlite::Connection;
use serde_json::json;
use std::collections::{HashMap, HashSet};

fn attendance_day_open(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerError> {
    let class_id = required_str(params, "classId")?;
    let date = required_date(params, "date")?;
    if !db::class_exists(conn, &class_id)? {
        return Err(HandlerError::NotFound("class"));
    }
    let settings = load_attendance_settings(conn)?;
    let students = db::list_students(conn, Some(&class_id))?;
    let saved: HashMap<String, AttendanceRecord> =
        db::attendance_in_range(conn, date, date, Some(&class_id))?
            .into_iter()
            .map(|r| (r.student_id.clone(), r))
            .collect();

    let rows: Vec<serde_json::Value> = students
        .iter()
        .map(|s| {
            let record = saved.get(&s.id);
            let status = record
                .and_then(|r| r.status)
                .unwrap_or(settings.default_status);
            json!({
                "studentId": s.id,
                "name": s.name,
                "nis": s.nis,
                "status": status.as_str(),
                "note": record.map(|r| r.note.as_str()).unwrap_or(""),
                "saved": record.is_some()
            })
        })
        .collect();

    Ok(json!({
        "classId": class_id,
        "date": date,
        "recapped": !saved.is_empty(),
        "students": rows
    }))
}

struct DayEntry {
    student_id: String,
    status: AttendanceStatus,
    note: String,
}

fn parse_day_entry(raw: &serde_json::Value) -> Result<DayEntry, HandlerError> {
    let student_id = required_str(raw, "studentId")?;
    let status_raw = required_str(raw, "status")?;
    let status = AttendanceStatus::parse(&status_raw).ok_or_else(|| {
        HandlerError::bad_params(format!("unknown status {:?} for {}", status_raw, student_id))
    })?;
    Ok(DayEntry {
        student_id,
        status,
        note: optional_str(raw, "note")?.unwrap_or_default(),
    })
}

fn attendance_save(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerError> {
    let class_id = required_str(params, "classId")?;
    let date = required_date(params, "date")?;
    if !db::class_exists(conn, &class_id)? {
        return Err(HandlerError::NotFound("class"));
    }
    let parsed = entries(params)?
        .iter()
        .map(parse_day_entry)
        .collect::<Result<Vec<_>, _>>()?;

    let roster: HashSet<String> = db::list_students(conn, Some(&class_id))?
        .into_iter()
        .map(|s| s.id)
        .collect();
    if let Some(stranger) = parsed.iter().find(|e| !roster.contains(&e.student_id)) {
        return Err(HandlerError::bad_params(format!(
            "student {} is not in class {}",
            stranger.student_id, class_id
        )));
    }

    let settings = load_attendance_settings(conn)?;
    let tx = conn.unchecked_transaction()?;
    for entry in &parsed {
        let note = if settings.keeps_note(entry.status) {
            entry.note.clone()
        } else {
            String::new()
        };
        let record = AttendanceRecord {
            student_id: entry.student_id.clone(),
            class_id: class_id.clone(),
            date,
            status: Some(entry.status),
            note,
        };
        db::upsert_attendance(&tx, &record, entry.status)
            .map_err(HandlerError::update("attendance"))?;
    }
    tx.commit()?;
    tracing::info!(class_id = %class_id, %date, saved = parsed.len(), "attendance saved");
    Ok(json!({ "saved": parsed.len() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.dayOpen" => Some(with_conn(state, req, attendance_day_open)),
        "attendance.save" => Some(with_conn(state, req, attendance_save)),
        _ => None,
    }
}
