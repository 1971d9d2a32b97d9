use crate::db;
use crate::ipc::error::HandlerError;
use crate::ipc::helpers::{entries, required_str, with_conn};
use crate::ipc::types::{AppState, Request};
use crate::model::{Assessment, GradeRecord};
use rusqlite::Connection;
use serde_json::json;
use std::collections::{HashMap, HashSet};

fn open_assessment(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<Assessment, HandlerError> {
    let assessment_id = required_str(params, "assessmentId")?;
    db::find_assessment(conn, &assessment_id)?.ok_or(HandlerError::NotFound("assessment"))
}

fn grades_assessment_open(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerError> {
    let assessment = open_assessment(conn, params)?;
    let max_score = db::list_assessment_types(conn)?
        .into_iter()
        .find(|t| t.id == assessment.assessment_type_id)
        .map(|t| t.max_score);
    let scores: HashMap<String, f64> = db::grades_for_assessments(conn, &[assessment.id.clone()])?
        .into_iter()
        .map(|g| (g.student_id, g.score))
        .collect();
    let rows: Vec<serde_json::Value> = db::list_students(conn, Some(&assessment.class_id))?
        .into_iter()
        .map(|s| {
            json!({
                "studentId": s.id,
                "name": s.name,
                "nis": s.nis,
                "score": scores.get(&s.id)
            })
        })
        .collect();
    Ok(json!({
        "assessment": assessment,
        "maxScore": max_score,
        "students": rows
    }))
}

/// `None` means the cell was left blank and is not saved.
fn parse_score(
    raw: Option<&serde_json::Value>,
    student_id: &str,
) -> Result<Option<f64>, HandlerError> {
    let score = match raw {
        None | Some(serde_json::Value::Null) => return Ok(None),
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => {
            let t = s.trim();
            if t.is_empty() {
                return Ok(None);
            }
            t.parse::<f64>().ok()
        }
        Some(_) => None,
    };
    match score {
        Some(v) if v.is_finite() && v >= 0.0 => Ok(Some(v)),
        _ => Err(HandlerError::bad_params(format!(
            "score for {} must be a non-negative number",
            student_id
        ))),
    }
}

fn grades_save(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerError> {
    let assessment = open_assessment(conn, params)?;
    let roster: HashSet<String> = db::list_students(conn, Some(&assessment.class_id))?
        .into_iter()
        .map(|s| s.id)
        .collect();

    let mut pending: Vec<GradeRecord> = Vec::new();
    let mut skipped = 0usize;
    for raw in entries(params)? {
        let student_id = required_str(raw, "studentId")?;
        if !roster.contains(&student_id) {
            return Err(HandlerError::bad_params(format!(
                "student {} is not in class {}",
                student_id, assessment.class_id
            )));
        }
        match parse_score(raw.get("score"), &student_id)? {
            Some(score) => pending.push(GradeRecord {
                student_id,
                assessment_id: assessment.id.clone(),
                score,
            }),
            None => skipped += 1,
        }
    }

    let tx = conn.unchecked_transaction()?;
    for grade in &pending {
        db::upsert_grade(&tx, grade).map_err(HandlerError::update("grades"))?;
    }
    tx.commit()?;
    tracing::info!(assessment_id = %assessment.id, saved = pending.len(), skipped, "grades saved");
    Ok(json!({ "saved": pending.len(), "skipped": skipped }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.assessmentOpen" => Some(with_conn(state, req, grades_assessment_open)),
        "grades.save" => Some(with_conn(state, req, grades_save)),
        _ => None,
    }
}
