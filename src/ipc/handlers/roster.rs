use crate::db;
use crate::ipc::error::HandlerError;
use crate::ipc::helpers::{optional_str, parse_date, required_date, required_str, with_conn};
use crate::ipc::types::{AppState, Request};
use crate::model::{Assessment, AssessmentType, Class, Student};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn classes_list(
    conn: &Connection,
    _params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerError> {
    // Correlated subqueries avoid double-counting from joins.
    let mut stmt = conn.prepare(
        "SELECT
           c.id,
           c.name,
           (SELECT COUNT(*) FROM students s WHERE s.class_id = c.id) AS student_count,
           (SELECT COUNT(*) FROM assessments a WHERE a.class_id = c.id) AS assessment_count
         FROM classes c
         ORDER BY c.name",
    )?;
    let classes = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let name: String = row.get(1)?;
            let student_count: i64 = row.get(2)?;
            let assessment_count: i64 = row.get(3)?;
            Ok(json!({
                "id": id,
                "name": name,
                "studentCount": student_count,
                "assessmentCount": assessment_count
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "classes": classes }))
}

fn classes_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerError> {
    let class = Class {
        id: Uuid::new_v4().to_string(),
        name: required_str(params, "name")?,
    };
    db::insert_class(conn, &class).map_err(HandlerError::update("classes"))?;
    Ok(json!({ "classId": class.id, "name": class.name }))
}

fn students_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerError> {
    let class_id = optional_str(params, "classId")?;
    let students = db::list_students(conn, class_id.as_deref())?;
    Ok(json!({ "students": students }))
}

fn students_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerError> {
    let class_id = required_str(params, "classId")?;
    if !db::class_exists(conn, &class_id)? {
        return Err(HandlerError::NotFound("class"));
    }
    let date_of_birth = match optional_str(params, "dateOfBirth")? {
        Some(raw) => {
            parse_date(&raw, "dateOfBirth")?;
            Some(raw)
        }
        None => None,
    };
    let student = Student {
        id: Uuid::new_v4().to_string(),
        name: required_str(params, "name")?,
        nis: required_str(params, "nis")?,
        gender: optional_str(params, "gender")?,
        date_of_birth,
        class_id,
    };
    db::insert_student(conn, &student).map_err(HandlerError::update("students"))?;
    Ok(json!({ "studentId": student.id }))
}

fn patch_text(
    patch: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Result<Option<String>, HandlerError> {
    match patch.get(key) {
        None => Ok(None),
        Some(v) => {
            let s = v.as_str().map(str::trim).filter(|s| !s.is_empty());
            match s {
                Some(s) => Ok(Some(s.to_string())),
                None => Err(HandlerError::bad_params(format!(
                    "{} must be a non-empty string",
                    key
                ))),
            }
        }
    }
}

fn patch_nullable(
    patch: &serde_json::Map<String, serde_json::Value>,
    key: &str,
) -> Result<Option<Option<String>>, HandlerError> {
    match patch.get(key) {
        None => Ok(None),
        Some(serde_json::Value::Null) => Ok(Some(None)),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => Ok(Some(None)),
        Some(serde_json::Value::String(s)) => Ok(Some(Some(s.trim().to_string()))),
        Some(_) => Err(HandlerError::bad_params(format!(
            "{} must be a string or null",
            key
        ))),
    }
}

fn students_update(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerError> {
    let student_id = required_str(params, "studentId")?;
    let patch = params
        .get("patch")
        .and_then(|v| v.as_object())
        .ok_or_else(|| HandlerError::bad_params("missing/invalid patch"))?;
    if let Some(k) = patch
        .keys()
        .find(|k| !matches!(k.as_str(), "name" | "nis" | "gender" | "dateOfBirth"))
    {
        return Err(HandlerError::bad_params(format!("unknown field {}", k)));
    }
    let date_of_birth = patch_nullable(patch, "dateOfBirth")?;
    if let Some(Some(raw)) = &date_of_birth {
        parse_date(raw, "dateOfBirth")?;
    }
    let changes = db::StudentPatch {
        name: patch_text(patch, "name")?,
        nis: patch_text(patch, "nis")?,
        gender: patch_nullable(patch, "gender")?,
        date_of_birth,
    };
    let updated = db::update_student(conn, &student_id, &changes)
        .map_err(HandlerError::update("students"))?;
    if !updated {
        return Err(HandlerError::NotFound("student"));
    }
    Ok(json!({ "ok": true }))
}

fn students_move(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerError> {
    let student_id = required_str(params, "studentId")?;
    let class_id = required_str(params, "classId")?;
    if !db::class_exists(conn, &class_id)? {
        return Err(HandlerError::NotFound("class"));
    }
    let moved = db::move_student(conn, &student_id, &class_id)
        .map_err(HandlerError::update("students"))?;
    if !moved {
        return Err(HandlerError::NotFound("student"));
    }
    tracing::info!(student_id = %student_id, class_id = %class_id, "student moved");
    Ok(json!({ "ok": true }))
}

fn students_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerError> {
    let student_id = required_str(params, "studentId")?;
    let deleted =
        db::delete_student(conn, &student_id).map_err(HandlerError::update("students"))?;
    if !deleted {
        return Err(HandlerError::NotFound("student"));
    }
    tracing::info!(student_id = %student_id, "student deleted");
    Ok(json!({ "ok": true }))
}

fn assessment_types_list(
    conn: &Connection,
    _params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerError> {
    Ok(json!({ "assessmentTypes": db::list_assessment_types(conn)? }))
}

fn assessment_types_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerError> {
    let max_score = match params.get("maxScore") {
        None => 100.0,
        Some(v) if v.is_null() => 100.0,
        Some(v) => v
            .as_f64()
            .filter(|n| n.is_finite() && *n > 0.0)
            .ok_or_else(|| HandlerError::bad_params("maxScore must be a positive number"))?,
    };
    let t = AssessmentType {
        id: Uuid::new_v4().to_string(),
        name: required_str(params, "name")?,
        max_score,
    };
    db::insert_assessment_type(conn, &t).map_err(HandlerError::update("assessment_types"))?;
    Ok(json!({ "assessmentTypeId": t.id }))
}

fn assessment_types_delete(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerError> {
    let type_id = required_str(params, "assessmentTypeId")?;
    let deleted = db::delete_assessment_type(conn, &type_id)
        .map_err(HandlerError::update("assessment_types"))?;
    if !deleted {
        return Err(HandlerError::NotFound("assessment type"));
    }
    Ok(json!({ "ok": true }))
}

fn assessments_list(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerError> {
    let class_id = optional_str(params, "classId")?;
    Ok(json!({ "assessments": db::list_assessments(conn, class_id.as_deref())? }))
}

fn assessments_create(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerError> {
    let class_id = required_str(params, "classId")?;
    if !db::class_exists(conn, &class_id)? {
        return Err(HandlerError::NotFound("class"));
    }
    let a = Assessment {
        id: Uuid::new_v4().to_string(),
        class_id,
        assessment_type_id: required_str(params, "assessmentTypeId")?,
        title: required_str(params, "title")?,
        date: required_date(params, "date")?,
    };
    db::insert_assessment(conn, &a).map_err(HandlerError::update("assessments"))?;
    Ok(json!({ "assessmentId": a.id }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handler: fn(&Connection, &serde_json::Value) -> Result<serde_json::Value, HandlerError> =
        match req.method.as_str() {
            "classes.list" => classes_list,
            "classes.create" => classes_create,
            "students.list" => students_list,
            "students.create" => students_create,
            "students.update" => students_update,
            "students.move" => students_move,
            "students.delete" => students_delete,
            "assessmentTypes.list" => assessment_types_list,
            "assessmentTypes.create" => assessment_types_create,
            "assessmentTypes.delete" => assessment_types_delete,
            "assessments.list" => assessments_list,
            "assessments.create" => assessments_create,
            _ => return None,
        };
    Some(with_conn(state, req, handler))
}
