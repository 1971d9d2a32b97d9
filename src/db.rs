use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use std::path::Path;

use crate::model::{
    Assessment, AssessmentType, AttendanceRecord, AttendanceStatus, Class, GradeRecord, Student,
};

pub const DB_FILE_NAME: &str = "rekap.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            name TEXT NOT NULL,
            nis TEXT NOT NULL,
            gender TEXT,
            date_of_birth TEXT,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_class_sort ON students(class_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assessment_types(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            max_score REAL NOT NULL DEFAULT 100
        )",
        [],
    )?;

    // assessment_type_id is deliberately not a foreign key: types can be
    // removed while their assessments stay.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS assessments(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            assessment_type_id TEXT NOT NULL,
            title TEXT NOT NULL,
            date TEXT NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assessments_class ON assessments(class_id)",
        [],
    )?;

    // One row per student per day; re-saving overwrites.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance(
            date TEXT NOT NULL,
            student_id TEXT NOT NULL,
            class_id TEXT NOT NULL,
            status TEXT NOT NULL,
            note TEXT NOT NULL DEFAULT '',
            PRIMARY KEY(date, student_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_class_date ON attendance(class_id, date)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_student ON attendance(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            assessment_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            score REAL,
            PRIMARY KEY(assessment_id, student_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_student ON grades(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS workspace_settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

pub fn settings_get_json(
    conn: &Connection,
    key: &str,
) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM workspace_settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO workspace_settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

/// Reference collections every report cross-references.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub classes: Vec<Class>,
    pub students: Vec<Student>,
    pub assessment_types: Vec<AssessmentType>,
    pub assessments: Vec<Assessment>,
}

impl Snapshot {
    pub fn students_in_class(&self, class_id: &str) -> Vec<Student> {
        self.students
            .iter()
            .filter(|s| s.class_id == class_id)
            .cloned()
            .collect()
    }

    pub fn assessments_in_class(&self, class_id: &str) -> Vec<Assessment> {
        self.assessments
            .iter()
            .filter(|a| a.class_id == class_id)
            .cloned()
            .collect()
    }

    pub fn class(&self, class_id: &str) -> Option<&Class> {
        self.classes.iter().find(|c| c.id == class_id)
    }

    pub fn student(&self, student_id: &str) -> Option<&Student> {
        self.students.iter().find(|s| s.id == student_id)
    }
}

pub fn load_snapshot(conn: &Connection) -> anyhow::Result<Snapshot> {
    Ok(Snapshot {
        classes: list_classes(conn)?,
        students: list_students(conn, None)?,
        assessment_types: list_assessment_types(conn)?,
        assessments: list_assessments(conn, None)?,
    })
}

pub fn class_exists(conn: &Connection, class_id: &str) -> anyhow::Result<bool> {
    Ok(conn
        .query_row("SELECT 1 FROM classes WHERE id = ?", [class_id], |r| {
            r.get::<_, i64>(0)
        })
        .optional()?
        .is_some())
}

pub fn list_classes(conn: &Connection) -> anyhow::Result<Vec<Class>> {
    let mut stmt = conn.prepare("SELECT id, name FROM classes ORDER BY name")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(Class {
                id: r.get(0)?,
                name: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        class_id: r.get(1)?,
        name: r.get(2)?,
        nis: r.get(3)?,
        gender: r.get(4)?,
        date_of_birth: r.get(5)?,
    })
}

pub fn list_students(conn: &Connection, class_id: Option<&str>) -> anyhow::Result<Vec<Student>> {
    let base = "SELECT id, class_id, name, nis, gender, date_of_birth FROM students";
    let rows = match class_id {
        Some(class_id) => {
            let mut stmt = conn.prepare(&format!(
                "{} WHERE class_id = ? ORDER BY sort_order, name",
                base
            ))?;
            let rows = stmt
                .query_map([class_id], student_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let mut stmt = conn.prepare(&format!("{} ORDER BY class_id, sort_order, name", base))?;
            let rows = stmt
                .query_map([], student_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };
    Ok(rows)
}

pub fn list_assessment_types(conn: &Connection) -> anyhow::Result<Vec<AssessmentType>> {
    let mut stmt = conn.prepare("SELECT id, name, max_score FROM assessment_types ORDER BY name")?;
    let rows = stmt
        .query_map([], |r| {
            Ok(AssessmentType {
                id: r.get(0)?,
                name: r.get(1)?,
                max_score: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn assessment_from_row(r: &Row<'_>) -> rusqlite::Result<Assessment> {
    Ok(Assessment {
        id: r.get(0)?,
        class_id: r.get(1)?,
        assessment_type_id: r.get(2)?,
        title: r.get(3)?,
        date: r.get(4)?,
    })
}

pub fn list_assessments(
    conn: &Connection,
    class_id: Option<&str>,
) -> anyhow::Result<Vec<Assessment>> {
    // rowid keeps creation order for assessments that share a date.
    let base = "SELECT id, class_id, assessment_type_id, title, date FROM assessments";
    let rows = match class_id {
        Some(class_id) => {
            let mut stmt = conn.prepare(&format!("{} WHERE class_id = ? ORDER BY rowid", base))?;
            let rows = stmt
                .query_map([class_id], assessment_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let mut stmt = conn.prepare(&format!("{} ORDER BY rowid", base))?;
            let rows = stmt
                .query_map([], assessment_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        }
    };
    Ok(rows)
}

pub fn find_assessment(
    conn: &Connection,
    assessment_id: &str,
) -> anyhow::Result<Option<Assessment>> {
    Ok(conn
        .query_row(
            "SELECT id, class_id, assessment_type_id, title, date FROM assessments WHERE id = ?",
            [assessment_id],
            assessment_from_row,
        )
        .optional()?)
}

pub fn insert_class(conn: &Connection, class: &Class) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO classes(id, name) VALUES(?, ?)",
        (&class.id, &class.name),
    )?;
    Ok(())
}

pub fn insert_student(conn: &Connection, student: &Student) -> anyhow::Result<()> {
    let next_sort = next_sort_order(conn, &student.class_id)?;
    conn.execute(
        "INSERT INTO students(id, class_id, name, nis, gender, date_of_birth, sort_order)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &student.id,
            &student.class_id,
            &student.name,
            &student.nis,
            &student.gender,
            &student.date_of_birth,
            next_sort,
        ),
    )?;
    Ok(())
}

fn next_sort_order(conn: &Connection, class_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM students WHERE class_id = ?",
        [class_id],
        |r| r.get(0),
    )
}

fn close_sort_gap(conn: &Connection, class_id: &str, removed: i64) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE students SET sort_order = sort_order - 1 WHERE class_id = ? AND sort_order > ?",
        (class_id, removed),
    )
}

fn student_placement(
    conn: &Connection,
    student_id: &str,
) -> rusqlite::Result<Option<(String, i64)>> {
    conn.query_row(
        "SELECT class_id, sort_order FROM students WHERE id = ?",
        [student_id],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )
    .optional()
}

/// Field changes for `update_student`. `None` keeps the stored value; the
/// nullable fields take `Some(None)` to clear.
#[derive(Debug, Default)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub nis: Option<String>,
    pub gender: Option<Option<String>>,
    pub date_of_birth: Option<Option<String>>,
}

/// Returns false when no such student exists.
pub fn update_student(
    conn: &Connection,
    student_id: &str,
    patch: &StudentPatch,
) -> anyhow::Result<bool> {
    let mut set_parts: Vec<&str> = Vec::new();
    let mut bind_values: Vec<Value> = Vec::new();
    if let Some(name) = &patch.name {
        set_parts.push("name = ?");
        bind_values.push(Value::Text(name.clone()));
    }
    if let Some(nis) = &patch.nis {
        set_parts.push("nis = ?");
        bind_values.push(Value::Text(nis.clone()));
    }
    if let Some(gender) = &patch.gender {
        set_parts.push("gender = ?");
        bind_values.push(gender.clone().map_or(Value::Null, Value::Text));
    }
    if let Some(dob) = &patch.date_of_birth {
        set_parts.push("date_of_birth = ?");
        bind_values.push(dob.clone().map_or(Value::Null, Value::Text));
    }
    if set_parts.is_empty() {
        return Ok(student_placement(conn, student_id)?.is_some());
    }
    bind_values.push(Value::Text(student_id.to_string()));
    let sql = format!("UPDATE students SET {} WHERE id = ?", set_parts.join(", "));
    let changed = conn.execute(&sql, params_from_iter(bind_values))?;
    Ok(changed > 0)
}

/// Moves a student to the end of another class's roster. Attendance and
/// grade rows keep the class they were recorded under.
pub fn move_student(conn: &Connection, student_id: &str, class_id: &str) -> anyhow::Result<bool> {
    let tx = conn.unchecked_transaction()?;
    let Some((from_class, sort_order)) = student_placement(&tx, student_id)? else {
        return Ok(false);
    };
    if from_class == class_id {
        return Ok(true);
    }
    let next_sort = next_sort_order(&tx, class_id)?;
    tx.execute(
        "UPDATE students SET class_id = ?, sort_order = ? WHERE id = ?",
        (class_id, next_sort, student_id),
    )?;
    close_sort_gap(&tx, &from_class, sort_order)?;
    tx.commit()?;
    Ok(true)
}

/// Removes the roster entry only; recorded attendance and grades stay and
/// are skipped by reports as unknown students.
pub fn delete_student(conn: &Connection, student_id: &str) -> anyhow::Result<bool> {
    let tx = conn.unchecked_transaction()?;
    let Some((class_id, sort_order)) = student_placement(&tx, student_id)? else {
        return Ok(false);
    };
    tx.execute("DELETE FROM students WHERE id = ?", [student_id])?;
    close_sort_gap(&tx, &class_id, sort_order)?;
    tx.commit()?;
    Ok(true)
}

/// Assessments of a removed type stay and fall back to the unknown-type label.
pub fn delete_assessment_type(conn: &Connection, type_id: &str) -> anyhow::Result<bool> {
    let changed = conn.execute("DELETE FROM assessment_types WHERE id = ?", [type_id])?;
    Ok(changed > 0)
}

pub fn insert_assessment_type(conn: &Connection, t: &AssessmentType) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO assessment_types(id, name, max_score) VALUES(?, ?, ?)",
        (&t.id, &t.name, t.max_score),
    )?;
    Ok(())
}

pub fn insert_assessment(conn: &Connection, a: &Assessment) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO assessments(id, class_id, assessment_type_id, title, date)
         VALUES(?, ?, ?, ?, ?)",
        (&a.id, &a.class_id, &a.assessment_type_id, &a.title, a.date),
    )?;
    Ok(())
}

fn attendance_from_row(r: &Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    let status: String = r.get(3)?;
    Ok(AttendanceRecord {
        date: r.get(0)?,
        student_id: r.get(1)?,
        class_id: r.get(2)?,
        status: AttendanceStatus::parse(&status),
        note: r.get(4)?,
    })
}

const ATTENDANCE_COLUMNS: &str = "date, student_id, class_id, status, note";

/// Records with `start <= date <= end`, optionally narrowed to one class.
pub fn attendance_in_range(
    conn: &Connection,
    start: NaiveDate,
    end: NaiveDate,
    class_id: Option<&str>,
) -> anyhow::Result<Vec<AttendanceRecord>> {
    let mut sql = format!(
        "SELECT {} FROM attendance WHERE date >= ? AND date <= ?",
        ATTENDANCE_COLUMNS
    );
    let mut bind_values: Vec<Value> = vec![
        Value::Text(start.to_string()),
        Value::Text(end.to_string()),
    ];
    if let Some(class_id) = class_id {
        sql.push_str(" AND class_id = ?");
        bind_values.push(Value::Text(class_id.to_string()));
    }
    sql.push_str(" ORDER BY date, student_id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(bind_values), attendance_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn attendance_for_student(
    conn: &Connection,
    student_id: &str,
) -> anyhow::Result<Vec<AttendanceRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM attendance WHERE student_id = ? ORDER BY date",
        ATTENDANCE_COLUMNS
    ))?;
    let rows = stmt
        .query_map([student_id], attendance_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn upsert_attendance(
    conn: &Connection,
    record: &AttendanceRecord,
    status: AttendanceStatus,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO attendance(date, student_id, class_id, status, note)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(date, student_id) DO UPDATE SET
           class_id = excluded.class_id,
           status = excluded.status,
           note = excluded.note",
        (
            record.date,
            &record.student_id,
            &record.class_id,
            status.as_str(),
            &record.note,
        ),
    )?;
    Ok(())
}

fn grade_from_row(r: &Row<'_>) -> rusqlite::Result<Option<GradeRecord>> {
    let score: Option<f64> = r.get(2)?;
    let Some(score) = score else {
        return Ok(None);
    };
    Ok(Some(GradeRecord {
        assessment_id: r.get(0)?,
        student_id: r.get(1)?,
        score,
    }))
}

/// Grades for any of the given assessments. Rows with a NULL score are
/// treated as not recorded and left out.
pub fn grades_for_assessments(
    conn: &Connection,
    assessment_ids: &[String],
) -> anyhow::Result<Vec<GradeRecord>> {
    if assessment_ids.is_empty() {
        return Ok(Vec::new());
    }
    let placeholders = std::iter::repeat("?")
        .take(assessment_ids.len())
        .collect::<Vec<_>>()
        .join(",");
    let sql = format!(
        "SELECT assessment_id, student_id, score
         FROM grades
         WHERE assessment_id IN ({})",
        placeholders
    );
    let bind_values: Vec<Value> = assessment_ids
        .iter()
        .map(|id| Value::Text(id.clone()))
        .collect();
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(bind_values), grade_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows.into_iter().flatten().collect())
}

pub fn grades_for_student(
    conn: &Connection,
    student_id: &str,
) -> anyhow::Result<Vec<GradeRecord>> {
    let mut stmt = conn.prepare(
        "SELECT assessment_id, student_id, score FROM grades WHERE student_id = ? ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map([student_id], grade_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows.into_iter().flatten().collect())
}

pub fn upsert_grade(conn: &Connection, grade: &GradeRecord) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO grades(assessment_id, student_id, score)
         VALUES(?, ?, ?)
         ON CONFLICT(assessment_id, student_id) DO UPDATE SET score = excluded.score",
        (&grade.assessment_id, &grade.student_id, grade.score),
    )?;
    Ok(())
}
