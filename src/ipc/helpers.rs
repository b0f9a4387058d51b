use crate::calc::{CourseRecord, MarkCriteria};
use crate::db;
use crate::grade::LetterGrade;
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};

pub const CRITERIA_KEY: &str = "criteria.marks";

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn required_i64(req: &Request, key: &str) -> Result<i64, serde_json::Value> {
    match req.params.get(key) {
        None => Err(err(&req.id, "bad_params", format!("missing {}", key), None)),
        Some(v) => v.as_i64().ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("{} must be an integer", key),
                None,
            )
        }),
    }
}

/// Reads an optional number. `null` and a missing key both mean absent.
pub fn optional_f64(req: &Request, key: &str) -> Result<Option<f64>, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v.as_f64().map(Some).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("{} must be a number or null", key),
                None,
            )
        }),
    }
}

pub fn student_exists(conn: &Connection, student_id: &str) -> rusqlite::Result<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM students WHERE id = ?", [student_id], |r| {
            r.get(0)
        })
        .optional()?;
    Ok(found.is_some())
}

/// Resolves `params.studentId` to an existing student.
pub fn existing_student(conn: &Connection, req: &Request) -> Result<String, serde_json::Value> {
    let student_id = required_str(req, "studentId")?;
    match student_exists(conn, &student_id) {
        Ok(true) => Ok(student_id),
        Ok(false) => Err(err(&req.id, "not_found", "student not found", None)),
        Err(e) => Err(err(&req.id, "db_query_failed", e.to_string(), None)),
    }
}

pub fn load_course_records(conn: &Connection, student_id: &str) -> anyhow::Result<Vec<CourseRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, credits, grade, semester
         FROM courses
         WHERE student_id = ?
         ORDER BY semester, sort_order",
    )?;
    let rows = stmt
        .query_map([student_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, i64>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, i64>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut records = Vec::with_capacity(rows.len());
    for (id, name, credits, grade, semester) in rows {
        let grade: LetterGrade = grade.parse()?;
        records.push(CourseRecord::new(id, name, credits, grade, semester)?);
    }
    Ok(records)
}

/// Saved criteria, or the defaults when nothing valid has been saved.
pub fn load_criteria(conn: &Connection) -> anyhow::Result<MarkCriteria> {
    let Some(saved) = db::settings_get_json(conn, CRITERIA_KEY)? else {
        return Ok(MarkCriteria::default());
    };
    match serde_json::from_value::<MarkCriteria>(saved) {
        Ok(c) if c.validate().is_ok() => Ok(c),
        _ => {
            tracing::warn!("ignoring malformed saved mark criteria");
            Ok(MarkCriteria::default())
        }
    }
}
