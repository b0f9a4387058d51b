use crate::calc::{self, ComponentScores};
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, existing_student, optional_f64, required_str};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;

#[derive(Clone, Copy)]
enum Component {
    FinalAssessment,
    Assignment,
    ModelExam,
}

impl Component {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "fat" => Some(Self::FinalAssessment),
            "assignment" => Some(Self::Assignment),
            "model" => Some(Self::ModelExam),
            _ => None,
        }
    }

    fn column(self) -> &'static str {
        match self {
            Self::FinalAssessment => "fat",
            Self::Assignment => "assignment",
            Self::ModelExam => "model",
        }
    }
}

fn load_scores(
    conn: &Connection,
    subject_code: &str,
    student_id: &str,
) -> rusqlite::Result<ComponentScores> {
    let row: Option<(Option<f64>, Option<f64>, Option<f64>)> = conn
        .query_row(
            "SELECT fat, assignment, model
             FROM component_marks
             WHERE subject_code = ? AND student_id = ?",
            (subject_code, student_id),
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()?;
    let (fat, assignment, model) = row.unwrap_or((None, None, None));
    Ok(ComponentScores {
        final_assessment: fat,
        assignment,
        model_exam: model,
    })
}

fn handle_marks_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let subject_code = match required_str(req, "subjectCode") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    // Every student gets a row, marked or not; missing components count as 0.
    let mut stmt = match conn.prepare(
        "SELECT s.id, s.name, s.roll_number, m.fat, m.assignment, m.model
         FROM students s
         LEFT JOIN component_marks m
           ON m.student_id = s.id AND m.subject_code = ?
         ORDER BY s.sort_order",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([&subject_code], |row| {
            let student_id: String = row.get(0)?;
            let name: String = row.get(1)?;
            let roll_number: String = row.get(2)?;
            let scores = ComponentScores {
                final_assessment: row.get(3)?,
                assignment: row.get(4)?,
                model_exam: row.get(5)?,
            };
            Ok(json!({
                "studentId": student_id,
                "name": name,
                "rollNumber": roll_number,
                "finalAssessment": scores.final_assessment,
                "assignment": scores.assignment,
                "modelExam": scores.model_exam,
                "internal": calc::weighted_internal(&scores),
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(rows) => ok(
            &req.id,
            json!({ "subjectCode": subject_code, "rows": rows }),
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_marks_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let subject_code = match required_str(req, "subjectCode") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let student_id = match existing_student(conn, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let component = match required_str(req, "component") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Some(component) = Component::parse(&component) else {
        return err(
            &req.id,
            "bad_params",
            "component must be one of fat, assignment, model",
            None,
        );
    };
    if req.params.get("value").is_none() {
        return err(&req.id, "bad_params", "missing value", None);
    }
    // Entered values are clamped into [0, 100]; null clears the component.
    let value = match optional_f64(req, "value") {
        Ok(v) => v.and_then(calc::clamp_component),
        Err(resp) => return resp,
    };

    let sql = format!(
        "INSERT INTO component_marks(subject_code, student_id, {col}, updated_at)
         VALUES(?, ?, ?, ?)
         ON CONFLICT(subject_code, student_id) DO UPDATE
         SET {col} = excluded.{col}, updated_at = excluded.updated_at",
        col = component.column()
    );
    if let Err(e) = conn.execute(&sql, (&subject_code, &student_id, value, db::now_ts())) {
        return err(
            &req.id,
            "db_update_failed",
            e.to_string(),
            Some(json!({ "table": "component_marks" })),
        );
    }

    match load_scores(conn, &subject_code, &student_id) {
        Ok(scores) => ok(
            &req.id,
            json!({
                "studentId": student_id,
                "subjectCode": subject_code,
                "finalAssessment": scores.final_assessment,
                "assignment": scores.assignment,
                "modelExam": scores.model_exam,
                "internal": calc::weighted_internal(&scores),
            }),
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "marks.get" => Some(handle_marks_get(state, req)),
        "marks.set" => Some(handle_marks_set(state, req)),
        _ => None,
    }
}
