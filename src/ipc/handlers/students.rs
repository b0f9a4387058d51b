use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, existing_student, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "students": [] }));
    };

    let mut stmt = match conn.prepare(
        "SELECT
           s.id,
           s.name,
           s.roll_number,
           s.department,
           s.semester,
           (SELECT COUNT(*) FROM courses c WHERE c.student_id = s.id) AS course_count
         FROM students s
         ORDER BY s.sort_order",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let name: String = row.get(1)?;
            let roll_number: String = row.get(2)?;
            let department: Option<String> = row.get(3)?;
            let semester: i64 = row.get(4)?;
            let course_count: i64 = row.get(5)?;
            Ok(json!({
                "id": id,
                "name": name,
                "rollNumber": roll_number,
                "department": department,
                "semester": semester,
                "courseCount": course_count
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let roll_number = match required_str(req, "rollNumber") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let department = optional_str(req, "department");
    let semester = match req.params.get("semester") {
        None => 1,
        Some(v) if v.is_null() => 1,
        Some(v) => match v.as_i64() {
            Some(n) if n > 0 => n,
            _ => {
                return err(
                    &req.id,
                    "invalid_semester",
                    "semester must be a positive integer",
                    None,
                )
            }
        },
    };

    let sort_order = match db::next_sort_order(conn, "students", None) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let student_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO students(id, name, roll_number, department, semester, sort_order, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &student_id,
            &name,
            &roll_number,
            &department,
            semester,
            sort_order,
            db::now_ts(),
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "students" })),
        );
    }

    ok(
        &req.id,
        json!({ "studentId": student_id, "name": name, "rollNumber": roll_number }),
    )
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student_id = match existing_student(conn, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    // Dependents first; there is no ON DELETE CASCADE.
    for table in ["component_marks", "courses"] {
        if let Err(e) = tx.execute(
            &format!("DELETE FROM {} WHERE student_id = ?", table),
            [&student_id],
        ) {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_delete_failed",
                e.to_string(),
                Some(json!({ "table": table })),
            );
        }
    }
    if let Err(e) = tx.execute("DELETE FROM students WHERE id = ?", [&student_id]) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "students" })),
        );
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        _ => None,
    }
}
