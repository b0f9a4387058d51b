use crate::calc::{self, CourseRecord};
use crate::db;
use crate::grade::LetterGrade;
use crate::ipc::error::{err, grade_err, ok};
use crate::ipc::helpers::{
    db_conn, existing_student, load_course_records, required_i64, required_str,
};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use uuid::Uuid;

fn course_json(r: &CourseRecord) -> serde_json::Value {
    json!({
        "id": r.id,
        "name": r.name,
        "credits": r.credits,
        "grade": r.grade,
        "semester": r.semester,
        "gradePoint": r.grade_points(),
        "tier": r.grade.tier(),
    })
}

/// Shared prelude for the read-only course views.
fn student_records(
    state: &AppState,
    req: &Request,
) -> Result<(String, Vec<CourseRecord>), serde_json::Value> {
    let conn = db_conn(state, req)?;
    let student_id = existing_student(conn, req)?;
    let records = load_course_records(conn, &student_id)
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;
    Ok((student_id, records))
}

fn handle_courses_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    match student_records(state, req) {
        Ok((student_id, records)) => {
            let courses: Vec<serde_json::Value> = records.iter().map(course_json).collect();
            ok(
                &req.id,
                json!({ "studentId": student_id, "courses": courses }),
            )
        }
        Err(resp) => resp,
    }
}

fn handle_courses_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student_id = match existing_student(conn, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let grade_raw = match required_str(req, "grade") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let credits = match required_i64(req, "credits") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let semester = match required_i64(req, "semester") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let grade: LetterGrade = match grade_raw.parse() {
        Ok(g) => g,
        Err(e) => return grade_err(&req.id, &e),
    };
    let record = match CourseRecord::new(Uuid::new_v4().to_string(), name, credits, grade, semester) {
        Ok(r) => r,
        Err(e) => return grade_err(&req.id, &e),
    };

    let sort_order = match db::next_sort_order(conn, "courses", Some(("student_id", student_id.as_str()))) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    if let Err(e) = conn.execute(
        "INSERT INTO courses(id, student_id, name, credits, grade, semester, sort_order, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &record.id,
            &student_id,
            &record.name,
            record.credits,
            record.grade.as_str(),
            record.semester,
            sort_order,
            db::now_ts(),
        ),
    ) {
        tracing::error!(error = %e, "course insert failed");
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "courses" })),
        );
    }

    ok(&req.id, json!({ "course": course_json(&record) }))
}

fn handle_courses_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let course_id = match required_str(req, "courseId") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match conn.execute(
        "DELETE FROM courses WHERE id = ? AND student_id = ?",
        (&course_id, &student_id),
    ) {
        Ok(0) => err(&req.id, "not_found", "course not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(
            &req.id,
            "db_delete_failed",
            e.to_string(),
            Some(json!({ "table": "courses" })),
        ),
    }
}

fn handle_results_summary(state: &mut AppState, req: &Request) -> serde_json::Value {
    let (student_id, records) = match student_records(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let cgpa = calc::cumulative_cgpa(&records);
    let courses: Vec<serde_json::Value> = records.iter().map(course_json).collect();
    ok(
        &req.id,
        json!({
            "studentId": student_id,
            "courses": courses,
            "semesters": calc::semester_summaries(&records),
            "cgpa": cgpa,
            "cgpaDisplay": calc::gpa_display(cgpa),
            "totalCredits": calc::total_credits(&records),
        }),
    )
}

fn handle_performance_overview(state: &mut AppState, req: &Request) -> serde_json::Value {
    match student_records(state, req) {
        Ok((_, records)) => ok(
            &req.id,
            json!(calc::performance_overview(&records)),
        ),
        Err(resp) => resp,
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "courses.list" => Some(handle_courses_list(state, req)),
        "courses.add" => Some(handle_courses_add(state, req)),
        "courses.remove" => Some(handle_courses_remove(state, req)),
        "results.summary" => Some(handle_results_summary(state, req)),
        "performance.overview" => Some(handle_performance_overview(state, req)),
        _ => None,
    }
}
