use crate::calc::{self, ComponentScores, CourseInput, CourseRecord, FinalComponents, MarkCriteria};
use crate::grade;
use crate::ipc::error::{err, grade_err, ok};
use crate::ipc::helpers::{load_criteria, optional_f64};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

/// Builds validated records from `params.courses`. Every stateless calc method
/// goes through here, so bad letters or credits never reach the aggregator.
fn parse_courses(req: &Request) -> Result<Vec<CourseRecord>, serde_json::Value> {
    let Some(raw) = req.params.get("courses").and_then(|v| v.as_array()) else {
        return Err(err(&req.id, "bad_params", "courses must be an array", None));
    };
    let mut out = Vec::with_capacity(raw.len());
    for (i, item) in raw.iter().enumerate() {
        let input: CourseInput = match serde_json::from_value(item.clone()) {
            Ok(v) => v,
            Err(e) => {
                return Err(err(
                    &req.id,
                    "bad_params",
                    e.to_string(),
                    Some(json!({ "index": i })),
                ))
            }
        };
        match input.into_record(|| format!("course-{}", i)) {
            Ok(r) => out.push(r),
            Err(e) => {
                return Err(err(
                    &req.id,
                    e.code(),
                    e.to_string(),
                    Some(json!({ "index": i })),
                ))
            }
        }
    }
    Ok(out)
}

fn percent_param(req: &Request, key: &str) -> Result<Option<f64>, serde_json::Value> {
    let v = optional_f64(req, key)?;
    if let Some(n) = v {
        if !(0.0..=100.0).contains(&n) {
            return Err(err(
                &req.id,
                "bad_params",
                format!("{} must be between 0 and 100", key),
                None,
            ));
        }
    }
    Ok(v)
}

fn handle_grades_table(req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "grades": grade::grade_table() }))
}

fn handle_grades_points(req: &Request) -> serde_json::Value {
    let Some(letter) = req.params.get("letter").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing letter", None);
    };
    let points = match grade::points_for(letter) {
        Ok(v) => v,
        Err(e) => return grade_err(&req.id, &e),
    };
    // Points are unique per letter.
    match grade::grade_table().into_iter().find(|row| row.points == points) {
        Some(row) => ok(&req.id, json!(row)),
        None => err(&req.id, "invalid_grade", "no grade carries these points", None),
    }
}

fn handle_semester_gpa(req: &Request) -> serde_json::Value {
    let records = match parse_courses(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let gpa = calc::semester_gpa(&records);
    ok(
        &req.id,
        json!({
            "gpa": gpa,
            "gpaDisplay": calc::gpa_display(gpa),
            "totalCredits": calc::total_credits(&records),
        }),
    )
}

fn handle_cgpa(req: &Request) -> serde_json::Value {
    let records = match parse_courses(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let cgpa = calc::cumulative_cgpa(&records);
    ok(
        &req.id,
        json!({
            "cgpa": cgpa,
            "cgpaDisplay": calc::gpa_display(cgpa),
            "totalCredits": calc::total_credits(&records),
            "semesters": calc::semester_summaries(&records),
        }),
    )
}

fn component_scores(req: &Request) -> Result<ComponentScores, serde_json::Value> {
    Ok(ComponentScores {
        final_assessment: percent_param(req, "finalAssessment")?,
        assignment: percent_param(req, "assignment")?,
        model_exam: percent_param(req, "modelExam")?,
    })
}

fn handle_internal(req: &Request) -> serde_json::Value {
    match component_scores(req) {
        Ok(s) => ok(&req.id, json!({ "internal": calc::weighted_internal(&s) })),
        Err(resp) => resp,
    }
}

fn handle_final_mark(state: &mut AppState, req: &Request) -> serde_json::Value {
    let mut parts = [0.0_f64; 3];
    for (slot, key) in parts
        .iter_mut()
        .zip(["internals", "practicals", "semesterFinals"])
    {
        match percent_param(req, key) {
            Ok(Some(v)) => *slot = v,
            Ok(None) => return err(&req.id, "bad_params", format!("missing {}", key), None),
            Err(resp) => return resp,
        }
    }
    let criteria = match state.db.as_ref() {
        Some(conn) => match load_criteria(conn) {
            Ok(c) => c,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        None => MarkCriteria::default(),
    };
    let parts = FinalComponents {
        internals: parts[0],
        practicals: parts[1],
        semester_finals: parts[2],
    };
    ok(
        &req.id,
        json!({
            "finalMark": calc::final_mark(&criteria, &parts),
            "criteria": criteria,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.table" => Some(handle_grades_table(req)),
        "grades.points" => Some(handle_grades_points(req)),
        "calc.semesterGpa" => Some(handle_semester_gpa(req)),
        "calc.cgpa" => Some(handle_cgpa(req)),
        "calc.internal" => Some(handle_internal(req)),
        "calc.finalMark" => Some(handle_final_mark(state, req)),
        _ => None,
    }
}
