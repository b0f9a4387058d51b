use crate::calc::MarkCriteria;
use crate::db;
use crate::ipc::error::{err, grade_err, ok};
use crate::ipc::helpers::{db_conn, load_criteria, CRITERIA_KEY};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_criteria_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "criteria": MarkCriteria::default() }));
    };
    match load_criteria(conn) {
        Ok(c) => ok(&req.id, json!({ "criteria": c })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_criteria_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let criteria: MarkCriteria = match serde_json::from_value(req.params.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    if let Err(e) = criteria.validate() {
        return grade_err(&req.id, &e);
    }
    if let Err(e) = db::settings_set_json(conn, CRITERIA_KEY, &json!(criteria)) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    tracing::info!(
        internals = criteria.internals,
        practicals = criteria.practicals,
        semester_finals = criteria.semester_finals,
        "mark criteria updated"
    );
    ok(&req.id, json!({ "criteria": criteria }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "criteria.get" => Some(handle_criteria_get(state, req)),
        "criteria.update" => Some(handle_criteria_update(state, req)),
        _ => None,
    }
}
