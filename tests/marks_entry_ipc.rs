use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_resultsd");
    let mut child = Command::new(exe)
        .env_remove("RESULTSD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn resultsd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn read_line(reader: &mut BufReader<ChildStdout>) -> serde_json::Value {
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response");
    serde_json::from_str(line.trim()).expect("parse response json")
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");
    let value = read_line(reader);
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn result_of(value: &serde_json::Value, method: &str) -> serde_json::Value {
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> String {
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false));
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn open_workspace(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    prefix: &str,
) -> PathBuf {
    let workspace = temp_dir(prefix);
    let selected = request(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    result_of(&selected, "workspace.select");
    workspace
}

fn set_mark(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    student_id: &str,
    component: &str,
    value: serde_json::Value,
) -> serde_json::Value {
    request(
        stdin,
        reader,
        id,
        "marks.set",
        json!({
            "subjectCode": "CS301",
            "studentId": student_id,
            "component": component,
            "value": value
        }),
    )
}

#[test]
fn marks_entry_recomputes_internal_per_student() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = open_workspace(&mut stdin, &mut reader, "resultsd-marks");

    let mut ids = Vec::new();
    for (i, (name, roll)) in [
        ("Alice Johnson", "CSE001"),
        ("Bob Smith", "CSE002"),
        ("Charlie Brown", "CSE003"),
    ]
    .iter()
    .enumerate()
    {
        let created = request(
            &mut stdin,
            &mut reader,
            &format!("s{}", i),
            "students.create",
            json!({ "name": name, "rollNumber": roll }),
        );
        ids.push(
            result_of(&created, "students.create")
                .get("studentId")
                .and_then(|v| v.as_str())
                .expect("studentId")
                .to_string(),
        );
    }

    let r = set_mark(&mut stdin, &mut reader, "1", &ids[0], "fat", json!(80));
    let r = result_of(&r, "marks.set");
    assert_eq!(r.get("internal").and_then(|v| v.as_f64()), Some(48.0));
    assert_eq!(r.get("assignment"), Some(&json!(null)));

    let r = set_mark(&mut stdin, &mut reader, "2", &ids[0], "assignment", json!(100));
    assert_eq!(
        result_of(&r, "marks.set").get("internal").and_then(|v| v.as_f64()),
        Some(68.0)
    );
    let r = set_mark(&mut stdin, &mut reader, "3", &ids[0], "model", json!(100));
    assert_eq!(
        result_of(&r, "marks.set").get("internal").and_then(|v| v.as_f64()),
        Some(88.0)
    );

    // Form values are clamped into range.
    let r = set_mark(&mut stdin, &mut reader, "4", &ids[1], "fat", json!(150));
    let r = result_of(&r, "marks.set");
    assert_eq!(r.get("finalAssessment").and_then(|v| v.as_f64()), Some(100.0));
    assert_eq!(r.get("internal").and_then(|v| v.as_f64()), Some(60.0));
    let r = set_mark(&mut stdin, &mut reader, "5", &ids[1], "model", json!(-4));
    let r = result_of(&r, "marks.set");
    assert_eq!(r.get("modelExam").and_then(|v| v.as_f64()), Some(0.0));

    // null clears a component.
    let r = set_mark(&mut stdin, &mut reader, "6", &ids[1], "fat", json!(null));
    let r = result_of(&r, "marks.set");
    assert_eq!(r.get("finalAssessment"), Some(&json!(null)));
    assert_eq!(r.get("internal").and_then(|v| v.as_f64()), Some(0.0));

    let bad = set_mark(&mut stdin, &mut reader, "7", &ids[2], "practical", json!(50));
    assert_eq!(error_code(&bad), "bad_params");
    let bad = set_mark(&mut stdin, &mut reader, "8", &ids[2], "fat", json!("high"));
    assert_eq!(error_code(&bad), "bad_params");
    let ghost = set_mark(&mut stdin, &mut reader, "9", "nope", "fat", json!(50));
    assert_eq!(error_code(&ghost), "not_found");

    let sheet = request(
        &mut stdin,
        &mut reader,
        "10",
        "marks.get",
        json!({ "subjectCode": "CS301" }),
    );
    let sheet = result_of(&sheet, "marks.get");
    let rows = sheet.get("rows").and_then(|v| v.as_array()).expect("rows");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].get("rollNumber"), Some(&json!("CSE001")));
    assert_eq!(rows[0].get("internal").and_then(|v| v.as_f64()), Some(88.0));
    assert_eq!(rows[2].get("finalAssessment"), Some(&json!(null)));
    assert_eq!(rows[2].get("internal").and_then(|v| v.as_f64()), Some(0.0));

    // Other subjects are independent.
    let other = request(
        &mut stdin,
        &mut reader,
        "11",
        "marks.get",
        json!({ "subjectCode": "CS302" }),
    );
    let other = result_of(&other, "marks.get");
    let rows = other.get("rows").and_then(|v| v.as_array()).expect("rows");
    assert!(rows
        .iter()
        .all(|r| r.get("internal").and_then(|v| v.as_f64()) == Some(0.0)));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn criteria_update_drives_final_mark() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let defaults = request(&mut stdin, &mut reader, "1", "criteria.get", json!({}));
    let defaults = result_of(&defaults, "criteria.get");
    assert_eq!(
        defaults.pointer("/criteria/internals").and_then(|v| v.as_f64()),
        Some(40.0)
    );
    let no_ws = request(
        &mut stdin,
        &mut reader,
        "2",
        "criteria.update",
        json!({ "internals": 30, "practicals": 0, "semesterFinals": 70 }),
    );
    assert_eq!(error_code(&no_ws), "no_workspace");

    let _ = open_workspace(&mut stdin, &mut reader, "resultsd-criteria");

    let bad_sum = request(
        &mut stdin,
        &mut reader,
        "3",
        "criteria.update",
        json!({ "internals": 50, "practicals": 20, "semesterFinals": 40 }),
    );
    assert_eq!(error_code(&bad_sum), "invalid_criteria");
    let missing = request(
        &mut stdin,
        &mut reader,
        "4",
        "criteria.update",
        json!({ "internals": 50 }),
    );
    assert_eq!(error_code(&missing), "bad_params");

    let updated = request(
        &mut stdin,
        &mut reader,
        "5",
        "criteria.update",
        json!({ "internals": 30, "practicals": 0, "semesterFinals": 70 }),
    );
    result_of(&updated, "criteria.update");

    let saved = request(&mut stdin, &mut reader, "6", "criteria.get", json!({}));
    let saved = result_of(&saved, "criteria.get");
    assert_eq!(
        saved.pointer("/criteria/semesterFinals").and_then(|v| v.as_f64()),
        Some(70.0)
    );

    let final_mark = request(
        &mut stdin,
        &mut reader,
        "7",
        "calc.finalMark",
        json!({ "internals": 80, "practicals": 90, "semesterFinals": 70 }),
    );
    let final_mark = result_of(&final_mark, "calc.finalMark");
    assert_eq!(final_mark.get("finalMark").and_then(|v| v.as_f64()), Some(73.0));

    drop(stdin);
    let _ = child.wait();
}
