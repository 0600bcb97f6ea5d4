#![allow(dead_code)]

use rusqlite::Connection;
use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
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

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradingd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradingd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
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

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

/// Returns the error object of a response that must have failed.
pub fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded",
        method
    );
    value.get("error").cloned().expect("error object")
}

pub fn error_code(error: &serde_json::Value) -> &str {
    error.get("code").and_then(|v| v.as_str()).unwrap_or("")
}

pub fn open_workspace_db(workspace: &Path) -> Connection {
    Connection::open(workspace.join("gradingd.sqlite3")).expect("open workspace db")
}

/// One faculty, one department (d1) with five admitted students U1001..U1005,
/// courses c1 (3 credits) and c2 (4 credits), and class k1 = c1 Fall 2024.
/// The sidecar must have selected the workspace first so the schema exists.
pub fn seed_directory(workspace: &Path) {
    let conn = open_workspace_db(workspace);
    conn.execute_batch(
        "INSERT INTO faculties(id, name) VALUES('f1', 'Engineering');
         INSERT INTO departments(id, faculty_id, name) VALUES('d1', 'f1', 'Computing');
         INSERT INTO courses(id, code, title, credit_hours, department_id)
           VALUES('c1', 'CS101', 'Programming', 3, 'd1'),
                 ('c2', 'CS102', 'Data Structures', 4, 'd1');
         INSERT INTO students(id, student_code, first_name, last_name, department_id, status)
           VALUES('s1', 'U1001', 'Ada', 'Lovelace', 'd1', 'admitted'),
                 ('s2', 'U1002', 'Grace', 'Hopper', 'd1', 'admitted'),
                 ('s3', 'U1003', 'Alan', 'Turing', 'd1', 'admitted'),
                 ('s4', 'U1004', 'Edsger', 'Dijkstra', 'd1', 'admitted'),
                 ('s5', 'U1005', 'Barbara', 'Liskov', 'd1', 'admitted');
         INSERT INTO classes(id, name, course_id, semester, year, department_id)
           VALUES('k1', 'CS101 Fall', 'c1', 'Fall', 2024, NULL);",
    )
    .expect("seed directory");
}

pub fn select_seeded_workspace(
    prefix: &str,
) -> (PathBuf, Child, ChildStdin, BufReader<ChildStdout>) {
    let workspace = temp_dir(prefix);
    let (child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "select",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    seed_directory(&workspace);
    (workspace, child, stdin, reader)
}
