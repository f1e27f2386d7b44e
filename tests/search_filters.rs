use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
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
    let exe = env!("CARGO_BIN_EXE_servicedeskd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn servicedeskd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
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

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
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
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn open_session(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, workspace: &Path) {
    let db_path = workspace.join("servicedesk.sqlite3");
    let secrets = workspace.join("secrets.json");
    std::fs::write(
        &secrets,
        json!({ "database": { "path": db_path.to_string_lossy() } }).to_string(),
    )
    .expect("write secrets");
    let _ = request_ok(
        stdin,
        reader,
        "open",
        "session.open",
        json!({ "secretsPath": secrets.to_string_lossy() }),
    );
}

fn seed_services(workspace: &Path, services: &[(&str, &str, f64)]) {
    let conn = rusqlite::Connection::open(workspace.join("servicedesk.sqlite3")).expect("open db");
    for &(id, name, fee) in services {
        conn.execute(
            "INSERT INTO services(service_id, service_name, fee) VALUES(?, ?, ?)",
            (id, name, fee),
        )
        .expect("seed service");
    }
}

// Three students, one log each, so every student has a tracker row.
fn seed_tracker(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, workspace: &Path) {
    seed_services(workspace, &[("SV1", "Tutoring", 10.0)]);
    for (i, (sid, name)) in [
        ("S101", "Alice Stone"),
        ("S102", "Anna Stone"),
        ("S103", "Bob Jones"),
    ]
    .iter()
    .enumerate()
    {
        let _ = request_ok(
            stdin,
            reader,
            &format!("r{}", i),
            "students.register",
            json!({ "studentId": sid, "name": name, "email": format!("u{}@x.com", i) }),
        );
        let _ = request_ok(
            stdin,
            reader,
            &format!("l{}", i),
            "services.log",
            json!({
                "logId": format!("SS{}", i + 1),
                "studentName": name,
                "serviceName": "Tutoring",
                "date": format!("2026-04-{:02}", i + 1)
            }),
        );
    }
}

#[test]
fn prefix_filter_is_case_sensitive_and_sorted_by_name() {
    let workspace = temp_dir("svcdesk-search-prefix");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    open_session(&mut stdin, &mut reader, &workspace);
    seed_tracker(&mut stdin, &mut reader, &workspace);

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "q1",
        "tracker.search",
        json!({ "prefix": "A" }),
    );
    let rows = result["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["student"].as_str(), Some("Alice Stone"));
    assert_eq!(rows[1]["student"].as_str(), Some("Anna Stone"));

    // Stored names are title-cased, so a lowercase prefix matches nothing.
    let result = request_ok(
        &mut stdin,
        &mut reader,
        "q2",
        "tracker.search",
        json!({ "prefix": "a" }),
    );
    assert_eq!(result["empty"], json!(true));
    assert_eq!(result["rows"].as_array().map(|r| r.len()), Some(0));
}

#[test]
fn absent_or_empty_prefix_returns_full_view() {
    let workspace = temp_dir("svcdesk-search-all");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    open_session(&mut stdin, &mut reader, &workspace);
    seed_tracker(&mut stdin, &mut reader, &workspace);

    let absent = request_ok(&mut stdin, &mut reader, "q1", "tracker.search", json!({}));
    assert_eq!(absent["rows"].as_array().map(|r| r.len()), Some(3));

    let empty = request_ok(
        &mut stdin,
        &mut reader,
        "q2",
        "tracker.search",
        json!({ "prefix": "" }),
    );
    assert_eq!(empty["rows"].as_array().map(|r| r.len()), Some(3));
}

#[test]
fn search_is_idempotent_without_mutations() {
    let workspace = temp_dir("svcdesk-search-idem");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    open_session(&mut stdin, &mut reader, &workspace);
    seed_tracker(&mut stdin, &mut reader, &workspace);

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "q1",
        "tracker.search",
        json!({ "prefix": "A" }),
    );
    let second = request_ok(
        &mut stdin,
        &mut reader,
        "q2",
        "tracker.search",
        json!({ "prefix": "A" }),
    );
    assert_eq!(first, second);
}

#[test]
fn hostile_prefix_input_matches_nothing_instead_of_injecting() {
    let workspace = temp_dir("svcdesk-search-hostile");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    open_session(&mut stdin, &mut reader, &workspace);
    seed_tracker(&mut stdin, &mut reader, &workspace);

    for (i, prefix) in ["%", "_", "A' OR '1'='1", "'; DROP TABLE students; --"]
        .iter()
        .enumerate()
    {
        let result = request_ok(
            &mut stdin,
            &mut reader,
            &format!("q{}", i),
            "tracker.search",
            json!({ "prefix": prefix }),
        );
        assert_eq!(
            result["rows"].as_array().map(|r| r.len()),
            Some(0),
            "prefix {:?}",
            prefix
        );
    }

    // The table survived the attempt.
    let all = request_ok(&mut stdin, &mut reader, "q9", "tracker.search", json!({}));
    assert_eq!(all["rows"].as_array().map(|r| r.len()), Some(3));
}
