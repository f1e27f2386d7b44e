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
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
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

#[test]
fn router_dispatch_smoke_covers_every_workflow() {
    let workspace = temp_dir("svcdesk-router-smoke");
    let db_path = workspace.join("servicedesk.sqlite3");
    let secrets = workspace.join("secrets.json");
    std::fs::write(
        &secrets,
        json!({ "database": { "path": db_path.to_string_lossy() } }).to_string(),
    )
    .expect("write secrets");
    let csv_out = workspace.join("smoke-export.csv");
    let zip_out = workspace.join("smoke-reports.zip");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request(&mut stdin, &mut reader, "1", "health", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "2",
        "session.open",
        json!({ "secretsPath": secrets.to_string_lossy() }),
    );
    seed_services(&workspace, &[("SV1", "Tutoring", 10.0)]);

    let _ = request(&mut stdin, &mut reader, "3", "dashboard.overview", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "4",
        "tracker.search",
        json!({ "prefix": "A" }),
    );
    let _ = request(&mut stdin, &mut reader, "5", "students.list", json!({}));
    let _ = request(&mut stdin, &mut reader, "6", "services.list", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "7",
        "students.register",
        json!({ "studentId": "S900", "name": "Smoke Student", "email": "smoke@x.com" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "8",
        "services.log",
        json!({
            "logId": "SS900",
            "studentName": "Smoke Student",
            "serviceName": "Tutoring",
            "date": "2026-05-01"
        }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "9",
        "students.updateEmail",
        json!({ "studentId": "S900", "email": "smoke2@x.com" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "10",
        "services.listForStudent",
        json!({ "studentId": "S900" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "11",
        "services.drop",
        json!({ "studentServiceId": "SS900" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "12",
        "reports.export",
        json!({ "report": "tracker", "outPath": csv_out.to_string_lossy() }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "13",
        "reports.archive",
        json!({ "outPath": zip_out.to_string_lossy() }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "14",
        "students.delete",
        json!({ "studentId": "S900", "confirmId": "S900" }),
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
