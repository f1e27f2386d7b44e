use chrono::NaiveDate;
use rusqlite::OptionalExtension;
use serde_json::json;
use tracing::info;

use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{open_connection, required_str};
use crate::ipc::types::{AppState, Request};
use crate::validate;

/// Students for the selector lists. An empty list is an empty-state result,
/// not an error; the client must not offer a selection from zero options.
fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match open_connection(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let mut stmt = match conn.prepare("SELECT student_id, name FROM students ORDER BY name") {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], |row| {
            let student_id: String = row.get(0)?;
            let name: String = row.get(1)?;
            Ok(json!({ "studentId": student_id, "name": name }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(students) => ok(
            &req.id,
            json!({ "empty": students.is_empty(), "students": students }),
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_services_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match open_connection(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let mut stmt =
        match conn.prepare("SELECT service_id, service_name FROM services ORDER BY service_name") {
            Ok(s) => s,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        };
    let rows = stmt
        .query_map([], |row| {
            let service_id: String = row.get(0)?;
            let service_name: String = row.get(1)?;
            Ok(json!({ "serviceId": service_id, "serviceName": service_name }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(services) => ok(
            &req.id,
            json!({ "empty": services.is_empty(), "services": services }),
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

/// Enroll a new student. Input is normalized before validation: id
/// uppercased, name title-cased, email lowercased, exactly as stored.
fn handle_register(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_str(req, "studentId") {
        Ok(v) => validate::normalize_id(&v),
        Err(resp) => return resp,
    };
    let name = match required_str(req, "name") {
        Ok(v) => validate::title_case(v.trim()),
        Err(resp) => return resp,
    };
    let email = match required_str(req, "email") {
        Ok(v) => validate::normalize_email(&v),
        Err(resp) => return resp,
    };

    if name.is_empty() {
        return err(&req.id, "bad_params", "name must not be empty", None);
    }
    if !validate::is_valid_student_id(&student_id) {
        return err(
            &req.id,
            "validation_error",
            "student id must be 'S' followed by digits",
            Some(json!({ "field": "studentId" })),
        );
    }
    if !validate::is_valid_email(&email) {
        return err(
            &req.id,
            "validation_error",
            "invalid email format",
            Some(json!({ "field": "email" })),
        );
    }

    let conn = match open_connection(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    if let Err(e) = conn.execute(
        "INSERT INTO students(student_id, name, email) VALUES(?, ?, ?)",
        (&student_id, &name, &email),
    ) {
        let code = if db::is_constraint_violation(&e) {
            "constraint_violation"
        } else {
            "db_insert_failed"
        };
        return err(
            &req.id,
            code,
            e.to_string(),
            Some(json!({ "table": "students" })),
        );
    }

    info!(student = %student_id, "student registered");
    ok(&req.id, json!({ "studentId": student_id, "name": name }))
}

/// Log a service usage event. Student and service arrive as display names
/// from the selector lists and are resolved to ids here.
fn handle_log_service(state: &mut AppState, req: &Request) -> serde_json::Value {
    let log_id = match required_str(req, "logId") {
        Ok(v) => validate::normalize_id(&v),
        Err(resp) => return resp,
    };
    let student_name = match required_str(req, "studentName") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let service_name = match required_str(req, "serviceName") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let date = match required_str(req, "date") {
        Ok(v) => v.trim().to_string(),
        Err(resp) => return resp,
    };

    if log_id.is_empty() {
        return err(&req.id, "bad_params", "logId must not be empty", None);
    }
    let service_date = match NaiveDate::parse_from_str(&date, "%Y-%m-%d") {
        Ok(d) => d.to_string(),
        Err(_) => {
            return err(
                &req.id,
                "validation_error",
                "date must be YYYY-MM-DD",
                Some(json!({ "field": "date" })),
            )
        }
    };

    let conn = match open_connection(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    // Deterministic pick if multiple students share a display name.
    let student_id: Option<String> = match conn
        .query_row(
            "SELECT student_id FROM students WHERE name = ? ORDER BY student_id LIMIT 1",
            [&student_name],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some(student_id) = student_id else {
        return err(&req.id, "not_found", "student not found", None);
    };

    let service_id: Option<String> = match conn
        .query_row(
            "SELECT service_id FROM services WHERE service_name = ? ORDER BY service_id LIMIT 1",
            [&service_name],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some(service_id) = service_id else {
        return err(&req.id, "not_found", "service not found", None);
    };

    if let Err(e) = conn.execute(
        "INSERT INTO student_services(student_service_id, student_id, service_id, service_date)
         VALUES(?, ?, ?, ?)",
        (&log_id, &student_id, &service_id, &service_date),
    ) {
        let code = if db::is_constraint_violation(&e) {
            "constraint_violation"
        } else {
            "db_insert_failed"
        };
        return err(
            &req.id,
            code,
            e.to_string(),
            Some(json!({ "table": "student_services" })),
        );
    }

    ok(
        &req.id,
        json!({
            "studentServiceId": log_id,
            "studentId": student_id,
            "serviceId": service_id,
            "serviceDate": service_date
        }),
    )
}

/// Update a student's contact email. An invalid address touches no row; an
/// unknown student reports not_found instead of succeeding silently.
fn handle_update_email(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_str(req, "studentId") {
        Ok(v) => validate::normalize_id(&v),
        Err(resp) => return resp,
    };
    let email = match required_str(req, "email") {
        Ok(v) => validate::normalize_email(&v),
        Err(resp) => return resp,
    };

    if !validate::is_valid_email(&email) {
        return err(
            &req.id,
            "validation_error",
            "invalid email format",
            Some(json!({ "field": "email" })),
        );
    }

    let conn = match open_connection(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let changed = match conn.execute(
        "UPDATE students SET email = ? WHERE student_id = ?",
        (&email, &student_id),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_update_failed", e.to_string(), None),
    };
    if changed == 0 {
        return err(&req.id, "not_found", "student not found", None);
    }

    ok(&req.id, json!({ "studentId": student_id, "email": email }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "services.list" => Some(handle_services_list(state, req)),
        "students.register" => Some(handle_register(state, req)),
        "services.log" => Some(handle_log_service(state, req)),
        "students.updateEmail" => Some(handle_update_email(state, req)),
        _ => None,
    }
}
