use rusqlite::OptionalExtension;
use serde_json::json;
use std::collections::HashMap;
use tracing::info;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{open_connection, required_str};
use crate::ipc::types::{AppState, Request};
use crate::validate;

/// A student's log entries with display labels for the drop-a-service
/// picker. When two logs share `Service (date)` the label is disambiguated
/// with the log-entry id; selection always travels by student_service_id.
fn handle_list_for_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_str(req, "studentId") {
        Ok(v) => validate::normalize_id(&v),
        Err(resp) => return resp,
    };

    let conn = match open_connection(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let exists: Option<i64> = match conn
        .query_row(
            "SELECT 1 FROM students WHERE student_id = ?",
            [&student_id],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_none() {
        return err(&req.id, "not_found", "student not found", None);
    }

    let mut stmt = match conn.prepare(
        "SELECT ss.student_service_id, sv.service_name, ss.service_date
         FROM student_services ss
         JOIN services sv ON sv.service_id = ss.service_id
         WHERE ss.student_id = ?
         ORDER BY ss.service_date, ss.student_service_id",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let entries = stmt
        .query_map([&student_id], |row| {
            let log_id: String = row.get(0)?;
            let service_name: String = row.get(1)?;
            let service_date: String = row.get(2)?;
            Ok((log_id, service_name, service_date))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    let entries = match entries {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut label_counts: HashMap<String, usize> = HashMap::new();
    for (_, service_name, service_date) in &entries {
        *label_counts
            .entry(format!("{} ({})", service_name, service_date))
            .or_insert(0) += 1;
    }

    let logs: Vec<serde_json::Value> = entries
        .iter()
        .map(|(log_id, service_name, service_date)| {
            let base = format!("{} ({})", service_name, service_date);
            let label = if label_counts.get(&base).copied().unwrap_or(0) > 1 {
                format!("{} [{}]", base, log_id)
            } else {
                base
            };
            json!({
                "studentServiceId": log_id,
                "serviceName": service_name,
                "serviceDate": service_date,
                "label": label
            })
        })
        .collect();

    if logs.is_empty() {
        return ok(
            &req.id,
            json!({
                "empty": true,
                "message": "student is not currently enrolled in any services",
                "logs": []
            }),
        );
    }
    ok(&req.id, json!({ "empty": false, "logs": logs }))
}

/// Drop a single service record without deleting the student profile.
fn handle_drop_service(state: &mut AppState, req: &Request) -> serde_json::Value {
    let log_id = match required_str(req, "studentServiceId") {
        Ok(v) => validate::normalize_id(&v),
        Err(resp) => return resp,
    };

    let conn = match open_connection(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let changed = match conn.execute(
        "DELETE FROM student_services WHERE student_service_id = ?",
        [&log_id],
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_delete_failed", e.to_string(), None),
    };
    if changed == 0 {
        return err(&req.id, "not_found", "service log not found", None);
    }

    ok(&req.id, json!({ "studentServiceId": log_id }))
}

/// Delete a student profile and all their service history. The operator must
/// re-type the exact student id; a mismatch aborts with no mutation. The
/// cascade runs child-first inside one transaction.
fn handle_delete_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_str(req, "studentId") {
        Ok(v) => validate::normalize_id(&v),
        Err(resp) => return resp,
    };
    let confirm_id = match required_str(req, "confirmId") {
        Ok(v) => validate::normalize_id(&v),
        Err(resp) => return resp,
    };

    let conn = match open_connection(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let exists: Option<i64> = match conn
        .query_row(
            "SELECT 1 FROM students WHERE student_id = ?",
            [&student_id],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if exists.is_none() {
        return err(&req.id, "not_found", "student not found", None);
    }

    if confirm_id != student_id {
        return err(
            &req.id,
            "verification_failed",
            "verification failed: ID does not match",
            None,
        );
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };

    let logs_deleted = match tx.execute(
        "DELETE FROM student_services WHERE student_id = ?",
        [&student_id],
    ) {
        Ok(v) => v,
        Err(e) => {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_delete_failed",
                e.to_string(),
                Some(json!({ "table": "student_services" })),
            );
        }
    };

    let changed = match tx.execute("DELETE FROM students WHERE student_id = ?", [&student_id]) {
        Ok(v) => v,
        Err(e) => {
            let _ = tx.rollback();
            return err(
                &req.id,
                "db_delete_failed",
                e.to_string(),
                Some(json!({ "table": "students" })),
            );
        }
    };
    if changed == 0 {
        let _ = tx.rollback();
        return err(&req.id, "not_found", "student not found", None);
    }

    if let Err(e) = tx.commit() {
        return err(&req.id, "db_tx_failed", e.to_string(), None);
    }

    info!(student = %student_id, logs = logs_deleted, "student profile deleted");
    ok(
        &req.id,
        json!({ "studentId": student_id, "logsDeleted": logs_deleted }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "services.listForStudent" => Some(handle_list_for_student(state, req)),
        "services.drop" => Some(handle_drop_service(state, req)),
        "students.delete" => Some(handle_delete_student(state, req)),
        _ => None,
    }
}
