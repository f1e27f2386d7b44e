use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{open_connection, optional_str};
use crate::ipc::types::{AppState, Request};

/// Name search over the tracker view. The prefix filter is parameterized
/// (never spliced into the statement) and case-sensitive; substr sidesteps
/// LIKE's ASCII case folding and its wildcard characters at the same time.
fn handle_search(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match open_connection(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let prefix = optional_str(req, "prefix").filter(|p| !p.is_empty());

    let sql = match prefix {
        Some(_) => {
            "SELECT Student_ID, Student, Email, Service, Date_Used
             FROM vw_StudentServiceTracker
             WHERE substr(Student, 1, length(?1)) = ?1
             ORDER BY Student ASC"
        }
        None => {
            "SELECT Student_ID, Student, Email, Service, Date_Used
             FROM vw_StudentServiceTracker"
        }
    };

    let mut stmt = match conn.prepare(sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let rows = match &prefix {
        Some(p) => stmt
            .query_map([p], |row| {
                let student_id: String = row.get(0)?;
                let student: String = row.get(1)?;
                let email: String = row.get(2)?;
                let service: String = row.get(3)?;
                let date_used: String = row.get(4)?;
                Ok(json!({
                    "studentId": student_id,
                    "student": student,
                    "email": email,
                    "service": service,
                    "dateUsed": date_used
                }))
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>()),
        None => stmt
            .query_map([], |row| {
                let student_id: String = row.get(0)?;
                let student: String = row.get(1)?;
                let email: String = row.get(2)?;
                let service: String = row.get(3)?;
                let date_used: String = row.get(4)?;
                Ok(json!({
                    "studentId": student_id,
                    "student": student,
                    "email": email,
                    "service": service,
                    "dateUsed": date_used
                }))
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>()),
    };

    match rows {
        Ok(rows) => ok(
            &req.id,
            json!({ "empty": rows.is_empty(), "rows": rows }),
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "tracker.search" => Some(handle_search(state, req)),
        _ => None,
    }
}
