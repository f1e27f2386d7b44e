use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::helpers::open_connection;
use crate::ipc::types::{AppState, Request};

const EMPTY_MESSAGE: &str =
    "No service data available. Register a student and log an activity first!";

/// Institutional overview: a usage-count-by-service breakdown plus the ten
/// most recent tracker rows. An empty tracker is an informational state.
fn handle_overview(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match open_connection(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let total: i64 = match conn.query_row(
        "SELECT COUNT(*) FROM vw_StudentServiceTracker",
        [],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if total == 0 {
        return ok(
            &req.id,
            json!({ "empty": true, "message": EMPTY_MESSAGE }),
        );
    }

    let mut usage_stmt = match conn.prepare(
        "SELECT Service, COUNT(*) AS used
         FROM vw_StudentServiceTracker
         GROUP BY Service
         ORDER BY used DESC, Service ASC",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let usage = usage_stmt
        .query_map([], |row| {
            let service: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            Ok(json!({ "service": service, "count": count }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    let usage = match usage {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut recent_stmt = match conn.prepare(
        "SELECT Student_ID, Student, Email, Service, Date_Used
         FROM vw_StudentServiceTracker
         ORDER BY Date_Used DESC
         LIMIT 10",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let recent = recent_stmt
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
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    let recent = match recent {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    ok(
        &req.id,
        json!({
            "empty": false,
            "totalRows": total,
            "serviceUsage": usage,
            "recent": recent
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dashboard.overview" => Some(handle_overview(state, req)),
        _ => None,
    }
}
