use serde_json::json;
use std::path::PathBuf;
use tracing::info;

use crate::db;
use crate::export;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{open_connection, optional_str, required_str};
use crate::ipc::types::{AppState, Request};

fn view_for_report(report: &str) -> Option<&'static str> {
    match report {
        "tracker" => Some(db::TRACKER_VIEW),
        "revenue" => Some(db::REVENUE_VIEW),
        _ => None,
    }
}

/// Export one report view: full rows for on-screen display plus the
/// comma-separated artifact, optionally written to disk. The artifact
/// filename always matches the view name.
fn handle_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let report = match required_str(req, "report") {
        Ok(v) => v.trim().to_ascii_lowercase(),
        Err(resp) => return resp,
    };
    let Some(view) = view_for_report(&report) else {
        return err(
            &req.id,
            "bad_params",
            "report must be one of: tracker, revenue",
            Some(json!({ "report": report })),
        );
    };

    let conn = match open_connection(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let table = match export::read_report(&conn, view) {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let csv = table.to_csv();
    let filename = table.filename();

    if let Some(out_path) = optional_str(req, "outPath").filter(|p| !p.trim().is_empty()) {
        let out = PathBuf::from(out_path.trim());
        if let Some(parent) = out.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    return err(
                        &req.id,
                        "io_failed",
                        e.to_string(),
                        Some(json!({ "path": out_path })),
                    );
                }
            }
        }
        if let Err(e) = std::fs::write(&out, &csv) {
            return err(
                &req.id,
                "io_failed",
                e.to_string(),
                Some(json!({ "path": out_path })),
            );
        }
        info!(view = view, path = %out.to_string_lossy(), "report exported");
    }

    ok(
        &req.id,
        json!({
            "view": view,
            "filename": filename,
            "columns": table.columns,
            "rowCount": table.rows.len(),
            "rows": table.rows,
            "csv": csv
        }),
    )
}

/// Export both reports as one zip bundle with a checksum manifest.
fn handle_archive(state: &mut AppState, req: &Request) -> serde_json::Value {
    let out_path = match required_str(req, "outPath") {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        Ok(_) => return err(&req.id, "bad_params", "missing outPath", None),
        Err(resp) => return resp,
    };

    let conn = match open_connection(state, req) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let mut reports = Vec::with_capacity(2);
    for view in [db::TRACKER_VIEW, db::REVENUE_VIEW] {
        match export::read_report(&conn, view) {
            Ok(t) => reports.push(t),
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        }
    }

    let summary = match export::write_report_bundle(&out_path, &reports) {
        Ok(s) => s,
        Err(e) => {
            return err(
                &req.id,
                "io_failed",
                e.to_string(),
                Some(json!({ "path": out_path.to_string_lossy() })),
            )
        }
    };

    info!(path = %out_path.to_string_lossy(), entries = summary.entry_count, "report bundle written");
    ok(
        &req.id,
        json!({
            "path": out_path.to_string_lossy(),
            "bundleFormat": summary.bundle_format,
            "entryCount": summary.entry_count,
            "entries": summary.entries
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.export" => Some(handle_export(state, req)),
        "reports.archive" => Some(handle_archive(state, req)),
        _ => None,
    }
}
