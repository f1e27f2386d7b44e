use serde_json::json;
use std::path::PathBuf;
use tracing::info;

use crate::config;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "databasePath": state
                .profile
                .as_ref()
                .map(|p| p.database.path.to_string_lossy().to_string())
        }),
    )
}

/// Loads the connection profile from the secrets file and verifies the store
/// opens. A failure here is fatal for the interaction and reported once;
/// later workflows refuse to run until a session is open.
fn handle_session_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("secretsPath")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(secrets_path) = p else {
        return err(&req.id, "bad_params", "missing params.secretsPath", None);
    };

    let profile = match config::load_profile(&secrets_path) {
        Ok(p) => p,
        Err(e) => return err(&req.id, "connection_error", e.to_string(), None),
    };

    // Probe the store once so a bad profile surfaces now, not mid-workflow.
    match db::connect(&profile) {
        Ok(_conn) => {
            info!(
                database = %profile.database.path.to_string_lossy(),
                "session opened"
            );
            let result = json!({
                "databasePath": profile.database.path.to_string_lossy()
            });
            state.profile = Some(profile);
            ok(&req.id, result)
        }
        Err(e) => err(&req.id, "connection_error", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "session.open" => Some(handle_session_open(state, req)),
        _ => None,
    }
}
