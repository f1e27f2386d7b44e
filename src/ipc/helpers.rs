use rusqlite::Connection;

use crate::config::ConnectionProfile;
use crate::db;
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
}

pub fn session_profile<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<&'a ConnectionProfile, serde_json::Value> {
    state
        .profile
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_session", "open a session first", None))
}

/// One connection per interaction; the handle drops when the handler returns.
pub fn open_connection(state: &AppState, req: &Request) -> Result<Connection, serde_json::Value> {
    let profile = session_profile(state, req)?;
    db::connect(profile).map_err(|e| err(&req.id, "connection_error", e.to_string(), None))
}
