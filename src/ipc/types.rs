use serde::Deserialize;

use crate::config::ConnectionProfile;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Per-process state. Only the connection profile lives here; every
/// interaction opens its own connection and drops it before replying.
pub struct AppState {
    pub profile: Option<ConnectionProfile>,
}
