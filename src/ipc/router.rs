use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    if let Some(resp) = handlers::core::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::dashboard::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::search::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::registration::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::removal::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::exports::try_handle(state, &req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
