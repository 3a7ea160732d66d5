use axum::extract::State;
use chrono::Local;
use serde_json::json;

use super::AppState;
use crate::domain::{messages, Reply};

/// `GET /api/status`: server local time and version. No session needed.
pub async fn status(State(state): State<AppState>) -> Reply {
    let server_time = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    Reply::ok(messages::STATUS_OK).with_data(json!({
        "server_time": server_time,
        "version": state.service.version,
    }))
}
