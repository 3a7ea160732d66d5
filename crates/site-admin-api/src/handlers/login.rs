//! `POST /api/login`: exchange account credentials for a session token.

use axum::extract::State;
use axum::Extension;
use serde_json::json;

use super::AppState;
use crate::domain::{messages, Reply, RequestContext};
use crate::middleware::constant_time_compare;

pub async fn login(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Reply {
    let Some(body) = ctx.parsed_body.as_ref() else {
        return Reply::error(messages::JSON_REQUIRED);
    };

    let (Some(client_name), Some(password)) = (body.get("client_name"), body.get("password"))
    else {
        return Reply::error(messages::MISSING_PARAMETERS);
    };

    let Some(account) = client_name.as_str().and_then(|name| state.accounts.get(name)) else {
        return Reply::error(messages::ACCOUNT_NOT_FOUND);
    };

    let matches = password
        .as_str()
        .map(|p| constant_time_compare(p, &account.password))
        .unwrap_or(false);
    if !matches {
        tracing::info!(request_id = ctx.request_id, client = %account.name, "login rejected");
        return Reply::error(messages::WRONG_PASSWORD);
    }

    let client_name = client_name.as_str().unwrap_or_default();
    let token = state.tokens.issue(client_name);
    tracing::info!(request_id = ctx.request_id, client = %client_name, "login accepted");

    Reply::ok(messages::LOGIN_OK).with_data(json!({ "token": token }))
}
