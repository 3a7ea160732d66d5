//! Site info blob endpoints.

use axum::extract::State;
use axum::Extension;

use super::AppState;
use crate::domain::{messages, HandlerFault, Reply, RequestContext};

/// `POST /api/get_info`
pub async fn get_info(State(state): State<AppState>) -> Result<Reply, HandlerFault> {
    Ok(match state.info.load().await? {
        Some(blob) => Reply::ok(messages::INFO_OK).with_data(blob),
        None => Reply::error(messages::INFO_NOT_FOUND),
    })
}

/// `POST /api/save`: replace the blob with the request body.
pub async fn save(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> Result<Reply, HandlerFault> {
    let Some(blob) = ctx.parsed_body.as_ref() else {
        return Ok(Reply::error(messages::JSON_REQUIRED));
    };

    state.info.save(blob).await?;
    tracing::info!(
        request_id = ctx.request_id,
        client = ctx.identity.as_deref().unwrap_or("--"),
        "home info saved"
    );
    Ok(Reply::ok(messages::SAVED))
}
