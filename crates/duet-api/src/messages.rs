use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use duet_types::api::SendMessageRequest;
use duet_types::models::MessageId;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::Caller;
use crate::state::{AppState, run_blocking};

#[derive(Debug, Deserialize)]
pub struct MessageQuery {
    /// Cursor-based pagination: pass the id of the last message from the
    /// previous page to fetch the ones after it.
    pub after: Option<MessageId>,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(Caller(caller)): Extension<Caller>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let message = run_blocking(&state, move |s| {
        s.log.append_with_token(
            conversation_id,
            &caller,
            &req.body,
            req.client_token.as_deref(),
        )
    })
    .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn get_messages(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<MessageQuery>,
    Extension(Caller(caller)): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    let messages = run_blocking(&state, move |s| {
        s.resolver.conversation_for(conversation_id, &caller)?;
        s.log.list(conversation_id, query.after, query.limit)
    })
    .await?;

    Ok(Json(messages))
}
