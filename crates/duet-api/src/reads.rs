use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use duet_types::api::{MarkReadRequest, ReadCursorResponse, UnreadResponse};
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::Caller;
use crate::state::{AppState, run_blocking};

pub async fn get_unread(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(Caller(caller)): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    let unread =
        run_blocking(&state, move |s| s.reader.unread_count(conversation_id, &caller)).await?;

    Ok(Json(UnreadResponse {
        conversation_id,
        unread,
    }))
}

/// Advance the caller's read cursor. Stale devices can't move it backwards.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(Caller(caller)): Extension<Caller>,
    Json(req): Json<MarkReadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let last_read_message_id = run_blocking(&state, move |s| {
        s.reader.mark_read(conversation_id, &caller, req.up_to)
    })
    .await?;

    Ok(Json(ReadCursorResponse {
        conversation_id,
        last_read_message_id,
    }))
}
