use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use duet_types::api::{ResolveRequest, ResolveResponse};
use duet_types::models::ParticipantId;
use uuid::Uuid;

use crate::error::ApiError;
use crate::middleware::Caller;
use crate::state::{AppState, run_blocking};

/// Find or create the caller's conversation with `peer`.
pub async fn resolve(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
    Json(req): Json<ResolveRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let peer = ParticipantId::from(req.peer);

    let conversation_id =
        run_blocking(&state, move |s| s.resolver.resolve(&caller, &peer)).await?;

    Ok((StatusCode::OK, Json(ResolveResponse { conversation_id })))
}

/// The caller's inbox, most recent activity first.
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(Caller(caller)): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    let summaries =
        run_blocking(&state, move |s| s.reader.list_for_participant(&caller)).await?;

    Ok(Json(summaries))
}

pub async fn get_conversation(
    State(state): State<AppState>,
    Path(conversation_id): Path<Uuid>,
    Extension(Caller(caller)): Extension<Caller>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation = run_blocking(&state, move |s| {
        s.resolver.conversation_for(conversation_id, &caller)
    })
    .await?;

    Ok(Json(conversation))
}
