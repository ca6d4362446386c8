use axum::{
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::Response,
};
use duet_types::api::Claims;
use duet_types::models::ParticipantId;
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;

use crate::state::AppState;

/// The authenticated participant making the request.
#[derive(Debug, Clone)]
pub struct Caller(pub ParticipantId);

/// Extract and validate the JWT from the Authorization header.
///
/// Tokens are minted by the identity service; we only check the signature
/// and expiry and take `sub` as the participant id.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(state.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        debug!("Rejected bearer token: {}", e);
        StatusCode::UNAUTHORIZED
    })?;

    if token_data.claims.sub.trim().is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    req.extensions_mut()
        .insert(Caller(ParticipantId::from(token_data.claims.sub)));
    Ok(next.run(req).await)
}
