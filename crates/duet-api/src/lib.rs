pub mod conversations;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod reads;
pub mod state;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::middleware::require_auth;
use crate::state::AppState;

/// All routes are authenticated; the bearer token's subject is the caller.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/conversations",
            get(conversations::list_conversations).post(conversations::resolve),
        )
        .route("/conversations/{conversation_id}", get(conversations::get_conversation))
        .route(
            "/conversations/{conversation_id}/messages",
            get(messages::get_messages).post(messages::send_message),
        )
        .route("/conversations/{conversation_id}/unread", get(reads::get_unread))
        .route("/conversations/{conversation_id}/read", post(reads::mark_read))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state)
}
