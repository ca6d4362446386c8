use std::sync::Arc;
use std::time::Duration;

use duet_core::{ConversationResolver, DmError, MessageLog, ThreadReader};
use duet_db::Database;
use tracing::error;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub resolver: ConversationResolver<Database>,
    pub log: MessageLog<Database>,
    pub reader: ThreadReader<Database>,
    pub jwt_secret: String,
    /// Upper bound on any single storage call.
    pub storage_timeout: Duration,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, jwt_secret: String, storage_timeout: Duration) -> Self {
        Self {
            resolver: ConversationResolver::new(Arc::clone(&db)),
            log: MessageLog::new(Arc::clone(&db)),
            reader: ThreadReader::new(db),
            jwt_secret,
            storage_timeout,
        }
    }
}

/// Run blocking storage work off the async runtime, bounded by the storage timeout.
///
/// A timed-out call may still commit in the background; every operation is
/// a single transaction, so the caller sees either nothing or the whole write.
pub async fn run_blocking<F, T>(state: &AppState, f: F) -> Result<T, DmError>
where
    F: FnOnce(&AppStateInner) -> Result<T, DmError> + Send + 'static,
    T: Send + 'static,
{
    let inner = Arc::clone(state);
    let task = tokio::task::spawn_blocking(move || f(&inner));

    match tokio::time::timeout(state.storage_timeout, task).await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            error!("spawn_blocking join error: {}", e);
            Err(DmError::storage("storage task failed"))
        }
        Err(_) => {
            error!("Storage call exceeded {:?}", state.storage_timeout);
            Err(DmError::storage("storage call timed out"))
        }
    }
}
