use crate::errors::StoreError;
use crate::metrics_defs::SESSION_FALLBACK_HIT;
use crate::pool::BackendPool;
use sessionfile::SessionRecord;
use shared::counter;
use std::sync::Arc;
use std::time::Duration;

const SESSION_NAMESPACE: &str = "session";

fn session_key(id: &str) -> String {
    format!("{SESSION_NAMESPACE}:{id}")
}

/// Session records keyed by session id, stored as JSON in the pool's backends.
#[derive(Clone)]
pub struct SessionStore {
    pool: Arc<BackendPool>,
    ttl: Option<Duration>,
}

impl SessionStore {
    pub fn new(pool: Arc<BackendPool>, ttl: Option<Duration>) -> Self {
        SessionStore { pool, ttl }
    }

    pub fn pool(&self) -> &Arc<BackendPool> {
        &self.pool
    }

    /// Writes the record to the current backend.
    pub async fn put(&self, id: &str, record: &SessionRecord) -> Result<(), StoreError> {
        let value = serde_json::to_string(record)?;
        let backend = self.pool.current();
        backend.set(&session_key(id), &value, self.ttl).await?;
        tracing::debug!(backend = backend.name(), session_id = id, "stored session");
        Ok(())
    }

    /// Looks the record up in the current backend, then in the others in pool
    /// order. Records written before a rotation live in an earlier backend.
    pub async fn get(&self, id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let key = session_key(id);

        for (position, backend) in self.pool.lookup_order().enumerate() {
            let Some(value) = backend.get(&key).await? else {
                continue;
            };

            if position > 0 {
                tracing::debug!(
                    backend = backend.name(),
                    session_id = id,
                    "session found in non-current backend"
                );
                counter!(SESSION_FALLBACK_HIT).increment(1);
            }

            return Ok(Some(serde_json::from_str(&value)?));
        }

        Ok(None)
    }
}
