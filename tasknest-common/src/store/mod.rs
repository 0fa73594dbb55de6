mod postgres;

pub use postgres::PostgresStore;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;
use uuid::Uuid;

use crate::db::DaoError;
use crate::models::reset_code::ResetCode;

#[derive(Debug)]
pub enum StoreError {
    DbFailure(String),
    RuntimeFailure(String),
}

impl std::error::Error for StoreError {}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::DbFailure(e) => write!(f, "StoreError: Database failure: {e}"),
            StoreError::RuntimeFailure(e) => write!(f, "StoreError: Runtime failure: {e}"),
        }
    }
}

impl From<DaoError> for StoreError {
    fn from(error: DaoError) -> Self {
        StoreError::DbFailure(error.to_string())
    }
}

/// Persistence seam for reset codes. The handlers only ever touch the store
/// through this trait so they can be exercised against an in-memory double.
#[async_trait]
pub trait ResetCodeStore: Send + Sync {
    /// Persists a new pending code row.
    async fn save_code(
        &self,
        email: &str,
        code: &str,
        created_timestamp: SystemTime,
        expiration: SystemTime,
    ) -> Result<(), StoreError>;

    /// Returns the unconsumed, unexpired rows for an email, newest first.
    async fn find_consumable_codes(&self, email: &str) -> Result<Vec<ResetCode>, StoreError>;

    /// Atomically flips `used` from false to true. Returns false when the row
    /// was already consumed, which signals a lost race to another request.
    async fn consume_code(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Reverts a claim so the code can be retried after a failed credential
    /// rotation.
    async fn release_code(&self, id: Uuid) -> Result<(), StoreError>;
}

pub type ResetCodeRepo = Arc<Box<dyn ResetCodeStore>>;
