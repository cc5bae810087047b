//! Idempotency guard repository.
//!
//! Maps (key, principal) to a previously produced response, giving
//! at-most-once external-effect semantics within the TTL window.

use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
    SqlErr,
};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use crate::entities::idempotency_records;

/// Error types for idempotency operations.
#[derive(Debug, Error)]
pub enum IdempotencyError {
    /// A live record already exists for the (key, principal) pair.
    ///
    /// Callers must `check` before executing side effects and `save`
    /// exactly once per completed operation, so hitting this is a
    /// protocol violation, not a user error.
    #[error("Idempotency record already exists for key {key}")]
    Duplicate {
        /// The offending key.
        key: String,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl From<IdempotencyError> for settla_shared::AppError {
    fn from(err: IdempotencyError) -> Self {
        match err {
            IdempotencyError::Duplicate { key } => Self::DuplicateIdempotencyKey(key),
            IdempotencyError::Database(inner) => Self::Database(inner.to_string()),
        }
    }
}

/// Idempotency guard repository.
#[derive(Debug, Clone)]
pub struct IdempotencyRepository {
    db: DatabaseConnection,
}

impl IdempotencyRepository {
    /// Creates a new idempotency repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Looks up the stored response for (key, principal).
    ///
    /// Deterministic, read-only. Expired records simply stop matching;
    /// deleting them is the sweeper's job, never a correctness
    /// dependency.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn check(
        &self,
        key: &str,
        user_id: Uuid,
    ) -> Result<Option<JsonValue>, IdempotencyError> {
        let record = idempotency_records::Entity::find_by_id((key.to_string(), user_id))
            .one(&self.db)
            .await?;

        Ok(record
            .filter(|record| record.expires_at.with_timezone(&Utc) > Utc::now())
            .map(|record| record.response))
    }

    /// Persists the response for (key, principal).
    ///
    /// Called once per successfully completed logical operation, after
    /// the operation's transaction has committed.
    ///
    /// # Errors
    ///
    /// Returns `IdempotencyError::Duplicate` if a live record already
    /// exists for the pair.
    pub async fn save(
        &self,
        key: &str,
        user_id: Uuid,
        response: JsonValue,
        ttl: Duration,
    ) -> Result<(), IdempotencyError> {
        let now = Utc::now();
        let expires_at = now + ttl;

        let existing = idempotency_records::Entity::find_by_id((key.to_string(), user_id))
            .one(&self.db)
            .await?;

        if let Some(existing) = existing {
            if existing.expires_at.with_timezone(&Utc) > now {
                return Err(IdempotencyError::Duplicate {
                    key: key.to_string(),
                });
            }
            // An expired leftover occupies the unique slot; reuse it.
            let mut active: idempotency_records::ActiveModel = existing.into();
            active.response = Set(response);
            active.expires_at = Set(expires_at.into());
            active.created_at = Set(now.into());
            active.update(&self.db).await?;
            return Ok(());
        }

        let record = idempotency_records::ActiveModel {
            key: Set(key.to_string()),
            user_id: Set(user_id),
            response: Set(response),
            expires_at: Set(expires_at.into()),
            created_at: Set(now.into()),
        };

        match record.insert(&self.db).await {
            Ok(_) => Ok(()),
            Err(err) => {
                if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                    Err(IdempotencyError::Duplicate {
                        key: key.to_string(),
                    })
                } else {
                    Err(err.into())
                }
            }
        }
    }

    /// Deletes expired records. Safe to run concurrently with reads and
    /// writes; purely a space-reclamation operation.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn sweep_expired(&self) -> Result<u64, IdempotencyError> {
        let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
        let result = idempotency_records::Entity::delete_many()
            .filter(idempotency_records::Column::ExpiresAt.lte(now))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}
