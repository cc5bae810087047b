//! Outbox repository for durable external-call intents.

use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    sea_query::Expr,
};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use crate::entities::outbox_events;

/// Error types for outbox operations.
#[derive(Debug, Error)]
pub enum OutboxError {
    /// Outbox event not found.
    #[error("Outbox event not found: {0}")]
    NotFound(Uuid),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl From<OutboxError> for settla_shared::AppError {
    fn from(err: OutboxError) -> Self {
        match err {
            OutboxError::NotFound(_) => Self::NotFound(err.to_string()),
            OutboxError::Database(inner) => Self::Database(inner.to_string()),
        }
    }
}

/// Outbox repository.
///
/// Events are enqueued inside the same atomic unit as the ledger and
/// domain writes that justify them: if the enclosing transaction aborts,
/// no intent survives. Delivery is at-least-once; failed events are
/// never deleted.
#[derive(Debug, Clone)]
pub struct OutboxRepository {
    db: DatabaseConnection,
}

impl OutboxRepository {
    /// Creates a new outbox repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Enqueues an intent inside the caller-supplied atomic unit.
    ///
    /// # Errors
    ///
    /// Returns a database error if the insert fails.
    pub async fn enqueue<C: ConnectionTrait>(
        &self,
        conn: &C,
        topic: &str,
        payload: JsonValue,
    ) -> Result<outbox_events::Model, OutboxError> {
        let event = outbox_events::ActiveModel {
            id: Set(Uuid::now_v7()),
            topic: Set(topic.to_string()),
            payload: Set(payload),
            processed: Set(false),
            retry_count: Set(0),
            last_error: Set(None),
            claimed_at: Set(None),
            created_at: Set(Utc::now().into()),
            processed_at: Set(None),
        };
        Ok(event.insert(conn).await?)
    }

    /// Oldest-first bounded batch of unprocessed events.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn fetch_unprocessed(
        &self,
        limit: u64,
    ) -> Result<Vec<outbox_events::Model>, OutboxError> {
        Ok(outbox_events::Entity::find()
            .filter(outbox_events::Column::Processed.eq(false))
            .order_by_asc(outbox_events::Column::CreatedAt)
            .order_by_asc(outbox_events::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?)
    }

    /// Claims an event for dispatch.
    ///
    /// Atomic conditional update: succeeds only if the event is
    /// unprocessed and not already claimed within the visibility window.
    /// A dispatcher that crashes mid-dispatch leaves a claim that
    /// expires, so the event is redelivered (at-least-once).
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn claim(&self, id: Uuid, visibility: Duration) -> Result<bool, OutboxError> {
        let now = Utc::now();
        let cutoff: sea_orm::prelude::DateTimeWithTimeZone = (now - visibility).into();
        let now: sea_orm::prelude::DateTimeWithTimeZone = now.into();

        let result = outbox_events::Entity::update_many()
            .col_expr(outbox_events::Column::ClaimedAt, Expr::value(Some(now)))
            .filter(outbox_events::Column::Id.eq(id))
            .filter(outbox_events::Column::Processed.eq(false))
            .filter(
                Condition::any()
                    .add(outbox_events::Column::ClaimedAt.is_null())
                    .add(outbox_events::Column::ClaimedAt.lt(cutoff)),
            )
            .exec(&self.db)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Marks an event processed. Once processed it is never reprocessed.
    ///
    /// # Errors
    ///
    /// Returns `OutboxError::NotFound` for an unknown event.
    pub async fn mark_processed(&self, id: Uuid) -> Result<(), OutboxError> {
        let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();
        let result = outbox_events::Entity::update_many()
            .col_expr(outbox_events::Column::Processed, Expr::value(true))
            .col_expr(outbox_events::Column::ProcessedAt, Expr::value(Some(now)))
            .filter(outbox_events::Column::Id.eq(id))
            .filter(outbox_events::Column::Processed.eq(false))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return self.ensure_exists(id).await;
        }
        Ok(())
    }

    /// Records a dispatch failure: bumps the retry count, stores the
    /// error, and releases the claim so a later cycle retries. The event
    /// is never deleted.
    ///
    /// # Errors
    ///
    /// Returns `OutboxError::NotFound` for an unknown event.
    pub async fn mark_failed(&self, id: Uuid, error: &str) -> Result<(), OutboxError> {
        let result = outbox_events::Entity::update_many()
            .col_expr(
                outbox_events::Column::RetryCount,
                Expr::col((outbox_events::Entity, outbox_events::Column::RetryCount)).add(1),
            )
            .col_expr(
                outbox_events::Column::LastError,
                Expr::value(Some(error.to_string())),
            )
            .col_expr(
                outbox_events::Column::ClaimedAt,
                Expr::value(None::<sea_orm::prelude::DateTimeWithTimeZone>),
            )
            .filter(outbox_events::Column::Id.eq(id))
            .filter(outbox_events::Column::Processed.eq(false))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return self.ensure_exists(id).await;
        }
        Ok(())
    }

    /// Looks one event up by ID.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<outbox_events::Model>, OutboxError> {
        Ok(outbox_events::Entity::find_by_id(id).one(&self.db).await?)
    }

    /// Number of unprocessed events, for the pending gauge.
    ///
    /// # Errors
    ///
    /// Returns a database error.
    pub async fn count_unprocessed(&self) -> Result<u64, OutboxError> {
        use sea_orm::PaginatorTrait;
        Ok(outbox_events::Entity::find()
            .filter(outbox_events::Column::Processed.eq(false))
            .count(&self.db)
            .await?)
    }

    async fn ensure_exists(&self, id: Uuid) -> Result<(), OutboxError> {
        match self.find_by_id(id).await? {
            // Already processed: a no-op, not an error.
            Some(_) => Ok(()),
            None => Err(OutboxError::NotFound(id)),
        }
    }
}
