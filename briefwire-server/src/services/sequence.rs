//! Atomic per-scope sequence allocation.
//!
//! Counters are keyed by `(scope_id, name)` so contention stays local to one
//! conversation (or one organization for org-scoped counters). Allocation is
//! a single upsert; the row lock serializes concurrent callers, so no two
//! transactions ever observe the same value. A value is only consumed when
//! the surrounding transaction commits; rolled-back allocations leave no
//! committed gap.

use sqlx::PgConnection;
use uuid::Uuid;

use super::{CoreError, CoreResult};

/// Counter name for per-conversation message sequencing.
pub const MESSAGE_SEQ: &str = "message_seq";

/// Allocator over the `counters` table.
#[derive(Debug, Clone, Copy)]
pub struct SequenceAllocator;

impl SequenceAllocator {
    /// Allocates the next value inside the caller's transaction.
    ///
    /// # Errors
    /// `CoreError::Conflict` when the statement loses a serialization or
    /// deadlock race (SQLSTATE 40001/40P01); the caller retries with backoff.
    pub async fn allocate(
        conn: &mut PgConnection,
        scope_id: Uuid,
        name: &str,
    ) -> CoreResult<i64> {
        let next_value: i64 = sqlx::query_scalar(
            "INSERT INTO counters (scope_id, name, next_value)
             VALUES ($1, $2, 1)
             ON CONFLICT (scope_id, name)
             DO UPDATE SET next_value = counters.next_value + 1
             RETURNING next_value",
        )
        .bind(scope_id)
        .bind(name)
        .fetch_one(&mut *conn)
        .await
        .map_err(map_allocation_error)?;

        Ok(next_value)
    }
}

/// Whether an error is a transient commit conflict worth retrying.
pub fn is_commit_conflict(err: &CoreError) -> bool {
    matches!(err, CoreError::Conflict(_))
}

fn map_allocation_error(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db) = &err {
        if matches!(db.code().as_deref(), Some("40001" | "40P01")) {
            return CoreError::Conflict(format!("sequence allocation did not commit: {err}"));
        }
    }
    CoreError::Database(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_conflict_errors_stay_database_errors() {
        let mapped = map_allocation_error(sqlx::Error::PoolTimedOut);
        assert!(matches!(mapped, CoreError::Database(_)));
        assert!(!is_commit_conflict(&mapped));
    }

    #[test]
    fn conflict_detection_matches_conflict_variant_only() {
        assert!(is_commit_conflict(&CoreError::Conflict("retry".into())));
        assert!(!is_commit_conflict(&CoreError::Validation("nope".into())));
    }
}
