use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

/// ShiftSwapLog - append-only audit trail. One row per accepted transition,
/// written in the same transaction as the shift write. Never updated or
/// deleted.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ShiftSwapLog {
    pub id: Uuid,
    pub shift_id: Uuid,
    pub actor_id: Uuid,
    pub action: String, // 'POSTED' | 'CLAIMED' | 'APPROVED' | 'DECLINED' | 'CANCELLED'
    pub details: JsonValue,
    pub created_at: DateTime<Utc>,
}

/// Audit action enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwapAction {
    Posted,
    Claimed,
    Approved,
    Declined,
    Cancelled,
}

impl SwapAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Posted => "POSTED",
            Self::Claimed => "CLAIMED",
            Self::Approved => "APPROVED",
            Self::Declined => "DECLINED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

/// Audit entry recorded together with a shift write
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub actor_id: Uuid,
    pub action: SwapAction,
    pub details: JsonValue,
}

/// Swap log row decorated with actor and shift context for the manager's
/// history view
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: Uuid,
    pub shift_id: Uuid,
    pub action: String,
    pub details: JsonValue,
    pub created_at: DateTime<Utc>,
    pub actor_name: String,
    pub actor_role: String,
    pub shift_title: String,
    pub shift_date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub owner_name: String,
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl ShiftSwapLog {
    /// Decorated history for an organisation, newest first
    pub async fn history_for_org(
        organisation_id: Uuid,
        limit: i64,
        pool: &PgPool,
    ) -> Result<Vec<HistoryEntry>> {
        let entries = sqlx::query_as::<_, HistoryEntry>(
            r#"
            SELECT
                l.id, l.shift_id, l.action, l.details, l.created_at,
                actor.name AS actor_name,
                actor.role AS actor_role,
                s.title AS shift_title,
                s.date AS shift_date,
                s.start_time, s.end_time,
                owner.name AS owner_name
            FROM shift_swap_logs l
            JOIN shifts s ON s.id = l.shift_id
            JOIN members actor ON actor.id = l.actor_id
            JOIN members owner ON owner.id = s.original_owner_id
            WHERE s.organisation_id = $1
            ORDER BY l.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(organisation_id)
        .bind(limit)
        .fetch_all(pool)
        .await?;
        Ok(entries)
    }

    /// Raw log rows for a set of shifts with actor names, oldest first.
    /// Used by the JSON export to attach per-shift history.
    pub async fn for_shifts_with_actor(
        shift_ids: &[Uuid],
        pool: &PgPool,
    ) -> Result<Vec<(ShiftSwapLog, String)>> {
        #[derive(sqlx::FromRow)]
        struct Row {
            #[sqlx(flatten)]
            log: ShiftSwapLog,
            actor_name: String,
        }

        let rows = sqlx::query_as::<_, Row>(
            r#"
            SELECT l.*, m.name AS actor_name
            FROM shift_swap_logs l
            JOIN members m ON m.id = l.actor_id
            WHERE l.shift_id = ANY($1)
            ORDER BY l.created_at ASC
            "#,
        )
        .bind(shift_ids)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|r| (r.log, r.actor_name)).collect())
    }
}
