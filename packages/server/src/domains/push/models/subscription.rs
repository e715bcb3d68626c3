use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Push subscription - one browser/device endpoint for a member.
/// Pruned best-effort when delivery reports the endpoint is gone; that
/// cleanup never blocks a shift transition.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PushSubscription {
    pub id: Uuid,
    pub member_id: Uuid,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl PushSubscription {
    /// Upsert by endpoint. A device resubscribing under a new member takes
    /// the endpoint over.
    pub async fn upsert(
        member_id: Uuid,
        endpoint: &str,
        p256dh: &str,
        auth: &str,
        pool: &PgPool,
    ) -> Result<Self> {
        let sub = sqlx::query_as::<_, PushSubscription>(
            r#"
            INSERT INTO push_subscriptions (id, member_id, endpoint, p256dh, auth)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (endpoint) DO UPDATE
            SET member_id = EXCLUDED.member_id,
                p256dh = EXCLUDED.p256dh,
                auth = EXCLUDED.auth
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(member_id)
        .bind(endpoint)
        .bind(p256dh)
        .bind(auth)
        .fetch_one(pool)
        .await?;
        Ok(sub)
    }

    /// All subscriptions for a member
    pub async fn find_for_member(member_id: Uuid, pool: &PgPool) -> Result<Vec<Self>> {
        let subs = sqlx::query_as::<_, PushSubscription>(
            "SELECT * FROM push_subscriptions WHERE member_id = $1",
        )
        .bind(member_id)
        .fetch_all(pool)
        .await?;
        Ok(subs)
    }

    /// Remove a member's subscription for an endpoint
    pub async fn delete_for_member(endpoint: &str, member_id: Uuid, pool: &PgPool) -> Result<()> {
        sqlx::query("DELETE FROM push_subscriptions WHERE endpoint = $1 AND member_id = $2")
            .bind(endpoint)
            .bind(member_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Remove a subscription by ID (delivery reported the endpoint gone)
    pub async fn delete(id: Uuid, pool: &PgPool) -> Result<()> {
        sqlx::query("DELETE FROM push_subscriptions WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }
}
