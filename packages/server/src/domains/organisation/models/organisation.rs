use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Alphabet for join codes. Excludes 0/O/1/I to keep codes readable when
/// shared verbally or on paper.
const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const JOIN_CODE_LEN: usize = 8;

/// Organisation - anchor entity that scopes members, roles and shifts
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Organisation {
    pub id: Uuid,
    pub name: String,
    pub join_code: String,
    pub created_at: DateTime<Utc>,
}

/// Generate a random 8-character join code
pub fn generate_join_code() -> String {
    let mut rng = rand::thread_rng();
    (0..JOIN_CODE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..JOIN_CODE_ALPHABET.len());
            JOIN_CODE_ALPHABET[idx] as char
        })
        .collect()
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Organisation {
    /// Insert a new organisation. Takes an executor so registration can create
    /// the organisation and its first manager in one transaction.
    pub async fn insert<'e>(
        executor: impl PgExecutor<'e>,
        name: &str,
        join_code: &str,
    ) -> Result<Self> {
        let org = sqlx::query_as::<_, Organisation>(
            r#"
            INSERT INTO organisations (id, name, join_code)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(join_code)
        .fetch_one(executor)
        .await?;
        Ok(org)
    }

    /// Find organisation by ID
    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        let org = sqlx::query_as::<_, Organisation>("SELECT * FROM organisations WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(org)
    }

    /// Find organisation by join code (codes are stored uppercase)
    pub async fn find_by_join_code(join_code: &str, pool: &PgPool) -> Result<Option<Self>> {
        let org =
            sqlx::query_as::<_, Organisation>("SELECT * FROM organisations WHERE join_code = $1")
                .bind(join_code.to_uppercase())
                .fetch_optional(pool)
                .await?;
        Ok(org)
    }

    /// Pick a join code not already in use. Collisions are unlikely with a
    /// 32^8 space, so a handful of retries is plenty.
    pub async fn unused_join_code(pool: &PgPool) -> Result<String> {
        let mut code = generate_join_code();
        for _ in 0..10 {
            if Self::find_by_join_code(&code, pool).await?.is_none() {
                break;
            }
            code = generate_join_code();
        }
        Ok(code)
    }

    /// Replace the organisation's join code, invalidating the old one
    /// immediately. Returns the updated organisation.
    pub async fn set_join_code(id: Uuid, join_code: &str, pool: &PgPool) -> Result<Self> {
        let org = sqlx::query_as::<_, Organisation>(
            "UPDATE organisations SET join_code = $2 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(join_code)
        .fetch_one(pool)
        .await?;
        Ok(org)
    }

    /// Member and shift counts for the org overview
    pub async fn counts(id: Uuid, pool: &PgPool) -> Result<(i64, i64)> {
        let (members, shifts): (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM members WHERE organisation_id = $1),
                (SELECT COUNT(*) FROM shifts WHERE organisation_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(pool)
        .await?;
        Ok((members, shifts))
    }
}
