use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// OrgRole - a named tag staff can opt into (e.g. "Bartender", "Front desk").
/// Used only to target notifications; never an authorization gate.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrgRole {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// An org role with the number of members currently holding it
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OrgRoleWithCount {
    pub id: Uuid,
    pub name: String,
    pub member_count: i64,
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl OrgRole {
    /// List roles for an organisation, alphabetical
    pub async fn list_for_org(organisation_id: Uuid, pool: &PgPool) -> Result<Vec<Self>> {
        let roles = sqlx::query_as::<_, OrgRole>(
            "SELECT * FROM org_roles WHERE organisation_id = $1 ORDER BY name ASC",
        )
        .bind(organisation_id)
        .fetch_all(pool)
        .await?;
        Ok(roles)
    }

    /// List roles with the count of members holding each
    pub async fn list_with_counts(
        organisation_id: Uuid,
        pool: &PgPool,
    ) -> Result<Vec<OrgRoleWithCount>> {
        let roles = sqlx::query_as::<_, OrgRoleWithCount>(
            r#"
            SELECT r.id, r.name, COUNT(mr.member_id) AS member_count
            FROM org_roles r
            LEFT JOIN member_org_roles mr ON mr.org_role_id = r.id
            WHERE r.organisation_id = $1
            GROUP BY r.id, r.name
            ORDER BY r.name ASC
            "#,
        )
        .bind(organisation_id)
        .fetch_all(pool)
        .await?;
        Ok(roles)
    }

    /// Find a role by name within an organisation (names are unique per org)
    pub async fn find_by_name(
        name: &str,
        organisation_id: Uuid,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        let role = sqlx::query_as::<_, OrgRole>(
            "SELECT * FROM org_roles WHERE name = $1 AND organisation_id = $2",
        )
        .bind(name)
        .bind(organisation_id)
        .fetch_optional(pool)
        .await?;
        Ok(role)
    }

    /// Find a role by ID scoped to an organisation
    pub async fn find_in_org(id: Uuid, organisation_id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        let role = sqlx::query_as::<_, OrgRole>(
            "SELECT * FROM org_roles WHERE id = $1 AND organisation_id = $2",
        )
        .bind(id)
        .bind(organisation_id)
        .fetch_optional(pool)
        .await?;
        Ok(role)
    }

    /// Insert a new role
    pub async fn insert(name: &str, organisation_id: Uuid, pool: &PgPool) -> Result<Self> {
        let role = sqlx::query_as::<_, OrgRole>(
            r#"
            INSERT INTO org_roles (id, organisation_id, name)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(organisation_id)
        .bind(name)
        .fetch_one(pool)
        .await?;
        Ok(role)
    }

    /// Delete a role. Shifts already tagged with it keep a NULL reference
    /// (historic data stays intact).
    pub async fn delete(id: Uuid, pool: &PgPool) -> Result<()> {
        sqlx::query("DELETE FROM org_roles WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Replace a member's role assignments with the given set. Role IDs not
    /// belonging to the member's organisation are dropped.
    pub async fn replace_assignments(
        member_id: Uuid,
        organisation_id: Uuid,
        role_ids: &[Uuid],
        pool: &PgPool,
    ) -> Result<()> {
        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM member_org_roles WHERE member_id = $1")
            .bind(member_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO member_org_roles (member_id, org_role_id)
            SELECT $1, r.id FROM org_roles r
            WHERE r.id = ANY($2) AND r.organisation_id = $3
            "#,
        )
        .bind(member_id)
        .bind(role_ids)
        .bind(organisation_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// (member_id, role_id, role_name) pairs for every assignment in the org.
    /// Used to decorate the member list.
    pub async fn assignments_for_org(
        organisation_id: Uuid,
        pool: &PgPool,
    ) -> Result<Vec<(Uuid, Uuid, String)>> {
        let rows: Vec<(Uuid, Uuid, String)> = sqlx::query_as(
            r#"
            SELECT mr.member_id, r.id, r.name
            FROM member_org_roles mr
            JOIN org_roles r ON r.id = mr.org_role_id
            WHERE r.organisation_id = $1
            ORDER BY r.name ASC
            "#,
        )
        .bind(organisation_id)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}
