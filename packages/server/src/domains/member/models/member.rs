use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Member of an organisation - either a manager or a staff member
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Member {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String, // 'MANAGER' | 'STAFF'
    pub staff_title: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Role enum for type-safe checks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberRole {
    Manager,
    Staff,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manager => "MANAGER",
            Self::Staff => "STAFF",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "MANAGER" => Some(Self::Manager),
            "STAFF" => Some(Self::Staff),
            _ => None,
        }
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Member {
    /// Insert a new member. Takes an executor so registration can run inside
    /// the same transaction that creates the organisation.
    pub async fn insert<'e>(
        executor: impl PgExecutor<'e>,
        organisation_id: Uuid,
        name: &str,
        email: &str,
        password_hash: &str,
        role: MemberRole,
        staff_title: Option<&str>,
    ) -> Result<Self> {
        let member = sqlx::query_as::<_, Member>(
            r#"
            INSERT INTO members (id, organisation_id, name, email, password_hash, role, staff_title)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(organisation_id)
        .bind(name)
        .bind(email.to_lowercase())
        .bind(password_hash)
        .bind(role.as_str())
        .bind(staff_title)
        .fetch_one(executor)
        .await?;
        Ok(member)
    }

    /// Find a member by ID scoped to an organisation
    pub async fn find_in_org(id: Uuid, organisation_id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        let member = sqlx::query_as::<_, Member>(
            "SELECT * FROM members WHERE id = $1 AND organisation_id = $2",
        )
        .bind(id)
        .bind(organisation_id)
        .fetch_optional(pool)
        .await?;
        Ok(member)
    }

    /// Find a member by email within an organisation (emails are unique per org)
    pub async fn find_by_email_in_org(
        email: &str,
        organisation_id: Uuid,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        let member = sqlx::query_as::<_, Member>(
            "SELECT * FROM members WHERE email = $1 AND organisation_id = $2",
        )
        .bind(email.to_lowercase())
        .bind(organisation_id)
        .fetch_optional(pool)
        .await?;
        Ok(member)
    }

    /// Find every member with this email across organisations (login may match
    /// the same email in more than one org)
    pub async fn find_all_by_email(email: &str, pool: &PgPool) -> Result<Vec<Self>> {
        let members = sqlx::query_as::<_, Member>("SELECT * FROM members WHERE email = $1")
            .bind(email.to_lowercase())
            .fetch_all(pool)
            .await?;
        Ok(members)
    }

    /// List all members of an organisation, managers first then by name
    pub async fn list_for_org(organisation_id: Uuid, pool: &PgPool) -> Result<Vec<Self>> {
        let members = sqlx::query_as::<_, Member>(
            "SELECT * FROM members WHERE organisation_id = $1 ORDER BY role ASC, name ASC",
        )
        .bind(organisation_id)
        .fetch_all(pool)
        .await?;
        Ok(members)
    }

    /// Whether any shift or audit row references this member. Such members
    /// cannot be deleted (the schema RESTRICTs it); callers check first and
    /// report the conflict instead of surfacing a constraint error.
    pub async fn shift_history_exists(id: Uuid, pool: &PgPool) -> Result<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM shifts
                WHERE original_owner_id = $1 OR posted_by_id = $1 OR claimed_by_id = $1
            ) OR EXISTS(
                SELECT 1 FROM shift_swap_logs WHERE actor_id = $1
            )
            "#,
        )
        .bind(id)
        .fetch_one(pool)
        .await?;
        Ok(exists)
    }

    /// Delete a member
    pub async fn delete(id: Uuid, pool: &PgPool) -> Result<()> {
        sqlx::query("DELETE FROM members WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// IDs of members with the given role, optionally excluding one member.
    /// Used for notification audience selection.
    pub async fn ids_by_role(
        organisation_id: Uuid,
        role: MemberRole,
        exclude: Option<Uuid>,
        pool: &PgPool,
    ) -> Result<Vec<Uuid>> {
        let ids: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT id FROM members
            WHERE organisation_id = $1 AND role = $2 AND ($3::uuid IS NULL OR id != $3)
            "#,
        )
        .bind(organisation_id)
        .bind(role.as_str())
        .bind(exclude)
        .fetch_all(pool)
        .await?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    /// IDs of staff members holding a given org role, optionally excluding one
    /// member. Used to narrow notification fan-out when a shift carries a
    /// required-role tag.
    pub async fn ids_holding_org_role(
        organisation_id: Uuid,
        org_role_id: Uuid,
        exclude: Option<Uuid>,
        pool: &PgPool,
    ) -> Result<Vec<Uuid>> {
        let ids: Vec<(Uuid,)> = sqlx::query_as(
            r#"
            SELECT m.id FROM members m
            JOIN member_org_roles mr ON mr.member_id = m.id
            WHERE m.organisation_id = $1
              AND m.role = 'STAFF'
              AND mr.org_role_id = $2
              AND ($3::uuid IS NULL OR m.id != $3)
            "#,
        )
        .bind(organisation_id)
        .bind(org_role_id)
        .bind(exclude)
        .fetch_all(pool)
        .await?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_round_trip() {
        assert_eq!(MemberRole::parse("MANAGER"), Some(MemberRole::Manager));
        assert_eq!(MemberRole::parse("STAFF"), Some(MemberRole::Staff));
        assert_eq!(MemberRole::parse("manager"), None);
        assert_eq!(MemberRole::Manager.as_str(), "MANAGER");
    }
}
