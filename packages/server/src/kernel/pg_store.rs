//! Postgres-backed shift store.
//!
//! The conditional update is a single `UPDATE ... WHERE id AND org AND
//! version AND status RETURNING *` inside a transaction with the audit
//! insert. Row-level atomicity of the UPDATE makes the version check a
//! compare-and-swap: two racers on the same expected version cannot both
//! match, because the winner's write bumps the version before the loser's
//! predicate is evaluated.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domains::member::{Member, MemberRole};
use crate::domains::push::PushSubscription;
use crate::domains::shifts::{
    AuditEntry, NewShift, Shift, ShiftChange, ShiftListFilter, ShiftStatus, ShiftSwapLog,
    ShiftViewer,
};
use crate::kernel::traits::{
    BaseMemberDirectory, BaseShiftStore, BaseSubscriptionStore, StoreError, UpdateOutcome,
};

pub struct PgShiftStore {
    pool: PgPool,
}

impl PgShiftStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Append one audit row inside the caller's transaction
async fn insert_log(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    shift_id: Uuid,
    audit: &AuditEntry,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO shift_swap_logs (id, shift_id, actor_id, action, details)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(shift_id)
    .bind(audit.actor_id)
    .bind(audit.action.as_str())
    .bind(&audit.details)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl BaseShiftStore for PgShiftStore {
    async fn create_posted(&self, new: NewShift, audit: AuditEntry) -> Result<Shift, StoreError> {
        let mut tx = self.pool.begin().await?;

        let shift = sqlx::query_as::<_, Shift>(
            r#"
            INSERT INTO shifts (
                id, organisation_id, title, date, start_time, end_time,
                status, version, original_owner_id, posted_by_id,
                required_role_id, reason
            )
            VALUES ($1, $2, $3, $4, $5, $6, 'POSTED', 0, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new.organisation_id)
        .bind(&new.title)
        .bind(new.date)
        .bind(&new.start_time)
        .bind(&new.end_time)
        .bind(new.original_owner_id)
        .bind(new.posted_by_id)
        .bind(new.required_role_id)
        .bind(&new.reason)
        .fetch_one(&mut *tx)
        .await?;

        insert_log(&mut tx, shift.id, &audit).await?;
        tx.commit().await?;
        Ok(shift)
    }

    async fn find(
        &self,
        organisation_id: Uuid,
        shift_id: Uuid,
    ) -> Result<Option<Shift>, StoreError> {
        let shift = sqlx::query_as::<_, Shift>(
            "SELECT * FROM shifts WHERE id = $1 AND organisation_id = $2",
        )
        .bind(shift_id)
        .bind(organisation_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(shift)
    }

    async fn conditional_update(
        &self,
        organisation_id: Uuid,
        shift_id: Uuid,
        expected_version: i64,
        allowed: &[ShiftStatus],
        change: ShiftChange,
        audit: AuditEntry,
    ) -> Result<UpdateOutcome, StoreError> {
        let allowed: Vec<&str> = allowed.iter().map(ShiftStatus::as_str).collect();
        let mut tx = self.pool.begin().await?;

        let updated: Option<Shift> = match change {
            ShiftChange::Claim { claimed_by, at } => {
                sqlx::query_as::<_, Shift>(
                    r#"
                    UPDATE shifts
                    SET status = 'CLAIMED', claimed_by_id = $5, claimed_at = $6,
                        version = version + 1
                    WHERE id = $1 AND organisation_id = $2 AND version = $3
                      AND status = ANY($4)
                    RETURNING *
                    "#,
                )
                .bind(shift_id)
                .bind(organisation_id)
                .bind(expected_version)
                .bind(&allowed)
                .bind(claimed_by)
                .bind(at)
                .fetch_optional(&mut *tx)
                .await?
            }
            ShiftChange::Approve { at } => {
                sqlx::query_as::<_, Shift>(
                    r#"
                    UPDATE shifts
                    SET status = 'APPROVED', approved_at = $5, version = version + 1
                    WHERE id = $1 AND organisation_id = $2 AND version = $3
                      AND status = ANY($4)
                    RETURNING *
                    "#,
                )
                .bind(shift_id)
                .bind(organisation_id)
                .bind(expected_version)
                .bind(&allowed)
                .bind(at)
                .fetch_optional(&mut *tx)
                .await?
            }
            ShiftChange::Decline { at } => {
                sqlx::query_as::<_, Shift>(
                    r#"
                    UPDATE shifts
                    SET status = 'POSTED', claimed_by_id = NULL, claimed_at = NULL,
                        declined_at = $5, version = version + 1
                    WHERE id = $1 AND organisation_id = $2 AND version = $3
                      AND status = ANY($4)
                    RETURNING *
                    "#,
                )
                .bind(shift_id)
                .bind(organisation_id)
                .bind(expected_version)
                .bind(&allowed)
                .bind(at)
                .fetch_optional(&mut *tx)
                .await?
            }
            ShiftChange::Cancel => {
                sqlx::query_as::<_, Shift>(
                    r#"
                    UPDATE shifts
                    SET status = 'CANCELLED', version = version + 1
                    WHERE id = $1 AND organisation_id = $2 AND version = $3
                      AND status = ANY($4)
                    RETURNING *
                    "#,
                )
                .bind(shift_id)
                .bind(organisation_id)
                .bind(expected_version)
                .bind(&allowed)
                .fetch_optional(&mut *tx)
                .await?
            }
        };

        match updated {
            Some(shift) => {
                insert_log(&mut tx, shift.id, &audit).await?;
                tx.commit().await?;
                Ok(UpdateOutcome::Updated(shift))
            }
            None => {
                // Nothing matched; drop the transaction without writing.
                tx.rollback().await?;
                Ok(UpdateOutcome::NoMatch)
            }
        }
    }

    async fn list(
        &self,
        organisation_id: Uuid,
        filter: &ShiftListFilter,
        viewer: &ShiftViewer,
    ) -> Result<(Vec<Shift>, i64), StoreError> {
        let status = filter.effective_status(viewer).map(|s| s.as_str());
        let is_manager = matches!(viewer.role, crate::domains::member::MemberRole::Manager);

        let shifts = sqlx::query_as::<_, Shift>(
            r#"
            SELECT * FROM shifts
            WHERE organisation_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3 OR status = 'POSTED' OR original_owner_id = $4 OR claimed_by_id = $4)
            ORDER BY date ASC, created_at ASC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(organisation_id)
        .bind(status)
        .bind(is_manager)
        .bind(viewer.member_id)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?;

        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM shifts
            WHERE organisation_id = $1
              AND ($2::text IS NULL OR status = $2)
              AND ($3 OR status = 'POSTED' OR original_owner_id = $4 OR claimed_by_id = $4)
            "#,
        )
        .bind(organisation_id)
        .bind(status)
        .bind(is_manager)
        .bind(viewer.member_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((shifts, total))
    }

    async fn history(
        &self,
        organisation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ShiftSwapLog>, StoreError> {
        let logs = sqlx::query_as::<_, ShiftSwapLog>(
            r#"
            SELECT l.* FROM shift_swap_logs l
            JOIN shifts s ON s.id = l.shift_id
            WHERE s.organisation_id = $1
            ORDER BY l.created_at DESC
            LIMIT $2
            "#,
        )
        .bind(organisation_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(logs)
    }
}

/// Member lookups for the notification dispatcher, backed by the member model
pub struct PgMemberDirectory {
    pool: PgPool,
}

impl PgMemberDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseMemberDirectory for PgMemberDirectory {
    async fn ids_by_role(
        &self,
        organisation_id: Uuid,
        role: MemberRole,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Uuid>, StoreError> {
        Ok(Member::ids_by_role(organisation_id, role, exclude, &self.pool).await?)
    }

    async fn ids_holding_org_role(
        &self,
        organisation_id: Uuid,
        role_id: Uuid,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Uuid>, StoreError> {
        Ok(Member::ids_holding_org_role(organisation_id, role_id, exclude, &self.pool).await?)
    }

    async fn display_name(
        &self,
        organisation_id: Uuid,
        member_id: Uuid,
    ) -> Result<Option<String>, StoreError> {
        let member = Member::find_in_org(member_id, organisation_id, &self.pool).await?;
        Ok(member.map(|m| m.name))
    }
}

/// Push subscription lookups and pruning, backed by the subscription model
pub struct PgSubscriptionStore {
    pool: PgPool,
}

impl PgSubscriptionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BaseSubscriptionStore for PgSubscriptionStore {
    async fn subscriptions_for(
        &self,
        member_id: Uuid,
    ) -> Result<Vec<PushSubscription>, StoreError> {
        Ok(PushSubscription::find_for_member(member_id, &self.pool).await?)
    }

    async fn remove(&self, subscription_id: Uuid) -> Result<(), StoreError> {
        Ok(PushSubscription::delete(subscription_id, &self.pool).await?)
    }
}
