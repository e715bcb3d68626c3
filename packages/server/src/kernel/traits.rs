// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Transition rules (who may claim, which statuses allow which action) live in
// domains::shifts::lifecycle; these traits only promise atomicity.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::domains::member::MemberRole;
use crate::domains::push::PushSubscription;
use crate::domains::shifts::{
    AuditEntry, NewShift, Shift, ShiftChange, ShiftListFilter, ShiftStatus, ShiftSwapLog,
    ShiftViewer,
};

// =============================================================================
// Shift store (the Version Guard)
// =============================================================================

/// Transient store failure. Retrying the same call with the same expected
/// version is safe: it either still succeeds once or reports a conflict.
#[derive(Debug, Error)]
#[error("transient store error: {0}")]
pub struct StoreError(pub anyhow::Error);

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self(err.into())
    }
}

impl From<anyhow::Error> for StoreError {
    fn from(err: anyhow::Error) -> Self {
        Self(err)
    }
}

/// Result of a conditional update
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    /// The row matched id + org + expected version + allowed status and was
    /// rewritten with `version = expected + 1`; the audit row is committed
    /// with it.
    Updated(Shift),
    /// No row matched. Nothing was written; the caller re-reads the row to
    /// find out why.
    NoMatch,
}

/// The only mutation path for shift rows.
///
/// Implementations must guarantee that for concurrent `conditional_update`
/// calls racing on the same shift id and expected version, exactly one
/// succeeds - the rest observe `NoMatch`. The audit row always commits in the
/// same transaction as the shift write, or not at all.
#[async_trait]
pub trait BaseShiftStore: Send + Sync {
    /// Insert a shift with status POSTED and version 0, together with its
    /// POSTED audit row, atomically.
    async fn create_posted(&self, new: NewShift, audit: AuditEntry) -> Result<Shift, StoreError>;

    /// Current row state, scoped to an organisation
    async fn find(&self, organisation_id: Uuid, shift_id: Uuid)
        -> Result<Option<Shift>, StoreError>;

    /// Compare-and-swap on the version column: apply `change` with
    /// `version = expected_version + 1` if and only if the row exists under
    /// this org with exactly `expected_version` and a status in `allowed`.
    async fn conditional_update(
        &self,
        organisation_id: Uuid,
        shift_id: Uuid,
        expected_version: i64,
        allowed: &[ShiftStatus],
        change: ShiftChange,
        audit: AuditEntry,
    ) -> Result<UpdateOutcome, StoreError>;

    /// Visibility-filtered listing ordered by date, with total row count
    async fn list(
        &self,
        organisation_id: Uuid,
        filter: &ShiftListFilter,
        viewer: &ShiftViewer,
    ) -> Result<(Vec<Shift>, i64), StoreError>;

    /// Audit rows for an organisation, newest first
    async fn history(
        &self,
        organisation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ShiftSwapLog>, StoreError>;
}

// =============================================================================
// Notification collaborators
// =============================================================================

/// Member lookups the notification dispatcher needs: audience selection and
/// display names. Read-only.
#[async_trait]
pub trait BaseMemberDirectory: Send + Sync {
    /// IDs of members with the given account role, optionally excluding one
    async fn ids_by_role(
        &self,
        organisation_id: Uuid,
        role: MemberRole,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Uuid>, StoreError>;

    /// IDs of members assigned the given org role, optionally excluding one
    async fn ids_holding_org_role(
        &self,
        organisation_id: Uuid,
        role_id: Uuid,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Uuid>, StoreError>;

    /// Display name of a member, None if they are not in the organisation
    async fn display_name(
        &self,
        organisation_id: Uuid,
        member_id: Uuid,
    ) -> Result<Option<String>, StoreError>;
}

/// Push subscription lookups and pruning for delivery
#[async_trait]
pub trait BaseSubscriptionStore: Send + Sync {
    async fn subscriptions_for(
        &self,
        member_id: Uuid,
    ) -> Result<Vec<PushSubscription>, StoreError>;

    /// Drop a subscription whose endpoint reported itself gone
    async fn remove(&self, subscription_id: Uuid) -> Result<(), StoreError>;
}

// =============================================================================
// Push delivery
// =============================================================================

/// Payload delivered to a push endpoint
#[derive(Debug, Clone, Serialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub tag: String,
}

/// Delivery failure classification
#[derive(Debug, Error)]
pub enum PushError {
    /// The endpoint is permanently gone (HTTP 404/410); the subscription
    /// should be pruned.
    #[error("push endpoint gone")]
    Gone,
    #[error("push delivery failed: {0}")]
    Other(#[from] anyhow::Error),
}

/// Delivers one payload to one subscription endpoint
#[async_trait]
pub trait BasePushSender: Send + Sync {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &NotificationPayload,
    ) -> Result<(), PushError>;
}
