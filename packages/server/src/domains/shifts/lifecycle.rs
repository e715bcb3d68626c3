//! Shift lifecycle engine.
//!
//! Validates preconditions per transition (role, ownership, current status),
//! then delegates the guarded write to the store's conditional update. The
//! store bumps the version and appends the audit row in one transaction;
//! under concurrent calls racing on the same shift and version, exactly one
//! wins. When the conditional update reports no match, the engine re-reads
//! the row to tell the caller precisely why it lost.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::domains::member::MemberRole;
use crate::domains::shifts::models::shift::{
    posted_details, NewShift, Shift, ShiftChange, ShiftStatus,
};
use crate::domains::shifts::models::swap_log::{AuditEntry, SwapAction};
use crate::kernel::{BaseShiftStore, StoreError, UpdateOutcome};

/// The authenticated principal driving a transition
#[derive(Debug, Clone)]
pub struct Actor {
    pub member_id: Uuid,
    pub organisation_id: Uuid,
    pub role: MemberRole,
    pub name: String,
}

/// Lifecycle action requested against an existing shift
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftAction {
    Claim,
    Approve,
    Decline,
    Cancel,
}

impl ShiftAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CLAIM" => Some(Self::Claim),
            "APPROVE" => Some(Self::Approve),
            "DECLINE" => Some(Self::Decline),
            "CANCEL" => Some(Self::Cancel),
            _ => None,
        }
    }
}

/// Everything a transition attempt can fail with. All variants are
/// recoverable: the caller refetches current state and retries, or abandons
/// the action. Only `Store` is worth retrying with identical arguments.
#[derive(Debug, Error)]
pub enum ShiftError {
    #[error("Shift not found")]
    NotFound,
    #[error("This shift has already been claimed by someone else")]
    AlreadyClaimed,
    #[error("Someone else just changed this shift. Please refresh.")]
    VersionConflict,
    #[error("You can't claim your own shift")]
    SelfClaimForbidden,
    #[error("{0}")]
    Forbidden(String),
    #[error("This action is not allowed from the shift's current state")]
    InvalidTransition,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Input for posting a new shift. `owner_name` is resolved by the caller and
/// only feeds the audit snapshot and notification text.
#[derive(Debug, Clone)]
pub struct PostShift {
    pub title: String,
    pub date: chrono::NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub original_owner_id: Uuid,
    pub owner_name: String,
    pub required_role_id: Option<Uuid>,
    pub reason: Option<String>,
}

/// The lifecycle engine. Stateless besides the store handle; every operation
/// is one conditional write plus, on failure, one classifying read.
pub struct ShiftLifecycle {
    store: Arc<dyn BaseShiftStore>,
}

impl ShiftLifecycle {
    pub fn new(store: Arc<dyn BaseShiftStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn BaseShiftStore> {
        &self.store
    }

    /// POST: create a shift in the caller's organisation. Staff may only post
    /// for themselves; managers may post on behalf of anyone in the org.
    pub async fn post_shift(&self, actor: &Actor, input: PostShift) -> Result<Shift, ShiftError> {
        if actor.role == MemberRole::Staff && input.original_owner_id != actor.member_id {
            return Err(ShiftError::Forbidden(
                "You can only post your own shifts".to_string(),
            ));
        }

        let new = NewShift {
            organisation_id: actor.organisation_id,
            title: input.title,
            date: input.date,
            start_time: input.start_time,
            end_time: input.end_time,
            original_owner_id: input.original_owner_id,
            posted_by_id: actor.member_id,
            required_role_id: input.required_role_id,
            reason: input.reason,
        };
        let audit = AuditEntry {
            actor_id: actor.member_id,
            action: SwapAction::Posted,
            details: posted_details(&new, &input.owner_name),
        };

        let shift = self.store.create_posted(new, audit).await?;
        tracing::info!(shift_id = %shift.id, owner = %shift.original_owner_id, "Shift posted");
        Ok(shift)
    }

    /// Apply a CLAIM/APPROVE/DECLINE/CANCEL transition with the version the
    /// caller last observed.
    pub async fn apply(
        &self,
        actor: &Actor,
        shift_id: Uuid,
        action: ShiftAction,
        expected_version: i64,
    ) -> Result<Shift, ShiftError> {
        let shift = match action {
            ShiftAction::Claim => self.claim(actor, shift_id, expected_version).await?,
            ShiftAction::Approve => self.approve(actor, shift_id, expected_version).await?,
            ShiftAction::Decline => self.decline(actor, shift_id, expected_version).await?,
            ShiftAction::Cancel => self.cancel(actor, shift_id, expected_version).await?,
        };
        tracing::info!(
            shift_id = %shift.id,
            actor = %actor.member_id,
            action = ?action,
            version = shift.version,
            "Shift transition accepted"
        );
        Ok(shift)
    }

    /// CLAIM: POSTED -> CLAIMED by any org member except the original owner
    async fn claim(
        &self,
        actor: &Actor,
        shift_id: Uuid,
        expected_version: i64,
    ) -> Result<Shift, ShiftError> {
        let org = actor.organisation_id;
        let shift = self
            .store
            .find(org, shift_id)
            .await?
            .ok_or(ShiftError::NotFound)?;

        // Checked before the version guard: claiming your own shift is wrong
        // whether or not your version is stale.
        if shift.original_owner_id == actor.member_id {
            return Err(ShiftError::SelfClaimForbidden);
        }

        let outcome = self
            .store
            .conditional_update(
                org,
                shift_id,
                expected_version,
                &[ShiftStatus::Posted],
                ShiftChange::Claim {
                    claimed_by: actor.member_id,
                    at: Utc::now(),
                },
                AuditEntry {
                    actor_id: actor.member_id,
                    action: SwapAction::Claimed,
                    details: json!({ "claimedBy": actor.name }),
                },
            )
            .await?;

        match outcome {
            UpdateOutcome::Updated(shift) => Ok(shift),
            UpdateOutcome::NoMatch => {
                Err(match self.store.find(org, shift_id).await? {
                    None => ShiftError::NotFound,
                    // The row proves the shift left POSTED: "taken", not
                    // merely "stale".
                    Some(s) if s.status != ShiftStatus::Posted.as_str() => {
                        ShiftError::AlreadyClaimed
                    }
                    Some(_) => ShiftError::VersionConflict,
                })
            }
        }
    }

    /// APPROVE: CLAIMED -> APPROVED, manager only. Terminal.
    async fn approve(
        &self,
        actor: &Actor,
        shift_id: Uuid,
        expected_version: i64,
    ) -> Result<Shift, ShiftError> {
        if actor.role != MemberRole::Manager {
            return Err(ShiftError::Forbidden(
                "Only managers can approve shifts".to_string(),
            ));
        }

        let org = actor.organisation_id;
        let outcome = self
            .store
            .conditional_update(
                org,
                shift_id,
                expected_version,
                &[ShiftStatus::Claimed],
                ShiftChange::Approve { at: Utc::now() },
                AuditEntry {
                    actor_id: actor.member_id,
                    action: SwapAction::Approved,
                    details: json!({ "approvedBy": actor.name }),
                },
            )
            .await?;

        match outcome {
            UpdateOutcome::Updated(shift) => Ok(shift),
            UpdateOutcome::NoMatch => Err(self
                .classify_from_status(org, shift_id, ShiftStatus::Claimed)
                .await?),
        }
    }

    /// DECLINE: CLAIMED -> POSTED, manager only. Clears the claimant so the
    /// shift reappears in the pool.
    async fn decline(
        &self,
        actor: &Actor,
        shift_id: Uuid,
        expected_version: i64,
    ) -> Result<Shift, ShiftError> {
        if actor.role != MemberRole::Manager {
            return Err(ShiftError::Forbidden(
                "Only managers can decline shifts".to_string(),
            ));
        }

        let org = actor.organisation_id;
        let shift = self
            .store
            .find(org, shift_id)
            .await?
            .ok_or(ShiftError::NotFound)?;

        // The audit row names the displaced claimant, so the read above must
        // be the same row version the guarded update will match. Versions are
        // bumped on every accepted write; a mismatch here means the snapshot
        // is stale and its claimant cannot be trusted.
        if shift.version != expected_version {
            return Err(ShiftError::VersionConflict);
        }

        let outcome = self
            .store
            .conditional_update(
                org,
                shift_id,
                expected_version,
                &[ShiftStatus::Claimed],
                ShiftChange::Decline { at: Utc::now() },
                AuditEntry {
                    actor_id: actor.member_id,
                    action: SwapAction::Declined,
                    details: json!({
                        "declinedBy": actor.name,
                        "previousClaimant": shift.claimed_by_id,
                    }),
                },
            )
            .await?;

        match outcome {
            UpdateOutcome::Updated(shift) => Ok(shift),
            UpdateOutcome::NoMatch => Err(self
                .classify_from_status(org, shift_id, ShiftStatus::Claimed)
                .await?),
        }
    }

    /// CANCEL: POSTED|CLAIMED -> CANCELLED by a manager or the original
    /// owner. Terminal. The owner may cancel even while a claim is pending.
    async fn cancel(
        &self,
        actor: &Actor,
        shift_id: Uuid,
        expected_version: i64,
    ) -> Result<Shift, ShiftError> {
        let org = actor.organisation_id;
        let shift = self
            .store
            .find(org, shift_id)
            .await?
            .ok_or(ShiftError::NotFound)?;

        if actor.role != MemberRole::Manager && shift.original_owner_id != actor.member_id {
            return Err(ShiftError::Forbidden(
                "Only managers or the shift owner can cancel".to_string(),
            ));
        }

        let allowed = [ShiftStatus::Posted, ShiftStatus::Claimed];
        let outcome = self
            .store
            .conditional_update(
                org,
                shift_id,
                expected_version,
                &allowed,
                ShiftChange::Cancel,
                AuditEntry {
                    actor_id: actor.member_id,
                    action: SwapAction::Cancelled,
                    details: json!({ "cancelledBy": actor.name }),
                },
            )
            .await?;

        match outcome {
            UpdateOutcome::Updated(shift) => Ok(shift),
            UpdateOutcome::NoMatch => {
                Err(match self.store.find(org, shift_id).await? {
                    None => ShiftError::NotFound,
                    Some(s) if !allowed.iter().any(|a| s.status == a.as_str()) => {
                        ShiftError::InvalidTransition
                    }
                    Some(_) => ShiftError::VersionConflict,
                })
            }
        }
    }

    /// After a failed conditional update, decide between NotFound,
    /// InvalidTransition (status moved on) and VersionConflict (status fine,
    /// caller stale).
    async fn classify_from_status(
        &self,
        organisation_id: Uuid,
        shift_id: Uuid,
        required: ShiftStatus,
    ) -> Result<ShiftError, StoreError> {
        Ok(match self.store.find(organisation_id, shift_id).await? {
            None => ShiftError::NotFound,
            Some(s) if s.status != required.as_str() => ShiftError::InvalidTransition,
            Some(_) => ShiftError::VersionConflict,
        })
    }
}
