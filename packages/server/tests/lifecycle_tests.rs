// Lifecycle engine tests over the in-memory store.
//
// The in-memory store implements the same compare-and-swap contract as the
// Postgres store, so these exercise the full transition logic including the
// one-winner guarantee under concurrency.

use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use server_core::domains::member::MemberRole;
use server_core::domains::shifts::{
    Actor, PostShift, ShiftAction, ShiftError, ShiftLifecycle, ShiftListFilter, ShiftStatus,
    ShiftViewer,
};
use server_core::kernel::{BaseShiftStore, InMemoryShiftStore};

fn actor(org: Uuid, role: MemberRole, name: &str) -> Actor {
    Actor {
        member_id: Uuid::new_v4(),
        organisation_id: org,
        role,
        name: name.to_string(),
    }
}

fn post_input(owner: &Actor) -> PostShift {
    PostShift {
        title: "Evening Shift".to_string(),
        date: NaiveDate::from_ymd_opt(2025, 9, 5).unwrap(),
        start_time: "18:00".to_string(),
        end_time: "23:00".to_string(),
        original_owner_id: owner.member_id,
        owner_name: owner.name.clone(),
        required_role_id: None,
        reason: Some("Doctor's appointment".to_string()),
    }
}

fn engine() -> (Arc<InMemoryShiftStore>, ShiftLifecycle) {
    let store = Arc::new(InMemoryShiftStore::new());
    let lifecycle = ShiftLifecycle::new(store.clone());
    (store, lifecycle)
}

#[tokio::test]
async fn post_claim_approve_happy_path() {
    let org = Uuid::new_v4();
    let (store, lifecycle) = engine();
    let owner = actor(org, MemberRole::Staff, "Alice");
    let claimant = actor(org, MemberRole::Staff, "Bob");
    let manager = actor(org, MemberRole::Manager, "Mia");

    let shift = lifecycle.post_shift(&owner, post_input(&owner)).await.unwrap();
    assert_eq!(shift.status, "POSTED");
    assert_eq!(shift.version, 0);
    assert_eq!(shift.claimed_by_id, None);

    let shift = lifecycle
        .apply(&claimant, shift.id, ShiftAction::Claim, 0)
        .await
        .unwrap();
    assert_eq!(shift.status, "CLAIMED");
    assert_eq!(shift.version, 1);
    assert_eq!(shift.claimed_by_id, Some(claimant.member_id));
    assert!(shift.claimed_at.is_some());

    let shift = lifecycle
        .apply(&manager, shift.id, ShiftAction::Approve, 1)
        .await
        .unwrap();
    assert_eq!(shift.status, "APPROVED");
    assert_eq!(shift.version, 2);
    assert!(shift.approved_at.is_some());
    // Approved keeps the claimant on record
    assert_eq!(shift.claimed_by_id, Some(claimant.member_id));

    let actions: Vec<String> = store
        .logs_for_shift(shift.id)
        .into_iter()
        .map(|l| l.action)
        .collect();
    assert_eq!(actions, vec!["POSTED", "CLAIMED", "APPROVED"]);
}

#[tokio::test]
async fn decline_reopens_shift_for_reclaiming() {
    let org = Uuid::new_v4();
    let (store, lifecycle) = engine();
    let owner = actor(org, MemberRole::Staff, "Alice");
    let first = actor(org, MemberRole::Staff, "Bob");
    let second = actor(org, MemberRole::Staff, "Cara");
    let manager = actor(org, MemberRole::Manager, "Mia");

    let shift = lifecycle.post_shift(&owner, post_input(&owner)).await.unwrap();
    let shift = lifecycle
        .apply(&first, shift.id, ShiftAction::Claim, 0)
        .await
        .unwrap();

    let shift = lifecycle
        .apply(&manager, shift.id, ShiftAction::Decline, 1)
        .await
        .unwrap();
    assert_eq!(shift.status, "POSTED");
    assert_eq!(shift.version, 2);
    assert_eq!(shift.claimed_by_id, None);
    assert_eq!(shift.claimed_at, None);
    assert!(shift.declined_at.is_some());

    // The declined shift is back in the staff pool
    let viewer = ShiftViewer {
        member_id: second.member_id,
        role: MemberRole::Staff,
    };
    let filter = ShiftListFilter {
        status: None,
        limit: 50,
        offset: 0,
    };
    let (rows, total) = store.list(org, &filter, &viewer).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].id, shift.id);

    // and claimable again at the new version
    let shift = lifecycle
        .apply(&second, shift.id, ShiftAction::Claim, 2)
        .await
        .unwrap();
    assert_eq!(shift.status, "CLAIMED");
    assert_eq!(shift.version, 3);
    assert_eq!(shift.claimed_by_id, Some(second.member_id));

    let actions: Vec<String> = store
        .logs_for_shift(shift.id)
        .into_iter()
        .map(|l| l.action)
        .collect();
    assert_eq!(actions, vec!["POSTED", "CLAIMED", "DECLINED", "CLAIMED"]);
}

#[tokio::test]
async fn concurrent_claims_have_exactly_one_winner() {
    let org = Uuid::new_v4();
    let store = Arc::new(InMemoryShiftStore::new());
    let lifecycle = Arc::new(ShiftLifecycle::new(store.clone()));
    let owner = actor(org, MemberRole::Staff, "Alice");

    let shift = lifecycle.post_shift(&owner, post_input(&owner)).await.unwrap();

    let claimants: Vec<Actor> = (0..10)
        .map(|i| actor(org, MemberRole::Staff, &format!("Staff {i}")))
        .collect();

    let mut handles = Vec::new();
    for claimant in claimants.clone() {
        let lifecycle = lifecycle.clone();
        let shift_id = shift.id;
        handles.push(tokio::spawn(async move {
            let result = lifecycle
                .apply(&claimant, shift_id, ShiftAction::Claim, 0)
                .await;
            (claimant.member_id, result)
        }));
    }

    let mut winners = Vec::new();
    let mut losses = 0;
    for handle in handles {
        let (member_id, result) = handle.await.unwrap();
        match result {
            Ok(updated) => {
                assert_eq!(updated.version, 1);
                assert_eq!(updated.claimed_by_id, Some(member_id));
                winners.push(member_id);
            }
            Err(ShiftError::AlreadyClaimed) | Err(ShiftError::VersionConflict) => losses += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(winners.len(), 1);
    assert_eq!(losses, 9);

    // Final row agrees with the single winner, and losers wrote nothing
    let row = store.find(org, shift.id).await.unwrap().unwrap();
    assert_eq!(row.version, 1);
    assert_eq!(row.claimed_by_id, Some(winners[0]));
    let actions: Vec<String> = store
        .logs_for_shift(shift.id)
        .into_iter()
        .map(|l| l.action)
        .collect();
    assert_eq!(actions, vec!["POSTED", "CLAIMED"]);
}

#[tokio::test]
async fn stale_version_is_rejected() {
    let org = Uuid::new_v4();
    let (_, lifecycle) = engine();
    let owner = actor(org, MemberRole::Staff, "Alice");
    let claimant = actor(org, MemberRole::Staff, "Bob");
    let manager = actor(org, MemberRole::Manager, "Mia");

    let shift = lifecycle.post_shift(&owner, post_input(&owner)).await.unwrap();
    lifecycle
        .apply(&claimant, shift.id, ShiftAction::Claim, 0)
        .await
        .unwrap();

    // Approving with the pre-claim version: the status is right but the
    // caller's view is stale.
    let err = lifecycle
        .apply(&manager, shift.id, ShiftAction::Approve, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, ShiftError::VersionConflict));

    // Retrying with the current version succeeds
    lifecycle
        .apply(&manager, shift.id, ShiftAction::Approve, 1)
        .await
        .unwrap();
}

#[tokio::test]
async fn claiming_a_taken_shift_reports_already_claimed() {
    let org = Uuid::new_v4();
    let (_, lifecycle) = engine();
    let owner = actor(org, MemberRole::Staff, "Alice");
    let first = actor(org, MemberRole::Staff, "Bob");
    let late = actor(org, MemberRole::Staff, "Cara");

    let shift = lifecycle.post_shift(&owner, post_input(&owner)).await.unwrap();
    lifecycle
        .apply(&first, shift.id, ShiftAction::Claim, 0)
        .await
        .unwrap();

    // Late claimant still holds version 0; the row has left POSTED so the
    // precise answer is "taken", not "stale".
    let err = lifecycle
        .apply(&late, shift.id, ShiftAction::Claim, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, ShiftError::AlreadyClaimed));
}

#[tokio::test]
async fn self_claim_is_rejected_regardless_of_version() {
    let org = Uuid::new_v4();
    let (_, lifecycle) = engine();
    let owner = actor(org, MemberRole::Staff, "Alice");

    let shift = lifecycle.post_shift(&owner, post_input(&owner)).await.unwrap();

    let err = lifecycle
        .apply(&owner, shift.id, ShiftAction::Claim, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, ShiftError::SelfClaimForbidden));

    // Also with a stale version: ownership wins over staleness
    let err = lifecycle
        .apply(&owner, shift.id, ShiftAction::Claim, 7)
        .await
        .unwrap_err();
    assert!(matches!(err, ShiftError::SelfClaimForbidden));
}

#[tokio::test]
async fn role_checks_gate_manager_actions() {
    let org = Uuid::new_v4();
    let (_, lifecycle) = engine();
    let owner = actor(org, MemberRole::Staff, "Alice");
    let claimant = actor(org, MemberRole::Staff, "Bob");

    let shift = lifecycle.post_shift(&owner, post_input(&owner)).await.unwrap();
    lifecycle
        .apply(&claimant, shift.id, ShiftAction::Claim, 0)
        .await
        .unwrap();

    for action in [ShiftAction::Approve, ShiftAction::Decline] {
        let err = lifecycle
            .apply(&claimant, shift.id, action, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ShiftError::Forbidden(_)), "{action:?}");
    }
}

#[tokio::test]
async fn staff_can_only_post_their_own_shifts() {
    let org = Uuid::new_v4();
    let (_, lifecycle) = engine();
    let poster = actor(org, MemberRole::Staff, "Alice");
    let other = actor(org, MemberRole::Staff, "Bob");
    let manager = actor(org, MemberRole::Manager, "Mia");

    let mut input = post_input(&other);
    let err = lifecycle.post_shift(&poster, input.clone()).await.unwrap_err();
    assert!(matches!(err, ShiftError::Forbidden(_)));

    // Managers may post on behalf of anyone
    input.owner_name = other.name.clone();
    let shift = lifecycle.post_shift(&manager, input).await.unwrap();
    assert_eq!(shift.original_owner_id, other.member_id);
    assert_eq!(shift.posted_by_id, manager.member_id);
}

#[tokio::test]
async fn cancel_requires_manager_or_owner() {
    let org = Uuid::new_v4();
    let (_, lifecycle) = engine();
    let owner = actor(org, MemberRole::Staff, "Alice");
    let bystander = actor(org, MemberRole::Staff, "Bob");
    let manager = actor(org, MemberRole::Manager, "Mia");

    let shift = lifecycle.post_shift(&owner, post_input(&owner)).await.unwrap();

    let err = lifecycle
        .apply(&bystander, shift.id, ShiftAction::Cancel, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, ShiftError::Forbidden(_)));

    // The owner may cancel their own posted shift
    let shift2 = lifecycle.post_shift(&owner, post_input(&owner)).await.unwrap();
    let cancelled = lifecycle
        .apply(&owner, shift2.id, ShiftAction::Cancel, 0)
        .await
        .unwrap();
    assert_eq!(cancelled.status, "CANCELLED");
    assert_eq!(cancelled.version, 1);

    // A manager may cancel even while a claim is pending
    let claimant = actor(org, MemberRole::Staff, "Cara");
    lifecycle
        .apply(&claimant, shift.id, ShiftAction::Claim, 0)
        .await
        .unwrap();
    let cancelled = lifecycle
        .apply(&manager, shift.id, ShiftAction::Cancel, 1)
        .await
        .unwrap();
    assert_eq!(cancelled.status, "CANCELLED");
}

#[tokio::test]
async fn terminal_states_accept_no_further_transitions() {
    let org = Uuid::new_v4();
    let (_, lifecycle) = engine();
    let owner = actor(org, MemberRole::Staff, "Alice");
    let claimant = actor(org, MemberRole::Staff, "Bob");
    let late = actor(org, MemberRole::Staff, "Cara");
    let manager = actor(org, MemberRole::Manager, "Mia");

    let shift = lifecycle.post_shift(&owner, post_input(&owner)).await.unwrap();
    lifecycle
        .apply(&claimant, shift.id, ShiftAction::Claim, 0)
        .await
        .unwrap();
    lifecycle
        .apply(&manager, shift.id, ShiftAction::Approve, 1)
        .await
        .unwrap();

    let err = lifecycle
        .apply(&late, shift.id, ShiftAction::Claim, 2)
        .await
        .unwrap_err();
    assert!(matches!(err, ShiftError::AlreadyClaimed));

    let err = lifecycle
        .apply(&manager, shift.id, ShiftAction::Decline, 2)
        .await
        .unwrap_err();
    assert!(matches!(err, ShiftError::InvalidTransition));

    let err = lifecycle
        .apply(&manager, shift.id, ShiftAction::Cancel, 2)
        .await
        .unwrap_err();
    assert!(matches!(err, ShiftError::InvalidTransition));
}

#[tokio::test]
async fn shifts_are_scoped_to_their_organisation() {
    let org = Uuid::new_v4();
    let other_org = Uuid::new_v4();
    let (_, lifecycle) = engine();
    let owner = actor(org, MemberRole::Staff, "Alice");
    let outsider = actor(other_org, MemberRole::Staff, "Eve");
    let outside_manager = actor(other_org, MemberRole::Manager, "Mallory");

    let shift = lifecycle.post_shift(&owner, post_input(&owner)).await.unwrap();

    let err = lifecycle
        .apply(&outsider, shift.id, ShiftAction::Claim, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, ShiftError::NotFound));

    let err = lifecycle
        .apply(&outside_manager, shift.id, ShiftAction::Cancel, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, ShiftError::NotFound));
}

#[tokio::test]
async fn rejected_attempts_write_no_audit_rows() {
    let org = Uuid::new_v4();
    let (store, lifecycle) = engine();
    let owner = actor(org, MemberRole::Staff, "Alice");
    let claimant = actor(org, MemberRole::Staff, "Bob");
    let late = actor(org, MemberRole::Staff, "Cara");

    let shift = lifecycle.post_shift(&owner, post_input(&owner)).await.unwrap();
    lifecycle
        .apply(&claimant, shift.id, ShiftAction::Claim, 0)
        .await
        .unwrap();
    lifecycle
        .apply(&late, shift.id, ShiftAction::Claim, 0)
        .await
        .unwrap_err();
    lifecycle
        .apply(&owner, shift.id, ShiftAction::Claim, 1)
        .await
        .unwrap_err();

    let logs = store.logs_for_shift(shift.id);
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].actor_id, owner.member_id);
    assert_eq!(logs[1].actor_id, claimant.member_id);

    // The org-level trail agrees, newest first
    let trail = store.history(org, 10).await.unwrap();
    assert_eq!(trail.len(), 2);
    assert_eq!(trail[0].action, "CLAIMED");
    assert_eq!(trail[1].action, "POSTED");
}

#[tokio::test]
async fn decline_audit_names_the_displaced_claimant() {
    let org = Uuid::new_v4();
    let (store, lifecycle) = engine();
    let owner = actor(org, MemberRole::Staff, "Alice");
    let claimant = actor(org, MemberRole::Staff, "Bob");
    let manager = actor(org, MemberRole::Manager, "Mia");

    let shift = lifecycle.post_shift(&owner, post_input(&owner)).await.unwrap();
    lifecycle
        .apply(&claimant, shift.id, ShiftAction::Claim, 0)
        .await
        .unwrap();
    lifecycle
        .apply(&manager, shift.id, ShiftAction::Decline, 1)
        .await
        .unwrap();

    let logs = store.logs_for_shift(shift.id);
    let declined = logs.iter().find(|l| l.action == "DECLINED").unwrap();
    assert_eq!(
        declined.details["previousClaimant"],
        serde_json::json!(claimant.member_id)
    );
}

/// Store wrapper whose first `find` hands out a doctored snapshot, standing
/// in for a read that raced a concurrent write.
struct LaggedReadStore {
    inner: Arc<InMemoryShiftStore>,
    stale: std::sync::Mutex<Option<server_core::domains::shifts::Shift>>,
}

#[async_trait::async_trait]
impl server_core::kernel::BaseShiftStore for LaggedReadStore {
    async fn create_posted(
        &self,
        new: server_core::domains::shifts::NewShift,
        audit: server_core::domains::shifts::AuditEntry,
    ) -> Result<server_core::domains::shifts::Shift, server_core::kernel::StoreError> {
        self.inner.create_posted(new, audit).await
    }

    async fn find(
        &self,
        organisation_id: Uuid,
        shift_id: Uuid,
    ) -> Result<Option<server_core::domains::shifts::Shift>, server_core::kernel::StoreError> {
        if let Some(stale) = self.stale.lock().unwrap_or_else(|e| e.into_inner()).take() {
            return Ok(Some(stale));
        }
        self.inner.find(organisation_id, shift_id).await
    }

    async fn conditional_update(
        &self,
        organisation_id: Uuid,
        shift_id: Uuid,
        expected_version: i64,
        allowed: &[ShiftStatus],
        change: server_core::domains::shifts::ShiftChange,
        audit: server_core::domains::shifts::AuditEntry,
    ) -> Result<server_core::kernel::UpdateOutcome, server_core::kernel::StoreError> {
        self.inner
            .conditional_update(organisation_id, shift_id, expected_version, allowed, change, audit)
            .await
    }

    async fn list(
        &self,
        organisation_id: Uuid,
        filter: &ShiftListFilter,
        viewer: &ShiftViewer,
    ) -> Result<(Vec<server_core::domains::shifts::Shift>, i64), server_core::kernel::StoreError>
    {
        self.inner.list(organisation_id, filter, viewer).await
    }

    async fn history(
        &self,
        organisation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<server_core::domains::shifts::ShiftSwapLog>, server_core::kernel::StoreError>
    {
        self.inner.history(organisation_id, limit).await
    }
}

#[tokio::test]
async fn decline_over_a_lagged_read_reports_a_conflict() {

    let org = Uuid::new_v4();
    let inner = Arc::new(InMemoryShiftStore::new());
    let owner = actor(org, MemberRole::Staff, "Alice");
    let claimant = actor(org, MemberRole::Staff, "Bob");
    let manager = actor(org, MemberRole::Manager, "Mia");

    // Post and claim through the real store.
    let setup = ShiftLifecycle::new(inner.clone());
    let shift = setup.post_shift(&owner, post_input(&owner)).await.unwrap();
    setup
        .apply(&claimant, shift.id, ShiftAction::Claim, 0)
        .await
        .unwrap();

    // The row is at version 1 with Bob as claimant. Feed decline a version 0
    // snapshot from before the claim, with no claimant on it.
    let mut stale = inner.find(org, shift.id).await.unwrap().unwrap();
    stale.version = 0;
    stale.status = ShiftStatus::Posted.as_str().to_string();
    stale.claimed_by_id = None;

    let lagged = Arc::new(LaggedReadStore {
        inner: inner.clone(),
        stale: std::sync::Mutex::new(Some(stale)),
    });
    let lifecycle = ShiftLifecycle::new(lagged);

    // A decline keyed to the current version but reading the old snapshot
    // must not record "no previous claimant"; it reports a conflict instead.
    let err = lifecycle
        .apply(&manager, shift.id, ShiftAction::Decline, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, ShiftError::VersionConflict));

    let actions: Vec<String> = inner
        .logs_for_shift(shift.id)
        .into_iter()
        .map(|l| l.action)
        .collect();
    assert_eq!(actions, vec!["POSTED", "CLAIMED"]);

    // Retried against a fresh read, the decline lands and the audit row names
    // the claimant it displaced.
    let lifecycle = ShiftLifecycle::new(inner.clone());
    lifecycle
        .apply(&manager, shift.id, ShiftAction::Decline, 1)
        .await
        .unwrap();
    let logs = inner.logs_for_shift(shift.id);
    let declined = logs.iter().find(|l| l.action == "DECLINED").unwrap();
    assert_eq!(
        declined.details["previousClaimant"],
        serde_json::json!(claimant.member_id)
    );
}
