// In-memory implementations for testing
//
// InMemoryShiftStore holds shifts and audit rows behind one mutex and
// performs the same compare-and-swap as the Postgres store, so the lifecycle
// engine's contract (exactly one winner per shift id + expected version) can
// be exercised without a database.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

use crate::domains::member::MemberRole;
use crate::domains::push::PushSubscription;
use crate::domains::shifts::{
    visible_to, AuditEntry, NewShift, Shift, ShiftChange, ShiftListFilter, ShiftStatus,
    ShiftSwapLog, ShiftViewer,
};
use crate::kernel::traits::{
    BaseMemberDirectory, BasePushSender, BaseShiftStore, BaseSubscriptionStore,
    NotificationPayload, PushError, StoreError, UpdateOutcome,
};

#[derive(Default)]
struct Inner {
    shifts: HashMap<Uuid, Shift>,
    logs: Vec<ShiftSwapLog>,
}

#[derive(Default)]
pub struct InMemoryShiftStore {
    // One lock over the whole map. Contention is per-store rather than
    // per-row, which is fine for tests and single-process use; the CAS
    // semantics observed by callers are identical to the SQL store.
    inner: Mutex<Inner>,
}

impl InMemoryShiftStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All audit rows for one shift, oldest first. Test helper.
    pub fn logs_for_shift(&self, shift_id: Uuid) -> Vec<ShiftSwapLog> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .logs
            .iter()
            .filter(|l| l.shift_id == shift_id)
            .cloned()
            .collect()
    }
}

fn append_log(inner: &mut Inner, shift_id: Uuid, audit: AuditEntry) {
    inner.logs.push(ShiftSwapLog {
        id: Uuid::new_v4(),
        shift_id,
        actor_id: audit.actor_id,
        action: audit.action.as_str().to_string(),
        details: audit.details,
        created_at: Utc::now(),
    });
}

#[async_trait]
impl BaseShiftStore for InMemoryShiftStore {
    async fn create_posted(&self, new: NewShift, audit: AuditEntry) -> Result<Shift, StoreError> {
        let shift = Shift {
            id: Uuid::new_v4(),
            organisation_id: new.organisation_id,
            title: new.title,
            date: new.date,
            start_time: new.start_time,
            end_time: new.end_time,
            status: ShiftStatus::Posted.as_str().to_string(),
            version: 0,
            original_owner_id: new.original_owner_id,
            posted_by_id: new.posted_by_id,
            claimed_by_id: None,
            required_role_id: new.required_role_id,
            reason: new.reason,
            created_at: Utc::now(),
            claimed_at: None,
            approved_at: None,
            declined_at: None,
        };

        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.shifts.insert(shift.id, shift.clone());
        append_log(&mut inner, shift.id, audit);
        Ok(shift)
    }

    async fn find(
        &self,
        organisation_id: Uuid,
        shift_id: Uuid,
    ) -> Result<Option<Shift>, StoreError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner
            .shifts
            .get(&shift_id)
            .filter(|s| s.organisation_id == organisation_id)
            .cloned())
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
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        let matches = inner
            .shifts
            .get(&shift_id)
            .map(|s| {
                s.organisation_id == organisation_id
                    && s.version == expected_version
                    && allowed.iter().any(|a| s.status == a.as_str())
            })
            .unwrap_or(false);
        if !matches {
            return Ok(UpdateOutcome::NoMatch);
        }

        // Matched under the lock: apply the change and the audit row together.
        let shift = inner
            .shifts
            .get_mut(&shift_id)
            .expect("row checked above");
        shift.version = expected_version + 1;
        shift.status = change.target_status().as_str().to_string();
        match change {
            ShiftChange::Claim { claimed_by, at } => {
                shift.claimed_by_id = Some(claimed_by);
                shift.claimed_at = Some(at);
            }
            ShiftChange::Approve { at } => {
                shift.approved_at = Some(at);
            }
            ShiftChange::Decline { at } => {
                shift.claimed_by_id = None;
                shift.claimed_at = None;
                shift.declined_at = Some(at);
            }
            ShiftChange::Cancel => {}
        }

        let updated = shift.clone();
        append_log(&mut inner, shift_id, audit);
        Ok(UpdateOutcome::Updated(updated))
    }

    async fn list(
        &self,
        organisation_id: Uuid,
        filter: &ShiftListFilter,
        viewer: &ShiftViewer,
    ) -> Result<(Vec<Shift>, i64), StoreError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let status = filter.effective_status(viewer);

        let mut rows: Vec<Shift> = inner
            .shifts
            .values()
            .filter(|s| s.organisation_id == organisation_id)
            .filter(|s| status.map_or(true, |st| s.status == st.as_str()))
            .filter(|s| visible_to(s, viewer))
            .cloned()
            .collect();
        rows.sort_by(|a, b| (a.date, a.created_at).cmp(&(b.date, b.created_at)));

        let total = rows.len() as i64;
        let rows = rows
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .collect();
        Ok((rows, total))
    }

    async fn history(
        &self,
        organisation_id: Uuid,
        limit: i64,
    ) -> Result<Vec<ShiftSwapLog>, StoreError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let org_shift_ids: Vec<Uuid> = inner
            .shifts
            .values()
            .filter(|s| s.organisation_id == organisation_id)
            .map(|s| s.id)
            .collect();

        Ok(inner
            .logs
            .iter()
            .rev()
            .filter(|l| org_shift_ids.contains(&l.shift_id))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

/// One member as the in-memory directory sees them
#[derive(Debug, Clone)]
pub struct DirectoryMember {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub role: MemberRole,
    pub name: String,
    pub org_roles: Vec<Uuid>,
}

/// In-memory member directory for notification tests
#[derive(Default)]
pub struct InMemoryDirectory {
    members: Mutex<Vec<DirectoryMember>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, member: DirectoryMember) {
        self.members
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(member);
    }
}

#[async_trait]
impl BaseMemberDirectory for InMemoryDirectory {
    async fn ids_by_role(
        &self,
        organisation_id: Uuid,
        role: MemberRole,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Uuid>, StoreError> {
        let members = self.members.lock().unwrap_or_else(|e| e.into_inner());
        Ok(members
            .iter()
            .filter(|m| m.organisation_id == organisation_id && m.role == role)
            .filter(|m| Some(m.id) != exclude)
            .map(|m| m.id)
            .collect())
    }

    async fn ids_holding_org_role(
        &self,
        organisation_id: Uuid,
        role_id: Uuid,
        exclude: Option<Uuid>,
    ) -> Result<Vec<Uuid>, StoreError> {
        let members = self.members.lock().unwrap_or_else(|e| e.into_inner());
        Ok(members
            .iter()
            .filter(|m| m.organisation_id == organisation_id && m.org_roles.contains(&role_id))
            .filter(|m| Some(m.id) != exclude)
            .map(|m| m.id)
            .collect())
    }

    async fn display_name(
        &self,
        organisation_id: Uuid,
        member_id: Uuid,
    ) -> Result<Option<String>, StoreError> {
        let members = self.members.lock().unwrap_or_else(|e| e.into_inner());
        Ok(members
            .iter()
            .find(|m| m.organisation_id == organisation_id && m.id == member_id)
            .map(|m| m.name.clone()))
    }
}

/// In-memory subscription store for notification tests
#[derive(Default)]
pub struct InMemorySubscriptionStore {
    subs: Mutex<Vec<PushSubscription>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, member_id: Uuid, endpoint: &str) -> Uuid {
        let sub = PushSubscription {
            id: Uuid::new_v4(),
            member_id,
            endpoint: endpoint.to_string(),
            p256dh: "p256dh".to_string(),
            auth: "auth".to_string(),
            created_at: Utc::now(),
        };
        let id = sub.id;
        self.subs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(sub);
        id
    }

    pub fn contains(&self, subscription_id: Uuid) -> bool {
        self.subs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|s| s.id == subscription_id)
    }
}

#[async_trait]
impl BaseSubscriptionStore for InMemorySubscriptionStore {
    async fn subscriptions_for(
        &self,
        member_id: Uuid,
    ) -> Result<Vec<PushSubscription>, StoreError> {
        let subs = self.subs.lock().unwrap_or_else(|e| e.into_inner());
        Ok(subs
            .iter()
            .filter(|s| s.member_id == member_id)
            .cloned()
            .collect())
    }

    async fn remove(&self, subscription_id: Uuid) -> Result<(), StoreError> {
        self.subs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|s| s.id != subscription_id);
        Ok(())
    }
}

/// Push sender that records deliveries instead of making HTTP calls.
/// Endpoints marked gone answer every send with `PushError::Gone`.
#[derive(Default)]
pub struct RecordingPushSender {
    sent: Mutex<Vec<(String, NotificationPayload)>>,
    gone: Mutex<HashSet<String>>,
}

impl RecordingPushSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_gone(&self, endpoint: &str) {
        self.gone
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(endpoint.to_string());
    }

    /// (endpoint, payload) pairs in delivery order
    pub fn deliveries(&self) -> Vec<(String, NotificationPayload)> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.deliveries().into_iter().map(|(e, _)| e).collect()
    }
}

#[async_trait]
impl BasePushSender for RecordingPushSender {
    async fn send(
        &self,
        subscription: &PushSubscription,
        payload: &NotificationPayload,
    ) -> Result<(), PushError> {
        let gone = self.gone.lock().unwrap_or_else(|e| e.into_inner());
        if gone.contains(&subscription.endpoint) {
            return Err(PushError::Gone);
        }
        drop(gone);
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((subscription.endpoint.clone(), payload.clone()));
        Ok(())
    }
}
