// Dispatcher fan-out tests over in-memory collaborators.
//
// The dispatcher only sees the directory, subscription store and push sender
// traits, so audience selection and dead-endpoint pruning can be checked
// without a database or a push service.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use server_core::domains::member::MemberRole;
use server_core::domains::shifts::Shift;
use server_core::kernel::{
    DirectoryMember, InMemoryDirectory, InMemorySubscriptionStore, NotificationDispatcher,
    RecordingPushSender, ShiftEvent,
};

struct Fixture {
    directory: Arc<InMemoryDirectory>,
    subscriptions: Arc<InMemorySubscriptionStore>,
    sender: Arc<RecordingPushSender>,
    dispatcher: NotificationDispatcher,
}

fn fixture() -> Fixture {
    let directory = Arc::new(InMemoryDirectory::new());
    let subscriptions = Arc::new(InMemorySubscriptionStore::new());
    let sender = Arc::new(RecordingPushSender::new());
    let dispatcher = NotificationDispatcher::new(
        directory.clone(),
        subscriptions.clone(),
        sender.clone(),
    );
    Fixture {
        directory,
        subscriptions,
        sender,
        dispatcher,
    }
}

fn member(org: Uuid, role: MemberRole, name: &str, org_roles: Vec<Uuid>) -> DirectoryMember {
    DirectoryMember {
        id: Uuid::new_v4(),
        organisation_id: org,
        role,
        name: name.to_string(),
        org_roles,
    }
}

fn posted_shift(org: Uuid, owner: Uuid, required_role_id: Option<Uuid>) -> Shift {
    Shift {
        id: Uuid::new_v4(),
        organisation_id: org,
        title: "Evening Shift".to_string(),
        date: NaiveDate::from_ymd_opt(2025, 9, 5).unwrap(),
        start_time: "18:00".to_string(),
        end_time: "23:00".to_string(),
        status: "POSTED".to_string(),
        version: 0,
        original_owner_id: owner,
        posted_by_id: owner,
        claimed_by_id: None,
        required_role_id,
        reason: None,
        created_at: Utc::now(),
        claimed_at: None,
        approved_at: None,
        declined_at: None,
    }
}

#[tokio::test]
async fn posted_shift_with_required_role_targets_only_role_holders() {
    let org = Uuid::new_v4();
    let role_id = Uuid::new_v4();
    let f = fixture();

    let owner = member(org, MemberRole::Staff, "Alice", vec![role_id]);
    let barista = member(org, MemberRole::Staff, "Bob", vec![role_id]);
    let cook = member(org, MemberRole::Staff, "Cara", vec![]);
    let owner_id = owner.id;
    let barista_id = barista.id;
    for m in [owner, barista, cook.clone()] {
        f.directory.add(m);
    }
    f.subscriptions.add(owner_id, "ep-alice");
    f.subscriptions.add(barista_id, "ep-bob");
    f.subscriptions.add(cook.id, "ep-cara");

    let shift = posted_shift(org, owner_id, Some(role_id));
    f.dispatcher
        .dispatch(
            &shift,
            ShiftEvent::Posted {
                owner_name: "Alice".to_string(),
            },
        )
        .await;

    // Only the role holder hears about it; the owner is excluded even though
    // they hold the role too.
    assert_eq!(f.sender.endpoints(), vec!["ep-bob".to_string()]);
    let (_, payload) = &f.sender.deliveries()[0];
    assert_eq!(payload.title, "🔔 Shift Available!");
    assert_eq!(payload.tag, format!("shift-{}", shift.id));
}

#[tokio::test]
async fn posted_shift_falls_back_to_all_staff_when_no_one_holds_the_role() {
    let org = Uuid::new_v4();
    let f = fixture();

    let owner = member(org, MemberRole::Staff, "Alice", vec![]);
    let staff = member(org, MemberRole::Staff, "Bob", vec![]);
    let manager = member(org, MemberRole::Manager, "Mia", vec![]);
    let owner_id = owner.id;
    let staff_id = staff.id;
    for m in [owner, staff, manager.clone()] {
        f.directory.add(m);
    }
    f.subscriptions.add(owner_id, "ep-alice");
    f.subscriptions.add(staff_id, "ep-bob");
    f.subscriptions.add(manager.id, "ep-mia");

    // The required role exists on the shift but nobody holds it.
    let shift = posted_shift(org, owner_id, Some(Uuid::new_v4()));
    f.dispatcher
        .dispatch(
            &shift,
            ShiftEvent::Posted {
                owner_name: "Alice".to_string(),
            },
        )
        .await;

    // All staff except the owner; managers are not in the claim pool.
    assert_eq!(f.sender.endpoints(), vec!["ep-bob".to_string()]);
}

#[tokio::test]
async fn claimed_shift_notifies_managers_only() {
    let org = Uuid::new_v4();
    let f = fixture();

    let owner = member(org, MemberRole::Staff, "Alice", vec![]);
    let claimant = member(org, MemberRole::Staff, "Bob", vec![]);
    let manager = member(org, MemberRole::Manager, "Mia", vec![]);
    let owner_id = owner.id;
    let manager_id = manager.id;
    for m in [owner, claimant.clone(), manager] {
        f.directory.add(m);
    }
    f.subscriptions.add(owner_id, "ep-alice");
    f.subscriptions.add(claimant.id, "ep-bob");
    f.subscriptions.add(manager_id, "ep-mia");

    let mut shift = posted_shift(org, owner_id, None);
    shift.status = "CLAIMED".to_string();
    shift.version = 1;
    shift.claimed_by_id = Some(claimant.id);

    f.dispatcher
        .dispatch(
            &shift,
            ShiftEvent::Claimed {
                claimant_name: "Bob".to_string(),
                owner_name: "Alice".to_string(),
            },
        )
        .await;

    assert_eq!(f.sender.endpoints(), vec!["ep-mia".to_string()]);
    let (_, payload) = &f.sender.deliveries()[0];
    assert_eq!(payload.title, "📋 Shift Claimed!");
    assert!(payload.body.contains("Bob"));
    assert!(payload.body.contains("Alice"));
}

#[tokio::test]
async fn approval_notifies_claimant_and_owner() {
    let org = Uuid::new_v4();
    let f = fixture();

    let owner = member(org, MemberRole::Staff, "Alice", vec![]);
    let claimant = member(org, MemberRole::Staff, "Bob", vec![]);
    let bystander = member(org, MemberRole::Staff, "Cara", vec![]);
    let owner_id = owner.id;
    let claimant_id = claimant.id;
    for m in [owner, claimant, bystander.clone()] {
        f.directory.add(m);
    }
    f.subscriptions.add(owner_id, "ep-alice");
    f.subscriptions.add(claimant_id, "ep-bob");
    f.subscriptions.add(bystander.id, "ep-cara");

    let mut shift = posted_shift(org, owner_id, None);
    shift.status = "APPROVED".to_string();
    shift.version = 2;
    shift.claimed_by_id = Some(claimant_id);

    f.dispatcher.dispatch(&shift, ShiftEvent::Approved).await;

    let deliveries = f.sender.deliveries();
    assert_eq!(deliveries.len(), 2);
    assert_eq!(deliveries[0].0, "ep-bob");
    assert_eq!(deliveries[0].1.title, "✅ Shift Approved!");
    assert_eq!(deliveries[1].0, "ep-alice");
    assert_eq!(deliveries[1].1.title, "✅ Shift Swap Confirmed");
    assert!(deliveries[1].1.body.contains("Bob"));
}

#[tokio::test]
async fn gone_endpoints_are_pruned() {
    let org = Uuid::new_v4();
    let f = fixture();

    let owner = member(org, MemberRole::Staff, "Alice", vec![]);
    let staff = member(org, MemberRole::Staff, "Bob", vec![]);
    let owner_id = owner.id;
    let staff_id = staff.id;
    for m in [owner, staff] {
        f.directory.add(m);
    }
    let dead = f.subscriptions.add(staff_id, "ep-bob-old-device");
    let live = f.subscriptions.add(staff_id, "ep-bob-phone");
    f.sender.mark_gone("ep-bob-old-device");

    let shift = posted_shift(org, owner_id, None);
    f.dispatcher
        .dispatch(
            &shift,
            ShiftEvent::Posted {
                owner_name: "Alice".to_string(),
            },
        )
        .await;

    // The live endpoint was delivered to; the dead one got removed.
    assert_eq!(f.sender.endpoints(), vec!["ep-bob-phone".to_string()]);
    assert!(!f.subscriptions.contains(dead));
    assert!(f.subscriptions.contains(live));
}
