//! Notification fan-out for shift lifecycle events.
//!
//! Strictly post-commit and best-effort: callers spawn `dispatch` after the
//! transition transaction has committed. Delivery failures are logged and
//! discarded; they never roll back or re-report a committed transition.

use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::domains::member::MemberRole;
use crate::domains::shifts::Shift;
use crate::kernel::traits::{
    BaseMemberDirectory, BasePushSender, BaseSubscriptionStore, NotificationPayload, PushError,
};

/// A committed lifecycle event worth telling people about. Cancellations are
/// deliberately silent, matching the product behaviour.
#[derive(Debug, Clone)]
pub enum ShiftEvent {
    Posted { owner_name: String },
    Claimed { claimant_name: String, owner_name: String },
    Approved,
    Declined,
}

pub struct NotificationDispatcher {
    directory: Arc<dyn BaseMemberDirectory>,
    subscriptions: Arc<dyn BaseSubscriptionStore>,
    sender: Arc<dyn BasePushSender>,
}

impl NotificationDispatcher {
    pub fn new(
        directory: Arc<dyn BaseMemberDirectory>,
        subscriptions: Arc<dyn BaseSubscriptionStore>,
        sender: Arc<dyn BasePushSender>,
    ) -> Self {
        Self {
            directory,
            subscriptions,
            sender,
        }
    }

    /// Fan out one committed shift event. Never returns an error; everything
    /// in here is best-effort.
    pub async fn dispatch(&self, shift: &Shift, event: ShiftEvent) {
        if let Err(e) = self.dispatch_inner(shift, event).await {
            warn!(shift_id = %shift.id, error = %e, "Notification dispatch failed");
        }
    }

    async fn dispatch_inner(&self, shift: &Shift, event: ShiftEvent) -> anyhow::Result<()> {
        let date = shift.formatted_date();
        let time = shift.formatted_time();

        match event {
            ShiftEvent::Posted { owner_name } => {
                let payload = NotificationPayload {
                    title: "🔔 Shift Available!".to_string(),
                    body: format!(
                        "{}'s {} on {} ({}) is up for grabs!",
                        owner_name, shift.title, date, time
                    ),
                    tag: format!("shift-{}", shift.id),
                };
                self.send_to_staff_pool(shift, &payload).await?;
            }
            ShiftEvent::Claimed {
                claimant_name,
                owner_name,
            } => {
                let payload = NotificationPayload {
                    title: "📋 Shift Claimed!".to_string(),
                    body: format!(
                        "{} wants to cover {}'s {} on {} ({}). Approve?",
                        claimant_name, owner_name, shift.title, date, time
                    ),
                    tag: format!("claim-{}", shift.id),
                };
                let manager_ids = self
                    .directory
                    .ids_by_role(shift.organisation_id, MemberRole::Manager, None)
                    .await?;
                self.send_to_members(&manager_ids, &payload).await;
            }
            ShiftEvent::Approved => {
                let claimant_name = match shift.claimed_by_id {
                    Some(id) => {
                        self.directory
                            .display_name(shift.organisation_id, id)
                            .await?
                    }
                    None => None,
                };

                if let (Some(id), Some(_)) = (shift.claimed_by_id, &claimant_name) {
                    self.send_to_members(
                        &[id],
                        &NotificationPayload {
                            title: "✅ Shift Approved!".to_string(),
                            body: format!(
                                "Your claim for {} on {} ({}) has been approved!",
                                shift.title, date, time
                            ),
                            tag: format!("approved-{}", shift.id),
                        },
                    )
                    .await;
                }

                let owner_name = self
                    .directory
                    .display_name(shift.organisation_id, shift.original_owner_id)
                    .await?;
                if owner_name.is_some() {
                    let claimant_name =
                        claimant_name.unwrap_or_else(|| "A colleague".to_string());
                    self.send_to_members(
                        &[shift.original_owner_id],
                        &NotificationPayload {
                            title: "✅ Shift Swap Confirmed".to_string(),
                            body: format!(
                                "{} will cover your {} on {} ({}).",
                                claimant_name, shift.title, date, time
                            ),
                            tag: format!("approved-{}", shift.id),
                        },
                    )
                    .await;
                }
            }
            ShiftEvent::Declined => {
                let payload = NotificationPayload {
                    title: "🔔 Shift Available Again!".to_string(),
                    body: format!(
                        "{} on {} ({}) is available for claiming again.",
                        shift.title, date, time
                    ),
                    tag: format!("shift-{}", shift.id),
                };
                self.send_to_staff_pool(shift, &payload).await?;
            }
        }
        Ok(())
    }

    /// Audience for "shift available" events: staff excluding the owner. If
    /// the shift carries a required-role tag and anyone holds that role, the
    /// audience narrows to those members; otherwise all staff are notified.
    async fn send_to_staff_pool(
        &self,
        shift: &Shift,
        payload: &NotificationPayload,
    ) -> anyhow::Result<()> {
        let exclude = Some(shift.original_owner_id);

        let mut targets = Vec::new();
        if let Some(role_id) = shift.required_role_id {
            targets = self
                .directory
                .ids_holding_org_role(shift.organisation_id, role_id, exclude)
                .await?;
        }
        if targets.is_empty() {
            targets = self
                .directory
                .ids_by_role(shift.organisation_id, MemberRole::Staff, exclude)
                .await?;
        }

        self.send_to_members(&targets, payload).await;
        Ok(())
    }

    /// Deliver to every subscription of every target member. Endpoints that
    /// report themselves gone are pruned; other failures are logged.
    async fn send_to_members(&self, member_ids: &[Uuid], payload: &NotificationPayload) {
        for member_id in member_ids {
            let subs = match self.subscriptions.subscriptions_for(*member_id).await {
                Ok(subs) => subs,
                Err(e) => {
                    warn!(member_id = %member_id, error = %e, "Failed to load push subscriptions");
                    continue;
                }
            };

            for sub in subs {
                match self.sender.send(&sub, payload).await {
                    Ok(()) => {}
                    Err(PushError::Gone) => {
                        // Endpoint permanently gone; prune it. Best-effort.
                        if let Err(e) = self.subscriptions.remove(sub.id).await {
                            warn!(subscription = %sub.id, error = %e, "Failed to prune dead subscription");
                        }
                    }
                    Err(e) => {
                        warn!(member_id = %member_id, error = %e, "Push delivery failed");
                    }
                }
            }
        }
    }
}
