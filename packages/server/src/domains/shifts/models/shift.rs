use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domains::member::MemberRole;

/// Shift - the central mutable entity. Title, date and times are immutable
/// once posted; status/claimed_by/timestamps only change through the store's
/// conditional update, which bumps `version` by exactly 1 per accepted write.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Shift {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub title: String,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub status: String, // 'POSTED' | 'CLAIMED' | 'APPROVED' | 'DECLINED' | 'CANCELLED'
    pub version: i64,
    pub original_owner_id: Uuid,
    pub posted_by_id: Uuid,
    pub claimed_by_id: Option<Uuid>,
    pub required_role_id: Option<Uuid>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub declined_at: Option<DateTime<Utc>>,
}

impl Shift {
    /// Typed view of the status column. `None` only if the row predates the
    /// status CHECK constraint, which should not happen.
    pub fn status(&self) -> Option<ShiftStatus> {
        ShiftStatus::parse(&self.status)
    }

    /// Human-readable date, e.g. "Friday, 5 September 2025"
    pub fn formatted_date(&self) -> String {
        self.date.format("%A, %-d %B %Y").to_string()
    }

    /// "HH:MM - HH:MM" time range
    pub fn formatted_time(&self) -> String {
        format!("{} - {}", self.start_time, self.end_time)
    }
}

/// Status enum for type-safe transitions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShiftStatus {
    Posted,
    Claimed,
    Approved,
    Declined,
    Cancelled,
}

impl ShiftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Posted => "POSTED",
            Self::Claimed => "CLAIMED",
            Self::Approved => "APPROVED",
            Self::Declined => "DECLINED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "POSTED" => Some(Self::Posted),
            "CLAIMED" => Some(Self::Claimed),
            "APPROVED" => Some(Self::Approved),
            "DECLINED" => Some(Self::Declined),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Input for creating a shift (always lands as POSTED, version 0)
#[derive(Debug, Clone)]
pub struct NewShift {
    pub organisation_id: Uuid,
    pub title: String,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub original_owner_id: Uuid,
    pub posted_by_id: Uuid,
    pub required_role_id: Option<Uuid>,
    pub reason: Option<String>,
}

/// A guarded mutation applied through the store's conditional update
#[derive(Debug, Clone)]
pub enum ShiftChange {
    Claim {
        claimed_by: Uuid,
        at: DateTime<Utc>,
    },
    Approve {
        at: DateTime<Utc>,
    },
    /// Returns the shift to the pool: clears claimant, stamps declined_at
    Decline {
        at: DateTime<Utc>,
    },
    Cancel,
}

impl ShiftChange {
    /// Status the shift holds after this change
    pub fn target_status(&self) -> ShiftStatus {
        match self {
            Self::Claim { .. } => ShiftStatus::Claimed,
            Self::Approve { .. } => ShiftStatus::Approved,
            Self::Decline { .. } => ShiftStatus::Posted,
            Self::Cancel => ShiftStatus::Cancelled,
        }
    }
}

/// Who is asking for a listing - decides row visibility
#[derive(Debug, Clone, Copy)]
pub struct ShiftViewer {
    pub member_id: Uuid,
    pub role: MemberRole,
}

/// Listing filter. Staff visibility overrides the status filter: staff always
/// see POSTED shifts plus their own, whatever status they asked for.
#[derive(Debug, Clone, Copy)]
pub struct ShiftListFilter {
    pub status: Option<ShiftStatus>,
    pub limit: i64,
    pub offset: i64,
}

impl ShiftListFilter {
    /// The status filter actually applied for a viewer. Both store
    /// implementations go through this so visibility rules stay identical.
    pub fn effective_status(&self, viewer: &ShiftViewer) -> Option<ShiftStatus> {
        match viewer.role {
            MemberRole::Manager => self.status,
            MemberRole::Staff => None,
        }
    }
}

/// Whether a viewer may see a shift row at all
pub fn visible_to(shift: &Shift, viewer: &ShiftViewer) -> bool {
    match viewer.role {
        MemberRole::Manager => true,
        MemberRole::Staff => {
            shift.status == ShiftStatus::Posted.as_str()
                || shift.original_owner_id == viewer.member_id
                || shift.claimed_by_id == Some(viewer.member_id)
        }
    }
}

// =============================================================================
// Export projections (read-only, committed state only)
// =============================================================================

/// Flattened shift row for CSV/JSON export, joined with member names
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ShiftExportRow {
    pub id: Uuid,
    pub title: String,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub status: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub approved_at: Option<DateTime<Utc>>,
    pub owner_name: String,
    pub owner_title: Option<String>,
    pub owner_email: String,
    pub claimant_name: Option<String>,
    pub claimant_title: Option<String>,
    pub claimant_email: Option<String>,
    pub posted_by_name: String,
}

/// Filter for exports
#[derive(Debug, Clone, Default)]
pub struct ExportFilter {
    pub status: Option<ShiftStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl Shift {
    /// Export rows for an organisation, ordered by date
    pub async fn export_rows(
        organisation_id: Uuid,
        filter: &ExportFilter,
        pool: &PgPool,
    ) -> Result<Vec<ShiftExportRow>> {
        let rows = sqlx::query_as::<_, ShiftExportRow>(
            r#"
            SELECT
                s.id, s.title, s.date, s.start_time, s.end_time, s.status,
                s.reason, s.created_at, s.claimed_at, s.approved_at,
                owner.name AS owner_name,
                owner.staff_title AS owner_title,
                owner.email AS owner_email,
                claimant.name AS claimant_name,
                claimant.staff_title AS claimant_title,
                claimant.email AS claimant_email,
                poster.name AS posted_by_name
            FROM shifts s
            JOIN members owner ON owner.id = s.original_owner_id
            JOIN members poster ON poster.id = s.posted_by_id
            LEFT JOIN members claimant ON claimant.id = s.claimed_by_id
            WHERE s.organisation_id = $1
              AND ($2::text IS NULL OR s.status = $2)
              AND ($3::date IS NULL OR s.date >= $3)
              AND ($4::date IS NULL OR s.date <= $4)
            ORDER BY s.date ASC
            "#,
        )
        .bind(organisation_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.from)
        .bind(filter.to)
        .fetch_all(pool)
        .await?;
        Ok(rows)
    }
}

/// Audit details snapshot written with the POSTED log row
pub fn posted_details(new: &NewShift, owner_name: &str) -> JsonValue {
    serde_json::json!({
        "title": new.title,
        "date": new.date,
        "startTime": new.start_time,
        "endTime": new.end_time,
        "reason": new.reason,
        "ownerName": owner_name,
    })
}
