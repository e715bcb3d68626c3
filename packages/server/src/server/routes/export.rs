use axum::extract::{Extension, Query};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

use crate::common::response::{bad_request, forbidden, internal_error, unauthorized};
use crate::domains::shifts::{ExportFilter, Shift, ShiftExportRow, ShiftStatus, ShiftSwapLog};
use crate::server::app::AppState;
use crate::server::middleware::AuthUser;

#[derive(Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
    pub status: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// GET /api/export - download the organisation's shifts as CSV or JSON.
/// Manager only. Reads committed state, so an export never observes a
/// half-applied transition.
pub async fn export_shifts(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Query(query): Query<ExportQuery>,
) -> Response {
    let Some(Extension(user)) = auth else {
        return unauthorized();
    };
    if !user.is_manager() {
        return forbidden("Only managers can export shift data");
    }

    let status = match query.status.as_deref() {
        None | Some("") | Some("ALL") => None,
        Some(s) => match ShiftStatus::parse(s) {
            Some(status) => Some(status),
            None => return bad_request("Invalid status filter"),
        },
    };
    let filter = ExportFilter {
        status,
        from: query.from,
        to: query.to,
    };

    let rows = match Shift::export_rows(user.organisation_id, &filter, &state.db_pool).await {
        Ok(rows) => rows,
        Err(e) => return internal_error(&e),
    };

    let stamp = Utc::now().format("%Y-%m-%d");
    match query.format.as_deref().unwrap_or("csv") {
        "csv" => {
            let body = render_csv(&rows);
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"shift-swaps-{stamp}.csv\""),
                    ),
                ],
                body,
            )
                .into_response()
        }
        "json" => {
            let shift_ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
            let logs = match ShiftSwapLog::for_shifts_with_actor(&shift_ids, &state.db_pool).await {
                Ok(logs) => logs,
                Err(e) => return internal_error(&e),
            };
            let mut by_shift: HashMap<Uuid, Vec<serde_json::Value>> = HashMap::new();
            for (log, actor_name) in logs {
                by_shift.entry(log.shift_id).or_default().push(json!({
                    "action": log.action,
                    "actorName": actor_name,
                    "details": log.details,
                    "createdAt": log.created_at,
                }));
            }

            let shifts: Vec<serde_json::Value> = rows
                .iter()
                .map(|r| {
                    json!({
                        "id": r.id,
                        "title": r.title,
                        "date": r.date,
                        "startTime": r.start_time,
                        "endTime": r.end_time,
                        "status": r.status,
                        "reason": r.reason,
                        "originalOwner": {
                            "name": r.owner_name,
                            "title": r.owner_title,
                            "email": r.owner_email,
                        },
                        "claimedBy": r.claimant_name.as_ref().map(|name| json!({
                            "name": name,
                            "title": r.claimant_title,
                            "email": r.claimant_email,
                        })),
                        "postedBy": r.posted_by_name,
                        "createdAt": r.created_at,
                        "claimedAt": r.claimed_at,
                        "approvedAt": r.approved_at,
                        "history": by_shift.remove(&r.id).unwrap_or_default(),
                    })
                })
                .collect();

            let body = json!({
                "exportedAt": Utc::now(),
                "shiftCount": shifts.len(),
                "shifts": shifts,
            });
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/json".to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"shift-swaps-{stamp}.json\""),
                    ),
                ],
                axum::Json(body),
            )
                .into_response()
        }
        _ => bad_request("format must be csv or json"),
    }
}

const CSV_HEADER: &str = "Title,Date,Start Time,End Time,Status,Original Owner,Owner Title,Owner Email,Claimed By,Claimant Title,Claimant Email,Posted By,Reason,Created At,Claimed At,Approved At";

fn render_csv(rows: &[ShiftExportRow]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for r in rows {
        let fields = [
            csv_escape(&r.title),
            r.date.to_string(),
            csv_escape(&r.start_time),
            csv_escape(&r.end_time),
            r.status.clone(),
            csv_escape(&r.owner_name),
            csv_escape(r.owner_title.as_deref().unwrap_or("")),
            csv_escape(&r.owner_email),
            csv_escape(r.claimant_name.as_deref().unwrap_or("")),
            csv_escape(r.claimant_title.as_deref().unwrap_or("")),
            csv_escape(r.claimant_email.as_deref().unwrap_or("")),
            csv_escape(&r.posted_by_name),
            csv_escape(r.reason.as_deref().unwrap_or("")),
            r.created_at.to_rfc3339(),
            r.claimed_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            r.approved_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
        ];
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}

/// Quote a field if it contains a comma, quote or newline; embedded quotes
/// are doubled.
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
