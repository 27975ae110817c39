//! Compliance documents and their expiry status.
//!
//! `status` is derived from `expiresAt`, so it is recomputed whenever a
//! record is read and status filters run after that refresh.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use serde_json::json;
use vendorhub_api::{ApiError, ApiJson, ApiQuery, ApiResponse};
use vendorhub_auth::{Session, SessionAuth};
use vendorhub_core::models::{ComplianceRecord, ComplianceStatus, DocumentType};
use vendorhub_core::time::{parse_date, today};
use vendorhub_core::validation::{Required, clean, take};
use vendorhub_core::RecordMeta;
use vendorhub_storage::{Query, Repository};

use super::ListParams;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceListParams {
    #[serde(flatten)]
    pub list: ListParams,
    pub document_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceRequest {
    pub document_type: Option<String>,
    pub title: Option<String>,
    pub document_number: Option<String>,
    pub entity_id: Option<String>,
    pub issued_at: Option<String>,
    pub expires_at: Option<String>,
    pub notes: Option<String>,
}

/// Record counts per derived status.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceSummary {
    pub total: usize,
    pub valid: usize,
    pub expiring_soon: usize,
    pub expired: usize,
}

impl ComplianceSummary {
    fn of(records: &[ComplianceRecord]) -> Self {
        records.iter().fold(Self::default(), |mut s, r| {
            s.total += 1;
            match r.status {
                ComplianceStatus::Valid => s.valid += 1,
                ComplianceStatus::ExpiringSoon => s.expiring_soon += 1,
                ComplianceStatus::Expired => s.expired += 1,
            }
            s
        })
    }
}

fn records(state: &AppState, session: &Session) -> Result<Repository<ComplianceRecord>, ApiError> {
    state.tenant(session)
}

/// Load and refresh. Stored status is rewritten only when it changed.
async fn load(repo: &Repository<ComplianceRecord>, id: &str) -> Result<ComplianceRecord, ApiError> {
    let mut record = repo
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Compliance record not found"))?;
    let stored = record.status;
    if record.refresh_status(today()) != stored {
        repo.update(&mut record).await?;
    }
    Ok(record)
}

/// GET /api/compliance
///
/// Filters: `status` (derived), `documentType`, `search`, and `from`/`to`
/// on `issuedAt`. Sorted by soonest expiry rather than newest first; the
/// response also carries a status summary of every record matching the
/// non-status filters.
pub async fn list_records(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    ApiQuery(params): ApiQuery<ComplianceListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = records(&state, &session)?;
    let status = params.list.status::<ComplianceStatus>()?;
    let document_type: Option<DocumentType> = match clean(params.document_type.clone()) {
        Some(v) if v != "all" => Some(v.parse()?),
        _ => None,
    };

    let (issued_from, issued_to) = params.list.date_range()?;

    let query = Query::new()
        .eq_opt("documentType", document_type.map(|t| t.as_str()))
        .between("issuedAt", issued_from, issued_to)
        .search(params.list.search(), ["title", "documentNumber", "notes"]);
    let mut all = repo.find_all(query).await?;
    let today = today();
    for record in &mut all {
        record.refresh_status(today);
    }
    // Records without an expiry go last.
    all.sort_by_key(|r| (r.expires_at.is_none(), r.expires_at));

    let summary = ComplianceSummary::of(&all);
    let matching: Vec<_> = all
        .into_iter()
        .filter(|r| status.is_none_or(|s| r.status == s))
        .collect();
    let (items, pagination) = state.page(&params.list.page).slice(matching);

    Ok(ApiResponse::ok(json!({
        "records": items,
        "summary": summary,
        "pagination": pagination,
    })))
}

/// POST /api/compliance
pub async fn create_record(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    ApiJson(body): ApiJson<ComplianceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = records(&state, &session)?;
    session.require_manager()?;
    Required::new()
        .text("documentType", &body.document_type)
        .text("title", &body.title)
        .text("issuedAt", &body.issued_at)
        .finish()?;

    let mut record = ComplianceRecord {
        meta: RecordMeta::for_vendor(session.vendor_id()?),
        document_type: take("documentType", body.document_type)?.parse()?,
        title: take("title", clean(body.title))?,
        document_number: clean(body.document_number),
        entity_id: clean(body.entity_id),
        issued_at: parse_date(&take("issuedAt", body.issued_at)?)?,
        expires_at: clean(body.expires_at).map(|d| parse_date(&d)).transpose()?,
        notes: clean(body.notes),
        status: ComplianceStatus::Valid,
    };
    record.validate()?;
    record.refresh_status(today());

    let record = repo.insert(&record).await?;
    tracing::info!(
        record_id = %record.meta.id,
        document_type = %record.document_type,
        status = %record.status,
        "compliance record created"
    );
    Ok(ApiResponse::created(json!({ "record": record })))
}

/// GET /api/compliance/{id}
pub async fn read_record(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = records(&state, &session)?;
    let record = load(&repo, &id).await?;
    Ok(ApiResponse::ok(json!({ "record": record })))
}

/// PUT /api/compliance/{id}
pub async fn update_record(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<ComplianceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = records(&state, &session)?;
    session.require_manager()?;
    let mut record = load(&repo, &id).await?;

    if let Some(v) = clean(body.document_type) {
        record.document_type = v.parse()?;
    }
    if let Some(v) = clean(body.title) {
        record.title = v;
    }
    if body.document_number.is_some() {
        record.document_number = clean(body.document_number);
    }
    if body.entity_id.is_some() {
        record.entity_id = clean(body.entity_id);
    }
    if let Some(v) = clean(body.issued_at) {
        record.issued_at = parse_date(&v)?;
    }
    if body.expires_at.is_some() {
        record.expires_at = clean(body.expires_at).map(|d| parse_date(&d)).transpose()?;
    }
    if body.notes.is_some() {
        record.notes = clean(body.notes);
    }
    record.validate()?;
    record.refresh_status(today());

    repo.update(&mut record).await?;
    Ok(ApiResponse::ok(json!({ "record": record })))
}

/// DELETE /api/compliance/{id}
pub async fn delete_record(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = records(&state, &session)?;
    session.require_manager()?;
    if !repo.delete(&id).await? {
        return Err(ApiError::not_found("Compliance record not found"));
    }
    tracing::info!(record_id = %id, "compliance record deleted");
    Ok(ApiResponse::ok(json!({ "message": "Compliance record deleted" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn record(expires_at: Option<time::Date>) -> ComplianceRecord {
        let mut r = ComplianceRecord {
            meta: RecordMeta::for_vendor("v1"),
            document_type: DocumentType::Insurance,
            title: "Fleet insurance".into(),
            document_number: None,
            entity_id: None,
            issued_at: date!(2026 - 01 - 01),
            expires_at,
            notes: None,
            status: ComplianceStatus::Valid,
        };
        r.refresh_status(date!(2026 - 06 - 01));
        r
    }

    #[test]
    fn summary_counts_each_status() {
        let records = [
            record(None),
            record(Some(date!(2026 - 06 - 20))),
            record(Some(date!(2026 - 05 - 01))),
            record(Some(date!(2027 - 01 - 01))),
        ];
        let s = ComplianceSummary::of(&records);
        assert_eq!((s.total, s.valid, s.expiring_soon, s.expired), (4, 2, 1, 1));
    }
}
