//! Tenant staff records.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;
use vendorhub_api::{ApiError, ApiJson, ApiQuery, ApiResponse, CsvDownload, CsvTable};
use vendorhub_auth::{Session, SessionAuth};
use vendorhub_core::models::{
    Dispatch, DispatchStatus, StaffMember, StaffRole, StaffStatus, UsageResource,
};
use vendorhub_core::time::{format_date, parse_date, today};
use vendorhub_core::validation::{Required, clean, take};
use vendorhub_core::RecordMeta;
use vendorhub_storage::{Query, Repository};

use super::{ListParams, find_page, usage};
use crate::state::AppState;

const SEARCH_FIELDS: [&str; 4] = ["name", "email", "phone", "licenseNumber"];

#[derive(Debug, Default, Deserialize)]
pub struct StaffListParams {
    #[serde(flatten)]
    pub list: ListParams,
    pub role: Option<String>,
}

impl StaffListParams {
    fn query(&self) -> Result<Query, ApiError> {
        let role: Option<StaffRole> = match self.role.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(v) => Some(v.parse()?),
        };
        Ok(Query::new()
            .eq_opt("role", role.map(|r| r.as_str()))
            .eq_opt("status", self.list.status::<StaffStatus>()?.map(|s| s.as_str()))
            .search(self.list.search(), SEARCH_FIELDS))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub license_number: Option<String>,
    pub status: Option<String>,
    pub hired_at: Option<String>,
}

fn staff(state: &AppState, session: &Session) -> Result<Repository<StaffMember>, ApiError> {
    state.tenant(session)
}

async fn load(repo: &Repository<StaffMember>, id: &str) -> Result<StaffMember, ApiError> {
    repo.get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Staff member not found"))
}

/// GET /api/staff
///
/// Filters: `role`, `status`, `search`.
pub async fn list_staff(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    ApiQuery(params): ApiQuery<StaffListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = staff(&state, &session)?;
    let query = params.query()?.sort_by("name", false);
    let (items, pagination) = find_page(&repo, query, state.page(&params.list.page)).await?;
    Ok(ApiResponse::ok(json!({
        "staff": items,
        "pagination": pagination,
    })))
}

/// POST /api/staff
pub async fn create_staff(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    ApiJson(body): ApiJson<StaffRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = staff(&state, &session)?;
    session.require_manager()?;
    Required::new()
        .text("name", &body.name)
        .text("phone", &body.phone)
        .text("role", &body.role)
        .finish()?;

    let member = StaffMember {
        meta: RecordMeta::for_vendor(session.vendor_id()?),
        name: take("name", clean(body.name))?,
        email: clean(body.email).map(|e| e.to_ascii_lowercase()),
        phone: take("phone", clean(body.phone))?,
        role: take("role", body.role)?.parse()?,
        license_number: clean(body.license_number),
        status: match clean(body.status) {
            Some(s) => s.parse()?,
            None => StaffStatus::Active,
        },
        hired_at: clean(body.hired_at).map(|d| parse_date(&d)).transpose()?,
    };
    member.validate()?;

    let member = usage::insert_counted(&state.store, &repo, &member, UsageResource::Staff).await?;
    tracing::info!(staff_id = %member.meta.id, role = %member.role, "staff member added");
    Ok(ApiResponse::created(json!({ "staff": member })))
}

/// GET /api/staff/{id}
pub async fn read_staff(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = staff(&state, &session)?;
    let member = load(&repo, &id).await?;
    Ok(ApiResponse::ok(json!({ "staff": member })))
}

/// PUT /api/staff/{id}
pub async fn update_staff(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<StaffRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = staff(&state, &session)?;
    session.require_manager()?;
    let mut member = load(&repo, &id).await?;

    if let Some(v) = clean(body.name) {
        member.name = v;
    }
    if body.email.is_some() {
        member.email = clean(body.email).map(|e| e.to_ascii_lowercase());
    }
    if let Some(v) = clean(body.phone) {
        member.phone = v;
    }
    if let Some(v) = clean(body.role) {
        member.role = v.parse()?;
    }
    if body.license_number.is_some() {
        member.license_number = clean(body.license_number);
    }
    if let Some(v) = clean(body.status) {
        member.status = v.parse()?;
    }
    if let Some(v) = clean(body.hired_at) {
        member.hired_at = Some(parse_date(&v)?);
    }
    member.validate()?;

    repo.update(&mut member).await?;
    Ok(ApiResponse::ok(json!({ "staff": member })))
}

/// DELETE /api/staff/{id}
///
/// Refused while the member crews a dispatch that has not finished.
pub async fn delete_staff(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = staff(&state, &session)?;
    session.require_manager()?;
    let member = load(&repo, &id).await?;

    if matches!(member.role, StaffRole::Driver | StaffRole::Conductor) {
        let field = if member.role == StaffRole::Driver {
            "driverId"
        } else {
            "conductorId"
        };
        let open = state
            .tenant::<Dispatch>(&session)?
            .count(Query::new().eq(field, id.as_str()).any_of(
                "status",
                [
                    DispatchStatus::Scheduled,
                    DispatchStatus::Boarding,
                    DispatchStatus::Departed,
                    DispatchStatus::InTransit,
                    DispatchStatus::Delayed,
                ]
                .map(|s| s.as_str()),
            ))
            .await?;
        if open > 0 {
            return Err(ApiError::conflict(format!(
                "{} is assigned to {open} active dispatch(es)",
                member.name
            )));
        }
    }

    repo.delete(&id).await?;
    usage::release(&state.store, session.vendor_id()?, UsageResource::Staff).await?;
    tracing::info!(staff_id = %id, "staff member removed");
    Ok(ApiResponse::ok(json!({ "message": "Staff member deleted" })))
}

/// GET /api/staff/export
pub async fn export_staff(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    ApiQuery(params): ApiQuery<StaffListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = staff(&state, &session)?;
    let members = repo.find_all(params.query()?.sort_by("name", false)).await?;

    let mut table = CsvTable::new([
        "Name",
        "Role",
        "Status",
        "Phone",
        "Email",
        "License Number",
        "Hired",
    ]);
    for m in &members {
        table.push(vec![
            json!(m.name),
            json!(m.role),
            json!(m.status),
            json!(m.phone),
            json!(m.email),
            json!(m.license_number),
            json!(m.hired_at.map(format_date)),
        ]);
    }
    Ok(CsvDownload::render(
        format!("staff-{}.csv", format_date(today())),
        &table,
    )?)
}
