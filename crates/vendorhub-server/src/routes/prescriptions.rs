//! Pharmacy prescriptions.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;
use vendorhub_api::{ApiError, ApiJson, ApiQuery, ApiResponse};
use vendorhub_auth::{Session, SessionAuth};
use vendorhub_core::models::{
    Medication, Prescription, PrescriptionStatus, UsageResource,
};
use vendorhub_core::validation::{Required, clean, take};
use vendorhub_core::{RecordMeta, ServiceType};
use vendorhub_storage::{Query, Repository};

use super::{ListParams, find_page, usage};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionRequest {
    pub patient_name: Option<String>,
    pub patient_phone: Option<String>,
    pub doctor_name: Option<String>,
    pub medications: Option<Vec<Medication>>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: Option<String>,
    pub reason: Option<String>,
}

fn prescriptions(
    state: &AppState,
    session: &Session,
) -> Result<Repository<Prescription>, ApiError> {
    session.require_service(ServiceType::Pharmacy)?;
    state.tenant(session)
}

async fn load(repo: &Repository<Prescription>, id: &str) -> Result<Prescription, ApiError> {
    repo.get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Prescription not found"))
}

/// GET /api/prescriptions
///
/// Filters: `status`, `from`/`to` on creation day, `search`.
pub async fn list_prescriptions(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = prescriptions(&state, &session)?;
    let query = Query::new()
        .eq_opt(
            "status",
            params.status::<PrescriptionStatus>()?.map(|s| s.as_str()),
        )
        .search(params.search(), ["patientName", "patientPhone", "doctorName"]);
    let query = params.timestamp_range("createdAt", query)?;
    let (items, pagination) = find_page(&repo, query, state.page(&params.page)).await?;
    Ok(ApiResponse::ok(json!({
        "prescriptions": items,
        "pagination": pagination,
    })))
}

/// POST /api/prescriptions
pub async fn create_prescription(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    ApiJson(body): ApiJson<PrescriptionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = prescriptions(&state, &session)?;
    Required::new()
        .text("patientName", &body.patient_name)
        .text("doctorName", &body.doctor_name)
        .list("medications", &body.medications)
        .finish()?;

    let prescription = Prescription {
        meta: RecordMeta::for_vendor(session.vendor_id()?),
        patient_name: take("patientName", clean(body.patient_name))?,
        patient_phone: clean(body.patient_phone),
        doctor_name: take("doctorName", clean(body.doctor_name))?,
        medications: take("medications", body.medications)?,
        status: PrescriptionStatus::Pending,
        notes: clean(body.notes),
        rejection_reason: None,
        dispensed_at: None,
    };
    prescription.validate()?;

    let prescription = usage::insert_counted(
        &state.store,
        &repo,
        &prescription,
        UsageResource::Prescriptions,
    )
    .await?;
    tracing::info!(
        prescription_id = %prescription.meta.id,
        medications = prescription.medications.len(),
        "prescription recorded"
    );
    Ok(ApiResponse::created(json!({ "prescription": prescription })))
}

/// GET /api/prescriptions/{id}
pub async fn read_prescription(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = prescriptions(&state, &session)?;
    let prescription = load(&repo, &id).await?;
    Ok(ApiResponse::ok(json!({ "prescription": prescription })))
}

/// PUT /api/prescriptions/{id}
///
/// Editable only while pending.
pub async fn update_prescription(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<PrescriptionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = prescriptions(&state, &session)?;
    let mut prescription = load(&repo, &id).await?;
    if prescription.status != PrescriptionStatus::Pending {
        return Err(ApiError::bad_request(format!(
            "A {} prescription cannot be edited",
            prescription.status
        )));
    }

    if let Some(v) = clean(body.patient_name) {
        prescription.patient_name = v;
    }
    if body.patient_phone.is_some() {
        prescription.patient_phone = clean(body.patient_phone);
    }
    if let Some(v) = clean(body.doctor_name) {
        prescription.doctor_name = v;
    }
    if let Some(v) = body.medications {
        prescription.medications = v;
    }
    if body.notes.is_some() {
        prescription.notes = clean(body.notes);
    }
    prescription.validate()?;

    repo.update(&mut prescription).await?;
    Ok(ApiResponse::ok(json!({ "prescription": prescription })))
}

/// DELETE /api/prescriptions/{id}
pub async fn delete_prescription(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = prescriptions(&state, &session)?;
    session.require_manager()?;
    let prescription = load(&repo, &id).await?;
    if !prescription.is_deletable() {
        return Err(ApiError::bad_request(format!(
            "A {} prescription cannot be deleted",
            prescription.status
        )));
    }
    repo.delete(&id).await?;
    usage::release(&state.store, session.vendor_id()?, UsageResource::Prescriptions).await?;
    tracing::info!(prescription_id = %id, "prescription deleted");
    Ok(ApiResponse::ok(json!({ "message": "Prescription deleted" })))
}

/// PATCH /api/prescriptions/{id}/status
pub async fn update_status(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = prescriptions(&state, &session)?;
    Required::new().text("status", &body.status).finish()?;
    let next: PrescriptionStatus = take("status", body.status)?.parse()?;

    let mut prescription = load(&repo, &id).await?;
    let previous = prescription.status;
    prescription.change_status(next, clean(body.reason))?;
    repo.update(&mut prescription).await?;

    tracing::info!(
        prescription_id = %id,
        from = %previous,
        to = %next,
        user_id = %session.user_id(),
        "prescription status changed"
    );
    Ok(ApiResponse::ok(json!({ "prescription": prescription })))
}
