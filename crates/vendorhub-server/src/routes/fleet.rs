//! Buses in a tenant's fleet.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;
use vendorhub_api::{ApiError, ApiJson, ApiQuery, ApiResponse};
use vendorhub_auth::{Session, SessionAuth};
use vendorhub_core::models::{Bus, BusStatus, Dispatch, DispatchStatus, UsageResource};
use vendorhub_core::validation::{Required, clean, take};
use vendorhub_core::{RecordMeta, ServiceType};
use vendorhub_storage::{Query, Repository};

use super::{ListParams, find_page, usage};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusRequest {
    pub registration_number: Option<String>,
    pub model: Option<String>,
    pub capacity: Option<u32>,
    pub amenities: Option<Vec<String>>,
    pub status: Option<String>,
}

fn buses(state: &AppState, session: &Session) -> Result<Repository<Bus>, ApiError> {
    session.require_service(ServiceType::Bus)?;
    state.tenant(session)
}

async fn load(repo: &Repository<Bus>, id: &str) -> Result<Bus, ApiError> {
    repo.get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Bus not found"))
}

/// Registration numbers are unique per tenant.
async fn ensure_unique_registration(
    repo: &Repository<Bus>,
    registration: &str,
    except: Option<&str>,
) -> Result<(), ApiError> {
    let mut query = Query::new().eq("registrationNumber", registration);
    if let Some(id) = except {
        query = query.ne("id", id);
    }
    if repo.count(query).await? > 0 {
        return Err(ApiError::conflict(format!(
            "A bus with registration {registration} already exists"
        )));
    }
    Ok(())
}

/// GET /api/fleet
pub async fn list_buses(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = buses(&state, &session)?;
    let query = Query::new()
        .eq_opt("status", params.status::<BusStatus>()?.map(|s| s.as_str()))
        .search(params.search(), ["registrationNumber", "model"]);
    let (items, pagination) = find_page(&repo, query, state.page(&params.page)).await?;
    Ok(ApiResponse::ok(json!({
        "buses": items,
        "pagination": pagination,
    })))
}

/// POST /api/fleet
pub async fn create_bus(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    ApiJson(body): ApiJson<BusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = buses(&state, &session)?;
    session.require_manager()?;
    Required::new()
        .text("registrationNumber", &body.registration_number)
        .text("model", &body.model)
        .value("capacity", &body.capacity)
        .finish()?;

    let registration =
        Bus::normalize_registration(&take("registrationNumber", body.registration_number)?);
    let status = match clean(body.status) {
        Some(s) => s.parse()?,
        None => BusStatus::Active,
    };
    let bus = Bus {
        meta: RecordMeta::for_vendor(session.vendor_id()?),
        registration_number: registration,
        model: take("model", clean(body.model))?,
        capacity: take("capacity", body.capacity)?,
        amenities: body.amenities.unwrap_or_default(),
        status,
    };
    bus.validate()?;
    ensure_unique_registration(&repo, &bus.registration_number, None).await?;

    let bus = usage::insert_counted(&state.store, &repo, &bus, UsageResource::Buses).await?;
    tracing::info!(bus_id = %bus.meta.id, registration = %bus.registration_number, "bus added");
    Ok(ApiResponse::created(json!({ "bus": bus })))
}

/// Dispatches of `bus_id` that have not finished.
async fn open_dispatches(
    state: &AppState,
    session: &Session,
    bus_id: &str,
) -> Result<Vec<Dispatch>, ApiError> {
    let query = Query::new().eq("busId", bus_id).any_of(
        "status",
        [
            DispatchStatus::Scheduled,
            DispatchStatus::Boarding,
            DispatchStatus::Departed,
            DispatchStatus::InTransit,
            DispatchStatus::Delayed,
        ]
        .map(|s| s.as_str()),
    );
    Ok(state.tenant::<Dispatch>(session)?.find_all(query).await?)
}

/// GET /api/fleet/{id}
pub async fn read_bus(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = buses(&state, &session)?;
    let bus = load(&repo, &id).await?;
    Ok(ApiResponse::ok(json!({ "bus": bus })))
}

/// PUT /api/fleet/{id}
///
/// Capacity may not drop below the passenger count of an open dispatch.
pub async fn update_bus(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<BusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = buses(&state, &session)?;
    session.require_manager()?;
    let mut bus = load(&repo, &id).await?;

    if let Some(reg) = clean(body.registration_number) {
        let reg = Bus::normalize_registration(&reg);
        if reg != bus.registration_number {
            ensure_unique_registration(&repo, &reg, Some(&id)).await?;
            bus.registration_number = reg;
        }
    }
    if let Some(model) = clean(body.model) {
        bus.model = model;
    }
    if let Some(capacity) = body.capacity
        && capacity != bus.capacity
    {
        let booked = open_dispatches(&state, &session, &id)
            .await?
            .iter()
            .map(|d| d.counts.total_passengers)
            .max()
            .unwrap_or(0);
        if capacity < booked {
            return Err(ApiError::bad_request(format!(
                "Capacity cannot be lower than the {booked} passengers booked on an active dispatch"
            )));
        }
        bus.capacity = capacity;
    }
    if let Some(amenities) = body.amenities {
        bus.amenities = amenities;
    }
    if let Some(status) = clean(body.status) {
        bus.status = status.parse()?;
    }
    bus.validate()?;

    repo.update(&mut bus).await?;
    Ok(ApiResponse::ok(json!({ "bus": bus })))
}

/// DELETE /api/fleet/{id}
///
/// Refused while the bus is assigned to a dispatch that has not finished.
pub async fn delete_bus(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = buses(&state, &session)?;
    session.require_manager()?;
    load(&repo, &id).await?;

    let open = open_dispatches(&state, &session, &id).await?.len();
    if open > 0 {
        return Err(ApiError::conflict(format!(
            "Bus is assigned to {open} active dispatch(es)"
        )));
    }

    repo.delete(&id).await?;
    usage::release(&state.store, session.vendor_id()?, UsageResource::Buses).await?;
    tracing::info!(bus_id = %id, "bus removed");
    Ok(ApiResponse::ok(json!({ "message": "Bus deleted" })))
}
