//! Bus dispatches and their passenger manifests.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;
use vendorhub_api::{ApiError, ApiJson, ApiQuery, ApiResponse, CsvDownload, CsvTable};
use vendorhub_auth::{Session, SessionAuth};
use vendorhub_core::models::{
    Bus, BusRoute, Dispatch, DispatchSchedule, DispatchStatus, NewPassenger, PassengerStatus,
    StaffMember, StaffRole, UsageResource,
};
use vendorhub_core::time::{format_date, parse_clock_time, parse_date, today};
use vendorhub_core::validation::{Required, clean, take};
use vendorhub_core::ServiceType;
use vendorhub_storage::{Query, Repository};

use super::{ListParams, find_page, usage};
use crate::state::AppState;

const SEARCH_FIELDS: [&str; 3] = ["dispatchNumber", "tripId", "notes"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    pub trip_id: Option<String>,
    pub bus_id: Option<String>,
    pub route_id: Option<String>,
    pub driver_id: Option<String>,
    pub conductor_id: Option<String>,
    pub departure_date: Option<String>,
    pub departure_time: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassengerRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub seat_number: Option<String>,
    pub booking_reference: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PassengerStatusRequest {
    pub status: Option<String>,
}

fn dispatches(state: &AppState, session: &Session) -> Result<Repository<Dispatch>, ApiError> {
    session.require_service(ServiceType::Bus)?;
    state.tenant(session)
}

async fn load(repo: &Repository<Dispatch>, id: &str) -> Result<Dispatch, ApiError> {
    repo.get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Dispatch not found"))
}

fn list_query(params: &ListParams) -> Result<Query, ApiError> {
    let (from, to) = params.date_range()?;
    Ok(Query::new()
        .eq_opt("status", params.status::<DispatchStatus>()?.map(|s| s.as_str()))
        .between("departureDate", from, to)
        .search(params.search(), SEARCH_FIELDS))
}

/// Check that every referenced record belongs to the caller's tenant and can
/// be assigned.
async fn check_assignments(
    state: &AppState,
    session: &Session,
    bus_id: &str,
    route_id: &str,
    driver_id: &str,
    conductor_id: Option<&str>,
) -> Result<(), ApiError> {
    let bus = state
        .tenant::<Bus>(session)?
        .get(bus_id)
        .await?
        .ok_or_else(|| ApiError::bad_request(format!("Bus '{bus_id}' not found")))?;
    if !bus.is_dispatchable() {
        return Err(ApiError::bad_request(format!(
            "Bus {} is {} and cannot be dispatched",
            bus.registration_number, bus.status
        )));
    }

    let route = state
        .tenant::<BusRoute>(session)?
        .get(route_id)
        .await?
        .ok_or_else(|| ApiError::bad_request(format!("Route '{route_id}' not found")))?;
    if !route.active {
        return Err(ApiError::bad_request(format!("Route {} is inactive", route.label())));
    }

    let staff = state.tenant::<StaffMember>(session)?;
    let assignments = [(driver_id, StaffRole::Driver)]
        .into_iter()
        .chain(conductor_id.map(|id| (id, StaffRole::Conductor)));
    for (id, role) in assignments {
        let member = staff
            .get(id)
            .await?
            .ok_or_else(|| ApiError::bad_request(format!("Staff member '{id}' not found")))?;
        if !member.can_serve_as(role) {
            return Err(ApiError::bad_request(format!(
                "{} is not an active {role}",
                member.name
            )));
        }
    }
    Ok(())
}

/// GET /api/dispatches
///
/// Filters: `status`, `from`/`to` on `departureDate`, `search`.
pub async fn list_dispatches(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = dispatches(&state, &session)?;
    let page = state.page(&params.page);
    let (items, pagination) = find_page(&repo, list_query(&params)?, page).await?;
    Ok(ApiResponse::ok(json!({
        "dispatches": items,
        "pagination": pagination,
    })))
}

/// POST /api/dispatches
pub async fn create_dispatch(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    ApiJson(body): ApiJson<DispatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = dispatches(&state, &session)?;
    session.require_manager()?;
    Required::new()
        .text("busId", &body.bus_id)
        .text("routeId", &body.route_id)
        .text("driverId", &body.driver_id)
        .text("departureDate", &body.departure_date)
        .text("departureTime", &body.departure_time)
        .finish()?;

    let bus_id = take("busId", clean(body.bus_id))?;
    let route_id = take("routeId", clean(body.route_id))?;
    let driver_id = take("driverId", clean(body.driver_id))?;
    let conductor_id = clean(body.conductor_id);
    let departure_date = parse_date(&take("departureDate", body.departure_date)?)?;
    let departure_time = take("departureTime", clean(body.departure_time))?;
    parse_clock_time(&departure_time)?;

    check_assignments(
        &state,
        &session,
        &bus_id,
        &route_id,
        &driver_id,
        conductor_id.as_deref(),
    )
    .await?;

    let vendor_id = session.vendor_id()?;
    let dispatch = Dispatch::new(
        vendor_id,
        DispatchSchedule {
            trip_id: clean(body.trip_id),
            bus_id,
            route_id,
            driver_id,
            conductor_id,
            departure_date,
            departure_time,
            notes: clean(body.notes),
        },
    );
    let dispatch =
        usage::insert_counted(&state.store, &repo, &dispatch, UsageResource::Dispatches).await?;

    tracing::info!(
        vendor_id = %vendor_id,
        dispatch_id = %dispatch.meta.id,
        dispatch_number = %dispatch.dispatch_number,
        "dispatch created"
    );
    Ok(ApiResponse::created(json!({ "dispatch": dispatch })))
}

/// GET /api/dispatches/{id}
pub async fn read_dispatch(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = dispatches(&state, &session)?;
    let dispatch = load(&repo, &id).await?;
    Ok(ApiResponse::ok(json!({ "dispatch": dispatch })))
}

/// PUT /api/dispatches/{id}
///
/// Only dispatches that have not started may be rescheduled.
pub async fn update_dispatch(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<DispatchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = dispatches(&state, &session)?;
    session.require_manager()?;
    let mut dispatch = load(&repo, &id).await?;
    if !matches!(
        dispatch.status,
        DispatchStatus::Scheduled | DispatchStatus::Delayed
    ) {
        return Err(ApiError::bad_request(format!(
            "A {} dispatch cannot be edited",
            dispatch.status
        )));
    }

    if let Some(v) = clean(body.bus_id) {
        dispatch.bus_id = v;
    }
    if let Some(v) = clean(body.route_id) {
        dispatch.route_id = v;
    }
    if let Some(v) = clean(body.driver_id) {
        dispatch.driver_id = v;
    }
    if body.conductor_id.is_some() {
        dispatch.conductor_id = clean(body.conductor_id);
    }
    if let Some(v) = clean(body.departure_date) {
        dispatch.departure_date = parse_date(&v)?;
    }
    if let Some(v) = clean(body.departure_time) {
        parse_clock_time(&v)?;
        dispatch.departure_time = v;
    }
    if body.trip_id.is_some() {
        dispatch.trip_id = clean(body.trip_id);
    }
    if body.notes.is_some() {
        dispatch.notes = clean(body.notes);
    }

    check_assignments(
        &state,
        &session,
        &dispatch.bus_id,
        &dispatch.route_id,
        &dispatch.driver_id,
        dispatch.conductor_id.as_deref(),
    )
    .await?;

    repo.update(&mut dispatch).await?;
    Ok(ApiResponse::ok(json!({ "dispatch": dispatch })))
}

/// DELETE /api/dispatches/{id}
pub async fn delete_dispatch(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = dispatches(&state, &session)?;
    session.require_manager()?;
    let dispatch = load(&repo, &id).await?;
    if !dispatch.is_deletable() {
        return Err(ApiError::bad_request(format!(
            "A {} dispatch cannot be deleted",
            dispatch.status
        )));
    }
    repo.delete(&id).await?;
    usage::release(&state.store, session.vendor_id()?, UsageResource::Dispatches).await?;
    tracing::info!(dispatch_id = %id, "dispatch deleted");
    Ok(ApiResponse::ok(json!({ "message": "Dispatch deleted" })))
}

/// PATCH /api/dispatches/{id}/status
pub async fn update_status(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = dispatches(&state, &session)?;
    Required::new().text("status", &body.status).finish()?;
    let next: DispatchStatus = take("status", body.status)?.parse()?;

    let mut dispatch = load(&repo, &id).await?;
    let previous = dispatch.status;
    dispatch.change_status(next, clean(body.reason))?;
    repo.update(&mut dispatch).await?;

    tracing::info!(
        dispatch_id = %id,
        from = %previous,
        to = %next,
        user_id = %session.user_id(),
        "dispatch status changed"
    );
    Ok(ApiResponse::ok(json!({ "dispatch": dispatch })))
}

/// POST /api/dispatches/{id}/passengers
pub async fn add_passenger(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<PassengerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = dispatches(&state, &session)?;
    Required::new().text("name", &body.name).finish()?;

    let mut dispatch = load(&repo, &id).await?;
    let capacity = state
        .tenant::<Bus>(&session)?
        .get(&dispatch.bus_id)
        .await?
        .map(|bus| bus.capacity);

    let passenger = dispatch
        .add_passenger(
            NewPassenger {
                name: take("name", clean(body.name))?,
                phone: clean(body.phone),
                seat_number: clean(body.seat_number),
                booking_reference: clean(body.booking_reference),
            },
            capacity,
        )?
        .clone();
    repo.update(&mut dispatch).await?;

    tracing::debug!(dispatch_id = %id, passenger_id = %passenger.id, "passenger added");
    Ok(ApiResponse::created(json!({
        "passenger": passenger,
        "dispatch": dispatch,
    })))
}

/// PATCH /api/dispatches/{id}/passengers/{passenger_id}
pub async fn update_passenger(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    Path((id, passenger_id)): Path<(String, String)>,
    ApiJson(body): ApiJson<PassengerStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = dispatches(&state, &session)?;
    Required::new().text("status", &body.status).finish()?;
    let next: PassengerStatus = take("status", body.status)?.parse()?;

    let mut dispatch = load(&repo, &id).await?;
    let passenger = dispatch
        .update_passenger(&passenger_id, next)?
        .ok_or_else(|| ApiError::not_found("Passenger not found"))?;
    repo.update(&mut dispatch).await?;

    Ok(ApiResponse::ok(json!({
        "passenger": passenger,
        "dispatch": dispatch,
    })))
}

/// GET /api/dispatches/export
///
/// Same filters as the list, without paging.
pub async fn export_dispatches(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = dispatches(&state, &session)?;
    let items = repo
        .find_all(list_query(&params)?.sort_by("departureDate", false))
        .await?;

    let mut table = CsvTable::new([
        "Dispatch Number",
        "Departure Date",
        "Departure Time",
        "Status",
        "Bus",
        "Route",
        "Driver",
        "Conductor",
        "Passengers",
        "Onboard",
        "Completed",
        "No Show",
        "Notes",
    ]);
    for d in &items {
        table.push(vec![
            json!(d.dispatch_number),
            json!(format_date(d.departure_date)),
            json!(d.departure_time),
            json!(d.status),
            json!(d.bus_id),
            json!(d.route_id),
            json!(d.driver_id),
            json!(d.conductor_id),
            json!(d.counts.total_passengers),
            json!(d.counts.onboard_count),
            json!(d.counts.completed_count),
            json!(d.counts.no_show_count),
            json!(d.notes),
        ]);
    }

    tracing::info!(
        vendor_id = session.vendor_id()?,
        rows = table.len(),
        "dispatches exported"
    );
    Ok(CsvDownload::render(
        format!("dispatches-{}.csv", format_date(today())),
        &table,
    )?)
}
