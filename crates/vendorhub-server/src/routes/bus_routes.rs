//! Routes a bus tenant operates.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;
use vendorhub_api::{ApiError, ApiJson, ApiQuery, ApiResponse};
use vendorhub_auth::{Session, SessionAuth};
use vendorhub_core::models::{BusRoute, Dispatch, DispatchStatus, UsageResource};
use vendorhub_core::validation::{Required, clean, take};
use vendorhub_core::{RecordMeta, ServiceType};
use vendorhub_storage::{Query, Repository};

use super::{ListParams, find_page, usage};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct RouteListParams {
    #[serde(flatten)]
    pub list: ListParams,
    /// `true` or `false`; anything else lists both.
    pub active: Option<String>,
}

impl RouteListParams {
    fn active(&self) -> Result<Option<bool>, ApiError> {
        match self.active.as_deref().map(str::trim) {
            None | Some("") | Some("all") => Ok(None),
            Some(v) => v
                .parse()
                .map(Some)
                .map_err(|_| ApiError::bad_request(format!("Invalid active filter: '{v}'"))),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteRequest {
    pub name: Option<String>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub stops: Option<Vec<String>>,
    pub distance_km: Option<f64>,
    pub duration_minutes: Option<u32>,
    pub fare: Option<u64>,
    pub active: Option<bool>,
}

fn routes(state: &AppState, session: &Session) -> Result<Repository<BusRoute>, ApiError> {
    session.require_service(ServiceType::Bus)?;
    state.tenant(session)
}

async fn load(repo: &Repository<BusRoute>, id: &str) -> Result<BusRoute, ApiError> {
    repo.get(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Route not found"))
}

/// GET /api/routes
pub async fn list_routes(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    ApiQuery(params): ApiQuery<RouteListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = routes(&state, &session)?;
    let query = Query::new()
        .eq_opt("active", params.active()?)
        .search(params.list.search(), ["name", "origin", "destination"]);
    let (items, pagination) = find_page(&repo, query, state.page(&params.list.page)).await?;
    Ok(ApiResponse::ok(json!({
        "routes": items,
        "pagination": pagination,
    })))
}

/// POST /api/routes
pub async fn create_route(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    ApiJson(body): ApiJson<RouteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = routes(&state, &session)?;
    session.require_manager()?;
    Required::new()
        .text("name", &body.name)
        .text("origin", &body.origin)
        .text("destination", &body.destination)
        .value("fare", &body.fare)
        .finish()?;

    let route = BusRoute {
        meta: RecordMeta::for_vendor(session.vendor_id()?),
        name: take("name", clean(body.name))?,
        origin: take("origin", clean(body.origin))?,
        destination: take("destination", clean(body.destination))?,
        stops: body.stops.unwrap_or_default(),
        distance_km: body.distance_km,
        duration_minutes: body.duration_minutes,
        fare: take("fare", body.fare)?,
        active: body.active.unwrap_or(true),
    };
    route.validate()?;

    let route = usage::insert_counted(&state.store, &repo, &route, UsageResource::Routes).await?;
    tracing::info!(route_id = %route.meta.id, route = %route.label(), "route created");
    Ok(ApiResponse::created(json!({ "route": route })))
}

/// GET /api/routes/{id}
pub async fn read_route(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = routes(&state, &session)?;
    let route = load(&repo, &id).await?;
    Ok(ApiResponse::ok(json!({ "route": route })))
}

/// PUT /api/routes/{id}
pub async fn update_route(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<RouteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = routes(&state, &session)?;
    session.require_manager()?;
    let mut route = load(&repo, &id).await?;

    if let Some(v) = clean(body.name) {
        route.name = v;
    }
    if let Some(v) = clean(body.origin) {
        route.origin = v;
    }
    if let Some(v) = clean(body.destination) {
        route.destination = v;
    }
    if let Some(v) = body.stops {
        route.stops = v;
    }
    if body.distance_km.is_some() {
        route.distance_km = body.distance_km;
    }
    if body.duration_minutes.is_some() {
        route.duration_minutes = body.duration_minutes;
    }
    if let Some(v) = body.fare {
        route.fare = v;
    }
    if let Some(v) = body.active {
        route.active = v;
    }
    route.validate()?;

    repo.update(&mut route).await?;
    Ok(ApiResponse::ok(json!({ "route": route })))
}

/// DELETE /api/routes/{id}
pub async fn delete_route(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let repo = routes(&state, &session)?;
    session.require_manager()?;
    load(&repo, &id).await?;

    let upcoming = state
        .tenant::<Dispatch>(&session)?
        .count(Query::new().eq("routeId", id.as_str()).any_of(
            "status",
            [DispatchStatus::Scheduled, DispatchStatus::Boarding, DispatchStatus::Delayed]
                .map(|s| s.as_str()),
        ))
        .await?;
    if upcoming > 0 {
        return Err(ApiError::conflict(format!(
            "Route has {upcoming} upcoming dispatch(es)"
        )));
    }

    repo.delete(&id).await?;
    usage::release(&state.store, session.vendor_id()?, UsageResource::Routes).await?;
    tracing::info!(route_id = %id, "route deleted");
    Ok(ApiResponse::ok(json!({ "message": "Route deleted" })))
}
