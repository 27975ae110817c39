//! REST handlers, one module per resource.

pub mod admin;
pub mod analytics;
pub mod auth;
pub mod bus_routes;
pub mod compliance;
pub mod dispatches;
pub mod fleet;
pub mod payments;
pub mod plans;
pub mod prescriptions;
pub mod settings;
pub mod staff;
pub mod subscriptions;
mod usage;

use std::str::FromStr;

use axum::Router;
use axum::routing::{get, patch, post};
use serde::Deserialize;
use vendorhub_api::{ApiError, PageParams, PageRequest, Pagination};
use vendorhub_core::CoreError;
use vendorhub_core::time::{format_date, parse_date};
use vendorhub_core::Entity;
use vendorhub_storage::{Query, Repository};

use crate::state::AppState;

/// Every `/api` route.
pub fn api_router() -> Router<AppState> {
    Router::new()
        // Session
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/session", get(auth::session))
        // Dispatches
        .route(
            "/api/dispatches",
            get(dispatches::list_dispatches).post(dispatches::create_dispatch),
        )
        .route("/api/dispatches/export", get(dispatches::export_dispatches))
        .route(
            "/api/dispatches/{id}",
            get(dispatches::read_dispatch)
                .put(dispatches::update_dispatch)
                .delete(dispatches::delete_dispatch),
        )
        .route("/api/dispatches/{id}/status", patch(dispatches::update_status))
        .route("/api/dispatches/{id}/passengers", post(dispatches::add_passenger))
        .route(
            "/api/dispatches/{id}/passengers/{passenger_id}",
            patch(dispatches::update_passenger),
        )
        // Fleet and routes
        .route("/api/fleet", get(fleet::list_buses).post(fleet::create_bus))
        .route(
            "/api/fleet/{id}",
            get(fleet::read_bus).put(fleet::update_bus).delete(fleet::delete_bus),
        )
        .route(
            "/api/routes",
            get(bus_routes::list_routes).post(bus_routes::create_route),
        )
        .route(
            "/api/routes/{id}",
            get(bus_routes::read_route)
                .put(bus_routes::update_route)
                .delete(bus_routes::delete_route),
        )
        // Staff
        .route("/api/staff", get(staff::list_staff).post(staff::create_staff))
        .route("/api/staff/export", get(staff::export_staff))
        .route(
            "/api/staff/{id}",
            get(staff::read_staff)
                .put(staff::update_staff)
                .delete(staff::delete_staff),
        )
        // Compliance
        .route(
            "/api/compliance",
            get(compliance::list_records).post(compliance::create_record),
        )
        .route(
            "/api/compliance/{id}",
            get(compliance::read_record)
                .put(compliance::update_record)
                .delete(compliance::delete_record),
        )
        // Prescriptions
        .route(
            "/api/prescriptions",
            get(prescriptions::list_prescriptions).post(prescriptions::create_prescription),
        )
        .route(
            "/api/prescriptions/{id}",
            get(prescriptions::read_prescription)
                .put(prescriptions::update_prescription)
                .delete(prescriptions::delete_prescription),
        )
        .route(
            "/api/prescriptions/{id}/status",
            patch(prescriptions::update_status),
        )
        // Settings and analytics
        .route(
            "/api/settings",
            get(settings::read_settings).put(settings::update_settings),
        )
        .route("/api/analytics", get(analytics::summary))
        .route("/api/analytics/export", get(analytics::export_daily))
        // Billing
        .route("/api/plans", get(plans::list_plans))
        .route("/api/subscriptions", get(subscriptions::current))
        .route("/api/subscriptions/history", get(subscriptions::history))
        .route("/api/subscriptions/usage", get(subscriptions::usage))
        .route("/api/subscriptions/upgrade", post(subscriptions::upgrade))
        .route("/api/subscriptions/cancel", post(subscriptions::cancel))
        .route("/api/payments", get(payments::list_payments))
        .route("/api/payments/callback", post(payments::callback))
        .route("/api/payments/{reference}", get(payments::read_payment))
        .route("/api/payments/{reference}/cancel", post(payments::cancel_payment))
        // Platform administration
        .route(
            "/api/admin/vendors",
            get(admin::list_vendors).post(admin::create_vendor),
        )
        .route("/api/admin/vendors/{id}", get(admin::read_vendor))
        .route("/api/admin/vendors/{id}/status", patch(admin::set_vendor_status))
        .route("/api/admin/vendors/{id}/users", post(admin::create_vendor_user))
        .route("/api/admin/plans", get(admin::list_plans).post(admin::create_plan))
        .route(
            "/api/admin/plans/{id}",
            axum::routing::put(admin::update_plan).delete(admin::delete_plan),
        )
}

/// Common list query: paging, status filter, free-text search and an
/// inclusive `from`/`to` date range.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    #[serde(flatten)]
    pub page: PageParams,
    pub status: Option<String>,
    pub search: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl ListParams {
    /// The `status` filter parsed as `S`. Unknown values are a 400.
    pub fn status<S>(&self) -> Result<Option<S>, ApiError>
    where
        S: FromStr<Err = CoreError>,
    {
        match self.status.as_deref().map(str::trim) {
            None | Some("") | Some("all") => Ok(None),
            Some(value) => Ok(Some(value.parse()?)),
        }
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    /// `from`/`to` validated and normalized to `YYYY-MM-DD`.
    pub fn date_range(&self) -> Result<(Option<String>, Option<String>), ApiError> {
        let parse = |value: &Option<String>| -> Result<Option<String>, ApiError> {
            match value.as_deref().map(str::trim) {
                None | Some("") => Ok(None),
                Some(v) => Ok(Some(format_date(parse_date(v)?))),
            }
        };
        let (from, to) = (parse(&self.from)?, parse(&self.to)?);
        if let (Some(f), Some(t)) = (&from, &to)
            && f > t
        {
            return Err(ApiError::bad_request("'from' must not be after 'to'"));
        }
        Ok((from, to))
    }

    /// Range over an RFC 3339 timestamp field such as `createdAt`, covering
    /// whole days.
    pub fn timestamp_range(&self, field: &str, query: Query) -> Result<Query, ApiError> {
        let (from, to) = self.date_range()?;
        Ok(query.between(
            field,
            from,
            to.map(|day| format!("{day}T23:59:59.999999999Z")),
        ))
    }
}

/// One page of `query` from `repo`, newest first unless `query` sorts.
pub(crate) async fn find_page<T>(
    repo: &Repository<T>,
    query: Query,
    page: PageRequest,
) -> Result<(Vec<T>, Pagination), ApiError>
where
    T: Entity + serde::Serialize + serde::de::DeserializeOwned,
{
    let query = if query.sort.is_none() {
        query.newest_first()
    } else {
        query
    };
    let (items, total) = repo.find(query.window(page.offset(), page.limit)).await?;
    Ok((items, Pagination::new(page, total)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use vendorhub_core::models::DispatchStatus;

    fn params(status: Option<&str>, from: Option<&str>, to: Option<&str>) -> ListParams {
        ListParams {
            status: status.map(str::to_string),
            from: from.map(str::to_string),
            to: to.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn status_filter_is_validated() {
        let p = params(Some("in_transit"), None, None);
        assert_eq!(p.status::<DispatchStatus>().unwrap(), Some(DispatchStatus::InTransit));
        assert_eq!(params(Some("all"), None, None).status::<DispatchStatus>().unwrap(), None);
        let err = params(Some("teleported"), None, None)
            .status::<DispatchStatus>()
            .unwrap_err();
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn date_range_is_validated() {
        let (from, to) = params(None, Some("2026-03-01"), Some(" 2026-03-31 "))
            .date_range()
            .unwrap();
        assert_eq!(from.as_deref(), Some("2026-03-01"));
        assert_eq!(to.as_deref(), Some("2026-03-31"));
        assert!(params(None, Some("03/01/2026"), None).date_range().is_err());
        assert!(params(None, Some("2026-04-01"), Some("2026-03-01")).date_range().is_err());
    }

    #[test]
    fn query_string_with_paging_deserializes() {
        let p: ListParams =
            serde_json::from_value(serde_json::json!({"page": "2", "limit": "5", "search": "x"}))
                .unwrap();
        assert_eq!(p.page.page, Some(2));
        assert_eq!(p.page.limit, Some(5));
        assert_eq!(p.search(), Some("x"));
    }
}
