//! Dispatch analytics for bus tenants.

use std::collections::HashMap;

use axum::extract::State;
use axum::response::IntoResponse;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::json;
use vendorhub_api::{ApiError, ApiQuery, ApiResponse, CsvDownload, CsvTable};
use vendorhub_auth::{Session, SessionAuth};
use vendorhub_core::ServiceType;
use vendorhub_core::models::{BusRoute, Dispatch, DispatchStatus};
use vendorhub_core::time::{format_date, today};
use vendorhub_storage::Query;

use super::ListParams;
use crate::state::AppState;

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub dispatches: u64,
    pub passengers: u64,
    pub completed: u64,
    pub no_show: u64,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    pub date: String,
    pub dispatches: u64,
    pub arrived: u64,
    pub cancelled: u64,
    pub passengers: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStats {
    pub route_id: String,
    pub name: String,
    pub dispatches: u64,
    pub passengers: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub totals: Totals,
    pub by_status: IndexMap<DispatchStatus, u64>,
    pub completion_rate: f64,
    pub no_show_rate: f64,
    pub by_route: Vec<RouteStats>,
    pub daily: Vec<DailyStats>,
}

/// Percentage rounded to one decimal; zero when `whole` is zero.
fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 * 1000.0 / whole as f64).round() / 10.0
}

impl AnalyticsReport {
    /// Aggregate `dispatches`. `route_names` labels the per-route rows;
    /// unknown routes keep their id as the name.
    pub fn build(dispatches: &[Dispatch], route_names: &HashMap<String, String>) -> Self {
        let mut totals = Totals::default();
        let mut by_status: IndexMap<DispatchStatus, u64> =
            DispatchStatus::ALL.iter().map(|s| (*s, 0)).collect();
        let mut by_route: IndexMap<&str, RouteStats> = IndexMap::new();
        let mut daily: IndexMap<String, DailyStats> = IndexMap::new();

        for d in dispatches {
            let passengers = u64::from(d.counts.total_passengers);
            totals.dispatches += 1;
            totals.passengers += passengers;
            totals.completed += u64::from(d.counts.completed_count);
            totals.no_show += u64::from(d.counts.no_show_count);
            *by_status.entry(d.status).or_default() += 1;

            let route = by_route.entry(d.route_id.as_str()).or_insert_with(|| RouteStats {
                route_id: d.route_id.clone(),
                name: route_names
                    .get(&d.route_id)
                    .cloned()
                    .unwrap_or_else(|| d.route_id.clone()),
                dispatches: 0,
                passengers: 0,
            });
            route.dispatches += 1;
            route.passengers += passengers;

            let date = format_date(d.departure_date);
            let day = daily.entry(date.clone()).or_insert_with(|| DailyStats {
                date,
                ..DailyStats::default()
            });
            day.dispatches += 1;
            day.passengers += passengers;
            match d.status {
                DispatchStatus::Arrived => day.arrived += 1,
                DispatchStatus::Cancelled => day.cancelled += 1,
                _ => {}
            }
        }

        let arrived = by_status.get(&DispatchStatus::Arrived).copied().unwrap_or(0);
        let mut by_route: Vec<_> = by_route.into_values().collect();
        by_route.sort_by(|a, b| b.dispatches.cmp(&a.dispatches).then(a.name.cmp(&b.name)));
        daily.sort_keys();

        Self {
            completion_rate: percent(arrived, totals.dispatches),
            no_show_rate: percent(totals.no_show, totals.passengers),
            totals,
            by_status,
            by_route,
            daily: daily.into_values().collect(),
        }
    }
}

async fn load_dispatches(
    state: &AppState,
    session: &Session,
    params: &ListParams,
) -> Result<Vec<Dispatch>, ApiError> {
    session.require_service(ServiceType::Bus)?;
    let (from, to) = params.date_range()?;
    Ok(state
        .tenant::<Dispatch>(session)?
        .find_all(Query::new().between("departureDate", from, to))
        .await?)
}

/// GET /api/analytics?from&to
pub async fn summary(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let dispatches = load_dispatches(&state, &session, &params).await?;
    let route_names: HashMap<String, String> = state
        .tenant::<BusRoute>(&session)?
        .find_all(Query::new())
        .await?
        .into_iter()
        .map(|r| (r.meta.id.clone(), r.name))
        .collect();

    let report = AnalyticsReport::build(&dispatches, &route_names);
    Ok(ApiResponse::ok(json!({ "analytics": report })))
}

/// GET /api/analytics/export
pub async fn export_daily(
    State(state): State<AppState>,
    SessionAuth(session): SessionAuth,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let dispatches = load_dispatches(&state, &session, &params).await?;
    let report = AnalyticsReport::build(&dispatches, &HashMap::new());

    let mut table = CsvTable::new(["Date", "Dispatches", "Arrived", "Cancelled", "Passengers"]);
    for day in &report.daily {
        table.push(vec![
            json!(day.date),
            json!(day.dispatches),
            json!(day.arrived),
            json!(day.cancelled),
            json!(day.passengers),
        ]);
    }
    Ok(CsvDownload::render(
        format!("analytics-{}.csv", format_date(today())),
        &table,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vendorhub_core::models::{DispatchSchedule, NewPassenger, PassengerStatus};
    use time::macros::date;

    fn dispatch(route: &str, day: time::Date) -> Dispatch {
        Dispatch::new(
            "v1",
            DispatchSchedule {
                trip_id: None,
                bus_id: "b1".into(),
                route_id: route.into(),
                driver_id: "s1".into(),
                conductor_id: None,
                departure_date: day,
                departure_time: "08:00".into(),
                notes: None,
            },
        )
    }

    fn passenger(name: &str) -> NewPassenger {
        NewPassenger {
            name: name.into(),
            ..NewPassenger::default()
        }
    }

    #[test]
    fn empty_report_has_zero_rates() {
        let report = AnalyticsReport::build(&[], &HashMap::new());
        assert_eq!(report.totals, Totals::default());
        assert_eq!(report.completion_rate, 0.0);
        assert_eq!(report.no_show_rate, 0.0);
        assert_eq!(report.by_status.len(), DispatchStatus::ALL.len());
        assert!(report.daily.is_empty());
    }

    #[test]
    fn rates_and_series() {
        // Arrived with one completed passenger and one no-show.
        let mut arrived = dispatch("r1", date!(2026 - 03 - 02));
        arrived.add_passenger(passenger("A"), None).unwrap();
        arrived.add_passenger(passenger("B"), None).unwrap();
        let first = arrived.passengers[0].id.clone();
        arrived.update_passenger(&first, PassengerStatus::CheckedIn).unwrap();
        arrived.update_passenger(&first, PassengerStatus::Boarded).unwrap();
        arrived.change_status(DispatchStatus::Boarding, None).unwrap();
        arrived.change_status(DispatchStatus::Departed, None).unwrap();
        arrived.change_status(DispatchStatus::InTransit, None).unwrap();
        arrived.change_status(DispatchStatus::Arrived, None).unwrap();

        let mut cancelled = dispatch("r2", date!(2026 - 03 - 01));
        cancelled.change_status(DispatchStatus::Cancelled, None).unwrap();
        let scheduled = dispatch("r1", date!(2026 - 03 - 02));

        let names = HashMap::from([("r1".to_string(), "Coast Express".to_string())]);
        let report = AnalyticsReport::build(&[arrived, cancelled, scheduled], &names);

        assert_eq!(report.totals.dispatches, 3);
        assert_eq!(report.totals.passengers, 2);
        assert_eq!(report.totals.completed, 1);
        assert_eq!(report.totals.no_show, 1);
        assert_eq!(report.completion_rate, 33.3);
        assert_eq!(report.no_show_rate, 50.0);
        assert_eq!(report.by_status[&DispatchStatus::Scheduled], 1);

        assert_eq!(report.by_route[0].name, "Coast Express");
        assert_eq!(report.by_route[0].dispatches, 2);
        assert_eq!(report.by_route[1].name, "r2");

        let days: Vec<_> = report.daily.iter().map(|d| d.date.as_str()).collect();
        assert_eq!(days, ["2026-03-01", "2026-03-02"]);
        assert_eq!(report.daily[1].arrived, 1);
        assert_eq!(report.daily[0].cancelled, 1);
    }
}
