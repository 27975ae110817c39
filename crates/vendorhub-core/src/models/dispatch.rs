//! Bus dispatches: one scheduled trip, its passenger manifest and its status.

use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::entity::RecordMeta;
use crate::error::{CoreError, Result};
use crate::id::{generate_id, generate_reference};
use crate::lifecycle::Lifecycle;
use crate::{impl_entity, string_enum};

string_enum! {
    pub enum DispatchStatus ("dispatch status") {
        Scheduled => "scheduled",
        Boarding => "boarding",
        Departed => "departed",
        InTransit => "in_transit",
        Arrived => "arrived",
        Delayed => "delayed",
        Cancelled => "cancelled",
    }
}

impl Lifecycle for DispatchStatus {
    const ENTITY: &'static str = "dispatch";

    fn allowed_next(&self) -> &'static [Self] {
        use DispatchStatus::*;
        match self {
            Scheduled => &[Boarding, Delayed, Cancelled],
            Boarding => &[Departed, Delayed, Cancelled],
            Departed => &[InTransit, Delayed],
            InTransit => &[Arrived, Delayed],
            Delayed => &[Boarding, Departed, InTransit, Cancelled],
            Arrived | Cancelled => &[],
        }
    }
}

impl DispatchStatus {
    /// Whether new passengers may still be added to the manifest.
    pub fn accepts_passengers(&self) -> bool {
        matches!(self, Self::Scheduled | Self::Boarding | Self::Delayed)
    }

    /// Whether the bus has left its origin.
    pub fn is_underway(&self) -> bool {
        matches!(self, Self::Departed | Self::InTransit)
    }
}

string_enum! {
    pub enum PassengerStatus ("passenger status") {
        Booked => "booked",
        CheckedIn => "checked_in",
        Boarded => "boarded",
        Completed => "completed",
        NoShow => "no_show",
        Cancelled => "cancelled",
    }
}

impl Lifecycle for PassengerStatus {
    const ENTITY: &'static str = "passenger";

    fn allowed_next(&self) -> &'static [Self] {
        use PassengerStatus::*;
        match self {
            Booked => &[CheckedIn, NoShow, Cancelled],
            CheckedIn => &[Boarded, NoShow, Cancelled],
            Boarded => &[Completed],
            Completed | NoShow | Cancelled => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Passenger {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seat_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_reference: Option<String>,
    pub status: PassengerStatus,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub checked_in_at: Option<OffsetDateTime>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub boarded_at: Option<OffsetDateTime>,
}

/// Passenger data supplied when adding to a manifest.
#[derive(Debug, Clone, Default)]
pub struct NewPassenger {
    pub name: String,
    pub phone: Option<String>,
    pub seat_number: Option<String>,
    pub booking_reference: Option<String>,
}

/// Denormalized manifest counters kept on the dispatch document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassengerCounts {
    pub total_passengers: u32,
    pub onboard_count: u32,
    pub completed_count: u32,
    pub no_show_count: u32,
}

impl PassengerCounts {
    pub fn tally(passengers: &[Passenger]) -> Self {
        let mut counts = Self::default();
        for p in passengers {
            match p.status {
                PassengerStatus::Cancelled => continue,
                PassengerStatus::Boarded => counts.onboard_count += 1,
                PassengerStatus::Completed => counts.completed_count += 1,
                PassengerStatus::NoShow => counts.no_show_count += 1,
                PassengerStatus::Booked | PassengerStatus::CheckedIn => {}
            }
            counts.total_passengers += 1;
        }
        counts
    }
}

/// Scheduling data for a new dispatch.
#[derive(Debug, Clone)]
pub struct DispatchSchedule {
    pub trip_id: Option<String>,
    pub bus_id: String,
    pub route_id: String,
    pub driver_id: String,
    pub conductor_id: Option<String>,
    pub departure_date: Date,
    pub departure_time: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dispatch {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub dispatch_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<String>,
    pub bus_id: String,
    pub route_id: String,
    pub driver_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conductor_id: Option<String>,
    #[serde(with = "crate::time::iso_date")]
    pub departure_date: Date,
    pub departure_time: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub actual_departure: Option<OffsetDateTime>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub actual_arrival: Option<OffsetDateTime>,
    pub status: DispatchStatus,
    #[serde(default)]
    pub passengers: Vec<Passenger>,
    #[serde(flatten)]
    pub counts: PassengerCounts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl_entity!(Dispatch, "dispatches");

impl Dispatch {
    pub fn new(vendor_id: impl Into<String>, schedule: DispatchSchedule) -> Self {
        Self {
            meta: RecordMeta::for_vendor(vendor_id),
            dispatch_number: generate_reference("DSP"),
            trip_id: schedule.trip_id,
            bus_id: schedule.bus_id,
            route_id: schedule.route_id,
            driver_id: schedule.driver_id,
            conductor_id: schedule.conductor_id,
            departure_date: schedule.departure_date,
            departure_time: schedule.departure_time,
            actual_departure: None,
            actual_arrival: None,
            status: DispatchStatus::Scheduled,
            passengers: Vec::new(),
            counts: PassengerCounts::default(),
            delay_reason: None,
            cancellation_reason: None,
            notes: schedule.notes,
        }
    }

    /// Move the dispatch to `next`, applying the manifest side effects of
    /// that status.
    ///
    /// `reason` is recorded for `delayed` and `cancelled`.
    pub fn change_status(&mut self, next: DispatchStatus, reason: Option<String>) -> Result<()> {
        self.status = self.status.transition_to(next)?;
        let now = OffsetDateTime::now_utc();

        match next {
            DispatchStatus::Departed | DispatchStatus::InTransit => {
                if self.actual_departure.is_none() {
                    self.actual_departure = Some(now);
                    self.mark_absent_passengers();
                }
            }
            DispatchStatus::Arrived => {
                self.actual_arrival = Some(now);
                for p in &mut self.passengers {
                    if p.status == PassengerStatus::Boarded {
                        p.status = PassengerStatus::Completed;
                    }
                }
            }
            DispatchStatus::Delayed => self.delay_reason = reason,
            DispatchStatus::Cancelled => {
                self.cancellation_reason = reason;
                for p in &mut self.passengers {
                    if !p.status.is_terminal() {
                        p.status = PassengerStatus::Cancelled;
                    }
                }
            }
            DispatchStatus::Scheduled | DispatchStatus::Boarding => {}
        }

        self.recount();
        Ok(())
    }

    /// Append a passenger to the manifest.
    ///
    /// `capacity` is the seat count of the assigned bus, when known.
    pub fn add_passenger(&mut self, passenger: NewPassenger, capacity: Option<u32>) -> Result<&Passenger> {
        if !self.status.accepts_passengers() {
            return Err(CoreError::rule(format!(
                "Passengers cannot be added to a dispatch that is {}",
                self.status
            )));
        }
        if let Some(capacity) = capacity
            && self.counts.total_passengers >= capacity
        {
            return Err(CoreError::rule(format!(
                "Bus capacity of {capacity} passengers reached"
            )));
        }
        if let Some(seat) = passenger.seat_number.as_deref()
            && self.passengers.iter().any(|p| {
                p.status != PassengerStatus::Cancelled && p.seat_number.as_deref() == Some(seat)
            })
        {
            return Err(CoreError::invalid_field(
                "seatNumber",
                format!("seat {seat} is already taken"),
            ));
        }

        self.passengers.push(Passenger {
            id: generate_id(),
            name: passenger.name,
            phone: passenger.phone,
            seat_number: passenger.seat_number,
            booking_reference: passenger.booking_reference,
            status: PassengerStatus::Booked,
            checked_in_at: None,
            boarded_at: None,
        });
        self.recount();
        Ok(&self.passengers[self.passengers.len() - 1])
    }

    /// Change one passenger's status. Returns `Ok(None)` when no passenger
    /// has the given id.
    pub fn update_passenger(
        &mut self,
        passenger_id: &str,
        next: PassengerStatus,
    ) -> Result<Option<Passenger>> {
        if self.status == DispatchStatus::Cancelled {
            return Err(CoreError::rule("Dispatch is cancelled"));
        }
        let Some(passenger) = self.passengers.iter_mut().find(|p| p.id == passenger_id) else {
            return Ok(None);
        };
        passenger.status = passenger.status.transition_to(next)?;
        let now = OffsetDateTime::now_utc();
        match next {
            PassengerStatus::CheckedIn => passenger.checked_in_at = Some(now),
            PassengerStatus::Boarded => passenger.boarded_at = Some(now),
            _ => {}
        }
        let updated = passenger.clone();
        self.recount();
        Ok(Some(updated))
    }

    /// Recompute the denormalized counters from the manifest.
    pub fn recount(&mut self) {
        self.counts = PassengerCounts::tally(&self.passengers);
    }

    /// Dispatches can be deleted only before anything has happened.
    pub fn is_deletable(&self) -> bool {
        matches!(self.status, DispatchStatus::Scheduled | DispatchStatus::Cancelled)
    }

    fn mark_absent_passengers(&mut self) {
        for p in &mut self.passengers {
            if matches!(p.status, PassengerStatus::Booked | PassengerStatus::CheckedIn) {
                p.status = PassengerStatus::NoShow;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::parse_transition;
    use time::macros::date;

    fn dispatch() -> Dispatch {
        Dispatch::new(
            "vendor-1",
            DispatchSchedule {
                trip_id: None,
                bus_id: "bus-1".into(),
                route_id: "route-1".into(),
                driver_id: "driver-1".into(),
                conductor_id: None,
                departure_date: date!(2026 - 05 - 01),
                departure_time: "08:00".into(),
                notes: None,
            },
        )
    }

    fn passenger(name: &str, seat: &str) -> NewPassenger {
        NewPassenger {
            name: name.into(),
            seat_number: Some(seat.into()),
            ..Default::default()
        }
    }

    #[test]
    fn new_dispatch_is_scheduled_with_reference() {
        let d = dispatch();
        assert_eq!(d.status, DispatchStatus::Scheduled);
        assert!(d.dispatch_number.starts_with("DSP-"));
        assert_eq!(d.counts, PassengerCounts::default());
    }

    #[test]
    fn happy_path_through_every_status() {
        let mut d = dispatch();
        d.add_passenger(passenger("Ada", "1A"), Some(40)).unwrap();
        for next in [
            DispatchStatus::Boarding,
            DispatchStatus::Departed,
            DispatchStatus::InTransit,
            DispatchStatus::Arrived,
        ] {
            d.change_status(next, None).unwrap();
        }
        assert!(d.actual_departure.is_some());
        assert!(d.actual_arrival.is_some());
        assert!(d.status.is_terminal());
    }

    #[test]
    fn rejects_skipping_and_terminal_moves() {
        let mut d = dispatch();
        let err = d.change_status(DispatchStatus::Arrived, None).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot change dispatch status from 'scheduled' to 'arrived'"
        );
        d.change_status(DispatchStatus::Cancelled, Some("storm".into())).unwrap();
        assert!(d.change_status(DispatchStatus::Boarding, None).is_err());
        assert_eq!(d.cancellation_reason.as_deref(), Some("storm"));
    }

    #[test]
    fn unknown_status_value_is_rejected() {
        let err = parse_transition(DispatchStatus::Scheduled, "teleported").unwrap_err();
        assert_eq!(err.to_string(), "Invalid dispatch status: 'teleported'");
    }

    #[test]
    fn delay_and_resume() {
        let mut d = dispatch();
        d.change_status(DispatchStatus::Delayed, Some("traffic".into())).unwrap();
        assert_eq!(d.delay_reason.as_deref(), Some("traffic"));
        d.change_status(DispatchStatus::Boarding, None).unwrap();
        assert_eq!(d.status, DispatchStatus::Boarding);
    }

    #[test]
    fn departure_marks_no_shows_and_arrival_completes_boarded() {
        let mut d = dispatch();
        let a = d.add_passenger(passenger("Ada", "1A"), None).unwrap().id.clone();
        let b = d.add_passenger(passenger("Bo", "1B"), None).unwrap().id.clone();
        d.add_passenger(passenger("Cy", "1C"), None).unwrap();

        d.change_status(DispatchStatus::Boarding, None).unwrap();
        d.update_passenger(&a, PassengerStatus::CheckedIn).unwrap();
        d.update_passenger(&a, PassengerStatus::Boarded).unwrap();
        d.update_passenger(&b, PassengerStatus::Cancelled).unwrap();
        assert_eq!(d.counts.total_passengers, 2);
        assert_eq!(d.counts.onboard_count, 1);

        d.change_status(DispatchStatus::Departed, None).unwrap();
        assert_eq!(d.counts.no_show_count, 1);

        d.change_status(DispatchStatus::InTransit, None).unwrap();
        d.change_status(DispatchStatus::Arrived, None).unwrap();
        assert_eq!(
            d.counts,
            PassengerCounts {
                total_passengers: 2,
                onboard_count: 0,
                completed_count: 1,
                no_show_count: 1,
            }
        );
    }

    #[test]
    fn capacity_and_seat_rules() {
        let mut d = dispatch();
        d.add_passenger(passenger("Ada", "1A"), Some(2)).unwrap();
        let err = d.add_passenger(passenger("Bo", "1A"), Some(2)).unwrap_err();
        assert!(err.to_string().contains("seat 1A"));
        d.add_passenger(passenger("Bo", "1B"), Some(2)).unwrap();
        let err = d.add_passenger(passenger("Cy", "1C"), Some(2)).unwrap_err();
        assert_eq!(err.to_string(), "Bus capacity of 2 passengers reached");
    }

    #[test]
    fn no_passengers_after_departure() {
        let mut d = dispatch();
        d.change_status(DispatchStatus::Boarding, None).unwrap();
        d.change_status(DispatchStatus::Departed, None).unwrap();
        assert!(d.add_passenger(passenger("Late", "9Z"), None).is_err());
    }

    #[test]
    fn unknown_passenger_is_none() {
        let mut d = dispatch();
        assert!(d.update_passenger("nope", PassengerStatus::CheckedIn).unwrap().is_none());
    }

    #[test]
    fn passenger_lifecycle_rejects_backwards_moves() {
        let mut d = dispatch();
        let id = d.add_passenger(passenger("Ada", "1A"), None).unwrap().id.clone();
        d.update_passenger(&id, PassengerStatus::CheckedIn).unwrap();
        let err = d.update_passenger(&id, PassengerStatus::Booked).unwrap_err();
        assert!(err.to_string().contains("passenger"));
    }

    #[test]
    fn json_shape_is_flat_camel_case() {
        let d = dispatch();
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["vendorId"], "vendor-1");
        assert_eq!(json["departureDate"], "2026-05-01");
        assert_eq!(json["status"], "scheduled");
        assert_eq!(json["totalPassengers"], 0);
        let back: Dispatch = serde_json::from_value(json).unwrap();
        assert_eq!(back, d);
    }
}
