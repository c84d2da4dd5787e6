use std::time::Instant;

use chrono::{NaiveDate, NaiveDateTime, Weekday};
use tracing::debug;
use ulid::Ulid;

use crate::model::*;
use crate::time::{local_now, weekday_of};

use super::slots::compute_available_slots;
use super::Engine;

impl Engine {
    /// Duration source: minutes needed by a service or package.
    pub fn offering_duration(&self, offering_id: &Ulid) -> Option<Minutes> {
        self.offerings.get(offering_id).map(|o| o.duration_minutes)
    }

    /// Schedule source: a stylist's windows for one weekday, unmerged, in
    /// insertion order.
    pub async fn schedule_for(&self, stylist_id: Ulid, day: Weekday) -> Vec<WeeklyWindow> {
        match self.get_stylist(&stylist_id) {
            Some(rs) => rs.read().await.windows_on(day),
            None => Vec::new(),
        }
    }

    /// Booking source: non-cancelled appointment intervals on `date`.
    pub async fn booked_intervals(&self, stylist_id: Ulid, date: NaiveDate) -> Vec<BookedInterval> {
        match self.get_stylist(&stylist_id) {
            Some(rs) => rs.read().await.booked_on(date),
            None => Vec::new(),
        }
    }

    pub async fn available_slots(
        &self,
        stylist_id: Ulid,
        offering_id: Ulid,
        date: NaiveDate,
    ) -> Vec<CandidateSlot> {
        self.available_slots_at(stylist_id, offering_id, date, local_now())
            .await
    }

    /// Slots for `(stylist, offering, date)` as of `now`.
    ///
    /// Windows and bookings are read under one lock so the result reflects a
    /// single point in time. An unknown stylist or offering has no slots.
    pub async fn available_slots_at(
        &self,
        stylist_id: Ulid,
        offering_id: Ulid,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> Vec<CandidateSlot> {
        let started = Instant::now();
        let duration = self.offering_duration(&offering_id).unwrap_or(0);
        let Some(rs) = self.get_stylist(&stylist_id) else {
            return Vec::new();
        };
        let guard = rs.read().await;

        let windows = guard.windows_on(weekday_of(date));
        let booked = guard.booked_on(date);
        let slots = compute_available_slots(&windows, duration, &booked, date, now);
        drop(guard);

        metrics::histogram!(crate::observability::SLOT_QUERY_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        metrics::histogram!(crate::observability::SLOTS_RETURNED).record(slots.len() as f64);
        debug!(
            stylist = %stylist_id,
            offering = %offering_id,
            %date,
            windows = windows.len(),
            booked = booked.len(),
            slots = slots.len(),
            "slots computed"
        );
        slots
    }

    pub async fn list_stylists(&self) -> Vec<StylistInfo> {
        let handles: Vec<_> = self.state.iter().map(|e| e.value().clone()).collect();
        let mut out = Vec::with_capacity(handles.len());
        for rs in handles {
            let guard = rs.read().await;
            out.push(StylistInfo {
                id: guard.id,
                name: guard.name.clone(),
                windows: guard.windows.len(),
            });
        }
        out.sort_by_key(|s| s.id);
        out
    }

    pub fn list_offerings(&self) -> Vec<Offering> {
        let mut out: Vec<Offering> = self.offerings.iter().map(|e| e.value().clone()).collect();
        out.sort_by_key(|o| o.id);
        out
    }

    pub async fn get_windows(&self, stylist_id: Ulid) -> Vec<ScheduleWindow> {
        match self.get_stylist(&stylist_id) {
            Some(rs) => rs.read().await.windows.clone(),
            None => Vec::new(),
        }
    }

    /// Appointments of a stylist, optionally for one date. Cancelled ones included.
    pub async fn get_appointments(
        &self,
        stylist_id: Ulid,
        date: Option<NaiveDate>,
    ) -> Vec<Appointment> {
        let Some(rs) = self.get_stylist(&stylist_id) else {
            return Vec::new();
        };
        let guard = rs.read().await;
        match date {
            Some(d) => guard.appointments_on(d).to_vec(),
            None => guard.appointments.clone(),
        }
    }
}
