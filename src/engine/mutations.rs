use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, Weekday};
use tokio::sync::RwLock;
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::time::{local_now, weekday_of, TimeOfDay};

use super::slots::compute_available_slots;
use super::{Engine, EngineError};

impl Engine {
    pub async fn create_stylist(&self, id: Ulid, name: Option<String>) -> Result<(), EngineError> {
        if self.state.len() >= MAX_STYLISTS {
            return Err(EngineError::LimitExceeded("too many stylists"));
        }
        if let Some(ref n) = name
            && n.len() > MAX_NAME_LEN {
                return Err(EngineError::LimitExceeded("stylist name too long"));
            }
        if self.state.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        self.state
            .insert(id, Arc::new(RwLock::new(StylistState::new(id, name))));
        info!(stylist = %id, "stylist created");
        Ok(())
    }

    /// Remove a stylist together with their schedule and appointments.
    pub async fn delete_stylist(&self, id: Ulid) -> Result<(), EngineError> {
        let (_, rs) = self.state.remove(&id).ok_or(EngineError::NotFound(id))?;
        let guard = rs.read().await;
        for w in &guard.windows {
            self.entity_to_stylist.remove(&w.id);
        }
        for a in &guard.appointments {
            self.entity_to_stylist.remove(&a.id);
        }
        info!(
            stylist = %id,
            windows = guard.windows.len(),
            appointments = guard.appointments.len(),
            "stylist deleted"
        );
        Ok(())
    }

    pub async fn add_window(
        &self,
        id: Ulid,
        stylist_id: Ulid,
        day: Weekday,
        start: TimeOfDay,
        end: TimeOfDay,
    ) -> Result<(), EngineError> {
        if start >= end {
            return Err(EngineError::InvalidWindow { start, end });
        }
        let rs = self
            .get_stylist(&stylist_id)
            .ok_or(EngineError::NotFound(stylist_id))?;
        self.claim_entity(id, stylist_id)?;
        let mut guard = rs.write().await;
        if guard.windows.len() >= MAX_WINDOWS_PER_STYLIST {
            self.entity_to_stylist.remove(&id);
            return Err(EngineError::LimitExceeded("too many schedule windows"));
        }
        guard.add_window(ScheduleWindow {
            id,
            stylist_id,
            window: WeeklyWindow::new(day, start, end),
        });
        debug!(stylist = %stylist_id, %day, %start, %end, "window added");
        Ok(())
    }

    pub async fn remove_window(&self, id: Ulid) -> Result<(), EngineError> {
        let (_, mut guard) = self.resolve_entity_write(&id).await?;
        guard.remove_window(id).ok_or(EngineError::NotFound(id))?;
        self.entity_to_stylist.remove(&id);
        Ok(())
    }

    pub async fn create_offering(
        &self,
        id: Ulid,
        kind: OfferingKind,
        name: Option<String>,
        duration_minutes: Minutes,
    ) -> Result<(), EngineError> {
        if !(0..=MAX_DURATION_MINUTES).contains(&duration_minutes) {
            return Err(EngineError::InvalidDuration(duration_minutes));
        }
        if self.offerings.len() >= MAX_OFFERINGS {
            return Err(EngineError::LimitExceeded("too many offerings"));
        }
        if let Some(ref n) = name
            && n.len() > MAX_NAME_LEN {
                return Err(EngineError::LimitExceeded("offering name too long"));
            }
        if self.offerings.contains_key(&id) {
            return Err(EngineError::AlreadyExists(id));
        }
        self.offerings.insert(
            id,
            Offering {
                id,
                kind,
                name,
                duration_minutes,
            },
        );
        debug!(offering = %id, kind = kind.as_str(), duration_minutes, "offering created");
        Ok(())
    }

    /// Existing appointments keep the times they were booked with.
    pub async fn delete_offering(&self, id: Ulid) -> Result<(), EngineError> {
        self.offerings
            .remove(&id)
            .map(|_| ())
            .ok_or(EngineError::NotFound(id))
    }

    pub async fn book_appointment(
        &self,
        id: Ulid,
        stylist_id: Ulid,
        offering_id: Ulid,
        date: NaiveDate,
        start: TimeOfDay,
        client: Option<String>,
    ) -> Result<Appointment, EngineError> {
        self.book_appointment_at(id, stylist_id, offering_id, date, start, client, local_now())
            .await
    }

    /// Book `start` on `date` if it is still an offered slot as of `now`.
    ///
    /// Runs under the stylist's write lock, so two clients racing for the
    /// same slot cannot both succeed.
    #[allow(clippy::too_many_arguments)]
    pub async fn book_appointment_at(
        &self,
        id: Ulid,
        stylist_id: Ulid,
        offering_id: Ulid,
        date: NaiveDate,
        start: TimeOfDay,
        client: Option<String>,
        now: NaiveDateTime,
    ) -> Result<Appointment, EngineError> {
        if let Some(ref c) = client
            && c.len() > MAX_NAME_LEN {
                return Err(EngineError::LimitExceeded("client name too long"));
            }
        let duration = self
            .offering_duration(&offering_id)
            .ok_or(EngineError::NotFound(offering_id))?;
        if duration <= 0 {
            return Err(EngineError::NotBookable(offering_id));
        }
        let end = TimeOfDay::from_minutes(start.minutes() + duration)
            .ok_or(EngineError::OutsideSchedule { date, start })?;
        let rs = self
            .get_stylist(&stylist_id)
            .ok_or(EngineError::NotFound(stylist_id))?;

        self.claim_entity(id, stylist_id)?;
        let mut guard = rs.write().await;
        let requested = CandidateSlot {
            start: start.minutes(),
            end: end.minutes(),
        };
        if let Err(e) = check_bookable(&guard, requested, duration, date, start, now) {
            self.entity_to_stylist.remove(&id);
            return Err(e);
        }

        let appointment = Appointment {
            id,
            stylist_id,
            offering_id,
            date,
            start,
            end,
            status: AppointmentStatus::booked(),
            client,
        };
        guard.insert_appointment(appointment.clone());
        info!(appointment = %id, stylist = %stylist_id, %date, %start, %end, "appointment booked");
        Ok(appointment)
    }

    /// Replace the free-text status. Moving a cancelled appointment back to an
    /// active status re-checks it against the rest of that day's bookings.
    pub async fn set_appointment_status(
        &self,
        id: Ulid,
        status: AppointmentStatus,
    ) -> Result<(), EngineError> {
        if status.as_str().len() > MAX_STATUS_LEN {
            return Err(EngineError::LimitExceeded("status too long"));
        }
        let (_, mut guard) = self.resolve_entity_write(&id).await?;
        let current = guard
            .appointments
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .ok_or(EngineError::NotFound(id))?;

        if current.status.is_cancelled() && status.occupies_calendar() {
            let interval = current.interval();
            let slot = CandidateSlot {
                start: interval.start.minutes(),
                end: interval.end.minutes(),
            };
            if let Some(other) = guard.appointments_on(current.date).iter().find(|a| {
                a.id != id && a.status.occupies_calendar() && slot.overlaps(&a.interval())
            }) {
                return Err(EngineError::Conflict(other.id));
            }
        }

        if let Some(a) = guard.appointment_mut(id) {
            info!(appointment = %id, from = a.status.as_str(), to = status.as_str(), "status changed");
            a.status = status;
        }
        Ok(())
    }

    pub async fn delete_appointment(&self, id: Ulid) -> Result<(), EngineError> {
        let (_, mut guard) = self.resolve_entity_write(&id).await?;
        guard.remove_appointment(id).ok_or(EngineError::NotFound(id))?;
        self.entity_to_stylist.remove(&id);
        Ok(())
    }
}

/// Whether `requested` on `date` can be added to `stylist`'s calendar as of `now`.
fn check_bookable(
    stylist: &StylistState,
    requested: CandidateSlot,
    duration: Minutes,
    date: NaiveDate,
    start: TimeOfDay,
    now: NaiveDateTime,
) -> Result<(), EngineError> {
    if stylist.appointments.len() >= MAX_APPOINTMENTS_PER_STYLIST {
        return Err(EngineError::LimitExceeded("too many appointments"));
    }
    if let Some(existing) = stylist
        .appointments_on(date)
        .iter()
        .find(|a| a.status.occupies_calendar() && requested.overlaps(&a.interval()))
    {
        metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
        return Err(EngineError::Conflict(existing.id));
    }
    let windows = stylist.windows_on(weekday_of(date));
    let offered = compute_available_slots(&windows, duration, &[], date, now);
    if !offered.iter().any(|s| s.start == requested.start) {
        return Err(EngineError::OutsideSchedule { date, start });
    }
    Ok(())
}
