use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::time::{intervals_overlap, TimeOfDay};

/// Length of a service or package in minutes. Zero or negative means "not bookable".
pub type Minutes = i64;

/// A stylist's recurring availability for one weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyWindow {
    pub day: Weekday,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl WeeklyWindow {
    pub fn new(day: Weekday, start: TimeOfDay, end: TimeOfDay) -> Self {
        Self { day, start, end }
    }

    /// Returns true if the slot lies entirely inside this window.
    pub fn contains(&self, slot: &CandidateSlot) -> bool {
        self.start.minutes() <= slot.start && slot.end <= self.end.minutes()
    }
}

/// Time already taken by a non-cancelled appointment on the target date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookedInterval {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

impl BookedInterval {
    pub fn new(start: TimeOfDay, end: TimeOfDay) -> Self {
        Self { start, end }
    }
}

/// One offerable appointment, `end = start + duration`.
///
/// Bounds are minutes since midnight; use `start_hhmm`/`end_hhmm` for the wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSlot {
    pub start: Minutes,
    pub end: Minutes,
}

impl CandidateSlot {
    pub fn duration_minutes(&self) -> Minutes {
        self.end - self.start
    }

    pub fn overlaps(&self, booked: &BookedInterval) -> bool {
        intervals_overlap(self.start, self.end, booked.start.minutes(), booked.end.minutes())
    }

    pub fn start_hhmm(&self) -> String {
        crate::time::to_hhmm(self.start)
    }

    pub fn end_hhmm(&self) -> String {
        crate::time::to_hhmm(self.end)
    }
}

/// Free-text appointment status as stored by the front desk.
///
/// Matching is by case-insensitive substring, so "Cancelled by client" and
/// "CANCELED" both count as cancelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppointmentStatus(String);

impl AppointmentStatus {
    pub fn new(status: impl Into<String>) -> Self {
        Self(status.into())
    }

    pub fn booked() -> Self {
        Self("booked".into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.to_lowercase().contains("cancel")
    }

    /// Everything except a cancellation keeps the chair busy.
    pub fn occupies_calendar(&self) -> bool {
        !self.is_cancelled()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferingKind {
    Service,
    Package,
}

impl OfferingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferingKind::Service => "service",
            OfferingKind::Package => "package",
        }
    }
}

/// A bookable service or package and the chair time it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offering {
    pub id: Ulid,
    pub kind: OfferingKind,
    pub name: Option<String>,
    pub duration_minutes: Minutes,
}

/// A stored weekly window, owned by one stylist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleWindow {
    pub id: Ulid,
    pub stylist_id: Ulid,
    pub window: WeeklyWindow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Appointment {
    pub id: Ulid,
    pub stylist_id: Ulid,
    pub offering_id: Ulid,
    pub date: NaiveDate,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    pub status: AppointmentStatus,
    pub client: Option<String>,
}

impl Appointment {
    pub fn interval(&self) -> BookedInterval {
        BookedInterval::new(self.start, self.end)
    }
}

#[derive(Debug, Clone)]
pub struct StylistState {
    pub id: Ulid,
    pub name: Option<String>,
    /// Weekly windows in insertion order. Never merged.
    pub windows: Vec<ScheduleWindow>,
    /// Appointments sorted by `(date, start)`.
    pub appointments: Vec<Appointment>,
}

impl StylistState {
    pub fn new(id: Ulid, name: Option<String>) -> Self {
        Self {
            id,
            name,
            windows: Vec::new(),
            appointments: Vec::new(),
        }
    }

    pub fn add_window(&mut self, window: ScheduleWindow) {
        self.windows.push(window);
    }

    pub fn remove_window(&mut self, id: Ulid) -> Option<ScheduleWindow> {
        let pos = self.windows.iter().position(|w| w.id == id)?;
        Some(self.windows.remove(pos))
    }

    /// Windows for one weekday, in insertion order.
    pub fn windows_on(&self, day: Weekday) -> Vec<WeeklyWindow> {
        self.windows
            .iter()
            .filter(|w| w.window.day == day)
            .map(|w| w.window)
            .collect()
    }

    /// Insert appointment maintaining sort order by `(date, start)`.
    pub fn insert_appointment(&mut self, appointment: Appointment) {
        let key = (appointment.date, appointment.start);
        let pos = self
            .appointments
            .partition_point(|a| (a.date, a.start) <= key);
        self.appointments.insert(pos, appointment);
    }

    pub fn remove_appointment(&mut self, id: Ulid) -> Option<Appointment> {
        let pos = self.appointments.iter().position(|a| a.id == id)?;
        Some(self.appointments.remove(pos))
    }

    pub fn appointment_mut(&mut self, id: Ulid) -> Option<&mut Appointment> {
        self.appointments.iter_mut().find(|a| a.id == id)
    }

    /// All appointments on `date`, cancelled ones included.
    pub fn appointments_on(&self, date: NaiveDate) -> &[Appointment] {
        let lo = self.appointments.partition_point(|a| a.date < date);
        let hi = self.appointments.partition_point(|a| a.date <= date);
        &self.appointments[lo..hi]
    }

    /// Intervals that block new bookings on `date`.
    pub fn booked_on(&self, date: NaiveDate) -> Vec<BookedInterval> {
        self.appointments_on(date)
            .iter()
            .filter(|a| a.status.occupies_calendar())
            .map(Appointment::interval)
            .collect()
    }
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StylistInfo {
    pub id: Ulid,
    pub name: Option<String>,
    pub windows: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> TimeOfDay {
        s.parse().unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        crate::time::parse_date(s).unwrap()
    }

    fn appointment(day: &str, start: &str, end: &str, status: &str) -> Appointment {
        Appointment {
            id: Ulid::new(),
            stylist_id: Ulid::nil(),
            offering_id: Ulid::nil(),
            date: date(day),
            start: t(start),
            end: t(end),
            status: AppointmentStatus::new(status),
            client: None,
        }
    }

    #[test]
    fn status_substring_policy() {
        assert!(AppointmentStatus::new("Cancelled").is_cancelled());
        assert!(AppointmentStatus::new("canceled by client").is_cancelled());
        assert!(AppointmentStatus::new("CANCEL").is_cancelled());
        assert!(!AppointmentStatus::new("booked").is_cancelled());
        assert!(AppointmentStatus::new("completed").occupies_calendar());
        assert!(AppointmentStatus::new("walk-in").occupies_calendar());
        assert!(AppointmentStatus::new("ongoing").occupies_calendar());
        assert!(!AppointmentStatus::new("Cancelled").occupies_calendar());
    }

    #[test]
    fn window_contains_slot() {
        let w = WeeklyWindow::new(Weekday::Mon, t("09:00"), t("12:00"));
        assert!(w.contains(&CandidateSlot { start: 540, end: 600 }));
        assert!(w.contains(&CandidateSlot { start: 660, end: 720 }));
        assert!(!w.contains(&CandidateSlot { start: 690, end: 750 }));
        assert!(!w.contains(&CandidateSlot { start: 525, end: 585 }));
    }

    #[test]
    fn slot_overlap_back_to_back() {
        let slot = CandidateSlot { start: 630, end: 690 };
        assert!(!slot.overlaps(&BookedInterval::new(t("10:00"), t("10:30"))));
        assert!(slot.overlaps(&BookedInterval::new(t("10:00"), t("10:31"))));
        assert_eq!(slot.start_hhmm(), "10:30");
        assert_eq!(slot.end_hhmm(), "11:30");
    }

    #[test]
    fn windows_on_keeps_insertion_order() {
        let mut s = StylistState::new(Ulid::new(), None);
        for (day, start, end) in [
            (Weekday::Tue, "14:00", "16:00"),
            (Weekday::Mon, "09:00", "10:00"),
            (Weekday::Tue, "09:00", "11:00"),
        ] {
            s.add_window(ScheduleWindow {
                id: Ulid::new(),
                stylist_id: s.id,
                window: WeeklyWindow::new(day, t(start), t(end)),
            });
        }
        let tue = s.windows_on(Weekday::Tue);
        assert_eq!(tue.len(), 2);
        assert_eq!(tue[0].start, t("14:00"));
        assert_eq!(tue[1].start, t("09:00"));
        assert!(s.windows_on(Weekday::Sun).is_empty());
    }

    #[test]
    fn appointments_sorted_by_date_then_start() {
        let mut s = StylistState::new(Ulid::new(), None);
        s.insert_appointment(appointment("2026-10-20", "09:00", "10:00", "booked"));
        s.insert_appointment(appointment("2026-10-19", "15:00", "16:00", "booked"));
        s.insert_appointment(appointment("2026-10-19", "09:00", "10:00", "booked"));
        let starts: Vec<_> = s
            .appointments
            .iter()
            .map(|a| (a.date.to_string(), a.start.to_string()))
            .collect();
        assert_eq!(
            starts,
            vec![
                ("2026-10-19".to_string(), "09:00".to_string()),
                ("2026-10-19".to_string(), "15:00".to_string()),
                ("2026-10-20".to_string(), "09:00".to_string()),
            ]
        );
    }

    #[test]
    fn booked_on_skips_cancelled_and_other_days() {
        let mut s = StylistState::new(Ulid::new(), None);
        s.insert_appointment(appointment("2026-10-19", "09:00", "10:00", "Completed"));
        s.insert_appointment(appointment("2026-10-19", "11:00", "12:00", "Cancelled"));
        s.insert_appointment(appointment("2026-10-19", "13:00", "14:00", "walk-in"));
        s.insert_appointment(appointment("2026-10-18", "09:00", "10:00", "booked"));
        let booked = s.booked_on(date("2026-10-19"));
        assert_eq!(
            booked,
            vec![
                BookedInterval::new(t("09:00"), t("10:00")),
                BookedInterval::new(t("13:00"), t("14:00")),
            ]
        );
        assert_eq!(s.appointments_on(date("2026-10-19")).len(), 3);
        assert!(s.booked_on(date("2026-10-21")).is_empty());
    }

    #[test]
    fn remove_nonexistent_returns_none() {
        let mut s = StylistState::new(Ulid::new(), None);
        s.insert_appointment(appointment("2026-10-19", "09:00", "10:00", "booked"));
        assert!(s.remove_appointment(Ulid::new()).is_none());
        assert!(s.remove_window(Ulid::new()).is_none());
        assert_eq!(s.appointments.len(), 1);
    }
}
