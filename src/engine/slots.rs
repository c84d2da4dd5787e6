use chrono::{NaiveDate, NaiveDateTime};

use crate::model::*;
use crate::time::{round_up_to_quantum, TimeOfDay, SLOT_QUANTUM_MINUTES};

// ── Slot Algorithm ────────────────────────────────────────────────

/// Compute bookable slots for one stylist on one date.
///
/// `windows` must already be filtered to the weekday of `target_date`, and
/// `booked` to the same stylist and date with cancelled appointments removed.
/// Windows are walked independently in input order; within a window, starts
/// step by 15 minutes from the window start (or from the same-day cutoff,
/// when `target_date` is today's date according to `now`).
///
/// Degenerate input is not an error: no windows or `duration <= 0` gives an
/// empty list.
pub fn compute_available_slots(
    windows: &[WeeklyWindow],
    duration: Minutes,
    booked: &[BookedInterval],
    target_date: NaiveDate,
    now: NaiveDateTime,
) -> Vec<CandidateSlot> {
    if duration <= 0 || windows.is_empty() {
        return Vec::new();
    }

    let cutoff = same_day_cutoff(target_date, now);
    let mut slots = Vec::new();

    for w in windows {
        let mut start_min = w.start.minutes();
        if let Some(cutoff) = cutoff {
            start_min = start_min.max(cutoff);
        }
        let latest_start = w.end.minutes() - duration;
        if latest_start < start_min {
            continue;
        }

        let mut cursor = start_min;
        while cursor <= latest_start {
            let candidate = CandidateSlot {
                start: cursor,
                end: cursor + duration,
            };
            if !booked.iter().any(|b| candidate.overlaps(b)) {
                slots.push(candidate);
            }
            cursor += SLOT_QUANTUM_MINUTES;
        }
    }

    slots
}

/// Earliest allowed start when booking for today: now rounded up to the quantum.
pub fn same_day_cutoff(target_date: NaiveDate, now: NaiveDateTime) -> Option<Minutes> {
    if target_date != now.date() {
        return None;
    }
    Some(round_up_to_quantum(
        TimeOfDay::of(&now).minutes(),
        SLOT_QUANTUM_MINUTES,
    ))
}
