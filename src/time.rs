use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

pub const MINUTES_PER_DAY: i64 = 24 * 60;

/// Step between candidate slot starts, and the granularity of the same-day cutoff.
pub const SLOT_QUANTUM_MINUTES: i64 = 15;

/// Minutes since midnight, always in `[0, 1440)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub fn from_minutes(minutes: i64) -> Option<Self> {
        if (0..MINUTES_PER_DAY).contains(&minutes) {
            Some(Self(minutes as u16))
        } else {
            None
        }
    }

    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self((hour * 60 + minute) as u16))
        } else {
            None
        }
    }

    pub fn minutes(self) -> i64 {
        self.0 as i64
    }

    /// Wall-clock time of `now`, truncated to the minute.
    pub fn of(now: &NaiveDateTime) -> Self {
        Self((now.hour() * 60 + now.minute()) as u16)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl FromStr for TimeOfDay {
    type Err = TimeParseError;

    /// Accepts `HH:MM` and `HH:MM:SS` (seconds are dropped).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || TimeParseError(s.to_string());
        let mut parts = s.trim().split(':');
        let hour = parts.next().ok_or_else(bad)?;
        let minute = parts.next().ok_or_else(bad)?;
        if let Some(second) = parts.next() {
            second.parse::<u32>().ok().filter(|s| *s < 60).ok_or_else(bad)?;
        }
        if parts.next().is_some() || hour.is_empty() || hour.len() > 2 || minute.len() != 2 {
            return Err(bad());
        }
        let hour: u32 = hour.parse().map_err(|_| bad())?;
        let minute: u32 = minute.parse().map_err(|_| bad())?;
        Self::from_hm(hour, minute).ok_or_else(bad)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = TimeParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(t: TimeOfDay) -> String {
        t.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeParseError(pub String);

impl fmt::Display for TimeParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid time of day: {:?} (expected HH:MM)", self.0)
    }
}

impl std::error::Error for TimeParseError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekdayParseError(pub String);

impl fmt::Display for WeekdayParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid weekday: {:?}", self.0)
    }
}

impl std::error::Error for WeekdayParseError {}

// ── String helpers (HH:MM wire format) ──────────────────────────

pub fn minutes_since_midnight(hhmm: &str) -> Result<i64, TimeParseError> {
    hhmm.parse::<TimeOfDay>().map(TimeOfDay::minutes)
}

/// Format minutes as `HH:MM`. Values outside one day wrap around midnight.
pub fn to_hhmm(minutes: i64) -> String {
    let m = minutes.rem_euclid(MINUTES_PER_DAY);
    format!("{:02}:{:02}", m / 60, m % 60)
}

pub fn add_minutes(hhmm: &str, delta: i64) -> Result<String, TimeParseError> {
    Ok(to_hhmm(minutes_since_midnight(hhmm)? + delta))
}

// ── Interval arithmetic ─────────────────────────────────────────

/// Strict overlap: intervals that only touch at an endpoint do not overlap.
pub fn intervals_overlap(a_start: i64, a_end: i64, b_start: i64, b_end: i64) -> bool {
    a_start.max(b_start) < a_end.min(b_end)
}

pub fn round_up_to_quantum(minutes: i64, quantum: i64) -> i64 {
    if quantum <= 0 {
        return minutes;
    }
    minutes.div_euclid(quantum) * quantum + if minutes.rem_euclid(quantum) == 0 { 0 } else { quantum }
}

// ── Weekdays ────────────────────────────────────────────────────

/// Accepts a day index (0 = Sunday .. 6 = Saturday) or a 3-letter or full
/// English day name, case-insensitive.
pub fn normalize_weekday(input: &str) -> Result<Weekday, WeekdayParseError> {
    let s = input.trim().to_lowercase();
    if let Ok(index) = s.parse::<u32>() {
        return weekday_from_index(index).ok_or_else(|| WeekdayParseError(input.to_string()));
    }
    let day = match s.as_str() {
        "sun" | "sunday" => Weekday::Sun,
        "mon" | "monday" => Weekday::Mon,
        "tue" | "tuesday" => Weekday::Tue,
        "wed" | "wednesday" => Weekday::Wed,
        "thu" | "thursday" => Weekday::Thu,
        "fri" | "friday" => Weekday::Fri,
        "sat" | "saturday" => Weekday::Sat,
        _ => return Err(WeekdayParseError(input.to_string())),
    };
    Ok(day)
}

pub fn weekday_from_index(index: u32) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

/// Canonical 3-letter label (`Mon` .. `Sun`).
pub fn day_label(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Mon",
        Weekday::Tue => "Tue",
        Weekday::Wed => "Wed",
        Weekday::Thu => "Thu",
        Weekday::Fri => "Fri",
        Weekday::Sat => "Sat",
        Weekday::Sun => "Sun",
    }
}

pub fn weekday_of(date: NaiveDate) -> Weekday {
    date.weekday()
}

pub fn parse_date(s: &str) -> Result<NaiveDate, chrono::ParseError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
}

pub fn local_now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_format() {
        assert_eq!(minutes_since_midnight("09:30").unwrap(), 570);
        assert_eq!(minutes_since_midnight("00:00").unwrap(), 0);
        assert_eq!(minutes_since_midnight("23:59").unwrap(), 1439);
        assert_eq!(to_hhmm(570), "09:30");
        assert_eq!(to_hhmm(5), "00:05");
        assert_eq!("7:05".parse::<TimeOfDay>().unwrap().to_string(), "07:05");
    }

    #[test]
    fn seconds_are_dropped() {
        assert_eq!(minutes_since_midnight("14:45:00").unwrap(), 885);
        assert_eq!(minutes_since_midnight("14:45:59").unwrap(), 885);
    }

    #[test]
    fn malformed_times_rejected() {
        for bad in ["", "9", "24:00", "12:60", "12:5", "ab:cd", "12:00:61", "12:00:00:00", "-1:00"] {
            assert!(minutes_since_midnight(bad).is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn add_minutes_wraps_midnight() {
        assert_eq!(add_minutes("09:00", 45).unwrap(), "09:45");
        assert_eq!(add_minutes("23:30", 45).unwrap(), "00:15");
        assert_eq!(add_minutes("00:10", -20).unwrap(), "23:50");
    }

    #[test]
    fn overlap_is_strict() {
        assert!(intervals_overlap(570, 630, 600, 660));
        assert!(!intervals_overlap(540, 600, 600, 660)); // back to back
        assert!(!intervals_overlap(600, 660, 540, 600));
        assert!(intervals_overlap(600, 660, 540, 720)); // contained
    }

    #[test]
    fn round_up() {
        assert_eq!(round_up_to_quantum(607, 15), 615);
        assert_eq!(round_up_to_quantum(615, 15), 615);
        assert_eq!(round_up_to_quantum(890, 15), 900);
        assert_eq!(round_up_to_quantum(0, 15), 0);
        assert_eq!(round_up_to_quantum(1, 15), 15);
    }

    #[test]
    fn weekday_forms() {
        assert_eq!(normalize_weekday("0").unwrap(), Weekday::Sun);
        assert_eq!(normalize_weekday("6").unwrap(), Weekday::Sat);
        assert_eq!(normalize_weekday("tue").unwrap(), Weekday::Tue);
        assert_eq!(normalize_weekday(" Wednesday ").unwrap(), Weekday::Wed);
        assert_eq!(normalize_weekday("FRI").unwrap(), Weekday::Fri);
        assert!(normalize_weekday("7").is_err());
        assert!(normalize_weekday("someday").is_err());
        assert_eq!(day_label(normalize_weekday("thursday").unwrap()), "Thu");
    }

    #[test]
    fn weekday_index_matches_names() {
        assert_eq!(weekday_from_index(0), Some(Weekday::Sun));
        assert_eq!(weekday_from_index(1), Some(Weekday::Mon));
        assert_eq!(weekday_from_index(6), Some(Weekday::Sat));
        assert_eq!(weekday_from_index(7), None);
    }

    #[test]
    fn weekday_of_date() {
        let d = parse_date("2026-10-19").unwrap();
        assert_eq!(weekday_of(d), Weekday::Mon);
        assert!(parse_date("2026-13-01").is_err());
    }

    #[test]
    fn serde_uses_hhmm() {
        let t: TimeOfDay = serde_json::from_str("\"08:15\"").unwrap();
        assert_eq!(t.minutes(), 495);
        assert_eq!(serde_json::to_string(&t).unwrap(), "\"08:15\"");
    }
}
