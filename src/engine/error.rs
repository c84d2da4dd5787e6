use chrono::NaiveDate;
use ulid::Ulid;

use crate::time::TimeOfDay;

#[derive(Debug)]
pub enum EngineError {
    NotFound(Ulid),
    AlreadyExists(Ulid),
    /// The requested time strictly overlaps this existing appointment.
    Conflict(Ulid),
    /// The requested start is not one of the slots offered for that date.
    OutsideSchedule {
        date: NaiveDate,
        start: TimeOfDay,
    },
    NotBookable(Ulid),
    InvalidWindow {
        start: TimeOfDay,
        end: TimeOfDay,
    },
    InvalidDuration(i64),
    LimitExceeded(&'static str),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound(id) => write!(f, "not found: {id}"),
            EngineError::AlreadyExists(id) => write!(f, "already exists: {id}"),
            EngineError::Conflict(id) => write!(f, "conflict with appointment: {id}"),
            EngineError::OutsideSchedule { date, start } => {
                write!(f, "{date} {start} is not an available slot")
            }
            EngineError::NotBookable(id) => {
                write!(f, "offering {id} has no bookable duration")
            }
            EngineError::InvalidWindow { start, end } => {
                write!(f, "window {start}-{end} must start before it ends")
            }
            EngineError::InvalidDuration(d) => write!(f, "invalid duration: {d} minutes"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}
