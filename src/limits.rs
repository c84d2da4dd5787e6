//! Hard limits for stored entities and request sizes.

pub const MAX_STYLISTS: usize = 10_000;
pub const MAX_OFFERINGS: usize = 10_000;
pub const MAX_WINDOWS_PER_STYLIST: usize = 100;
pub const MAX_APPOINTMENTS_PER_STYLIST: usize = 100_000;
pub const MAX_NAME_LEN: usize = 256;
pub const MAX_STATUS_LEN: usize = 64;

/// Longest bookable duration: one full day.
pub const MAX_DURATION_MINUTES: i64 = 24 * 60;
