//! Start-up data: stylists with their weekly schedule, services and packages.
//!
//! ```json
//! {
//!   "stylists": [
//!     { "id": "01ARZ3NDEKTSV4RRFFQ69G5FAV", "name": "Ana",
//!       "schedule": [{ "day": "Mon", "start": "09:00", "end": "17:00" }] }
//!   ],
//!   "services": [{ "id": "01BX5ZZKBKACTAV9WEVGEMMVRZ", "name": "Cut", "duration": 45 }],
//!   "packages": []
//! }
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::info;
use ulid::Ulid;

use crate::engine::{Engine, EngineError};
use crate::model::{Minutes, OfferingKind};
use crate::time::{normalize_weekday, TimeOfDay, WeekdayParseError};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Seed {
    pub stylists: Vec<SeedStylist>,
    pub services: Vec<SeedOffering>,
    pub packages: Vec<SeedOffering>,
}

#[derive(Debug, Deserialize)]
pub struct SeedStylist {
    pub id: Ulid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub schedule: Vec<SeedWindow>,
}

#[derive(Debug, Deserialize)]
pub struct SeedWindow {
    /// Any form `normalize_weekday` accepts.
    pub day: String,
    pub start: TimeOfDay,
    pub end: TimeOfDay,
}

#[derive(Debug, Deserialize)]
pub struct SeedOffering {
    pub id: Ulid,
    #[serde(default)]
    pub name: Option<String>,
    /// Missing means "not configured yet".
    #[serde(default)]
    pub duration: Minutes,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub stylists: usize,
    pub windows: usize,
    pub offerings: usize,
}

impl Seed {
    pub fn from_file(path: &Path) -> Result<Self, SeedError> {
        let text = std::fs::read_to_string(path).map_err(SeedError::Io)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, SeedError> {
        serde_json::from_str(text).map_err(SeedError::Json)
    }

    /// Insert everything into `engine`. Stops at the first rejected row.
    pub async fn apply(self, engine: &Engine) -> Result<SeedSummary, SeedError> {
        let mut summary = SeedSummary::default();
        for (kind, list) in [
            (OfferingKind::Service, self.services),
            (OfferingKind::Package, self.packages),
        ] {
            for o in list {
                engine
                    .create_offering(o.id, kind, o.name, o.duration)
                    .await
                    .map_err(SeedError::Engine)?;
                summary.offerings += 1;
            }
        }
        for s in self.stylists {
            engine
                .create_stylist(s.id, s.name)
                .await
                .map_err(SeedError::Engine)?;
            summary.stylists += 1;
            for w in s.schedule {
                let day = normalize_weekday(&w.day).map_err(SeedError::Weekday)?;
                engine
                    .add_window(Ulid::new(), s.id, day, w.start, w.end)
                    .await
                    .map_err(SeedError::Engine)?;
                summary.windows += 1;
            }
        }
        info!(
            stylists = summary.stylists,
            windows = summary.windows,
            offerings = summary.offerings,
            "seed loaded"
        );
        Ok(summary)
    }
}

#[derive(Debug)]
pub enum SeedError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Weekday(WeekdayParseError),
    Engine(EngineError),
}

impl std::fmt::Display for SeedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeedError::Io(e) => write!(f, "seed file: {e}"),
            SeedError::Json(e) => write!(f, "seed file is not valid JSON: {e}"),
            SeedError::Weekday(e) => write!(f, "seed schedule: {e}"),
            SeedError::Engine(e) => write!(f, "seed rejected: {e}"),
        }
    }
}

impl std::error::Error for SeedError {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;

    const SEED: &str = r#"{
        "stylists": [
            { "id": "01ARZ3NDEKTSV4RRFFQ69G5FAV", "name": "Ana",
              "schedule": [
                { "day": "Mon", "start": "09:00", "end": "12:00" },
                { "day": "monday", "start": "14:00", "end": "18:00" },
                { "day": "6", "start": "10:00", "end": "14:00" }
              ] }
        ],
        "services": [{ "id": "01BX5ZZKBKACTAV9WEVGEMMVRZ", "name": "Cut", "duration": 45 }],
        "packages": [{ "id": "01BX5ZZKBKACTAV9WEVGEMMVS0", "name": "Bridal" }]
    }"#;

    #[tokio::test]
    async fn apply_loads_everything() {
        let engine = Engine::new();
        let summary = Seed::from_json(SEED).unwrap().apply(&engine).await.unwrap();
        assert_eq!(
            summary,
            SeedSummary {
                stylists: 1,
                windows: 3,
                offerings: 2
            }
        );
        let ana = Ulid::from_string("01ARZ3NDEKTSV4RRFFQ69G5FAV").unwrap();
        assert_eq!(engine.schedule_for(ana, Weekday::Mon).await.len(), 2);
        assert_eq!(engine.schedule_for(ana, Weekday::Sat).await.len(), 1);
        let bridal = Ulid::from_string("01BX5ZZKBKACTAV9WEVGEMMVS0").unwrap();
        assert_eq!(engine.offering_duration(&bridal), Some(0));
    }

    #[test]
    fn empty_object_is_empty_seed() {
        let seed = Seed::from_json("{}").unwrap();
        assert!(seed.stylists.is_empty() && seed.services.is_empty());
    }

    #[test]
    fn malformed_time_rejected() {
        let json = r#"{ "stylists": [{ "id": "01ARZ3NDEKTSV4RRFFQ69G5FAV",
            "schedule": [{ "day": "Mon", "start": "9am", "end": "12:00" }] }] }"#;
        assert!(matches!(Seed::from_json(json), Err(SeedError::Json(_))));
    }

    #[tokio::test]
    async fn bad_weekday_rejected() {
        let json = r#"{ "stylists": [{ "id": "01ARZ3NDEKTSV4RRFFQ69G5FAV",
            "schedule": [{ "day": "Funday", "start": "09:00", "end": "12:00" }] }] }"#;
        let engine = Engine::new();
        let err = Seed::from_json(json).unwrap().apply(&engine).await.unwrap_err();
        assert!(matches!(err, SeedError::Weekday(_)));
    }
}
