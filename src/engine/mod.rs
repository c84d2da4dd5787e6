mod error;
mod mutations;
mod queries;
mod slots;

pub use error::EngineError;
pub use slots::{compute_available_slots, same_day_cutoff};

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::*;

pub type SharedStylistState = Arc<RwLock<StylistState>>;

/// In-memory schedule, booking and duration source for the slot algorithm.
pub struct Engine {
    pub state: DashMap<Ulid, SharedStylistState>,
    pub(super) offerings: DashMap<Ulid, Offering>,
    /// Reverse lookup: entity (window/appointment) id → stylist id
    pub(super) entity_to_stylist: DashMap<Ulid, Ulid>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            state: DashMap::new(),
            offerings: DashMap::new(),
            entity_to_stylist: DashMap::new(),
        }
    }

    pub fn get_stylist(&self, id: &Ulid) -> Option<SharedStylistState> {
        self.state.get(id).map(|e| e.value().clone())
    }

    pub fn get_stylist_for_entity(&self, entity_id: &Ulid) -> Option<Ulid> {
        self.entity_to_stylist.get(entity_id).map(|e| *e.value())
    }

    /// Reserve `id` for `stylist_id` in the reverse index. The check and the
    /// insert happen under one shard lock, so a second claim fails.
    pub(super) fn claim_entity(&self, id: Ulid, stylist_id: Ulid) -> Result<(), EngineError> {
        match self.entity_to_stylist.entry(id) {
            Entry::Occupied(_) => Err(EngineError::AlreadyExists(id)),
            Entry::Vacant(slot) => {
                slot.insert(stylist_id);
                Ok(())
            }
        }
    }

    /// Lookup entity → stylist, get stylist, acquire write lock.
    pub(super) async fn resolve_entity_write(
        &self,
        entity_id: &Ulid,
    ) -> Result<(Ulid, tokio::sync::OwnedRwLockWriteGuard<StylistState>), EngineError> {
        let stylist_id = self
            .get_stylist_for_entity(entity_id)
            .ok_or(EngineError::NotFound(*entity_id))?;
        let rs = self
            .get_stylist(&stylist_id)
            .ok_or(EngineError::NotFound(stylist_id))?;
        let guard = rs.write_owned().await;
        Ok((stylist_id, guard))
    }
}
