//! Insert-or-fetch resolution of building, ITP and meter keys.
//!
//! Each level first attempts an insert that suppresses unique-key conflicts and, when
//! the insert reports a conflict, reads the existing key back. Concurrent or repeated
//! runs therefore converge on one row per natural key.

use crate::models::dimension::{BuildingId, ItpId, Level, MeterId};
use crate::store::{DimensionStore, StoreError};
use core::fmt;
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum ResolveError {
    /// The insert hit a conflict but the conflicting row could not be read back.
    Vanished { level: Level, code: String },
    Store(StoreError),
}

impl Display for ResolveError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::Vanished { level, code } => {
                write!(f, "{} {} conflicted on insert but could not be fetched", level, code)
            }
            ResolveError::Store(e) => write!(f, "{}", e),
        }
    }
}

impl Error for ResolveError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ResolveError::Store(e) => Some(e),
            ResolveError::Vanished { .. } => None,
        }
    }
}

impl From<StoreError> for ResolveError {
    fn from(value: StoreError) -> Self {
        ResolveError::Store(value)
    }
}

impl From<diesel::result::Error> for ResolveError {
    fn from(value: diesel::result::Error) -> Self {
        ResolveError::Store(StoreError::Database(value))
    }
}

fn vanished(level: Level, code: &str) -> ResolveError {
    ResolveError::Vanished {
        level,
        code: code.to_string(),
    }
}

pub fn resolve_building<S: DimensionStore>(store: &mut S, code: &str) -> Result<BuildingId, ResolveError> {
    if let Some(id) = store.insert_building(code)? {
        return Ok(id);
    }
    store
        .find_building(code)?
        .ok_or_else(|| vanished(Level::Building, code))
}

pub fn resolve_itp<S: DimensionStore>(store: &mut S, building: BuildingId, code: &str) -> Result<ItpId, ResolveError> {
    if let Some(id) = store.insert_itp(building, code)? {
        return Ok(id);
    }
    store.find_itp(code)?.ok_or_else(|| vanished(Level::Itp, code))
}

/// Meters are keyed by (ITP, code, metric); `unit` is only written on creation.
pub fn resolve_meter<S: DimensionStore>(
    store: &mut S,
    itp: ItpId,
    code: &str,
    metric: &str,
    unit: &str,
) -> Result<MeterId, ResolveError> {
    if let Some(id) = store.insert_meter(itp, code, metric, unit)? {
        return Ok(id);
    }
    store
        .find_meter(itp, code, metric)?
        .ok_or_else(|| vanished(Level::Meter, code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use std::sync::{Arc, Barrier};
    use std::thread;

    #[test]
    fn repeated_resolution_returns_the_same_key() {
        let mut store = MemoryStore::new();
        let first = resolve_building(&mut store, "ДОМ_5").unwrap();
        let second = resolve_building(&mut store, "ДОМ_5").unwrap();
        assert_eq!(first, second);
        assert_eq!(store.lock().buildings.len(), 1);
    }

    #[test]
    fn chain_resolves_each_level_once() {
        let mut store = MemoryStore::new();
        for _ in 0..3 {
            let b = resolve_building(&mut store, "ДОМ_5").unwrap();
            let i = resolve_itp(&mut store, b, "ИТП_1").unwrap();
            resolve_meter(&mut store, i, "сч_01", "flow_supply", "м3ч").unwrap();
            resolve_meter(&mut store, i, "сч_01", "T1", "C").unwrap();
        }
        let state = store.lock();
        assert_eq!(state.buildings.len(), 1);
        assert_eq!(state.itps.len(), 1);
        // same meter code, two metrics -> two meter rows
        assert_eq!(state.meters.len(), 2);
    }

    #[test]
    fn meter_unit_is_kept_from_first_creation() {
        let mut store = MemoryStore::new();
        let b = resolve_building(&mut store, "B").unwrap();
        let i = resolve_itp(&mut store, b, "B_ITP").unwrap();
        let first = resolve_meter(&mut store, i, "m", "X", "bar").unwrap();
        let second = resolve_meter(&mut store, i, "m", "X", "kPa").unwrap();
        assert_eq!(first, second);
        assert_eq!(store.lock().meters[0].unit, "bar");
    }

    #[test]
    fn concurrent_resolution_converges_on_one_row() {
        let store = MemoryStore::new();
        let workers = 8;
        let barrier = Arc::new(Barrier::new(workers));
        let handles = (0..workers)
            .map(|_| {
                let mut store = store.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    resolve_building(&mut store, "BUILDING_XVS").unwrap()
                })
            })
            .collect::<Vec<_>>();
        let keys = handles.into_iter().map(|h| h.join().unwrap()).collect::<Vec<_>>();

        assert!(keys.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(store.lock().buildings.len(), 1);
    }

    #[test]
    fn conflict_without_readable_row_is_vanished() {
        let mut store = MemoryStore::new();
        resolve_building(&mut store, "B").unwrap();
        store.lock().hide_existing = true;
        match resolve_building(&mut store, "B") {
            Err(ResolveError::Vanished { level, code }) => {
                assert_eq!(level, Level::Building);
                assert_eq!(code, "B");
            }
            other => panic!("expected Vanished, got {:?}", other),
        }
    }

    #[test]
    fn store_failures_propagate() {
        let mut store = MemoryStore::new();
        store.lock().fail_building = Some("B".to_string());
        assert!(matches!(resolve_building(&mut store, "B"), Err(ResolveError::Store(_))));
    }
}
