//! In-memory store used by the step tests. Every operation takes the lock on its
//! own, so concurrent callers interleave the way separate database sessions do.

use super::{BatchRegistry, DimensionStore, FactStore, StagingStore, StoreError, Transactional};
use crate::db::models::{CanonicalRecord, EnrichedRecord, NewRawFile, RawFile};
use crate::models::dimension::{BuildingId, ItpId, MeterId};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct MeterRow {
    pub id: i64,
    pub itp_id: i64,
    pub external_code: String,
    pub metric: String,
    pub unit: String,
}

#[derive(Debug, Clone, Default)]
pub struct State {
    pub raw_files: Vec<RawFile>,
    /// (id, external_code)
    pub buildings: Vec<(i64, String)>,
    /// (id, building_id, external_code)
    pub itps: Vec<(i64, i64, String)>,
    pub meters: Vec<MeterRow>,
    pub measurements: BTreeMap<(i64, DateTime<Utc>), f64>,
    pub parsed: Vec<CanonicalRecord>,
    pub enriched: Vec<EnrichedRecord>,
    /// Lookups pretend existing dimension rows are gone.
    pub hide_existing: bool,
    /// Building inserts for this code fail with a backend error.
    pub fail_building: Option<String>,
    next_id: i64,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn register(&self, file_path: &str) -> Uuid {
        let load_id = Uuid::new_v4();
        let file_name = std::path::Path::new(file_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(file_path)
            .to_string();
        self.lock().raw_files.push(RawFile {
            load_id,
            content_hash: load_id.to_string(),
            file_path: file_path.to_string(),
            file_name,
            detected_from: None,
            detected_to: None,
            row_count: None,
        });
        load_id
    }
}

impl Transactional for MemoryStore {
    fn atomically<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<diesel::result::Error>,
    {
        let snapshot = self.lock().clone();
        let result = f(self);
        if result.is_err() {
            *self.lock() = snapshot;
        }
        result
    }
}

impl BatchRegistry for MemoryStore {
    fn find_raw_file(&mut self, load_id: Uuid) -> Result<Option<RawFile>, StoreError> {
        Ok(self.lock().raw_files.iter().find(|f| f.load_id == load_id).cloned())
    }

    fn insert_raw_file(&mut self, file: &NewRawFile) -> Result<Option<Uuid>, StoreError> {
        let mut state = self.lock();
        if state.raw_files.iter().any(|f| f.content_hash == file.content_hash) {
            return Ok(None);
        }
        state.raw_files.push(RawFile {
            load_id: file.load_id,
            content_hash: file.content_hash.clone(),
            file_path: file.file_path.clone(),
            file_name: file.file_name.clone(),
            detected_from: file.detected_from,
            detected_to: file.detected_to,
            row_count: file.row_count,
        });
        Ok(Some(file.load_id))
    }

    fn find_load_id_by_hash(&mut self, content_hash: &str) -> Result<Option<Uuid>, StoreError> {
        Ok(self
            .lock()
            .raw_files
            .iter()
            .find(|f| f.content_hash == content_hash)
            .map(|f| f.load_id))
    }
}

impl DimensionStore for MemoryStore {
    fn insert_building(&mut self, code: &str) -> Result<Option<BuildingId>, StoreError> {
        let mut state = self.lock();
        if state.fail_building.as_deref() == Some(code) {
            return Err(StoreError::Backend(format!("insert building {} refused", code)));
        }
        if state.buildings.iter().any(|(_, c)| c == code) {
            return Ok(None);
        }
        let id = state.next_id();
        state.buildings.push((id, code.to_string()));
        Ok(Some(BuildingId(id)))
    }

    fn find_building(&mut self, code: &str) -> Result<Option<BuildingId>, StoreError> {
        let state = self.lock();
        if state.hide_existing {
            return Ok(None);
        }
        Ok(state
            .buildings
            .iter()
            .find(|(_, c)| c == code)
            .map(|(id, _)| BuildingId(*id)))
    }

    fn insert_itp(&mut self, building: BuildingId, code: &str) -> Result<Option<ItpId>, StoreError> {
        let mut state = self.lock();
        if state.itps.iter().any(|(_, _, c)| c == code) {
            return Ok(None);
        }
        let id = state.next_id();
        state.itps.push((id, building.0, code.to_string()));
        Ok(Some(ItpId(id)))
    }

    fn find_itp(&mut self, code: &str) -> Result<Option<ItpId>, StoreError> {
        let state = self.lock();
        if state.hide_existing {
            return Ok(None);
        }
        Ok(state
            .itps
            .iter()
            .find(|(_, _, c)| c == code)
            .map(|(id, _, _)| ItpId(*id)))
    }

    fn insert_meter(
        &mut self,
        itp: ItpId,
        code: &str,
        metric: &str,
        unit: &str,
    ) -> Result<Option<MeterId>, StoreError> {
        let mut state = self.lock();
        if state
            .meters
            .iter()
            .any(|m| m.itp_id == itp.0 && m.external_code == code && m.metric == metric)
        {
            return Ok(None);
        }
        let id = state.next_id();
        state.meters.push(MeterRow {
            id,
            itp_id: itp.0,
            external_code: code.to_string(),
            metric: metric.to_string(),
            unit: unit.to_string(),
        });
        Ok(Some(MeterId(id)))
    }

    fn find_meter(&mut self, itp: ItpId, code: &str, metric: &str) -> Result<Option<MeterId>, StoreError> {
        let state = self.lock();
        if state.hide_existing {
            return Ok(None);
        }
        Ok(state
            .meters
            .iter()
            .find(|m| m.itp_id == itp.0 && m.external_code == code && m.metric == metric)
            .map(|m| MeterId(m.id)))
    }
}

impl FactStore for MemoryStore {
    fn insert_measurement(&mut self, meter: MeterId, ts: DateTime<Utc>, value: f64) -> Result<bool, StoreError> {
        let mut state = self.lock();
        if state.measurements.contains_key(&(meter.0, ts)) {
            return Ok(false);
        }
        state.measurements.insert((meter.0, ts), value);
        Ok(true)
    }
}

impl StagingStore for MemoryStore {
    fn delete_parsed(&mut self, load_id: Uuid) -> Result<usize, StoreError> {
        let mut state = self.lock();
        let before = state.parsed.len();
        state.parsed.retain(|r| r.load_id != load_id);
        Ok(before - state.parsed.len())
    }

    fn insert_parsed(&mut self, records: &[CanonicalRecord]) -> Result<usize, StoreError> {
        let mut state = self.lock();
        if records
            .iter()
            .any(|r| state.parsed.iter().any(|p| p.load_id == r.load_id && p.row_num == r.row_num))
        {
            return Err(StoreError::Backend("duplicate (load_id, row_num)".to_string()));
        }
        state.parsed.extend_from_slice(records);
        Ok(records.len())
    }

    fn read_parsed(&mut self, load_id: Uuid) -> Result<Vec<CanonicalRecord>, StoreError> {
        let mut rows = self
            .lock()
            .parsed
            .iter()
            .filter(|r| r.load_id == load_id)
            .cloned()
            .collect::<Vec<_>>();
        rows.sort_by_key(|r| r.row_num);
        Ok(rows)
    }

    fn delete_enriched(&mut self, load_id: Uuid) -> Result<usize, StoreError> {
        let mut state = self.lock();
        let before = state.enriched.len();
        state.enriched.retain(|r| r.load_id != load_id);
        Ok(before - state.enriched.len())
    }

    fn insert_enriched(&mut self, records: &[EnrichedRecord]) -> Result<usize, StoreError> {
        let mut state = self.lock();
        if records
            .iter()
            .any(|r| state.enriched.iter().any(|p| p.load_id == r.load_id && p.row_num == r.row_num))
        {
            return Err(StoreError::Backend("duplicate (load_id, row_num)".to_string()));
        }
        state.enriched.extend_from_slice(records);
        Ok(records.len())
    }
}
