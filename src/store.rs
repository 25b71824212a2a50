//! Storage seams the pipeline steps are written against.
//!
//! `PgConnection` implements every trait (see `db::pg`). The insert operations
//! report a uniqueness conflict as `Ok(None)` / `Ok(false)` rather than an error;
//! the dimension resolver and the fact loader are built on that contract.

use crate::db::models::{CanonicalRecord, EnrichedRecord, NewRawFile, RawFile};
use crate::models::dimension::{BuildingId, ItpId, MeterId};
use chrono::{DateTime, Utc};
use core::fmt;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

#[cfg(test)]
pub mod memory;

#[derive(Debug)]
pub enum StoreError {
    Database(diesel::result::Error),
    /// A store without a database behind it failed.
    Backend(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "database error: {}", e),
            StoreError::Backend(e) => write!(f, "store error: {}", e),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StoreError::Database(e) => Some(e),
            StoreError::Backend(_) => None,
        }
    }
}

impl From<diesel::result::Error> for StoreError {
    fn from(value: diesel::result::Error) -> Self {
        StoreError::Database(value)
    }
}

/// Load-batch registry: source files and the batch identifiers assigned to them.
pub trait BatchRegistry {
    fn find_raw_file(&mut self, load_id: Uuid) -> Result<Option<RawFile>, StoreError>;

    /// Register a file unless its content hash is known; `None` on conflict.
    fn insert_raw_file(&mut self, file: &NewRawFile) -> Result<Option<Uuid>, StoreError>;

    fn find_load_id_by_hash(&mut self, content_hash: &str) -> Result<Option<Uuid>, StoreError>;
}

/// Building -> ITP -> meter dimension tables.
pub trait DimensionStore {
    fn insert_building(&mut self, code: &str) -> Result<Option<BuildingId>, StoreError>;
    fn find_building(&mut self, code: &str) -> Result<Option<BuildingId>, StoreError>;

    fn insert_itp(&mut self, building: BuildingId, code: &str) -> Result<Option<ItpId>, StoreError>;
    fn find_itp(&mut self, code: &str) -> Result<Option<ItpId>, StoreError>;

    fn insert_meter(&mut self, itp: ItpId, code: &str, metric: &str, unit: &str)
    -> Result<Option<MeterId>, StoreError>;
    fn find_meter(&mut self, itp: ItpId, code: &str, metric: &str) -> Result<Option<MeterId>, StoreError>;
}

pub trait FactStore {
    /// Insert unless (meter, ts) exists; `true` when a row was written.
    fn insert_measurement(&mut self, meter: MeterId, ts: DateTime<Utc>, value: f64) -> Result<bool, StoreError>;
}

/// Staging area between the parse, enrich and load steps.
pub trait StagingStore {
    fn delete_parsed(&mut self, load_id: Uuid) -> Result<usize, StoreError>;
    fn insert_parsed(&mut self, records: &[CanonicalRecord]) -> Result<usize, StoreError>;
    /// Staged records of a batch ordered by `row_num`.
    fn read_parsed(&mut self, load_id: Uuid) -> Result<Vec<CanonicalRecord>, StoreError>;

    fn delete_enriched(&mut self, load_id: Uuid) -> Result<usize, StoreError>;
    fn insert_enriched(&mut self, records: &[EnrichedRecord]) -> Result<usize, StoreError>;
}

/// All-or-nothing execution. Nested calls roll back only their own work.
pub trait Transactional {
    fn atomically<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<diesel::result::Error>;
}
