//! Diesel model structs for the dimension tables, the fact table and the staging area.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::schema;

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::buildings)]
pub struct NewBuilding<'a> {
    pub external_code: &'a str,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::itp)]
pub struct NewItp<'a> {
    pub building_id: i64,
    pub external_code: &'a str,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::meters)]
pub struct NewMeter<'a> {
    pub itp_id: i64,
    pub external_code: &'a str,
    pub metric: &'a str,
    pub unit: &'a str,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = schema::measurements)]
pub struct NewMeasurement {
    pub meter_id: i64,
    pub ts: DateTime<Utc>,
    pub value: f64,
}

/// A registered source file; `load_id` is the batch identifier every step is keyed by.
#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = schema::raw_files)]
pub struct RawFile {
    pub load_id: Uuid,
    pub content_hash: String,
    pub file_path: String,
    pub file_name: String,
    pub detected_from: Option<DateTime<Utc>>,
    pub detected_to: Option<DateTime<Utc>>,
    pub row_count: Option<i32>,
}

#[derive(Debug, Clone, Insertable, Serialize)]
#[diesel(table_name = schema::raw_files)]
pub struct NewRawFile {
    pub load_id: Uuid,
    pub content_hash: String,
    pub file_path: String,
    pub file_name: String,
    pub detected_from: Option<DateTime<Utc>>,
    pub detected_to: Option<DateTime<Utc>>,
    pub row_count: Option<i32>,
}

/// One source row after normalization, staged in `stage.parsed_measurements`.
///
/// `row_num` is 1-based and unique within `load_id`; it orders the batch and anchors
/// idempotent re-runs. Absent `ts`/`value` mark rows the load step will skip.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = schema::parsed_measurements)]
pub struct CanonicalRecord {
    pub load_id: Uuid,
    pub row_num: i32,
    pub source_file: String,
    pub ts: Option<DateTime<Utc>>,
    pub building_code: String,
    pub itp_code: String,
    pub meter_code: String,
    pub metric: String,
    pub value: Option<f64>,
    pub unit: String,
}

/// Calendar attributes derived from a staged record, keyed by (load_id, row_num).
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable, Serialize)]
#[diesel(table_name = schema::parsed_measurements_enriched)]
pub struct EnrichedRecord {
    pub load_id: Uuid,
    pub row_num: i32,
    pub ts_hour: Option<DateTime<Utc>>,
    pub dow: Option<i32>,
    pub is_weekend: Option<bool>,
}
