//! Load step: resolve dimension keys for staged records and write their facts.
//!
//! The whole step runs in one transaction; each row runs in a nested one, so a row
//! that fails is rolled back on its own and reported, and the step moves on.

use crate::db::models::CanonicalRecord;
use crate::models::dimension::MeterId;
use crate::services::resolve::{ResolveError, resolve_building, resolve_itp, resolve_meter};
use crate::step::{AnomalyKind, StepError, StepReport};
use crate::store::{DimensionStore, FactStore, StagingStore, StoreError, Transactional};
use chrono::{DateTime, Utc};
use log::{info, warn};
use uuid::Uuid;

/// Write one measurement unless (meter, ts) already exists. Existing values are
/// never overwritten; returns whether a row was written.
pub fn upsert_fact<S: FactStore>(store: &mut S, meter: MeterId, ts: DateTime<Utc>, value: f64) -> Result<bool, StoreError> {
    store.insert_measurement(meter, ts, value)
}

fn load_row<S>(store: &mut S, record: &CanonicalRecord, ts: DateTime<Utc>, value: f64) -> Result<bool, ResolveError>
where
    S: DimensionStore + FactStore,
{
    let building = resolve_building(store, &record.building_code)?;
    let itp = resolve_itp(store, building, &record.itp_code)?;
    let meter = resolve_meter(store, itp, &record.meter_code, &record.metric, &record.unit)?;
    Ok(upsert_fact(store, meter, ts, value)?)
}

pub fn load<S>(store: &mut S, load_id: Uuid) -> Result<StepReport, StepError>
where
    S: StagingStore + DimensionStore + FactStore + Transactional,
{
    info!("Load: load {}", load_id);
    let mut report = StepReport::new(load_id);

    store.atomically(|tx| -> Result<(), StepError> {
        let records = tx.read_parsed(load_id)?;
        report.processed = records.len();

        for record in &records {
            let (ts, value) = match (record.ts, record.value) {
                (Some(ts), Some(value)) => (ts, value),
                (ts, _) => {
                    let kind = if ts.is_none() { AnomalyKind::MissingTimestamp } else { AnomalyKind::MissingValue };
                    warn!("Load: load {} row {} skipped: {}", load_id, record.row_num, kind);
                    report.anomaly(record.row_num, kind);
                    continue;
                }
            };

            match tx.atomically(|row| load_row(row, record, ts, value)) {
                Ok(true) => report.written += 1,
                Ok(false) => {}
                Err(e) => {
                    let kind = AnomalyKind::from(e);
                    warn!("Load: load {} row {} rolled back: {}", load_id, record.row_num, kind);
                    report.anomaly(record.row_num, kind);
                }
            }
        }
        Ok(())
    })?;

    info!(
        "Load: load {} complete (rows={}, written={}, skipped={})",
        load_id,
        report.processed,
        report.written,
        report.anomalies.len()
    );
    Ok(report)
}
