//! Enrich step: calendar attributes for every staged record of a batch.

use crate::db::models::{CanonicalRecord, EnrichedRecord};
use crate::step::{StepError, StepReport};
use crate::store::{StagingStore, Transactional};
use chrono::{Datelike, DurationRound, TimeDelta};
use chrono_tz::Tz;
use log::info;
use uuid::Uuid;

/// Hour bucket, day of week (Mon=0..Sun=6) and weekend flag, on the wall clock of `tz`.
/// A record without a timestamp gets all three absent.
pub fn enrich_record(record: &CanonicalRecord, tz: Tz) -> EnrichedRecord {
    let local = record.ts.map(|ts| ts.with_timezone(&tz));
    let dow = local.map(|t| t.weekday().num_days_from_monday() as i32);
    EnrichedRecord {
        load_id: record.load_id,
        row_num: record.row_num,
        ts_hour: local
            .and_then(|t| t.duration_trunc(TimeDelta::hours(1)).ok())
            .map(|t| t.to_utc()),
        dow,
        is_weekend: dow.map(|d| d >= 5),
    }
}

pub fn enrich<S>(store: &mut S, load_id: Uuid, tz: Tz) -> Result<StepReport, StepError>
where
    S: StagingStore + Transactional,
{
    info!("Enrich: load {}", load_id);
    let mut report = StepReport::new(load_id);

    let (processed, written) = store.atomically(|tx| -> Result<(usize, usize), StepError> {
        let records = tx.read_parsed(load_id)?;
        let enriched = records.iter().map(|r| enrich_record(r, tz)).collect::<Vec<_>>();
        tx.delete_enriched(load_id)?;
        Ok((records.len(), tx.insert_enriched(&enriched)?))
    })?;
    report.processed = processed;
    report.written = written;

    info!(
        "Enrich: load {} complete (rows={}, written={})",
        load_id, report.processed, report.written
    );
    Ok(report)
}
