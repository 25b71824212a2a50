//! Parse step: read a registered raw file and stage one canonical record per data row.

use crate::db::models::CanonicalRecord;
use crate::rows::RowParser;
use crate::source::read_table;
use crate::step::{AnomalyKind, StepError, StepReport};
use crate::store::{BatchRegistry, StagingStore, Transactional};
use chrono_tz::Tz;
use log::{debug, info, warn};
use std::collections::BTreeSet;
use std::path::Path;
use uuid::Uuid;

/// Re-parsing the same load id replaces its staged records, so the step is repeatable.
pub fn parse<S>(store: &mut S, load_id: Uuid, tz: Tz) -> Result<StepReport, StepError>
where
    S: BatchRegistry + StagingStore + Transactional,
{
    let raw = store.find_raw_file(load_id)?.ok_or(StepError::UnknownBatch(load_id))?;
    info!("Parse: load {} from {}", load_id, raw.file_path);

    let table = read_table(Path::new(&raw.file_path))?;
    let parser = RowParser::for_table(&table, raw.file_name.as_str(), tz);
    debug!("Parse: {} column map {:?}", raw.file_name, parser.columns);

    let records = parser.parse_table(load_id, &table);
    if parser.meter_from_file() {
        warn_if_meter_spans_substations(&raw.file_name, &records);
    }

    let mut report = StepReport::new(load_id);
    report.processed = records.len();
    for record in &records {
        if record.ts.is_none() {
            report.anomaly(record.row_num, AnomalyKind::MissingTimestamp);
        }
        if record.value.is_none() {
            report.anomaly(record.row_num, AnomalyKind::MissingValue);
        }
    }
    for anomaly in &report.anomalies {
        warn!("Parse: load {} row {}: {}", load_id, anomaly.row_num, anomaly.kind);
    }

    report.written = store.atomically(|tx| -> Result<usize, StepError> {
        let removed = tx.delete_parsed(load_id)?;
        if removed > 0 {
            debug!("Parse: replaced {} previously staged row(s) of load {}", removed, load_id);
        }
        Ok(tx.insert_parsed(&records)?)
    })?;

    info!(
        "Parse: load {} complete (rows={}, staged={}, anomalies={})",
        load_id,
        report.processed,
        report.written,
        report.anomalies.len()
    );
    Ok(report)
}

/// A meter code taken from the file name stands for one physical meter; warn when the
/// file nevertheless covers several substations.
fn warn_if_meter_spans_substations(file_name: &str, records: &[CanonicalRecord]) {
    let pairs = records
        .iter()
        .map(|r| (r.building_code.as_str(), r.itp_code.as_str()))
        .collect::<BTreeSet<_>>();
    if pairs.len() > 1 {
        warn!(
            "Parse: {} has no meter column but spans {} building/ITP pairs; one meter code covers all of them",
            file_name,
            pairs.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use chrono::{TimeZone, Utc};

    #[test]
    fn stages_fixture_rows_with_anomalies() {
        let mut store = MemoryStore::new();
        let load_id = store.register("tests/data/hvs_jan.csv");

        let report = parse(&mut store, load_id, chrono_tz::UTC).unwrap();
        assert_eq!(report.processed, 4);
        assert_eq!(report.written, 4);
        assert_eq!(
            report.anomalies.iter().map(|a| (a.row_num, a.kind.clone())).collect::<Vec<_>>(),
            vec![(3, AnomalyKind::MissingValue), (4, AnomalyKind::MissingTimestamp)]
        );

        let staged = store.read_parsed(load_id).unwrap();
        assert_eq!(staged.len(), 4);
        let first = &staged[0];
        assert_eq!(first.row_num, 1);
        assert_eq!(first.source_file, "hvs_jan.csv");
        assert_eq!(first.ts, Some(Utc.with_ymd_and_hms(2025, 4, 5, 14, 37, 0).unwrap()));
        assert_eq!(first.building_code, "BUILDING_XVS");
        assert_eq!(first.itp_code, "BUILDING_XVS_ITP");
        assert_eq!(first.meter_code, "hvs_jan");
        assert_eq!(first.metric, "consumption_period");
        assert_eq!(first.unit, "м3");
        assert_eq!(first.value, Some(12.5));
        assert_eq!(staged[1].value, Some(13.25));
    }

    #[test]
    fn stages_workbook_rows() {
        let mut store = MemoryStore::new();
        let load_id = store.register("tests/data/hvs_jan.xlsx");

        let report = parse(&mut store, load_id, chrono_tz::UTC).unwrap();
        assert_eq!(report.processed, 4);
        assert_eq!(
            report.anomalies.iter().map(|a| (a.row_num, a.kind.clone())).collect::<Vec<_>>(),
            vec![(4, AnomalyKind::MissingValue)]
        );

        let staged = store.read_parsed(load_id).unwrap();
        let first_ts = staged[0].ts.unwrap();
        let expected = Utc.with_ymd_and_hms(2025, 4, 5, 14, 37, 0).unwrap();
        assert!((first_ts - expected).num_seconds().abs() <= 1);
        assert_eq!(staged[0].meter_code, "hvs_jan");
        assert_eq!(staged[0].building_code, "BUILDING_XVS");
        assert_eq!(staged[0].metric, "consumption_period");
        assert_eq!(staged[0].value, Some(12.5));
        assert_eq!(staged[2].ts, Some(Utc.with_ymd_and_hms(2025, 4, 5, 16, 0, 0).unwrap()));
        assert_eq!(staged[2].value, Some(7.0));
    }

    #[test]
    fn parsing_twice_yields_identical_staging() {
        let mut store = MemoryStore::new();
        let load_id = store.register("tests/data/hvs_jan.csv");

        parse(&mut store, load_id, chrono_tz::Europe::Moscow).unwrap();
        let first = store.read_parsed(load_id).unwrap();
        let report = parse(&mut store, load_id, chrono_tz::Europe::Moscow).unwrap();
        let second = store.read_parsed(load_id).unwrap();

        assert_eq!(report.written, 4);
        assert_eq!(first, second);
        assert_eq!(store.lock().parsed.len(), 4);
    }

    #[test]
    fn unknown_batch_is_a_step_error() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            parse(&mut store, Uuid::new_v4(), chrono_tz::UTC),
            Err(StepError::UnknownBatch(_))
        ));
    }

    #[test]
    fn unreadable_source_leaves_staging_untouched() {
        let mut store = MemoryStore::new();
        let load_id = store.register("tests/data/missing.csv");
        assert!(matches!(parse(&mut store, load_id, chrono_tz::UTC), Err(StepError::Source(_))));
        assert!(store.lock().parsed.is_empty());
    }

    #[test]
    fn multi_column_file_keeps_row_order() {
        let mut store = MemoryStore::new();
        let load_id = store.register("tests/data/itp_readings.csv");

        let report = parse(&mut store, load_id, chrono_tz::UTC).unwrap();
        assert!(report.anomalies.is_empty());

        let staged = store.read_parsed(load_id).unwrap();
        let summary = staged
            .iter()
            .map(|r| (r.row_num, r.building_code.as_str(), r.meter_code.as_str(), r.metric.as_str()))
            .collect::<Vec<_>>();
        assert_eq!(
            summary,
            vec![
                (1, "ДОМ_5", "сч_01", "flow_supply"),
                (2, "ДОМ_5", "сч_01", "flow_return"),
                (3, "ДОМ_5", "сч_02", "T1"),
                (4, "ДОМ_7", "сч_11", "flow_supply"),
            ]
        );
    }
}
