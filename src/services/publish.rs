//! Publish step: (re)create the reporting views over the fact table.

use crate::models::dimension::metrics;
use crate::store::StoreError;
use diesel::PgConnection;
use diesel::prelude::*;
use log::info;

const MEASUREMENTS_FLAT: &str = "
    CREATE VIEW core.measurements_flat AS
    SELECT
        m.id AS measurement_id,
        b.external_code AS building_code,
        i.external_code AS itp_code,
        mt.external_code AS meter_code,
        mt.metric,
        mt.unit,
        m.ts,
        m.value,
        m.inserted_at
    FROM core.measurements m
    JOIN core.meters mt ON mt.id = m.meter_id
    JOIN core.itp i ON i.id = mt.itp_id
    JOIN core.buildings b ON b.id = i.building_id";

/// Supply, return, consumption and supply-minus-return loss per building and bucket.
fn balance_view(name: &str, bucket: &str) -> String {
    let sum = |metric: &str| format!("sum(CASE WHEN metric = '{}' THEN value ELSE 0 END)", metric);
    format!(
        "CREATE MATERIALIZED VIEW core.{name} AS
    SELECT
        building_code,
        date_trunc('{bucket}', ts) AS {bucket},
        {supply} AS supply,
        {ret} AS \"return\",
        {consumption} AS consumption,
        {supply} - {ret} AS loss
    FROM core.measurements_flat
    GROUP BY building_code, date_trunc('{bucket}', ts)",
        supply = sum(metrics::FLOW_SUPPLY),
        ret = sum(metrics::FLOW_RETURN),
        consumption = sum(metrics::CONSUMPTION_PERIOD),
    )
}

fn statements() -> Vec<String> {
    vec![
        "DROP VIEW IF EXISTS core.measurements_flat CASCADE".to_string(),
        MEASUREMENTS_FLAT.to_string(),
        "DROP MATERIALIZED VIEW IF EXISTS core.daily_balance CASCADE".to_string(),
        balance_view("daily_balance", "day"),
        "DROP MATERIALIZED VIEW IF EXISTS core.hourly_balance CASCADE".to_string(),
        balance_view("hourly_balance", "hour"),
    ]
}

/// Recreate `core.measurements_flat`, `core.daily_balance` and `core.hourly_balance`
/// in one transaction.
pub fn publish(conn: &mut PgConnection) -> Result<(), StoreError> {
    info!("Publish: recreating reporting views");
    conn.transaction(|tx| -> Result<(), StoreError> {
        for sql in statements() {
            diesel::sql_query(sql).execute(tx)?;
        }
        Ok(())
    })?;
    info!("Publish: views published in schema core");
    Ok(())
}
