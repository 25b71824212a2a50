//! Postgres implementation of the storage traits.
//!
//! Conflict detection relies on the unique constraints created by the migrations:
//! `ON CONFLICT DO NOTHING RETURNING id` yields no row when the key already exists.

use crate::db::models::{
    CanonicalRecord, EnrichedRecord, NewBuilding, NewItp, NewMeasurement, NewMeter, NewRawFile, RawFile,
};
use crate::models::dimension::{BuildingId, ItpId, MeterId};
use crate::schema;
use crate::store::{BatchRegistry, DimensionStore, FactStore, StagingStore, StoreError, Transactional};
use chrono::{DateTime, Utc};
use diesel::PgConnection;
use diesel::prelude::*;
use uuid::Uuid;

/// Rows per multi-row INSERT; keeps the bind-parameter count under the Postgres limit.
const INSERT_CHUNK: usize = 1_000;

impl Transactional for PgConnection {
    fn atomically<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<diesel::result::Error>,
    {
        self.transaction(f)
    }
}

impl BatchRegistry for PgConnection {
    fn find_raw_file(&mut self, load_id: Uuid) -> Result<Option<RawFile>, StoreError> {
        use schema::raw_files::dsl as R;

        Ok(R::raw_files
            .filter(R::load_id.eq(load_id))
            .select(RawFile::as_select())
            .first(self)
            .optional()?)
    }

    fn insert_raw_file(&mut self, file: &NewRawFile) -> Result<Option<Uuid>, StoreError> {
        use schema::raw_files::dsl as R;

        Ok(diesel::insert_into(R::raw_files)
            .values(file)
            .on_conflict(R::content_hash)
            .do_nothing()
            .returning(R::load_id)
            .get_result(self)
            .optional()?)
    }

    fn find_load_id_by_hash(&mut self, content_hash: &str) -> Result<Option<Uuid>, StoreError> {
        use schema::raw_files::dsl as R;

        Ok(R::raw_files
            .filter(R::content_hash.eq(content_hash))
            .select(R::load_id)
            .first(self)
            .optional()?)
    }
}

impl DimensionStore for PgConnection {
    fn insert_building(&mut self, code: &str) -> Result<Option<BuildingId>, StoreError> {
        use schema::buildings::dsl as B;

        let id: Option<i64> = diesel::insert_into(B::buildings)
            .values(&NewBuilding { external_code: code })
            .on_conflict(B::external_code)
            .do_nothing()
            .returning(B::id)
            .get_result(self)
            .optional()?;
        Ok(id.map(BuildingId))
    }

    fn find_building(&mut self, code: &str) -> Result<Option<BuildingId>, StoreError> {
        use schema::buildings::dsl as B;

        let id: Option<i64> = B::buildings
            .filter(B::external_code.eq(code))
            .select(B::id)
            .first(self)
            .optional()?;
        Ok(id.map(BuildingId))
    }

    fn insert_itp(&mut self, building: BuildingId, code: &str) -> Result<Option<ItpId>, StoreError> {
        use schema::itp::dsl as I;

        let id: Option<i64> = diesel::insert_into(I::itp)
            .values(&NewItp {
                building_id: building.0,
                external_code: code,
            })
            .on_conflict(I::external_code)
            .do_nothing()
            .returning(I::id)
            .get_result(self)
            .optional()?;
        Ok(id.map(ItpId))
    }

    fn find_itp(&mut self, code: &str) -> Result<Option<ItpId>, StoreError> {
        use schema::itp::dsl as I;

        let id: Option<i64> = I::itp
            .filter(I::external_code.eq(code))
            .select(I::id)
            .first(self)
            .optional()?;
        Ok(id.map(ItpId))
    }

    fn insert_meter(
        &mut self,
        itp: ItpId,
        code: &str,
        metric: &str,
        unit: &str,
    ) -> Result<Option<MeterId>, StoreError> {
        use schema::meters::dsl as M;

        let id: Option<i64> = diesel::insert_into(M::meters)
            .values(&NewMeter {
                itp_id: itp.0,
                external_code: code,
                metric,
                unit,
            })
            .on_conflict((M::itp_id, M::external_code, M::metric))
            .do_nothing()
            .returning(M::id)
            .get_result(self)
            .optional()?;
        Ok(id.map(MeterId))
    }

    fn find_meter(&mut self, itp: ItpId, code: &str, metric: &str) -> Result<Option<MeterId>, StoreError> {
        use schema::meters::dsl as M;

        let id: Option<i64> = M::meters
            .filter(
                M::itp_id
                    .eq(itp.0)
                    .and(M::external_code.eq(code))
                    .and(M::metric.eq(metric)),
            )
            .select(M::id)
            .first(self)
            .optional()?;
        Ok(id.map(MeterId))
    }
}

impl FactStore for PgConnection {
    fn insert_measurement(&mut self, meter: MeterId, ts: DateTime<Utc>, value: f64) -> Result<bool, StoreError> {
        use schema::measurements::dsl as F;

        let count = diesel::insert_into(F::measurements)
            .values(&NewMeasurement {
                meter_id: meter.0,
                ts,
                value,
            })
            .on_conflict((F::meter_id, F::ts))
            .do_nothing()
            .execute(self)?;
        Ok(count > 0)
    }
}

impl StagingStore for PgConnection {
    fn delete_parsed(&mut self, load_id: Uuid) -> Result<usize, StoreError> {
        use schema::parsed_measurements::dsl as P;

        Ok(diesel::delete(P::parsed_measurements.filter(P::load_id.eq(load_id))).execute(self)?)
    }

    fn insert_parsed(&mut self, records: &[CanonicalRecord]) -> Result<usize, StoreError> {
        use schema::parsed_measurements::dsl as P;

        let mut inserted = 0usize;
        for chunk in records.chunks(INSERT_CHUNK) {
            inserted += diesel::insert_into(P::parsed_measurements)
                .values(chunk)
                .execute(self)?;
        }
        Ok(inserted)
    }

    fn read_parsed(&mut self, load_id: Uuid) -> Result<Vec<CanonicalRecord>, StoreError> {
        use schema::parsed_measurements::dsl as P;

        Ok(P::parsed_measurements
            .filter(P::load_id.eq(load_id))
            .order(P::row_num.asc())
            .select(CanonicalRecord::as_select())
            .load(self)?)
    }

    fn delete_enriched(&mut self, load_id: Uuid) -> Result<usize, StoreError> {
        use schema::parsed_measurements_enriched::dsl as E;

        Ok(diesel::delete(E::parsed_measurements_enriched.filter(E::load_id.eq(load_id))).execute(self)?)
    }

    fn insert_enriched(&mut self, records: &[EnrichedRecord]) -> Result<usize, StoreError> {
        use schema::parsed_measurements_enriched::dsl as E;

        let mut inserted = 0usize;
        for chunk in records.chunks(INSERT_CHUNK) {
            inserted += diesel::insert_into(E::parsed_measurements_enriched)
                .values(chunk)
                .execute(self)?;
        }
        Ok(inserted)
    }
}
