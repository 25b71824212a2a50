//! Ingest step: find source files in the raw directory and register each one as a batch.

use crate::db::models::NewRawFile;
use crate::rows::RowParser;
use crate::source::{SourceError, read_table};
use crate::step::StepError;
use crate::store::BatchRegistry;
use crate::utils::{file_sha256, is_lock_file};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Files under `raw_dir` matching any pattern, sorted, lock files removed.
pub fn discover_files(raw_dir: &Path, patterns: &[String]) -> Result<Vec<PathBuf>, SourceError> {
    let mut files = Vec::new();
    for pattern in patterns {
        // the directory is literal, only `pattern` carries wildcards
        let full = Path::new(&glob::Pattern::escape(&raw_dir.to_string_lossy())).join(pattern);
        for entry in glob::glob(&full.to_string_lossy())? {
            match entry {
                Ok(path) if path.is_file() && !is_lock_file(&path) => files.push(path),
                Ok(_) => {}
                Err(e) => warn!("Ingest: skipping unreadable entry: {}", e),
            }
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

/// Row count and timestamp range of a file, or `None` when it cannot be read.
fn inspect(path: &Path, tz: Tz) -> Option<(i32, Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
    let table = match read_table(path) {
        Ok(table) => table,
        Err(e) => {
            warn!("Ingest: cannot inspect {}: {}", path.display(), e);
            return None;
        }
    };
    let parser = RowParser::for_table(&table, "", tz);
    let stamps = table.rows.iter().filter_map(|row| parser.timestamp(row)).collect::<Vec<_>>();
    let rows = i32::try_from(table.rows.len()).unwrap_or(i32::MAX);
    Some((rows, stamps.iter().min().copied(), stamps.iter().max().copied()))
}

/// Register one file, or return the load id it already has. Registration is keyed by
/// content hash, so unchanged files keep their batch across runs.
pub fn register_file<S: BatchRegistry>(store: &mut S, path: &Path, tz: Tz) -> Result<Uuid, StepError> {
    let content_hash = file_sha256(path).map_err(SourceError::from)?;
    if let Some(existing) = store.find_load_id_by_hash(&content_hash)? {
        debug!("Ingest: {} already registered as {}", path.display(), existing);
        return Ok(existing);
    }

    let (row_count, detected_from, detected_to) = match inspect(path, tz) {
        Some((rows, from, to)) => (Some(rows), from, to),
        None => (None, None, None),
    };
    let file = NewRawFile {
        load_id: Uuid::new_v4(),
        content_hash,
        file_path: path.to_string_lossy().into_owned(),
        file_name: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        detected_from,
        detected_to,
        row_count,
    };

    match store.insert_raw_file(&file)? {
        Some(load_id) => {
            info!(
                "Ingest: registered {} as {} (rows={}, from={}, to={})",
                file.file_name,
                load_id,
                row_count.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string()),
                detected_from.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".to_string()),
                detected_to.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".to_string()),
            );
            Ok(load_id)
        }
        // registered concurrently between the lookup and the insert
        None => store
            .find_load_id_by_hash(&file.content_hash)?
            .ok_or_else(|| StepError::UnknownBatch(file.load_id)),
    }
}

/// Register every matching file under `raw_dir`; returns load ids in file order.
/// A file that cannot be hashed or registered is logged and skipped.
pub fn ingest<S: BatchRegistry>(store: &mut S, raw_dir: &Path, patterns: &[String], tz: Tz) -> Result<Vec<Uuid>, StepError> {
    let files = discover_files(raw_dir, patterns)?;
    info!("Ingest: {} file(s) in {}", files.len(), raw_dir.display());

    let mut load_ids = Vec::with_capacity(files.len());
    for path in &files {
        match register_file(store, path, tz) {
            Ok(load_id) => load_ids.push(load_id),
            Err(e) => warn!("Ingest: skipping {}: {}", path.display(), e),
        }
    }
    Ok(load_ids)
}
