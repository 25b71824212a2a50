//! Outcome and failure types shared by the pipeline steps.

use crate::services::resolve::ResolveError;
use crate::source::SourceError;
use crate::store::StoreError;
use core::fmt;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Why a single row was skipped. Row anomalies never abort a step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum AnomalyKind {
    MissingTimestamp,
    MissingValue,
    /// Dimension resolution failed for the row.
    Resolution(String),
    /// Writing the row failed and its savepoint was rolled back.
    Store(String),
}

impl Display for AnomalyKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AnomalyKind::MissingTimestamp => write!(f, "missing or unparseable timestamp"),
            AnomalyKind::MissingValue => write!(f, "missing or non-numeric value"),
            AnomalyKind::Resolution(e) => write!(f, "dimension resolution failed: {}", e),
            AnomalyKind::Store(e) => write!(f, "write failed: {}", e),
        }
    }
}

impl From<ResolveError> for AnomalyKind {
    fn from(value: ResolveError) -> Self {
        match value {
            ResolveError::Store(e) => AnomalyKind::Store(e.to_string()),
            other => AnomalyKind::Resolution(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowAnomaly {
    pub row_num: i32,
    #[serde(flatten)]
    pub kind: AnomalyKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub load_id: Uuid,
    /// Rows the step looked at.
    pub processed: usize,
    /// Rows the step actually wrote.
    pub written: usize,
    pub anomalies: Vec<RowAnomaly>,
}

impl StepReport {
    pub fn new(load_id: Uuid) -> Self {
        StepReport {
            load_id,
            processed: 0,
            written: 0,
            anomalies: Vec::new(),
        }
    }

    pub fn anomaly(&mut self, row_num: i32, kind: AnomalyKind) {
        self.anomalies.push(RowAnomaly { row_num, kind });
    }
}

/// A failure that aborts the whole step for one batch.
#[derive(Debug)]
pub enum StepError {
    Store(StoreError),
    Source(SourceError),
    /// No raw file is registered under this load id.
    UnknownBatch(Uuid),
}

impl Display for StepError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StepError::Store(e) => write!(f, "{}", e),
            StepError::Source(e) => write!(f, "source file error: {}", e),
            StepError::UnknownBatch(id) => write!(f, "no raw file registered for load id {}", id),
        }
    }
}

impl Error for StepError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StepError::Store(e) => Some(e),
            StepError::Source(e) => Some(e),
            StepError::UnknownBatch(_) => None,
        }
    }
}

impl From<StoreError> for StepError {
    fn from(value: StoreError) -> Self {
        StepError::Store(value)
    }
}

impl From<SourceError> for StepError {
    fn from(value: SourceError) -> Self {
        StepError::Source(value)
    }
}

impl From<diesel::result::Error> for StepError {
    fn from(value: diesel::result::Error) -> Self {
        StepError::Store(StoreError::Database(value))
    }
}
