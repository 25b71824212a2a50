//! Row parser: column-role discovery and the per-row fallback chain that turns one
//! raw source row into one [`CanonicalRecord`].

use crate::db::models::CanonicalRecord;
use crate::models::dimension::metrics;
use crate::normalize::codes::{normalize_entity_code, normalize_meter_code};
use crate::normalize::units::canonicalize;
use crate::source::{Cell, Table};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::path::Path;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Timestamp,
    Building,
    Itp,
    Meter,
    Metric,
    Value,
    Unit,
}

/// Header keywords per role, in discovery order. Keywords of one or two characters
/// must equal a whole token of the header, longer ones may appear anywhere in it.
/// A header matching several roles belongs to the role with the longest matching
/// keyword (`parameter` is a metric, not a `meter`).
const ROLE_KEYWORDS: &[(ColumnRole, &[&str])] = &[
    (ColumnRole::Timestamp, &["ts", "timestamp", "time", "дата", "время", "date"]),
    (ColumnRole::Building, &["building", "дом", "здание"]),
    (ColumnRole::Itp, &["itp", "итп"]),
    (ColumnRole::Meter, &["meter", "счетчик", "счётчик", "meter_code"]),
    (ColumnRole::Metric, &["metric", "parameter", "метрика", "тип", "параметр"]),
    (ColumnRole::Value, &["value", "значение", "потребление", "показания"]),
    (ColumnRole::Unit, &["unit", "ед", "u", "единица"]),
];

pub const UNKNOWN_BUILDING: &str = "UNKNOWN";

/// File-name fragments that identify the building when no building column exists.
const BUILDING_HINTS: &[(&[&str], &str)] = &[
    (&["хвс", "hvs", "xvs"], "BUILDING_XVS"),
    (&["гвс", "gvs"], "BUILDING_GVS"),
];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d.%m.%Y %H:%M:%S",
    "%d.%m.%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d.%m.%Y", "%d/%m/%Y"];

/// Which column (by index) carries each role. Unmatched roles stay `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColumnMap {
    pub timestamp: Option<usize>,
    pub building: Option<usize>,
    pub itp: Option<usize>,
    pub meter: Option<usize>,
    pub metric: Option<usize>,
    pub value: Option<usize>,
    pub unit: Option<usize>,
}

fn keyword_matches(header: &str, keyword: &str) -> bool {
    if keyword.chars().count() <= 2 {
        header.split(|c: char| !c.is_alphanumeric()).any(|token| token == keyword)
    } else {
        header.contains(keyword)
    }
}

/// Role of the longest keyword found in a lowercased header; ties go to the role
/// discovered first.
fn header_role(header: &str) -> Option<ColumnRole> {
    let mut best: Option<(ColumnRole, usize)> = None;
    for (role, keywords) in ROLE_KEYWORDS {
        let longest = keywords
            .iter()
            .filter(|k| keyword_matches(header, k))
            .map(|k| k.chars().count())
            .max();
        if let Some(len) = longest {
            if best.map_or(true, |(_, best_len)| len > best_len) {
                best = Some((*role, len));
            }
        }
    }
    best.map(|(role, _)| role)
}

impl ColumnMap {
    /// Each role takes the first column (by position) whose header belongs to it.
    pub fn discover(headers: &[String]) -> ColumnMap {
        let roles = headers
            .iter()
            .map(|h| header_role(&h.trim().to_lowercase()))
            .collect::<Vec<_>>();
        let mut map = ColumnMap::default();
        for (role, _) in ROLE_KEYWORDS {
            if let Some(idx) = roles.iter().position(|r| *r == Some(*role)) {
                *map.slot(*role) = Some(idx);
            }
        }
        map
    }

    pub fn get(&self, role: ColumnRole) -> Option<usize> {
        match role {
            ColumnRole::Timestamp => self.timestamp,
            ColumnRole::Building => self.building,
            ColumnRole::Itp => self.itp,
            ColumnRole::Meter => self.meter,
            ColumnRole::Metric => self.metric,
            ColumnRole::Value => self.value,
            ColumnRole::Unit => self.unit,
        }
    }

    fn slot(&mut self, role: ColumnRole) -> &mut Option<usize> {
        match role {
            ColumnRole::Timestamp => &mut self.timestamp,
            ColumnRole::Building => &mut self.building,
            ColumnRole::Itp => &mut self.itp,
            ColumnRole::Meter => &mut self.meter,
            ColumnRole::Metric => &mut self.metric,
            ColumnRole::Value => &mut self.value,
            ColumnRole::Unit => &mut self.unit,
        }
    }
}

fn localize(naive: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&naive).earliest().map(|dt| dt.with_timezone(&Utc))
}

/// Best-effort timestamp. Zone-less values are read as wall-clock time in `tz`.
pub fn parse_timestamp(cell: &Cell, tz: Tz) -> Option<DateTime<Utc>> {
    let text = match cell {
        Cell::DateTime(naive) => return localize(*naive, tz),
        Cell::Text(s) => s.trim(),
        _ => return None,
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Some(naive) = NAIVE_DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    {
        return localize(naive, tz);
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .and_then(|d| localize(d.and_time(NaiveTime::MIN), tz))
}

/// Best-effort number. Blank, NaN and non-numeric input is absent rather than zero.
pub fn coerce_value(cell: &Cell) -> Option<f64> {
    let value = match cell {
        Cell::Int(i) => *i as f64,
        Cell::Float(f) => *f,
        Cell::Text(s) => {
            let cleaned = s
                .chars()
                .filter(|c| !c.is_whitespace() && *c != '\u{a0}' && *c != '\u{202f}')
                .map(|c| if c == ',' { '.' } else { c })
                .collect::<String>();
            cleaned.parse::<f64>().ok()?
        }
        Cell::Empty | Cell::Bool(_) | Cell::DateTime(_) => return None,
    };
    value.is_finite().then_some(value)
}

/// Synthetic building code inferred from the file name, if it carries a known hint.
pub fn building_from_file_name(file_name: &str) -> Option<&'static str> {
    let lowered = file_name.to_lowercase();
    BUILDING_HINTS
        .iter()
        .find(|(fragments, _)| fragments.iter().any(|f| lowered.contains(f)))
        .map(|(_, code)| *code)
}

/// Meter code derived from the file's base name (`hvs_jan.xlsx` -> `hvs_jan`).
pub fn meter_from_file_name(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .and_then(normalize_meter_code)
}

/// Parses the rows of one source file against a discovered [`ColumnMap`].
#[derive(Debug, Clone)]
pub struct RowParser {
    pub columns: ColumnMap,
    file_name: String,
    tz: Tz,
}

impl RowParser {
    pub fn new(columns: ColumnMap, file_name: impl Into<String>, tz: Tz) -> Self {
        RowParser {
            columns,
            file_name: file_name.into(),
            tz,
        }
    }

    pub fn for_table(table: &Table, file_name: impl Into<String>, tz: Tz) -> Self {
        RowParser::new(ColumnMap::discover(&table.headers), file_name, tz)
    }

    fn cell<'r>(&self, row: &'r [Cell], role: ColumnRole) -> Option<&'r Cell> {
        self.columns.get(role).and_then(|idx| row.get(idx))
    }

    fn label(&self, row: &[Cell], role: ColumnRole) -> Option<String> {
        self.cell(row, role).and_then(Cell::as_label)
    }

    pub fn timestamp(&self, row: &[Cell]) -> Option<DateTime<Utc>> {
        self.cell(row, ColumnRole::Timestamp).and_then(|c| parse_timestamp(c, self.tz))
    }

    /// Build the canonical record for one row. Every code field is filled through
    /// its own fallback chain, so this never fails.
    pub fn parse(&self, load_id: Uuid, row_num: i32, row: &[Cell]) -> CanonicalRecord {
        let building_code = self
            .label(row, ColumnRole::Building)
            .and_then(|raw| normalize_entity_code(&raw))
            .or_else(|| building_from_file_name(&self.file_name).map(str::to_string))
            .unwrap_or_else(|| UNKNOWN_BUILDING.to_string());

        let itp_code = self
            .label(row, ColumnRole::Itp)
            .and_then(|raw| normalize_entity_code(&raw))
            .unwrap_or_else(|| format!("{}_ITP", building_code));

        let meter_code = self
            .label(row, ColumnRole::Meter)
            .and_then(|raw| normalize_meter_code(&raw))
            .or_else(|| meter_from_file_name(&self.file_name))
            .unwrap_or_else(|| format!("{}_meter", itp_code.to_lowercase()));

        let raw_unit = self.label(row, ColumnRole::Unit).unwrap_or_default();
        let raw_metric = self
            .label(row, ColumnRole::Metric)
            .unwrap_or_else(|| metrics::DEFAULT.to_string());
        let (metric, unit) = canonicalize(&raw_metric, &raw_unit);

        CanonicalRecord {
            load_id,
            row_num,
            source_file: self.file_name.clone(),
            ts: self.timestamp(row),
            building_code,
            itp_code,
            meter_code,
            metric,
            value: self.cell(row, ColumnRole::Value).and_then(coerce_value),
            unit,
        }
    }

    /// One record per table row, in order, with 1-based ordinals.
    pub fn parse_table(&self, load_id: Uuid, table: &Table) -> Vec<CanonicalRecord> {
        table
            .rows
            .iter()
            .enumerate()
            .map(|(idx, row)| self.parse(load_id, idx as i32 + 1, row))
            .collect()
    }

    /// Whether meter codes come from the file name rather than a column.
    pub fn meter_from_file(&self) -> bool {
        self.columns.meter.is_none()
    }
}
