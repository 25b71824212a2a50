//! Keys of the dimensional hierarchy (building -> ITP -> meter) and the closed metric vocabulary.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BuildingId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ItpId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MeterId(pub i64);

/// Level of the hierarchy a dimension row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Building,
    Itp,
    Meter,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Building => "building",
            Level::Itp => "itp",
            Level::Meter => "meter",
        };
        f.write_str(name)
    }
}

/// Canonical metric names stored in `core.meters.metric`.
pub mod metrics {
    pub const T1: &str = "T1";
    pub const T2: &str = "T2";
    pub const FLOW_SUPPLY: &str = "flow_supply";
    pub const FLOW_RETURN: &str = "flow_return";
    pub const CONSUMPTION_PERIOD: &str = "consumption_period";
    pub const CONSUMPTION_CUMULATIVE: &str = "consumption_cumulative";
    pub const PUMP_RUNTIME_HOURS: &str = "pump_runtime_hours";

    /// Metric assumed for rows without a metric column.
    pub const DEFAULT: &str = CONSUMPTION_PERIOD;
}

/// Canonical unit labels stored in `core.meters.unit`.
pub mod units {
    pub const CUBIC_METRE: &str = "м3";
    pub const CUBIC_METRE_PER_HOUR: &str = "м3ч";
    pub const LITRE_PER_SECOND: &str = "л/с";
    pub const CELSIUS: &str = "C";
    pub const HOUR: &str = "час";
    pub const GIGACALORIE: &str = "Гкал";
    pub const KILOWATT_HOUR: &str = "кВт·ч";
}
