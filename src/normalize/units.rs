//! Metric and unit vocabulary.
//!
//! Source exports label the same quantity in many ways ("Расход подачи", "G1",
//! "flow supply", ...) and write units with every mix of Cyrillic, Latin and
//! superscripts. Both are folded onto a closed canonical vocabulary here. The
//! functions are total: anything unrecognized degrades to a cleaned string.

use crate::models::dimension::{metrics, units};

/// Metric aliases keyed by [`metric_key`] output.
const METRIC_ALIASES: &[(&str, &str)] = &[
    // supply temperature
    ("t1", metrics::T1),
    ("т1", metrics::T1),
    ("t1подачи", metrics::T1),
    ("т1подачи", metrics::T1),
    ("tподачи", metrics::T1),
    ("тподачи", metrics::T1),
    ("температураподачи", metrics::T1),
    ("supplytemperature", metrics::T1),
    ("temperaturesupply", metrics::T1),
    ("tsupply", metrics::T1),
    // return temperature
    ("t2", metrics::T2),
    ("т2", metrics::T2),
    ("t2обратки", metrics::T2),
    ("т2обратки", metrics::T2),
    ("tобратки", metrics::T2),
    ("тобратки", metrics::T2),
    ("температураобратки", metrics::T2),
    ("returntemperature", metrics::T2),
    ("temperaturereturn", metrics::T2),
    ("treturn", metrics::T2),
    // flow rates
    ("flowsupply", metrics::FLOW_SUPPLY),
    ("supplyflow", metrics::FLOW_SUPPLY),
    ("расходподачи", metrics::FLOW_SUPPLY),
    ("расходнаподаче", metrics::FLOW_SUPPLY),
    ("g1", metrics::FLOW_SUPPLY),
    ("г1", metrics::FLOW_SUPPLY),
    ("flowreturn", metrics::FLOW_RETURN),
    ("returnflow", metrics::FLOW_RETURN),
    ("расходобратки", metrics::FLOW_RETURN),
    ("расходнаобратке", metrics::FLOW_RETURN),
    ("g2", metrics::FLOW_RETURN),
    ("г2", metrics::FLOW_RETURN),
    // consumption
    ("consumptionperiod", metrics::CONSUMPTION_PERIOD),
    ("periodconsumption", metrics::CONSUMPTION_PERIOD),
    ("consumption", metrics::CONSUMPTION_PERIOD),
    ("объемзапериод", metrics::CONSUMPTION_PERIOD),
    ("потреблениезапериод", metrics::CONSUMPTION_PERIOD),
    ("расходзапериод", metrics::CONSUMPTION_PERIOD),
    ("потребление", metrics::CONSUMPTION_PERIOD),
    ("consumptioncumulative", metrics::CONSUMPTION_CUMULATIVE),
    ("cumulativeconsumption", metrics::CONSUMPTION_CUMULATIVE),
    ("накопленныйрасход", metrics::CONSUMPTION_CUMULATIVE),
    ("накопленныйобъем", metrics::CONSUMPTION_CUMULATIVE),
    ("показания", metrics::CONSUMPTION_CUMULATIVE),
    ("показаниясчетчика", metrics::CONSUMPTION_CUMULATIVE),
    // pumps
    ("pumpruntimehours", metrics::PUMP_RUNTIME_HOURS),
    ("pumpruntime", metrics::PUMP_RUNTIME_HOURS),
    ("наработканасоса", metrics::PUMP_RUNTIME_HOURS),
    ("часыработынасоса", metrics::PUMP_RUNTIME_HOURS),
    ("времяработынасоса", metrics::PUMP_RUNTIME_HOURS),
];

/// Unit each recognized metric is stored in.
const METRIC_UNITS: &[(&str, &str)] = &[
    (metrics::T1, units::CELSIUS),
    (metrics::T2, units::CELSIUS),
    (metrics::FLOW_SUPPLY, units::CUBIC_METRE_PER_HOUR),
    (metrics::FLOW_RETURN, units::CUBIC_METRE_PER_HOUR),
    (metrics::CONSUMPTION_PERIOD, units::CUBIC_METRE),
    (metrics::CONSUMPTION_CUMULATIVE, units::CUBIC_METRE),
    (metrics::PUMP_RUNTIME_HOURS, units::HOUR),
];

/// Unit aliases keyed by [`unit_key`] output.
const UNIT_ALIASES: &[(&[&str], &str)] = &[
    (
        &[
            "м3", "м³", "м^3", "m3", "m^3", "m³", "кубм", "куб.м", "куб.м.", "кубометр", "кубометры", "кубметр",
        ],
        units::CUBIC_METRE,
    ),
    (
        &[
            "м3/ч", "м³/ч", "м^3/ч", "м3ч", "м3час", "м3/час", "m3/h", "m^3/h", "m³/h", "m3h", "m3/hr", "кубм/ч",
            "куб.м/ч", "куб.м/час",
        ],
        units::CUBIC_METRE_PER_HOUR,
    ),
    (&["л/с", "л/c", "л-с", "лсек", "л/сек", "l/s", "lps"], units::LITRE_PER_SECOND),
    (
        &[
            "c", "degc", "°c", "°с", "градc", "градс", "цел", "цельсий", "цельсия", "градусц", "градусыц",
        ],
        units::CELSIUS,
    ),
    (&["ч", "час", "часы", "h", "hr", "hrs", "hour", "hours"], units::HOUR),
    (&["гкал", "гигакал", "гигакалория", "gcal"], units::GIGACALORIE),
    (
        &["квтч", "квт*ч", "квт·ч", "квт-ч", "kwh", "квтчас", "квтчч", "квтчасы", "kw*h", "kw·h"],
        units::KILOWATT_HOUR,
    ),
];

/// Fold a metric label into the alias-table key space.
fn metric_key(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .filter(|c| !matches!(c, ' ' | '_' | '-' | '.') && !c.is_whitespace())
        .map(|c| if c == 'ё' { 'е' } else { c })
        .collect()
}

/// Fold a unit label into the alias-table key space.
fn unit_key(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == 'ё' { 'е' } else { c })
        .collect()
}

/// Escape hatch for metrics outside the closed vocabulary.
fn unmapped_metric(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join("_").to_uppercase()
}

/// Look up the canonical metric for a raw label, if it is part of the vocabulary.
pub fn canonical_metric(raw: &str) -> Option<&'static str> {
    let key = metric_key(raw);
    METRIC_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, metric)| *metric)
}

/// Unit a canonical metric is stored in, if the metric is part of the vocabulary.
pub fn target_unit(metric: &str) -> Option<&'static str> {
    METRIC_UNITS.iter().find(|(m, _)| *m == metric).map(|(_, u)| *u)
}

/// Normalize a unit label without regard to the metric. Unknown labels come back trimmed.
pub fn normalize_unit(raw: &str) -> String {
    let key = unit_key(raw);
    UNIT_ALIASES
        .iter()
        .find(|(aliases, _)| aliases.contains(&key.as_str()))
        .map(|(_, unit)| (*unit).to_string())
        .unwrap_or_else(|| raw.trim().to_string())
}

/// Map a raw (metric, unit) pair onto the canonical vocabulary.
///
/// A recognized metric always yields its target unit; the raw unit only decides
/// the outcome when the metric is unknown.
pub fn canonicalize(raw_metric: &str, raw_unit: &str) -> (String, String) {
    match canonical_metric(raw_metric) {
        Some(metric) => {
            let unit = target_unit(metric).map(str::to_string).unwrap_or_else(|| normalize_unit(raw_unit));
            (metric.to_string(), unit)
        }
        None => (unmapped_metric(raw_metric), normalize_unit(raw_unit)),
    }
}
