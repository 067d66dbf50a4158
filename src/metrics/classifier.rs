use num_traits::ToPrimitive;
use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::metrics::key::{metric_key, percentile_suffix};
use crate::models::event::{Event, FieldValue};

/// Field name prefixes every sink forwards.
pub const DEFAULT_PREFIXES: &[&str] = &[
    "rollingCount",
    "current",
    "isCircuitBreakerOpen",
    "latencyTotal",
];

/// Per-host sinks also forward execution latency.
pub const PER_HOST_PREFIXES: &[&str] = &[
    "rollingCount",
    "current",
    "isCircuitBreakerOpen",
    "latencyExecute",
    "latencyTotal",
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifyError {
    #[error("event is missing required string field '{0}'")]
    MissingRequiredField(&'static str),
}

/// Shape reported for numbers that have no finite `i64`/`f64` gauge.
const OUT_OF_RANGE: &str = "out-of-range number";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representation {
    /// Floats are truncated toward zero.
    Integer,
    Float,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierPolicy {
    pub admitted_prefixes: Vec<&'static str>,
    pub representation: Representation,
    pub normalize_per_host: bool,
}

impl ClassifierPolicy {
    pub fn raw() -> Self {
        Self {
            admitted_prefixes: DEFAULT_PREFIXES.to_vec(),
            representation: Representation::Integer,
            normalize_per_host: false,
        }
    }

    pub fn per_host() -> Self {
        Self {
            admitted_prefixes: PER_HOST_PREFIXES.to_vec(),
            representation: Representation::Integer,
            normalize_per_host: true,
        }
    }

    pub fn series() -> Self {
        Self {
            admitted_prefixes: DEFAULT_PREFIXES.to_vec(),
            representation: Representation::Float,
            normalize_per_host: false,
        }
    }

    pub fn admits(&self, field: &str) -> bool {
        self.admitted_prefixes
            .iter()
            .any(|prefix| field.starts_with(prefix))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Gauge {
    Integer(i64),
    Float(f64),
}

impl fmt::Display for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gauge::Integer(v) => write!(f, "{v}"),
            Gauge::Float(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Emission {
    pub key: String,
    pub value: Gauge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnexpectedField {
    pub field: String,
    pub shape: &'static str,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classified {
    pub emissions: Vec<Emission>,
    pub unexpected: Vec<UnexpectedField>,
}

impl Classified {
    pub fn is_empty(&self) -> bool {
        self.emissions.is_empty()
    }
}

/// Turns an [`Event`] into gauge emissions under a fixed policy.
///
/// Holds no mutable state, so classifying the same event twice yields the
/// same result.
#[derive(Debug, Clone)]
pub struct FieldClassifier {
    policy: ClassifierPolicy,
}

impl FieldClassifier {
    pub fn new(policy: ClassifierPolicy) -> Self {
        Self { policy }
    }

    pub fn classify(&self, event: &Event) -> Result<Classified, ClassifyError> {
        let name = event.name()?;
        let resource_type = event.resource_type()?;

        let divisor = if self.policy.normalize_per_host {
            match event.reporting_hosts().filter(|hosts| *hosts >= 1.0) {
                Some(hosts) => Some(hosts),
                None => {
                    debug!("Skipping {event}: no usable reportingHosts");
                    return Ok(Classified::default());
                }
            }
        } else {
            None
        };

        let mut fields: Vec<(&String, &FieldValue)> = event
            .fields()
            .filter(|(field, _)| self.policy.admits(field))
            .collect();
        fields.sort_unstable_by(|a, b| a.0.cmp(b.0));

        let mut classified = Classified::default();
        for (field, value) in fields {
            let key = metric_key(event.cluster_name(), name, resource_type, field);
            match value {
                FieldValue::Str(_) => {}
                FieldValue::Percentiles(table) => {
                    for (label, v) in table {
                        let pct_key = format!("{key}.{}", percentile_suffix(label));
                        match self.coerce_float(*v, divisor) {
                            Some(value) => classified.emissions.push(Emission {
                                key: pct_key,
                                value,
                            }),
                            None => classified.unexpected.push(UnexpectedField {
                                field: pct_key,
                                shape: OUT_OF_RANGE,
                            }),
                        }
                    }
                }
                FieldValue::Bool(b) => classified.emissions.push(Emission {
                    key,
                    value: self.flag(*b),
                }),
                FieldValue::Int(v) => match self.coerce_int(*v, divisor) {
                    Some(value) => classified.emissions.push(Emission { key, value }),
                    None => classified.unexpected.push(UnexpectedField {
                        field: field.clone(),
                        shape: OUT_OF_RANGE,
                    }),
                },
                FieldValue::Float(v) => match self.coerce_float(*v, divisor) {
                    Some(value) => classified.emissions.push(Emission { key, value }),
                    None => classified.unexpected.push(UnexpectedField {
                        field: field.clone(),
                        shape: OUT_OF_RANGE,
                    }),
                },
                FieldValue::Unknown(_) => classified.unexpected.push(UnexpectedField {
                    field: field.clone(),
                    shape: value.shape(),
                }),
            }
        }

        Ok(classified)
    }

    fn flag(&self, value: bool) -> Gauge {
        let v = i64::from(value);
        match self.policy.representation {
            Representation::Integer => Gauge::Integer(v),
            Representation::Float => Gauge::Float(v as f64),
        }
    }

    fn coerce_int(&self, value: i64, divisor: Option<f64>) -> Option<Gauge> {
        match (self.policy.representation, divisor) {
            (Representation::Integer, None) => Some(Gauge::Integer(value)),
            (Representation::Float, None) => Some(Gauge::Float(value as f64)),
            // Divided as a float, so `10` and `10.0` normalize to the same gauge.
            (_, Some(_)) => self.coerce_float(value as f64, divisor),
        }
    }

    fn coerce_float(&self, value: f64, divisor: Option<f64>) -> Option<Gauge> {
        let value = match divisor {
            Some(hosts) => value / hosts,
            None => value,
        };
        match self.policy.representation {
            Representation::Integer => value.trunc().to_i64().map(Gauge::Integer),
            Representation::Float => value.is_finite().then_some(Gauge::Float(value)),
        }
    }
}
