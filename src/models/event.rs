use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::metrics::classifier::ClassifyError;

pub const NAME_FIELD: &str = "name";
pub const TYPE_FIELD: &str = "type";
pub const REPORTING_HOSTS_FIELD: &str = "reportingHosts";

/// One decoded payload value.
///
/// Numbers that fit an `i64` decode as `Int`, every other number as `Float`.
/// Objects whose members are all numbers are percentile tables; anything the
/// classifier has no rule for ends up in `Unknown`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    Percentiles(BTreeMap<String, f64>),
    Unknown(Value),
}

impl FieldValue {
    pub fn shape(&self) -> &'static str {
        match self {
            FieldValue::Str(_) => "string",
            FieldValue::Bool(_) => "bool",
            FieldValue::Int(_) => "int",
            FieldValue::Float(_) => "float",
            FieldValue::Percentiles(_) => "percentiles",
            FieldValue::Unknown(Value::Null) => "null",
            FieldValue::Unknown(Value::Array(_)) => "array",
            FieldValue::Unknown(Value::Object(_)) => "object",
            FieldValue::Unknown(_) => "number",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Int(v) => Some(*v as f64),
            FieldValue::Float(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => FieldValue::Str(s),
            Value::Bool(b) => FieldValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    FieldValue::Int(i)
                } else if let Some(f) = n.as_f64() {
                    FieldValue::Float(f)
                } else {
                    FieldValue::Unknown(Value::Number(n))
                }
            }
            Value::Object(map) => {
                if map.values().all(Value::is_number) {
                    let table = map
                        .iter()
                        .filter_map(|(label, v)| v.as_f64().map(|f| (label.clone(), f)))
                        .collect();
                    FieldValue::Percentiles(table)
                } else {
                    FieldValue::Unknown(Value::Object(map))
                }
            }
            other => FieldValue::Unknown(other),
        }
    }
}

/// A single decoded `turbine.stream` record for one circuit or thread pool.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    cluster_name: String,
    data: HashMap<String, FieldValue>,
}

impl Event {
    pub fn new(cluster_name: impl Into<String>, data: HashMap<String, FieldValue>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
            data,
        }
    }

    /// Decodes the JSON text following a `data: ` prefix.
    ///
    /// The payload must be a JSON object; anything else is a decode error.
    pub fn from_payload(cluster_name: &str, payload: &str) -> Result<Self, serde_json::Error> {
        let raw: HashMap<String, Value> = serde_json::from_str(payload)?;
        let data = raw
            .into_iter()
            .map(|(k, v)| (k, FieldValue::from(v)))
            .collect();
        Ok(Self::new(cluster_name, data))
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.data.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.data.iter()
    }

    /// Circuit or pool identifier.
    pub fn name(&self) -> Result<&str, ClassifyError> {
        self.required_str(NAME_FIELD)
    }

    /// Resource type, e.g. `HystrixCommand` or `HystrixThreadPool`.
    pub fn resource_type(&self) -> Result<&str, ClassifyError> {
        self.required_str(TYPE_FIELD)
    }

    pub fn reporting_hosts(&self) -> Option<f64> {
        self.data
            .get(REPORTING_HOSTS_FIELD)
            .and_then(FieldValue::as_f64)
    }

    fn required_str(&self, field: &'static str) -> Result<&str, ClassifyError> {
        match self.data.get(field) {
            Some(FieldValue::Str(s)) => Ok(s.as_str()),
            _ => Err(ClassifyError::MissingRequiredField(field)),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name().unwrap_or("<unnamed>");
        write!(
            f,
            "{}/{} ({} fields)",
            self.cluster_name,
            name,
            self.data.len()
        )
    }
}
