//! Config-driven row synthesis for insert load tests
//!
//! Operators describe each column of a batch as a [`ValueSpec`] in the plan
//! params; the [`BatchBuilder`] turns the schema into rows, threading a
//! shared sequence number through so sequence-based columns stay contiguous
//! across batches.

use chrono::NaiveDateTime;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::warn;

const CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

fn default_step() -> u64 {
    1
}

/// One column's value generator.
///
/// ```json
/// {
///   "event_id": {"type": "uuid"},
///   "org_id": {"type": "randomInteger", "min": 1, "max": 1000},
///   "platform": {"type": "randomSet", "alphabet": ["python", "rust"]},
///   "received": {"type": "timestamp", "format": "%Y-%m-%d %H:%M:%S"}
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ValueSpec {
    /// Always the same value.
    Constant { value: Value },
    /// `from + step * sequence`.
    Sequence {
        #[serde(default)]
        from: u64,
        #[serde(default = "default_step")]
        step: u64,
    },
    /// Uniform draw from a fixed alphabet.
    RandomSet { alphabet: Vec<String> },
    /// Cycles through the alphabet in sequence order.
    SequenceSet { alphabet: Vec<String> },
    /// The current time in the given chrono format.
    Timestamp { format: String },
    /// A uniformly random time between two instants, all in the given
    /// chrono format.
    RandomTimestamp {
        start: String,
        end: String,
        format: String,
    },
    Uuid,
    RandomInteger { min: i64, max: i64 },
    RandomFloat { min: f64, max: f64 },
    #[serde(rename_all = "camelCase")]
    RandomString { min_size: usize, max_size: usize },
    /// A list of values from a nested spec.
    #[serde(rename_all = "camelCase")]
    RandomArray {
        min_size: usize,
        max_size: usize,
        values: Box<ValueSpec>,
    },
    /// A string-keyed map with nested key and value specs.
    #[serde(rename_all = "camelCase")]
    RandomMap {
        min_size: usize,
        max_size: usize,
        keys: Box<ValueSpec>,
        values: Box<ValueSpec>,
    },
}

fn random_size(min: usize, max: usize) -> usize {
    if max > min {
        rand::thread_rng().gen_range(min..max)
    } else {
        min
    }
}

fn random_string(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
        .collect()
}

impl ValueSpec {
    /// Produce the value for one row.
    pub fn value(&self, sequence: u64) -> Value {
        let mut rng = rand::thread_rng();
        match self {
            ValueSpec::Constant { value } => value.clone(),
            ValueSpec::Sequence { from, step } => json!(from + step * sequence),
            ValueSpec::RandomSet { alphabet } => {
                if alphabet.is_empty() {
                    return Value::Null;
                }
                json!(alphabet[rng.gen_range(0..alphabet.len())])
            }
            ValueSpec::SequenceSet { alphabet } => {
                if alphabet.is_empty() {
                    return Value::Null;
                }
                json!(alphabet[(sequence % alphabet.len() as u64) as usize])
            }
            ValueSpec::Timestamp { format } => {
                json!(chrono::Utc::now().format(format).to_string())
            }
            ValueSpec::RandomTimestamp { start, end, format } => {
                random_timestamp(start, end, format)
            }
            ValueSpec::Uuid => json!(uuid::Uuid::new_v4().to_string()),
            ValueSpec::RandomInteger { min, max } => {
                if max > min {
                    json!(rng.gen_range(*min..*max))
                } else {
                    json!(min)
                }
            }
            ValueSpec::RandomFloat { min, max } => json!(min + rng.gen::<f64>() * (max - min)),
            ValueSpec::RandomString { min_size, max_size } => {
                json!(random_string(random_size(*min_size, *max_size)))
            }
            ValueSpec::RandomArray {
                min_size,
                max_size,
                values,
            } => {
                let length = random_size(*min_size, *max_size);
                Value::Array((0..length).map(|_| values.value(sequence)).collect())
            }
            ValueSpec::RandomMap {
                min_size,
                max_size,
                keys,
                values,
            } => {
                let length = random_size(*min_size, *max_size);
                let mut map = Map::new();
                for _ in 0..length {
                    let key = match keys.value(sequence) {
                        Value::String(key) => key,
                        other => other.to_string(),
                    };
                    map.insert(key, values.value(sequence));
                }
                Value::Object(map)
            }
        }
    }
}

fn random_timestamp(start: &str, end: &str, format: &str) -> Value {
    let parse = |raw: &str| NaiveDateTime::parse_from_str(raw, format);
    match (parse(start), parse(end)) {
        (Ok(start), Ok(end)) if (end - start).num_seconds() > 0 => {
            let span = (end - start).num_seconds();
            let offset = chrono::Duration::seconds(rand::thread_rng().gen_range(0..span));
            json!((start + offset).format(format).to_string())
        }
        _ => {
            warn!(start, end, "invalid randomTimestamp bounds, using now");
            json!(chrono::Utc::now().format(format).to_string())
        }
    }
}

/// Column name to value spec, ordered so generated rows are stable.
pub type RowSchema = BTreeMap<String, ValueSpec>;

/// Builds batches of rows from a schema, handing each row the next value of
/// a shared sequence counter.
pub struct BatchBuilder {
    schema: RowSchema,
    batch_size: u64,
    sequence: Mutex<u64>,
}

impl BatchBuilder {
    pub fn new(schema: RowSchema, batch_size: u64) -> Self {
        Self {
            schema,
            batch_size,
            sequence: Mutex::new(0),
        }
    }

    pub fn build_batch(&self) -> Vec<Map<String, Value>> {
        let start = {
            let mut sequence = self.sequence.lock().expect("sequence lock poisoned");
            let start = *sequence;
            *sequence += self.batch_size;
            start
        };

        (0..self.batch_size)
            .map(|offset| {
                self.schema
                    .iter()
                    .map(|(column, spec)| (column.clone(), spec.value(start + offset)))
                    .collect()
            })
            .collect()
    }
}
