//! Generic identity-plus-attributes container for table rows.

use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Errors raised while building a [`Record`] from caller input.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RecordError {
    /// The payload is neither a JSON object, a JSON-object string, nor a
    /// bare numeric identity.
    #[error("record payload must be an object, an object string, or a numeric id, got {kind}")]
    UnsupportedPayload {
        /// JSON kind of the offending value.
        kind: &'static str,
    },
    /// A string payload was not valid JSON.
    #[error("failed to parse record payload as JSON: {source}")]
    InvalidJson {
        /// Underlying decode failure.
        #[source]
        source: serde_json::Error,
    },
}

/// A single table row: an optional identity plus an ordered attribute map.
///
/// The identity column is configured per owning store, not per instance.
/// `attributes` never holds a stale copy of the identity: it is stripped on
/// construction and re-injected by [`Record::to_map`].
///
/// # Examples
/// ```
/// use serde_json::json;
/// use geodata_core::Record;
///
/// let record = Record::from_value(&json!({"id": 5, "name": "a"}), "id", false).unwrap();
/// assert_eq!(record.id(), Some(5));
/// assert_eq!(record.to_map()["name"], "a");
/// assert_eq!(record.to_map()["id"], 5);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: Option<i64>,
    attributes: Map<String, Value>,
    unique_id_field: String,
}

impl Record {
    /// Construct an empty record bound to the given identity column.
    pub fn new(unique_id_field: impl Into<String>) -> Self {
        Self {
            id: None,
            attributes: Map::new(),
            unique_id_field: unique_id_field.into(),
        }
    }

    /// Build a record from caller-supplied JSON.
    ///
    /// Strings are decoded as JSON first. Bare numbers become identity-only
    /// records. With `unwrap_envelope`, an object carrying an `attributes`
    /// key is treated as an `{id, attributes}` envelope and the envelope id
    /// is merged under the identity column before extraction.
    pub fn from_value(
        raw: &Value,
        unique_id_field: &str,
        unwrap_envelope: bool,
    ) -> Result<Self, RecordError> {
        match raw {
            Value::String(text) => {
                let decoded: Value = serde_json::from_str(text)
                    .map_err(|source| RecordError::InvalidJson { source })?;
                Self::from_value(&decoded, unique_id_field, unwrap_envelope)
            }
            Value::Number(n) => {
                let mut record = Self::new(unique_id_field);
                record.id = n.as_i64();
                if record.id.is_none() {
                    return Err(RecordError::UnsupportedPayload {
                        kind: "non-integer number",
                    });
                }
                Ok(record)
            }
            Value::Object(map) => Ok(Self::from_map(map.clone(), unique_id_field, unwrap_envelope)),
            Value::Null => Err(RecordError::UnsupportedPayload { kind: "null" }),
            Value::Bool(_) => Err(RecordError::UnsupportedPayload { kind: "boolean" }),
            Value::Array(_) => Err(RecordError::UnsupportedPayload { kind: "array" }),
        }
    }

    fn from_map(mut map: Map<String, Value>, unique_id_field: &str, unwrap_envelope: bool) -> Self {
        if unwrap_envelope {
            if let Some(Value::Object(mut attributes)) = map.remove("attributes") {
                if let Some(id) = map.remove("id") {
                    attributes.insert(unique_id_field.to_string(), id);
                }
                map = attributes;
            }
        }

        let id = map.remove(unique_id_field).and_then(|v| value_as_id(&v));
        Self {
            id,
            attributes: map,
            unique_id_field: unique_id_field.to_string(),
        }
    }

    /// Name of the identity column this record is bound to.
    pub fn unique_id_field(&self) -> &str {
        &self.unique_id_field
    }

    /// Whether the record has been assigned an identity.
    pub fn has_id(&self) -> bool {
        self.id.is_some()
    }

    /// The assigned identity, if any. `None` means "not yet persisted".
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    /// Assign (or clear) the identity. Assigning a value is what flips the
    /// save lifecycle from insert to update.
    pub fn set_id(&mut self, id: impl Into<Option<i64>>) {
        self.id = id.into();
    }

    /// The attribute map, identity excluded.
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    /// Look up a single attribute.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Set a single attribute. Writing under the identity column updates the
    /// identity instead, preserving the no-stale-duplicate invariant.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if name == self.unique_id_field {
            self.id = value_as_id(&value);
        } else {
            self.attributes.insert(name, value);
        }
    }

    /// Replace the attribute map wholesale. The identity, if present in the
    /// new map, is extracted rather than stored as a plain attribute.
    pub fn set_attributes(&mut self, mut attributes: Map<String, Value>) {
        if let Some(id) = attributes.remove(&self.unique_id_field) {
            self.id = value_as_id(&id);
        }
        self.attributes = attributes;
    }

    /// Remove and return a single attribute.
    pub fn remove_attribute(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }

    /// Emit the attribute map with the identity injected under its column
    /// name. Records without an identity carry no identity key at all, which
    /// signals "new, unsaved" to SQL builders.
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = self.attributes.clone();
        match self.id {
            Some(id) => {
                map.insert(self.unique_id_field.clone(), Value::Number(Number::from(id)));
            }
            None => {
                map.remove(&self.unique_id_field);
            }
        }
        map
    }
}

fn value_as_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
