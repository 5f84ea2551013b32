//! API records.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Unique identifier of a record within its collection.
///
/// The server assigns ids as opaque strings (`_id`). Numeric ids are
/// accepted and kept in their decimal form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    /// Creates an id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for ResourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Lead classification of an inquiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lead {
    /// Hot lead.
    Red,
    /// Converted or positive lead.
    Green,
    /// Warm lead.
    Orange,
}

impl Lead {
    /// Parses the server's label (`"Red"`, `"Green"`, `"Orange"`).
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Red" => Some(Lead::Red),
            "Green" => Some(Lead::Green),
            "Orange" => Some(Lead::Orange),
            _ => None,
        }
    }

    /// Returns the server's label.
    pub fn label(&self) -> &'static str {
        match self {
            Lead::Red => "Red",
            Lead::Green => "Green",
            Lead::Orange => "Orange",
        }
    }
}

/// A generic record from a resource collection.
///
/// Beyond the id the payload is opaque. Accessors exist only for the few
/// fields the engine reasons about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Resource {
    id: ResourceId,
    fields: Map<String, Value>,
}

impl Resource {
    /// Field name the server uses for ids.
    pub const ID_FIELD: &'static str = "_id";

    /// Creates a resource from an id and payload fields.
    ///
    /// The id is written into the payload under `_id`.
    pub fn new(id: impl Into<ResourceId>, mut fields: Map<String, Value>) -> Self {
        let id = id.into();
        fields.insert(Self::ID_FIELD.into(), Value::String(id.as_str().to_owned()));
        Self { id, fields }
    }

    /// Builds a resource from a decoded JSON value.
    pub fn from_value(value: Value) -> ProtocolResult<Self> {
        let Value::Object(fields) = value else {
            return Err(ProtocolError::Decode("record is not a JSON object".into()));
        };
        let id = match fields.get(Self::ID_FIELD).or_else(|| fields.get("id")) {
            Some(Value::String(s)) => ResourceId::new(s.clone()),
            Some(Value::Number(n)) => ResourceId::new(n.to_string()),
            Some(other) => {
                return Err(ProtocolError::invalid_field(
                    "_id",
                    format!("expected string or number, got {other}"),
                ))
            }
            None => return Err(ProtocolError::invalid_field("_id", "missing")),
        };
        Ok(Self { id, fields })
    }

    /// Returns the record id.
    pub fn id(&self) -> &ResourceId {
        &self.id
    }

    /// Returns a payload field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns a payload field as a string.
    pub fn text(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    /// Sets a payload field. The id field cannot be overwritten.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();
        if field != Self::ID_FIELD {
            self.fields.insert(field, value);
        }
    }

    /// Returns all payload fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Lead classification (inquiries).
    pub fn lead(&self) -> Option<Lead> {
        self.text("lead").and_then(Lead::from_label)
    }

    /// Whether an audio recording is attached (inquiries).
    pub fn has_audio(&self) -> bool {
        self.fields
            .get("audio")
            .and_then(|audio| audio.get("key"))
            .is_some_and(|key| !key.is_null())
    }

    /// Read flag (notifications). Missing means unread.
    pub fn is_read(&self) -> bool {
        self.fields
            .get("isRead")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Sets the read flag.
    pub fn set_read(&mut self, read: bool) {
        self.fields.insert("isRead".into(), Value::Bool(read));
    }

    /// Active flag (clients, reference data). Missing means active.
    pub fn is_active(&self) -> bool {
        self.fields
            .get("isActive")
            .and_then(Value::as_bool)
            .unwrap_or(true)
    }
}

impl TryFrom<Value> for Resource {
    type Error = ProtocolError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl From<Resource> for Value {
    fn from(resource: Resource) -> Self {
        Value::Object(resource.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_with_underscore_id() {
        let r = Resource::from_value(json!({"_id": "c1", "name": "Acme"})).unwrap();
        assert_eq!(r.id().as_str(), "c1");
        assert_eq!(r.text("name"), Some("Acme"));
    }

    #[test]
    fn decode_with_numeric_id() {
        let r: Resource = serde_json::from_value(json!({"id": 42})).unwrap();
        assert_eq!(r.id().as_str(), "42");
    }

    #[test]
    fn missing_id_rejected() {
        let err = Resource::from_value(json!({"name": "x"})).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidField { field: "_id", .. }));
    }

    #[test]
    fn non_object_rejected() {
        assert!(Resource::from_value(json!([1, 2])).is_err());
    }

    #[test]
    fn inquiry_accessors() {
        let r = Resource::from_value(json!({
            "_id": "f1",
            "lead": "Orange",
            "audio": {"key": "rec/1.webm"}
        }))
        .unwrap();
        assert_eq!(r.lead(), Some(Lead::Orange));
        assert!(r.has_audio());

        let r = Resource::from_value(json!({"_id": "f2", "lead": "Blue", "audio": {}})).unwrap();
        assert_eq!(r.lead(), None);
        assert!(!r.has_audio());
    }

    #[test]
    fn read_flag_roundtrip() {
        let mut r = Resource::new("n1", Map::new());
        assert!(!r.is_read());
        r.set_read(true);
        assert!(r.is_read());
        assert_eq!(Value::from(r)["isRead"], json!(true));
    }

    #[test]
    fn set_cannot_change_id() {
        let mut r = Resource::new("a", Map::new());
        r.set("_id", json!("b"));
        assert_eq!(r.text("_id"), Some("a"));
        assert_eq!(r.id().as_str(), "a");
    }
}
