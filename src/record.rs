//! Employee record under edit
//!
//! A record is the stable identifier plus an ordered field-name to value map.
//! The backend's representation is authoritative: whatever it returns from a
//! partial update is merged back over the local copy.

use indexmap::IndexMap;
use serde_json::Value;

use crate::errors::{EditError, EditResult};

/// Placeholder hosts render for absent values
pub const EMPTY_DISPLAY: &str = "-";

/// The employee entity being inspected and edited
#[derive(Debug, Clone)]
pub struct Record {
    id: String,
    values: IndexMap<String, Value>,
}

impl Record {
    /// Build a record from a backend list-entry payload.
    ///
    /// The `id` key is lifted out of the map; it never changes afterwards.
    pub fn from_value(payload: &Value) -> EditResult<Self> {
        let map = payload
            .as_object()
            .ok_or_else(|| EditError::MalformedRecord("expected a JSON object".to_string()))?;

        let id = map
            .get("id")
            .and_then(value_to_id)
            .ok_or_else(|| EditError::MalformedRecord("missing record id".to_string()))?;

        let values = map
            .iter()
            .filter(|(name, _)| name.as_str() != "id")
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        Ok(Record { id, values })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Committed value of a field; null when absent
    pub fn get(&self, field: &str) -> &Value {
        self.values.get(field).unwrap_or(&Value::Null)
    }

    pub fn set(&mut self, field: &str, value: Value) {
        self.values.insert(field.to_string(), value);
    }

    /// Merge a full or partial server representation over the local copy.
    ///
    /// The server decides the canonical form of every field it returns (it
    /// may reformat a date, for instance). The id is never overwritten.
    pub fn apply_server_response(&mut self, response: &Value) {
        let Some(map) = response.as_object() else {
            return;
        };
        for (name, value) in map {
            if name == "id" {
                continue;
            }
            self.values.insert(name.clone(), value.clone());
        }
    }

    /// Plain-text rendering of a field value; `-` for absent values
    pub fn display(&self, field: &str) -> String {
        display_value(self.get(field))
    }
}

/// Render one JSON value the way hosts show it
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => EMPTY_DISPLAY.to_string(),
        Value::String(s) if s.is_empty() => EMPTY_DISPLAY.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn builds_from_list_entry() {
        let record = Record::from_value(&json!({
            "id": 7,
            "firstName": "Asha",
            "phone2": null,
        }))
        .unwrap();

        assert_eq!(record.id(), "7");
        assert_eq!(record.get("firstName"), &json!("Asha"));
        assert!(record.get("phone2").is_null());
        assert!(record.get("neverSeen").is_null());
    }

    #[test]
    fn rejects_payload_without_id() {
        let err = Record::from_value(&json!({ "firstName": "Asha" })).unwrap_err();
        assert_eq!(err.error_code(), "MALFORMED_RECORD");
    }

    #[test]
    fn server_response_wins_but_id_is_immutable() {
        let mut record = Record::from_value(&json!({ "id": 7, "dob": "1994-2-8" })).unwrap();
        record.apply_server_response(&json!({ "id": 999, "dob": "1994-02-08" }));

        assert_eq!(record.id(), "7");
        assert_eq!(record.get("dob"), &json!("1994-02-08"));
    }

    #[test]
    fn displays_dash_for_absent_values() {
        let record = Record::from_value(&json!({ "id": 1, "phone2": null })).unwrap();
        assert_eq!(record.display("phone2"), "-");
        assert_eq!(record.display("nothing"), "-");
    }

    #[test]
    fn displays_numbers_without_quotes() {
        let record = Record::from_value(&json!({ "id": 1, "ctc": 50000 })).unwrap();
        assert_eq!(record.display("ctc"), "50000");
    }
}
