//! Minimal record value for generator-less matching
//!
//! Reflection-based struct marshaling belongs to the calling layer; the
//! in-memory matcher only needs an identity value and a field map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::value::Value;

/// One record: an identity value plus named fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Record {
    pub id: Value,
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field assignment.
    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let record = Record::new(1i64).set("name", "ted").set("age", 7i64);

        assert_eq!(record.id, Value::Int(1));
        assert_eq!(record.get("name"), Some(&Value::String("ted".to_string())));
        assert_eq!(record.get("age"), Some(&Value::Int(7)));
        assert_eq!(record.get("missing"), None);
    }
}
