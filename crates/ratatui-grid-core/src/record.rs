use crate::value::Value;
use std::collections::BTreeMap;

/// Stable identity of a data row, supplied by the caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowId(pub u64);

/// A data row: an identity plus named fields.
///
/// The grid reads fields for display and writes them only when an edit is committed.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub id: RowId,
    fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(id: u64) -> Self {
        Self {
            id: RowId(id),
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Missing fields read as [`Value::Null`].
    pub fn get(&self, field: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.fields.get(field).unwrap_or(&NULL)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }
}
