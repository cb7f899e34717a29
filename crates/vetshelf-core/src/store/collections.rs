//! Collection and index declarations.

use serde_json::Value;

use super::{StoreError, StoreResult};

/// A secondary index over one field of a collection's records.
///
/// When the field holds an array, every element becomes its own index key
/// (multi-entry). Strings are indexed verbatim, numbers and booleans by
/// their JSON text; nulls, objects and nested arrays are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: &'static str,
    pub key_path: &'static str,
}

/// A named collection of records with a primary key and secondary indexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: &'static str,
    pub key_path: &'static str,
    pub indexes: &'static [IndexSpec],
}

impl CollectionSpec {
    /// Look up an index by name.
    pub fn index(&self, name: &str) -> StoreResult<&IndexSpec> {
        self.indexes
            .iter()
            .find(|index| index.name == name)
            .ok_or_else(|| StoreError::UnknownIndex {
                collection: self.name.to_string(),
                index: name.to_string(),
            })
    }

    /// Extract the primary key of a record.
    pub fn primary_key(&self, record: &Value) -> StoreResult<String> {
        match record.get(self.key_path) {
            Some(Value::String(key)) if !key.is_empty() => Ok(key.clone()),
            _ => Err(StoreError::MissingKey {
                collection: self.name.to_string(),
                key_path: self.key_path.to_string(),
            }),
        }
    }
}

impl IndexSpec {
    /// Index keys produced by a record.
    pub fn keys(&self, record: &Value) -> Vec<String> {
        match record.get(self.key_path) {
            Some(Value::Array(items)) => {
                let mut keys: Vec<String> = items.iter().filter_map(scalar_key).collect();
                keys.sort();
                keys.dedup();
                keys
            }
            Some(value) => scalar_key(value).into_iter().collect(),
            None => Vec::new(),
        }
    }
}

fn scalar_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Find a collection by name.
pub fn find_collection(
    collections: &'static [CollectionSpec],
    name: &str,
) -> StoreResult<&'static CollectionSpec> {
    collections
        .iter()
        .find(|spec| spec.name == name)
        .ok_or_else(|| StoreError::UnknownCollection(name.to_string()))
}
