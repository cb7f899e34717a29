//! Domain models for the clinic records store.

mod client;
mod patient;
mod phone;
mod summary;
pub mod timestamp;
mod visit;

pub use client::*;
pub use patient::*;
pub use phone::*;
pub use summary::*;
pub use visit::*;

use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;

/// Model errors.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Value error: {0}")]
    Value(String),

    #[error("Type error: expected a {expected} record, found {found:?}")]
    Type { expected: &'static str, found: String },

    #[error("Malformed record: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ModelResult<T> = Result<T, ModelError>;

/// Names of fields changed since the last successful persist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirtyFields(BTreeSet<&'static str>);

impl DirtyFields {
    pub fn mark(&mut self, field: &'static str) {
        self.0.insert(field);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().map(|f| f.to_string()).collect()
    }
}

/// Read the `type` discriminant of a raw record.
pub fn record_type(record: &Value) -> Option<&str> {
    record.get("type").and_then(Value::as_str)
}

pub(crate) fn expect_type(record: &Value, expected: &'static str) -> ModelResult<()> {
    match record_type(record) {
        Some(found) if found == expected => Ok(()),
        found => Err(ModelError::Type {
            expected,
            found: found.unwrap_or("<none>").to_string(),
        }),
    }
}

/// Either kind of top-level document.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Client(Client),
    Patient(Patient),
}

impl Entity {
    /// Decode a raw record by its `type` discriminant.
    pub fn from_value(record: Value) -> ModelResult<Entity> {
        match record_type(&record) {
            Some(CLIENT_TYPE) => Ok(Entity::Client(Client::from_value(record)?)),
            Some(PATIENT_TYPE) => Ok(Entity::Patient(Patient::from_value(record)?)),
            found => Err(ModelError::Type {
                expected: "client or patient",
                found: found.unwrap_or("<none>").to_string(),
            }),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Entity::Client(_) => CLIENT_TYPE,
            Entity::Patient(_) => PATIENT_TYPE,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Entity::Client(c) => c.id(),
            Entity::Patient(p) => p.id(),
        }
    }

    pub fn is_dirty(&self) -> bool {
        match self {
            Entity::Client(c) => c.is_dirty(),
            Entity::Patient(p) => p.is_dirty(),
        }
    }

    pub fn to_value(&self) -> ModelResult<Value> {
        match self {
            Entity::Client(c) => c.to_value(),
            Entity::Patient(p) => p.to_value(),
        }
    }
}

impl From<Client> for Entity {
    fn from(client: Client) -> Self {
        Entity::Client(client)
    }
}

impl From<Patient> for Entity {
    fn from(patient: Patient) -> Self {
        Entity::Patient(patient)
    }
}
