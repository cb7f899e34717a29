//! Client (owner) model.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

use super::{expect_type, DirtyFields, ModelResult, PhoneInfo};

/// Discriminant of serialized clients.
pub const CLIENT_TYPE: &str = "client";

const DEFAULT_NAME: &str = "(unnamed)";

/// Canonical stored form of a [`Client`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub phone: Vec<PhoneInfo>,
    #[serde(default)]
    pub pets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dirty: Option<Vec<String>>,
}

/// A client of the clinic, owning zero or more patients.
#[derive(Debug, Clone)]
pub struct Client {
    id: Option<String>,
    name: String,
    address: String,
    email: String,
    note: String,
    phone: Vec<PhoneInfo>,
    pets: BTreeSet<String>,
    dirty: DirtyFields,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

/// Equality ignores dirty state.
impl PartialEq for Client {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.address == other.address
            && self.email == other.email
            && self.note == other.note
            && self.phone == other.phone
            && self.pets == other.pets
    }
}

impl Client {
    /// A new, unsaved client.
    pub fn new() -> Self {
        Self {
            id: None,
            name: DEFAULT_NAME.to_string(),
            address: String::new(),
            email: String::new(),
            note: String::new(),
            phone: Vec::new(),
            pets: BTreeSet::new(),
            dirty: DirtyFields::default(),
        }
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub(crate) fn assign_id(&mut self, id: String) {
        self.id = Some(id);
    }

    pub(crate) fn clear_id(&mut self) {
        self.id = None;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the name. An empty name becomes `(unnamed)`.
    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.dirty.mark("name");
        self.name = if name.is_empty() {
            DEFAULT_NAME.to_string()
        } else {
            name
        };
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn set_address(&mut self, address: impl Into<String>) {
        self.dirty.mark("address");
        self.address = address.into();
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.dirty.mark("email");
        self.email = email.into();
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn set_note(&mut self, note: impl Into<String>) {
        self.dirty.mark("note");
        self.note = note.into();
    }

    pub fn phones(&self) -> &[PhoneInfo] {
        &self.phone
    }

    pub fn set_phones(&mut self, phones: Vec<PhoneInfo>) {
        self.dirty.mark("phone");
        self.phone = phones;
    }

    /// Apply an edit to the entry currently holding `old_number`.
    ///
    /// An empty replacement number deletes that entry. Otherwise the entry
    /// is replaced in place, or `replacement` is appended when no entry has
    /// `old_number`.
    ///
    /// Only an edit that changes the list marks `phone` dirty.
    pub fn update_phone(&mut self, old_number: &str, replacement: PhoneInfo) {
        let position = self.phone.iter().position(|p| p.number() == old_number);

        if replacement.number().is_empty() {
            if let Some(i) = position {
                self.phone.remove(i);
                self.dirty.mark("phone");
            }
            return;
        }

        match position {
            Some(i) if self.phone[i] == replacement => return,
            Some(i) => self.phone[i] = replacement,
            None => self.phone.push(replacement),
        }
        self.dirty.mark("phone");
    }

    /// Owned patient IDs.
    pub fn pets(&self) -> Vec<String> {
        self.pets.iter().cloned().collect()
    }

    pub fn has_pet(&self, patient_id: &str) -> bool {
        self.pets.contains(patient_id)
    }

    pub fn add_pet(&mut self, patient_id: impl Into<String>) {
        self.dirty.mark("pets");
        self.pets.insert(patient_id.into());
    }

    pub fn remove_pet(&mut self, patient_id: &str) {
        self.dirty.mark("pets");
        self.pets.remove(patient_id);
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn dirty_fields(&self) -> &DirtyFields {
        &self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    /// Full canonical record.
    pub fn serialize(&self) -> ClientRecord {
        ClientRecord {
            kind: CLIENT_TYPE.to_string(),
            id: self.id.clone(),
            name: Some(self.name.clone()),
            address: self.address.clone(),
            email: self.email.clone(),
            note: self.note.clone(),
            phone: self.phone.clone(),
            pets: self.pets(),
            dirty: None,
        }
    }

    /// Full record plus the dirty field list.
    pub fn serialize_with_dirty(&self) -> ClientRecord {
        ClientRecord {
            dirty: Some(self.dirty.to_vec()),
            ..self.serialize()
        }
    }

    pub fn to_value(&self) -> ModelResult<Value> {
        Ok(serde_json::to_value(self.serialize())?)
    }

    /// Rebuild a client from its record. The result is never dirty.
    pub fn deserialize(record: ClientRecord) -> ModelResult<Client> {
        if record.kind != CLIENT_TYPE {
            return Err(super::ModelError::Type {
                expected: CLIENT_TYPE,
                found: record.kind,
            });
        }

        Ok(Client {
            id: record.id.filter(|id| !id.is_empty()),
            name: record
                .name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| DEFAULT_NAME.to_string()),
            address: record.address,
            email: record.email,
            note: record.note,
            phone: record.phone,
            pets: record.pets.into_iter().collect(),
            dirty: DirtyFields::default(),
        })
    }

    pub fn from_value(record: Value) -> ModelResult<Client> {
        expect_type(&record, CLIENT_TYPE)?;
        Self::deserialize(serde_json::from_value(record)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ModelError;
    use serde_json::json;

    fn client_with_phones() -> Client {
        let mut client = Client::new();
        client.set_phones(vec![
            PhoneInfo::new("555-0001", "home"),
            PhoneInfo::new("555-0002", "work"),
            PhoneInfo::new("555-0003", "cell"),
        ]);
        client.clear_dirty();
        client
    }

    #[test]
    fn test_new_client() {
        let client = Client::new();
        assert_eq!(client.id(), None);
        assert_eq!(client.name(), "(unnamed)");
        assert!(!client.is_dirty());
    }

    #[test]
    fn test_setters_mark_dirty() {
        let mut client = Client::new();
        client.set_name("Ann");
        client.set_email("ann@example.com");
        assert!(client.is_dirty());
        assert!(client.dirty_fields().contains("name"));
        assert!(client.dirty_fields().contains("email"));
        assert!(!client.dirty_fields().contains("address"));

        client.clear_dirty();
        assert!(!client.is_dirty());
    }

    #[test]
    fn test_pets_are_a_set() {
        let mut client = Client::new();
        client.add_pet("p-2");
        client.add_pet("p-1");
        client.add_pet("p-2");
        assert_eq!(client.pets(), vec!["p-1".to_string(), "p-2".to_string()]);
        assert!(client.has_pet("p-1"));

        client.remove_pet("p-1");
        assert!(!client.has_pet("p-1"));
        assert!(client.dirty_fields().contains("pets"));
    }

    #[test]
    fn test_update_phone_empty_number_deletes() {
        let mut client = client_with_phones();
        client.update_phone("555-0002", PhoneInfo::new("", ""));

        let numbers: Vec<_> = client.phones().iter().map(|p| p.number()).collect();
        assert_eq!(numbers, vec!["555-0001", "555-0003"]);
        assert!(client.dirty_fields().contains("phone"));
    }

    #[test]
    fn test_update_phone_replaces_in_place() {
        let mut client = client_with_phones();
        client.update_phone("555-0002", PhoneInfo::new("555-9999", "new work"));

        let numbers: Vec<_> = client.phones().iter().map(|p| p.number()).collect();
        assert_eq!(numbers, vec!["555-0001", "555-9999", "555-0003"]);
        assert_eq!(client.phones()[1].note(), "new work");
    }

    #[test]
    fn test_update_phone_appends_unknown() {
        let mut client = client_with_phones();
        client.update_phone("", PhoneInfo::new("555-0004", "vacation"));
        assert_eq!(client.phones().len(), 4);
        assert_eq!(client.phones()[3].number(), "555-0004");
    }

    #[test]
    fn test_round_trip_clears_dirty() {
        let mut client = client_with_phones();
        client.assign_id("c-1".into());
        client.set_name("Ann");
        client.set_address("1 Main St");
        client.add_pet("p-1");

        let back = Client::from_value(client.to_value().unwrap()).unwrap();
        assert_eq!(back, client);
        assert!(!back.is_dirty());
    }

    #[test]
    fn test_empty_name_round_trips() {
        let mut client = Client::new();
        client.set_name("Ann");
        client.set_name("");
        assert_eq!(client.name(), "(unnamed)");
        assert!(client.dirty_fields().contains("name"));

        let back = Client::from_value(client.to_value().unwrap()).unwrap();
        assert_eq!(back, client);
    }

    #[test]
    fn test_update_phone_noop_stays_clean() {
        let mut client = client_with_phones();
        client.clear_dirty();

        client.update_phone("555-0404", PhoneInfo::new("", ""));
        let same = client.phones()[0].clone();
        client.update_phone("555-0001", same);
        assert!(!client.is_dirty());
        assert_eq!(client.phones().len(), 3);

        client.update_phone("555-0001", PhoneInfo::new("", ""));
        assert!(client.dirty_fields().contains("phone"));
    }

    #[test]
    fn test_serialize_with_dirty() {
        let mut client = Client::new();
        client.set_note("prefers email");
        let record = client.serialize_with_dirty();
        assert_eq!(record.dirty, Some(vec!["note".to_string()]));
        assert_eq!(client.serialize().dirty, None);
    }

    #[test]
    fn test_wrong_type_rejected() {
        let err = Client::from_value(json!({"type": "patient", "id": "p-1"})).unwrap_err();
        assert!(matches!(err, ModelError::Type { .. }));

        let err = Client::from_value(json!({"id": "c-1"})).unwrap_err();
        assert!(matches!(err, ModelError::Type { .. }));
    }
}
