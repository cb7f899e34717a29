//! Hydrated search results.

use std::collections::{HashMap, HashSet};

use crate::models::{Client, Patient};

/// Clients in result order together with every patient they own.
///
/// `matched` holds the patients that matched the query itself, as opposed
/// to siblings loaded only to complete an owner's patient list.
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    client_ids: Vec<String>,
    clients: HashMap<String, Client>,
    patients: HashMap<String, Patient>,
    matched: HashSet<String>,
    /// visit id -> patient id
    visit_index: HashMap<String, String>,
}

impl SearchResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of clients.
    pub fn len(&self) -> usize {
        self.client_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.client_ids.is_empty()
    }

    pub fn client_ids(&self) -> &[String] {
        &self.client_ids
    }

    pub fn client(&self, id: &str) -> Option<&Client> {
        self.clients.get(id)
    }

    pub fn patient(&self, id: &str) -> Option<&Patient> {
        self.patients.get(id)
    }

    /// Clients in result order.
    pub fn clients(&self) -> impl Iterator<Item = &Client> + '_ {
        self.client_ids.iter().filter_map(|id| self.clients.get(id))
    }

    /// Loaded patients of `client`. Pets that could not be loaded are
    /// skipped.
    pub fn patients_of(&self, client: &Client) -> Vec<&Patient> {
        client
            .pets()
            .iter()
            .filter_map(|id| self.patients.get(id))
            .collect()
    }

    pub fn patient_count(&self) -> usize {
        self.patients.len()
    }

    pub fn is_matched(&self, patient_id: &str) -> bool {
        self.matched.contains(patient_id)
    }

    pub fn matched(&self) -> &HashSet<String> {
        &self.matched
    }

    /// Patient holding the visit `visit_id`.
    pub fn patient_for_visit(&self, visit_id: &str) -> Option<&Patient> {
        self.visit_index
            .get(visit_id)
            .and_then(|patient_id| self.patients.get(patient_id))
    }

    pub(crate) fn push_client(&mut self, client: Client) {
        let Some(id) = client.id().map(str::to_string) else {
            return;
        };
        if !self.clients.contains_key(&id) {
            self.client_ids.push(id.clone());
        }
        self.clients.insert(id, client);
    }

    pub(crate) fn mark_matched(&mut self, patient_id: impl Into<String>) {
        self.matched.insert(patient_id.into());
    }

    /// Insert or replace a client. A client not yet in the results goes to
    /// the top.
    pub fn refresh_client(&mut self, client: Client) {
        let Some(id) = client.id().map(str::to_string) else {
            return;
        };
        if !self.clients.contains_key(&id) {
            self.client_ids.insert(0, id.clone());
        }
        self.clients.insert(id, client);
    }

    /// Insert or replace a patient, keeping the visit index in step.
    pub fn refresh_patient(&mut self, patient: Patient) {
        let Some(id) = patient.id().map(str::to_string) else {
            return;
        };

        if let Some(old) = self.patients.get(&id) {
            for visit_id in old.visits().iter().filter_map(|v| v.id()) {
                if patient.visit(visit_id).is_none() {
                    self.visit_index.remove(visit_id);
                }
            }
        }

        for visit_id in patient.visits().iter().filter_map(|v| v.id()) {
            self.visit_index.insert(visit_id.to_string(), id.clone());
        }
        self.patients.insert(id, patient);
    }
}
