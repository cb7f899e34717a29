//! Bulk import from the legacy export format.
//!
//! ```json
//! {
//!   "patients": [{"id": "17", "name": "Rex", "sex": "m-",
//!                 "visits": [{"date": "2015-03-01T10:00:00Z", "weight": 12500,
//!                             "tasks": ["rabies"]}]}],
//!   "clients": [{"name": "Ann Smith", "phone": [["555-0001", "home"]],
//!                "pets": ["17"]}]
//! }
//! ```
//!
//! Legacy weights are in grams. Legacy patient ids are only meaningful
//! inside one import file and are replaced with fresh ones.

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;
use tracing::{info, warn};

use super::{Database, DbResult, UpdatePatientOptions};
use crate::models::{
    timestamp, Client, ModelResult, Patient, PhoneInfo, Sex, Task, Visit, VisitPatch,
};

const GRAMS_PER_KG: f64 = 1000.0;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportData {
    #[serde(default)]
    pub clients: Vec<LegacyClient>,
    #[serde(default)]
    pub patients: Vec<LegacyPatient>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyPatient {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub species: String,
    #[serde(default)]
    pub breed: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub visits: Vec<LegacyVisit>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyVisit {
    pub date: String,
    /// Grams.
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub tasks: LegacyTasks,
}

/// Tasks were exported either as bare names or as a full task map.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LegacyTasks {
    Names(Vec<String>),
    Map(BTreeMap<String, Task>),
}

impl Default for LegacyTasks {
    fn default() -> Self {
        LegacyTasks::Names(Vec::new())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LegacyClient {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub note: String,
    #[serde(default)]
    pub phone: Vec<LegacyPhone>,
    /// Legacy patient ids.
    #[serde(default)]
    pub pets: Vec<String>,
}

/// A phone as a `[number, note]` pair, a bare number, or an object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LegacyPhone {
    Pair(String, String),
    Number(String),
    Entry(PhoneInfo),
}

impl From<LegacyPhone> for PhoneInfo {
    fn from(phone: LegacyPhone) -> Self {
        match phone {
            LegacyPhone::Pair(number, note) => PhoneInfo::new(number, note),
            LegacyPhone::Number(number) => PhoneInfo::new(number, ""),
            LegacyPhone::Entry(info) => info,
        }
    }
}

/// Outcome of [`Database::import_data`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    pub patients_imported: usize,
    pub patients_skipped: usize,
    pub clients_imported: usize,
    pub clients_skipped: usize,
    /// Client pet references to patients that were not imported.
    pub dropped_pets: usize,
}

impl LegacyVisit {
    fn to_visit(&self) -> ModelResult<Visit> {
        let tasks = match &self.tasks {
            LegacyTasks::Names(names) => names
                .iter()
                .map(|name| (name.clone(), Task::default()))
                .collect(),
            LegacyTasks::Map(map) => map.clone(),
        };

        Ok(Visit::new(timestamp::parse(&self.date)?).with(VisitPatch {
            weight_kg: Some(self.weight / GRAMS_PER_KG),
            note: Some(self.note.clone()),
            tasks: Some(tasks),
            ..Default::default()
        }))
    }
}

impl LegacyPatient {
    fn to_patient(&self) -> ModelResult<Patient> {
        let mut patient = Patient::new();
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            patient.set_name(name);
        }
        if let Some(sex) = self.sex.as_deref().filter(|s| !s.is_empty()) {
            let sex: Sex = sex.parse()?;
            patient.set_sex(sex.kind);
            patient.set_intact(sex.intact);
        }
        patient.set_species(self.species.as_str());
        patient.set_breed(self.breed.as_str());
        patient.set_description(self.description.as_str());
        patient.set_note(self.note.as_str());
        patient.set_active(self.active.unwrap_or(true));

        for visit in &self.visits {
            patient.insert_visit(visit.to_visit()?);
        }
        Ok(patient)
    }
}

impl LegacyClient {
    fn to_client(&self, patient_ids: &HashMap<String, String>) -> (Client, usize) {
        let mut client = Client::new();
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            client.set_name(name);
        }
        client.set_address(self.address.as_str());
        client.set_email(self.email.as_str());
        client.set_note(self.note.as_str());
        client.set_phones(self.phone.iter().cloned().map(PhoneInfo::from).collect());

        let mut dropped = 0;
        for legacy_id in &self.pets {
            match patient_ids.get(legacy_id) {
                Some(id) => client.add_pet(id.as_str()),
                None => dropped += 1,
            }
        }
        (client, dropped)
    }
}

impl Database {
    /// Import legacy records.
    ///
    /// Patients are imported first, then clients with their pet references
    /// translated to the new patient ids. A record that fails is logged and
    /// skipped. The search index is rebuilt once at the end, not per write.
    pub fn import_data(&mut self, data: ImportData) -> DbResult<ImportReport> {
        let started = Instant::now();
        let mut guard = self.batch();
        let report = guard.import_records(&data);
        guard.release()?;

        info!(
            patients = report.patients_imported,
            clients = report.clients_imported,
            skipped = report.patients_skipped + report.clients_skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Import finished"
        );
        Ok(report)
    }

    fn import_records(&mut self, data: &ImportData) -> ImportReport {
        let mut report = ImportReport::default();
        let mut patient_ids: HashMap<String, String> = HashMap::new();

        for legacy in &data.patients {
            let imported = legacy.to_patient().map_err(Into::into).and_then(|mut patient| {
                self.update_patient(&mut patient, &UpdatePatientOptions::default())
            });
            match imported {
                Ok(id) => {
                    patient_ids.insert(legacy.id.clone(), id);
                    report.patients_imported += 1;
                }
                Err(e) => {
                    warn!(legacy_id = %legacy.id, error = %e, "Skipping patient");
                    report.patients_skipped += 1;
                }
            }
        }

        for legacy in &data.clients {
            let (mut client, dropped) = legacy.to_client(&patient_ids);
            report.dropped_pets += dropped;
            match self.update_client(&mut client) {
                Ok(_) => report.clients_imported += 1,
                Err(e) => {
                    warn!(name = client.name(), error = %e, "Skipping client");
                    report.clients_skipped += 1;
                }
            }
        }
        report
    }
}
