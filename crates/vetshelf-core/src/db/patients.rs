//! Patient operations.

use serde_json::Value;

use super::{Database, DbResult, CLIENTS, PATIENTS};
use crate::ids;
use crate::models::{Client, Patient};
use crate::store::{StoreError, StoreResult, TransactionMode};

/// Extra work for [`Database::update_patient`].
#[derive(Debug, Clone, Default)]
pub struct UpdatePatientOptions {
    /// Clients to record as owners, in the same transaction as the patient.
    pub add_owners: Vec<String>,
}

impl Database {
    /// Persist a patient and return its id.
    ///
    /// With `add_owners`, the patient and every named owner's `pets` set
    /// are written in one transaction: either all of them land or none do.
    /// A saved, clean patient with no owners to add is not written again.
    pub fn update_patient(
        &mut self,
        patient: &mut Patient,
        options: &UpdatePatientOptions,
    ) -> DbResult<String> {
        if let Some(id) = patient.id() {
            if !patient.is_dirty() && options.add_owners.is_empty() {
                return Ok(id.to_string());
            }
        }

        let is_new = patient.id().is_none();
        if is_new {
            patient.assign_id(ids::generate(ids::PATIENT_PREFIX));
        }

        let written = match patient.to_value() {
            Ok(record) => self.write_patient(&record, is_new, &options.add_owners),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = written {
            if is_new {
                patient.clear_id();
            }
            return Err(e);
        }

        patient.clear_dirty();
        self.process_changes();
        Ok(patient.id().unwrap_or_default().to_string())
    }

    fn write_patient(&mut self, record: &Value, is_new: bool, owners: &[String]) -> DbResult<()> {
        if owners.is_empty() {
            let result: StoreResult<()> = if is_new {
                self.store.add(PATIENTS, record)
            } else {
                self.store.put(PATIENTS, record)
            };
            return Ok(result?);
        }

        let patient_id = record
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::MissingKey {
                collection: PATIENTS.to_string(),
                key_path: "id".to_string(),
            })?;

        let mut tx = self
            .store
            .raw_transaction(&[PATIENTS, CLIENTS], TransactionMode::ReadWrite)?;
        if is_new {
            tx.add(PATIENTS, record)?;
        } else {
            tx.put(PATIENTS, record)?;
        }

        for owner in tx.get(CLIENTS, None, owners)? {
            let mut client = Client::from_value(owner)?;
            client.add_pet(patient_id);
            tx.put(CLIENTS, &client.to_value()?)?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Fetch patients by id, in the order given. Fails if any is missing.
    pub fn get_patients<S: AsRef<str>>(&self, ids: &[S]) -> DbResult<Vec<Patient>> {
        self.store
            .get(PATIENTS, None, ids)?
            .into_iter()
            .map(|record| Ok(Patient::from_value(record)?))
            .collect()
    }

    pub fn get_patient(&self, id: &str) -> DbResult<Patient> {
        self.get_patients(&[id])?
            .pop()
            .ok_or_else(|| StoreError::MissingDocument(id.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_db;
    use crate::db::DbError;
    use crate::models::{Task, Visit};
    use crate::search::DebugInfo;

    fn owned_by(client_id: &str) -> UpdatePatientOptions {
        UpdatePatientOptions {
            add_owners: vec![client_id.to_string()],
        }
    }

    #[test]
    fn test_new_patient_gets_id() {
        let (_dir, mut db) = setup_db();
        let mut patient = Patient::new();
        patient.set_name("Rex");
        let id = db
            .update_patient(&mut patient, &UpdatePatientOptions::default())
            .unwrap();

        assert!(ids::is_valid(ids::PATIENT_PREFIX, &id));
        assert!(!patient.is_dirty());
        assert_eq!(db.get_patient(&id).unwrap(), patient);
    }

    #[test]
    fn test_add_owners_links_both_sides() {
        let (_dir, mut db) = setup_db();
        let mut client = Client::new();
        client.set_name("Ann Smith");
        let client_id = db.update_client(&mut client).unwrap();

        let mut patient = Patient::new();
        patient.set_name("Rex");
        let patient_id = db.update_patient(&mut patient, &owned_by(&client_id)).unwrap();

        let owner = db.get_client(&client_id).unwrap();
        assert!(owner.has_pet(&patient_id));
        let owners = db.get_owners(&[&patient_id]).unwrap();
        assert_eq!(owners.len(), 1);

        // The owner's summary now embeds the patient
        match db.search_worker().debug(Some(client_id.as_str())).unwrap() {
            DebugInfo::Document(Some(summary)) => assert_eq!(summary.pet_name, "Rex"),
            other => panic!("unexpected debug reply: {:?}", other),
        }
    }

    #[test]
    fn test_missing_owner_aborts_whole_write() {
        let (_dir, mut db) = setup_db();
        let mut patient = Patient::new();
        let err = db
            .update_patient(&mut patient, &owned_by("c-missing"))
            .unwrap_err();

        assert!(matches!(err, DbError::Store(StoreError::MissingDocument(_))));
        assert_eq!(patient.id(), None);
        assert_eq!(db.store().count(PATIENTS).unwrap(), 0);
    }

    #[test]
    fn test_clean_patient_with_new_owner_is_written() {
        let (_dir, mut db) = setup_db();
        let mut patient = Patient::new();
        let patient_id = db
            .update_patient(&mut patient, &UpdatePatientOptions::default())
            .unwrap();

        let mut client = Client::new();
        let client_id = db.update_client(&mut client).unwrap();

        assert!(!patient.is_dirty());
        db.update_patient(&mut patient, &owned_by(&client_id)).unwrap();
        assert!(db.get_client(&client_id).unwrap().has_pet(&patient_id));
    }

    #[test]
    fn test_patient_edit_reindexes_every_owner() {
        let (_dir, mut db) = setup_db();
        let mut ann = Client::new();
        let ann_id = db.update_client(&mut ann).unwrap();
        let mut bob = Client::new();
        let bob_id = db.update_client(&mut bob).unwrap();

        let mut patient = Patient::new();
        db.update_patient(&mut patient, &owned_by(&ann_id)).unwrap();
        db.update_patient(&mut patient, &owned_by(&bob_id)).unwrap();

        patient.set_name("Biscuit");
        db.update_patient(&mut patient, &UpdatePatientOptions::default())
            .unwrap();

        for id in [&ann_id, &bob_id] {
            match db.search_worker().debug(Some(id.as_str())).unwrap() {
                DebugInfo::Document(Some(summary)) => assert_eq!(summary.pet_name, "Biscuit"),
                other => panic!("unexpected debug reply: {:?}", other),
            }
        }
    }

    #[test]
    fn test_visits_persist_in_order() {
        let (_dir, mut db) = setup_db();
        let mut patient = Patient::new();
        let older = Visit::new(chrono::Utc::now() - chrono::Duration::days(30))
            .with_task("rabies", Task::with_charge(25.0));
        let newer = Visit::new(chrono::Utc::now() - chrono::Duration::days(1));
        patient.insert_visit(older);
        patient.insert_visit(newer);
        let id = db
            .update_patient(&mut patient, &UpdatePatientOptions::default())
            .unwrap();

        let stored = db.get_patient(&id).unwrap();
        assert_eq!(stored.visits().len(), 2);
        assert!(stored.visits()[0].date() > stored.visits()[1].date());
        assert!(stored.visits()[1].has_task("rabies"));
    }
}
