//! Client operations.

use super::{Database, DbError, DbResult, CLIENTS, PETS_INDEX};
use crate::ids;
use crate::models::Client;
use crate::store::StoreError;

impl Database {
    /// Persist a client and return its id.
    ///
    /// A saved client with no pending changes is not written again. A new
    /// client is assigned an id first; if the write fails the id is taken
    /// back.
    pub fn update_client(&mut self, client: &mut Client) -> DbResult<String> {
        if let Some(id) = client.id() {
            if !client.is_dirty() {
                return Ok(id.to_string());
            }
        }

        let is_new = client.id().is_none();
        if is_new {
            client.assign_id(ids::generate(ids::CLIENT_PREFIX));
        }

        let written = match client.to_value() {
            Ok(record) if is_new => self.store.add(CLIENTS, &record).map_err(DbError::from),
            Ok(record) => self.store.put(CLIENTS, &record).map_err(DbError::from),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = written {
            if is_new {
                client.clear_id();
            }
            return Err(e);
        }

        client.clear_dirty();
        self.process_changes();
        Ok(client.id().unwrap_or_default().to_string())
    }

    /// Fetch clients by id, in the order given. Fails if any is missing.
    pub fn get_clients<S: AsRef<str>>(&self, ids: &[S]) -> DbResult<Vec<Client>> {
        self.store
            .get(CLIENTS, None, ids)?
            .into_iter()
            .map(|record| Ok(Client::from_value(record)?))
            .collect()
    }

    pub fn get_client(&self, id: &str) -> DbResult<Client> {
        self.get_clients(&[id])?
            .pop()
            .ok_or_else(|| StoreError::MissingDocument(id.to_string()).into())
    }

    /// Distinct owners of any of `patient_ids`.
    pub fn get_owners<S: AsRef<str>>(&self, patient_ids: &[S]) -> DbResult<Vec<Client>> {
        let client_ids = self
            .store
            .primary_keys_by_index(CLIENTS, PETS_INDEX, patient_ids)?;
        self.get_clients(&client_ids)
    }
}
