//! Composite queries: full-text search and upcoming visits.

use serde_json::Value;
use std::collections::HashSet;
use tracing::{error, warn};

use super::{
    decode_or_warn, Database, DbResult, SearchResults, CLIENTS, PATIENTS, VISIT_DATES_INDEX,
};
use crate::models::{timestamp, Client, Patient, SearchSummary};
use crate::search::TextIndex;
use crate::store::{Direction, KeyRange};

/// Query that lists patients with a visit scheduled from now on.
/// The empty query does the same.
pub const UPCOMING_QUERY: &str = "upcoming";

impl Database {
    /// Run a query typed by the user.
    ///
    /// Never fails: errors are logged and yield empty results.
    pub fn search(&mut self, query: &str) -> SearchResults {
        let result = if query.is_empty() || query == UPCOMING_QUERY {
            self.show_upcoming()
        } else {
            self.full_text_search(query)
        };

        result.unwrap_or_else(|e| {
            error!(query, error = %e, "Search failed");
            SearchResults::default()
        })
    }

    /// Patients with a visit dated now or later, earliest first, with
    /// their owners and the owners' other patients.
    pub fn show_upcoming(&mut self) -> DbResult<SearchResults> {
        let now = timestamp::format(&timestamp::now());
        let records = self.store.query(
            PATIENTS,
            Some(VISIT_DATES_INDEX),
            &KeyRange::lower_bound(now, false),
            self.upcoming_limit,
            Direction::Next,
        )?;

        let mut seen = HashSet::new();
        let mut matched = Vec::new();
        for patient in records
            .into_iter()
            .filter_map(|record| decode_or_warn(record, Patient::from_value))
        {
            if let Some(id) = patient.id() {
                if seen.insert(id.to_string()) {
                    matched.push(patient);
                }
            }
        }

        let matched_ids: Vec<String> = matched
            .iter()
            .filter_map(|p| p.id().map(str::to_string))
            .collect();
        let owners = self.get_owners(&matched_ids)?;

        let mut results = SearchResults::new();
        for patient in matched {
            if let Some(id) = patient.id() {
                results.mark_matched(id);
            }
            results.refresh_patient(patient);
        }

        // Back-fill siblings so every owner's patient list is complete
        let missing: Vec<String> = owners
            .iter()
            .flat_map(|owner| owner.pets())
            .filter(|id| !seen.contains(id))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        for patient in self.existing_patients(&missing)? {
            results.refresh_patient(patient);
        }

        for owner in owners {
            results.push_client(owner);
        }
        Ok(results)
    }

    /// Clients matching `query` through the search index, best first.
    ///
    /// Falls back to scanning every client when the index is unavailable.
    pub fn full_text_search(&mut self, query: &str) -> DbResult<SearchResults> {
        let ids: Vec<String> = match self.search.search(query) {
            Ok(hits) => hits.take(self.result_limit).map(|hit| hit.id).collect(),
            Err(e) => {
                warn!(error = %e, "Search index unavailable, scanning clients");
                self.scan_search(query)?
            }
        };

        // Stale index entries may name clients that no longer exist
        let clients = self.existing_clients(&ids)?;
        self.populate_results_from_clients(clients)
    }

    /// Rank every stored client against `query` without the worker.
    fn scan_search(&self, query: &str) -> DbResult<Vec<String>> {
        let mut records: Vec<Value> = Vec::new();
        self.store
            .for_each(CLIENTS, None, &KeyRange::all(), Direction::Next, |_, record| {
                records.push(record);
                true
            })?;

        let mut index = TextIndex::new();
        for client in records
            .into_iter()
            .filter_map(|record| decode_or_warn(record, Client::from_value))
        {
            let patients = self.existing_patients(&client.pets())?;
            if let Some(summary) = SearchSummary::build(&client, &patients) {
                index.update(summary);
            }
        }

        Ok(index
            .search(query)
            .into_iter()
            .take(self.result_limit)
            .map(|hit| hit.id)
            .collect())
    }

    /// Results holding `clients`, in order, and every patient they own.
    pub(crate) fn populate_results_from_clients(
        &self,
        clients: Vec<Client>,
    ) -> DbResult<SearchResults> {
        let mut results = SearchResults::new();
        for client in clients {
            for patient in self.existing_patients(&client.pets())? {
                results.refresh_patient(patient);
            }
            results.push_client(client);
        }
        Ok(results)
    }
}
