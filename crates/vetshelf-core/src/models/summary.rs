//! Flattened text projections fed to the search index.

use serde::{Deserialize, Serialize};

use super::{Client, Patient};

/// A client and its patients, flattened to one string per field.
///
/// Patient fields are prefixed `pet_` and the values of all patients are
/// joined with spaces, so the index sees plain text rather than lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSummary {
    pub id: String,
    pub name: String,
    pub address: String,
    pub email: String,
    pub phone: String,
    pub note: String,
    pub pet_name: String,
    pub pet_species: String,
    pub pet_breed: String,
    pub pet_sex: String,
    pub pet_description: String,
    pub pet_note: String,
}

fn join<'a>(values: impl Iterator<Item = &'a str>) -> String {
    values
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

impl SearchSummary {
    /// Summarize `client` together with the patients it owns.
    ///
    /// Returns `None` for a client that has not been saved yet.
    pub fn build(client: &Client, patients: &[Patient]) -> Option<SearchSummary> {
        let id = client.id()?.to_string();
        let phone = join(
            client
                .phones()
                .iter()
                .flat_map(|p| [p.number(), p.note()]),
        );

        Some(SearchSummary {
            id,
            name: client.name().to_string(),
            address: client.address().to_string(),
            email: client.email().to_string(),
            phone,
            note: client.note().to_string(),
            pet_name: join(patients.iter().map(|p| p.name())),
            pet_species: join(patients.iter().map(|p| p.species())),
            pet_breed: join(patients.iter().map(|p| p.breed())),
            pet_sex: join(patients.iter().map(|p| p.sex().describe())),
            pet_description: join(patients.iter().map(|p| p.description())),
            pet_note: join(patients.iter().map(|p| p.note())),
        })
    }

    /// Indexed fields as `(field name, text)` pairs. Excludes `id`.
    pub fn fields(&self) -> [(&'static str, &str); 11] {
        [
            ("name", self.name.as_str()),
            ("address", self.address.as_str()),
            ("email", self.email.as_str()),
            ("phone", self.phone.as_str()),
            ("note", self.note.as_str()),
            ("pet_name", self.pet_name.as_str()),
            ("pet_species", self.pet_species.as_str()),
            ("pet_breed", self.pet_breed.as_str()),
            ("pet_sex", self.pet_sex.as_str()),
            ("pet_description", self.pet_description.as_str()),
            ("pet_note", self.pet_note.as_str()),
        ]
    }
}
