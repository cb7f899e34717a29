//! Collection layout.

use crate::store::{CollectionSpec, IndexSpec};

pub const CLIENTS: &str = "clients";
pub const PATIENTS: &str = "patients";

/// Clients by owned patient id.
pub const PETS_INDEX: &str = "pets";

/// Patients by visit date.
pub const VISIT_DATES_INDEX: &str = "visitDates";

pub static COLLECTIONS: &[CollectionSpec] = &[
    CollectionSpec {
        name: CLIENTS,
        key_path: "id",
        indexes: &[IndexSpec {
            name: PETS_INDEX,
            key_path: "pets",
        }],
    },
    CollectionSpec {
        name: PATIENTS,
        key_path: "id",
        indexes: &[IndexSpec {
            name: VISIT_DATES_INDEX,
            key_path: "visitDates",
        }],
    },
];
