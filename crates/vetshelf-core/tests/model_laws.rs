//! Property tests for model serialization, dirty tracking and the text index.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use vetshelf_core::models::{Client, Patient, PhoneInfo, SearchSummary, Sex, Task, Visit};
use vetshelf_core::search::TextIndex;

fn word() -> impl Strategy<Value = String> {
    "[a-z]{1,8}"
}

/// A name, possibly empty.
fn name() -> impl Strategy<Value = String> {
    prop_oneof![Just(String::new()), word()]
}

fn text() -> impl Strategy<Value = String> {
    prop::collection::vec(word(), 0..4).prop_map(|words| words.join(" "))
}

fn arb_client() -> impl Strategy<Value = Client> {
    (
        name(),
        text(),
        text(),
        prop::collection::vec(("[0-9]{3}-[0-9]{4}", word()), 0..3),
        prop::collection::vec("p-[0-9a-f]{8}", 0..4),
    )
        .prop_map(|(name, address, note, phones, pets)| {
            let mut client = Client::new();
            client.set_name(name);
            client.set_address(address);
            client.set_note(note);
            client.set_phones(
                phones
                    .into_iter()
                    .map(|(number, note)| PhoneInfo::new(number, note))
                    .collect(),
            );
            for pet in pets {
                client.add_pet(pet);
            }
            client
        })
}

fn arb_visit() -> impl Strategy<Value = Visit> {
    (
        0i64..2_000_000_000_000,
        0u32..120,
        prop::option::of(0u32..500),
    )
        .prop_map(|(millis, kg, charge)| {
            let date = Utc.timestamp_millis_opt(millis).single().unwrap_or_else(Utc::now);
            let visit = Visit::new(date).with_task("exam", Task::default());
            let visit = match charge {
                Some(charge) => visit.with_task("rabies", Task::with_charge(charge as f64)),
                None => visit,
            };
            visit.with(vetshelf_core::models::VisitPatch {
                weight_kg: Some(kg as f64),
                ..Default::default()
            })
        })
}

fn arb_patient() -> impl Strategy<Value = Patient> {
    (
        name(),
        "[mf?][+-]",
        text(),
        any::<bool>(),
        prop::collection::vec(arb_visit(), 0..5),
    )
        .prop_map(|(name, sex, breed, active, visits)| {
            let mut patient = Patient::new();
            patient.set_name(name);
            let sex: Sex = sex.parse().unwrap();
            patient.set_sex(sex.kind);
            patient.set_intact(sex.intact);
            patient.set_breed(breed);
            patient.set_active(active);
            for visit in visits {
                patient.insert_visit(visit);
            }
            patient
        })
}

fn arb_summary() -> impl Strategy<Value = SearchSummary> {
    ("c-[0-9a-f]{6}", word(), text(), text()).prop_map(|(id, name, note, pet_name)| {
        SearchSummary {
            id,
            name,
            note,
            pet_name,
            ..Default::default()
        }
    })
}

proptest! {
    #[test]
    fn test_client_round_trip(client in arb_client()) {
        let restored = Client::from_value(client.to_value().unwrap()).unwrap();
        prop_assert_eq!(&restored, &client);
        prop_assert!(!restored.is_dirty());
    }

    #[test]
    fn test_client_setter_marks_field(mut client in arb_client(), email in word()) {
        client.clear_dirty();
        client.set_email(email.clone());
        prop_assert!(client.dirty_fields().contains("email"));
        prop_assert_eq!(client.dirty_fields().len(), 1);
        prop_assert_eq!(client.email(), email.as_str());
    }

    #[test]
    fn test_client_pets_are_unique(client in arb_client(), pet in "p-[0-9a-f]{8}") {
        let mut client = client;
        client.add_pet(pet.clone());
        client.add_pet(pet.clone());
        prop_assert_eq!(client.pets().iter().filter(|p| **p == pet).count(), 1);
    }

    #[test]
    fn test_patient_round_trip(patient in arb_patient()) {
        let restored = Patient::from_value(patient.to_value().unwrap()).unwrap();
        prop_assert_eq!(&restored, &patient);
        prop_assert!(!restored.is_dirty());
    }

    #[test]
    fn test_patient_visits_sorted_newest_first(patient in arb_patient()) {
        let visits = patient.visits();
        for pair in visits.windows(2) {
            prop_assert!(pair[0].date() >= pair[1].date());
        }
        prop_assert!(visits.iter().all(|v| v.id().is_some()));
    }

    #[test]
    fn test_reindex_is_idempotent(summaries in prop::collection::vec(arb_summary(), 1..6)) {
        let mut once = TextIndex::new();
        for summary in &summaries {
            once.update(summary.clone());
        }
        let mut twice = once.clone();
        for summary in &summaries {
            twice.update(summary.clone());
        }
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn test_every_indexed_name_is_findable(summaries in prop::collection::vec(arb_summary(), 1..6)) {
        let mut index = TextIndex::new();
        for summary in &summaries {
            index.update(summary.clone());
        }
        for id in summaries.iter().map(|s| &s.id) {
            let name = &index.document(id).unwrap().name;
            let hits = index.search(name);
            prop_assert!(hits.iter().any(|hit| &hit.id == id));
            for pair in hits.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
        }
    }
}
