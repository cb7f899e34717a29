//! Patient (animal) model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::{expect_type, timestamp, DirtyFields, ModelError, ModelResult, Visit};
use crate::ids;
use crate::schedule::{self, DueGroup};

/// Discriminant of serialized patients.
pub const PATIENT_TYPE: &str = "patient";

const DEFAULT_NAME: &str = "(unnamed)";
const DEFAULT_SEX: &str = "?+";

/// Reproductive category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SexKind {
    Male,
    Female,
    Unknown,
}

impl SexKind {
    pub fn code(&self) -> char {
        match self {
            SexKind::Male => 'm',
            SexKind::Female => 'f',
            SexKind::Unknown => '?',
        }
    }

    pub fn from_code(code: char) -> ModelResult<SexKind> {
        match code {
            'm' => Ok(SexKind::Male),
            'f' => Ok(SexKind::Female),
            '?' => Ok(SexKind::Unknown),
            other => Err(ModelError::Value(format!("Invalid sex code: {:?}", other))),
        }
    }
}

/// Sex as two independent facets, stored as a two character code such as
/// `"f+"` (intact female) or `"m-"` (neutered male).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sex {
    pub kind: SexKind,
    pub intact: bool,
}

impl Default for Sex {
    fn default() -> Self {
        Sex {
            kind: SexKind::Unknown,
            intact: true,
        }
    }
}

impl FromStr for Sex {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let (Some(kind), Some(status), None) = (chars.next(), chars.next(), chars.next()) else {
            return Err(ModelError::Value(format!("Invalid sex string: {:?}", s)));
        };

        let intact = match status {
            '+' => true,
            '-' => false,
            _ => return Err(ModelError::Value(format!("Invalid sex string: {:?}", s))),
        };

        Ok(Sex {
            kind: SexKind::from_code(kind)?,
            intact,
        })
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind.code(), if self.intact { '+' } else { '-' })
    }
}

impl Sex {
    /// Human readable description used for search.
    pub fn describe(&self) -> &'static str {
        match (self.kind, self.intact) {
            (SexKind::Male, true) => "intact male",
            (SexKind::Male, false) => "neutered male",
            (SexKind::Female, true) => "intact female",
            (SexKind::Female, false) => "spayed female",
            (SexKind::Unknown, true) => "unknown",
            (SexKind::Unknown, false) => "fixed unknown",
        }
    }
}

fn default_active() -> bool {
    true
}

/// Canonical stored form of a [`Patient`].
///
/// `due` and `visitDates` are derived on serialization and ignored when
/// read back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: Option<String>,
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
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub visits: Vec<Visit>,
    #[serde(default)]
    pub due: BTreeMap<String, String>,
    #[serde(default, rename = "visitDates")]
    pub visit_dates: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dirty: Option<Vec<String>>,
}

/// A patient of the clinic.
#[derive(Debug, Clone)]
pub struct Patient {
    id: Option<String>,
    name: String,
    sex: Sex,
    species: String,
    breed: String,
    description: String,
    note: String,
    active: bool,
    visits: Vec<Visit>,
    dirty: DirtyFields,
}

impl Default for Patient {
    fn default() -> Self {
        Self::new()
    }
}

/// Equality ignores dirty state.
impl PartialEq for Patient {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.sex == other.sex
            && self.species == other.species
            && self.breed == other.breed
            && self.description == other.description
            && self.note == other.note
            && self.active == other.active
            && self.visits == other.visits
    }
}

/// Descending by date. Stable, so visits sharing a date keep their order.
fn sort_visits(visits: &mut [Visit]) {
    visits.sort_by(|a, b| b.date().cmp(&a.date()));
}

impl Patient {
    /// A new, unsaved, active patient.
    pub fn new() -> Self {
        Self {
            id: None,
            name: DEFAULT_NAME.to_string(),
            sex: Sex::default(),
            species: String::new(),
            breed: String::new(),
            description: String::new(),
            note: String::new(),
            active: true,
            visits: Vec::new(),
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

    pub fn species(&self) -> &str {
        &self.species
    }

    pub fn set_species(&mut self, species: impl Into<String>) {
        self.dirty.mark("species");
        self.species = species.into();
    }

    pub fn breed(&self) -> &str {
        &self.breed
    }

    pub fn set_breed(&mut self, breed: impl Into<String>) {
        self.dirty.mark("breed");
        self.breed = breed.into();
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.dirty.mark("description");
        self.description = description.into();
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn set_note(&mut self, note: impl Into<String>) {
        self.dirty.mark("note");
        self.note = note.into();
    }

    pub fn active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.dirty.mark("active");
        self.active = active;
    }

    pub fn sex(&self) -> Sex {
        self.sex
    }

    pub fn set_sex(&mut self, kind: SexKind) {
        self.dirty.mark("sex");
        self.sex.kind = kind;
    }

    /// Set the reproductive category from its one character code.
    pub fn set_sex_code(&mut self, code: &str) -> ModelResult<()> {
        let mut chars = code.chars();
        let kind = match (chars.next(), chars.next()) {
            (Some(c), None) => SexKind::from_code(c)?,
            _ => return Err(ModelError::Value(format!("Invalid sex string: {:?}", code))),
        };
        self.set_sex(kind);
        Ok(())
    }

    pub fn intact(&self) -> bool {
        self.sex.intact
    }

    pub fn set_intact(&mut self, intact: bool) {
        self.dirty.mark("sex");
        self.sex.intact = intact;
    }

    /// Visits, most recent first.
    pub fn visits(&self) -> &[Visit] {
        &self.visits
    }

    pub fn visit(&self, id: &str) -> Option<&Visit> {
        self.visits.iter().find(|v| v.id() == Some(id))
    }

    /// Replace the whole visit list.
    pub fn set_visits(&mut self, visits: Vec<Visit>) {
        self.dirty.mark("visits");
        self.visits = visits;
        sort_visits(&mut self.visits);
    }

    /// Add a visit, assigning it an id if it has none. Returns the id.
    pub fn insert_visit(&mut self, visit: Visit) -> String {
        let visit = match visit.id() {
            Some(_) => visit,
            None => visit.with_id(ids::generate(ids::VISIT_PREFIX)),
        };
        let id = visit.id().unwrap_or_default().to_string();

        let mut visits = self.visits.clone();
        visits.push(visit);
        self.set_visits(visits);
        id
    }

    /// Replace the visit sharing `visit`'s id.
    pub fn update_visit(&mut self, visit: Visit) -> ModelResult<()> {
        let id = visit
            .id()
            .ok_or_else(|| ModelError::Value("Cannot update a visit without an id".into()))?;
        let position = self
            .visits
            .iter()
            .position(|v| v.id() == Some(id))
            .ok_or_else(|| ModelError::Value(format!("No such visit: {}", id)))?;

        let mut visits = self.visits.clone();
        visits[position] = visit;
        self.set_visits(visits);
        Ok(())
    }

    /// Remove a visit by id. Returns whether one was removed.
    pub fn remove_visit(&mut self, id: &str) -> bool {
        if self.visit(id).is_none() {
            return false;
        }

        let visits = self
            .visits
            .iter()
            .filter(|v| v.id() != Some(id))
            .cloned()
            .collect();
        self.set_visits(visits);
        true
    }

    /// Most recent visit that performed `task`.
    pub fn last_visit_with_task(&self, task: &str) -> Option<&Visit> {
        schedule::last_visit_with_task(&self.visits, task)
    }

    /// Due date of every periodic task, as of now.
    pub fn due(&self) -> BTreeMap<String, DateTime<Utc>> {
        self.due_at(timestamp::now())
    }

    pub fn due_at(&self, now: DateTime<Utc>) -> BTreeMap<String, DateTime<Utc>> {
        schedule::compute_due(&self.visits, now)
    }

    /// Due tasks grouped by date, earliest first.
    pub fn due_by_date(&self) -> Vec<DueGroup> {
        schedule::group_by_date(&self.due())
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

    /// Full canonical record, with due dates computed as of now.
    pub fn serialize(&self) -> PatientRecord {
        let due = self
            .due()
            .iter()
            .map(|(task, date)| (task.clone(), timestamp::format(date)))
            .collect();
        let mut visit_dates: Vec<String> = self
            .visits
            .iter()
            .map(|v| timestamp::format(&v.date()))
            .collect();
        visit_dates.sort();
        visit_dates.dedup();

        PatientRecord {
            kind: PATIENT_TYPE.to_string(),
            id: self.id.clone(),
            name: Some(self.name.clone()),
            sex: Some(self.sex.to_string()),
            species: self.species.clone(),
            breed: self.breed.clone(),
            description: self.description.clone(),
            note: self.note.clone(),
            active: self.active,
            visits: self.visits.clone(),
            due,
            visit_dates,
            dirty: None,
        }
    }

    /// Full record plus the dirty field list.
    pub fn serialize_with_dirty(&self) -> PatientRecord {
        PatientRecord {
            dirty: Some(self.dirty.to_vec()),
            ..self.serialize()
        }
    }

    pub fn to_value(&self) -> ModelResult<Value> {
        Ok(serde_json::to_value(self.serialize())?)
    }

    /// Rebuild a patient from its record. The result is never dirty.
    pub fn deserialize(record: PatientRecord) -> ModelResult<Patient> {
        if record.kind != PATIENT_TYPE {
            return Err(ModelError::Type {
                expected: PATIENT_TYPE,
                found: record.kind,
            });
        }

        let sex = match record.sex.as_deref() {
            None | Some("") => DEFAULT_SEX.parse()?,
            Some(code) => code.parse()?,
        };
        let mut visits = record.visits;
        sort_visits(&mut visits);

        Ok(Patient {
            id: record.id.filter(|id| !id.is_empty()),
            name: record
                .name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| DEFAULT_NAME.to_string()),
            sex,
            species: record.species,
            breed: record.breed,
            description: record.description,
            note: record.note,
            active: record.active,
            visits,
            dirty: DirtyFields::default(),
        })
    }

    pub fn from_value(record: Value) -> ModelResult<Patient> {
        expect_type(&record, PATIENT_TYPE)?;
        Self::deserialize(serde_json::from_value(record)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Task, VisitPatch};
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_new_patient_defaults() {
        let patient = Patient::new();
        assert_eq!(patient.name(), "(unnamed)");
        assert_eq!(patient.sex().to_string(), "?+");
        assert!(patient.active());
        assert!(!patient.is_dirty());
    }

    #[test]
    fn test_sex_codes() {
        let sex: Sex = "f-".parse().unwrap();
        assert_eq!(sex.kind, SexKind::Female);
        assert!(!sex.intact);
        assert_eq!(sex.describe(), "spayed female");

        assert!(matches!("x+".parse::<Sex>(), Err(ModelError::Value(_))));
        assert!(matches!("f".parse::<Sex>(), Err(ModelError::Value(_))));
        assert!(matches!("f+-".parse::<Sex>(), Err(ModelError::Value(_))));
        assert!(matches!("m*".parse::<Sex>(), Err(ModelError::Value(_))));
    }

    #[test]
    fn test_sex_setters_are_independent() {
        let mut patient = Patient::new();
        patient.set_sex_code("m").unwrap();
        patient.set_intact(false);
        assert_eq!(patient.sex().to_string(), "m-");
        assert!(patient.dirty_fields().contains("sex"));

        patient.clear_dirty();
        assert!(patient.set_sex_code("z").is_err());
        assert!(!patient.is_dirty());
        assert_eq!(patient.sex().to_string(), "m-");
    }

    #[test]
    fn test_visits_sorted_descending() {
        let mut patient = Patient::new();
        let first = patient.insert_visit(Visit::new(at(2024, 1, 1)));
        let second = patient.insert_visit(Visit::new(at(2024, 3, 1)));
        patient.insert_visit(Visit::new(at(2023, 6, 1)));

        let ids: Vec<_> = patient.visits().iter().map(|v| v.id().unwrap()).collect();
        assert_eq!(ids[0], second);
        assert_eq!(ids[1], first);
        assert!(ids.iter().all(|id| ids::is_valid(ids::VISIT_PREFIX, id)));
        assert!(patient.dirty_fields().contains("visits"));
    }

    #[test]
    fn test_update_and_remove_visit() {
        let mut patient = Patient::new();
        let id = patient.insert_visit(Visit::new(at(2024, 1, 1)));

        let edited = patient.visit(&id).unwrap().with(VisitPatch {
            note: Some("vomiting".into()),
            ..Default::default()
        });
        patient.update_visit(edited).unwrap();
        assert_eq!(patient.visit(&id).unwrap().note(), "vomiting");

        let stray = Visit::new(at(2024, 1, 1)).with_id("v-missing");
        assert!(patient.update_visit(stray).is_err());
        assert!(patient.update_visit(Visit::new(at(2024, 1, 1))).is_err());

        assert!(patient.remove_visit(&id));
        assert!(!patient.remove_visit(&id));
        assert!(patient.visits().is_empty());
    }

    #[test]
    fn test_due_follows_visits() {
        let now = at(2024, 7, 1);
        let mut patient = Patient::new();
        assert_eq!(patient.due_at(now)["heartworm"], now);

        patient.insert_visit(
            Visit::new(at(2024, 1, 1)).with_task("heartworm", Task::with_charge(30.0)),
        );
        assert_eq!(patient.due_at(now)["heartworm"], at(2024, 7, 1));

        patient.insert_visit(
            Visit::new(at(2024, 5, 1)).with_task("heartworm", Task::with_charge(30.0)),
        );
        assert_eq!(patient.due_at(now)["heartworm"], at(2024, 11, 1));
    }

    #[test]
    fn test_due_now_without_history() {
        let patient = Patient::new();
        let before = Utc::now() - Duration::seconds(1);
        let due = patient.due();
        assert!(due["rabies"] >= before);
        assert!(due["rabies"] <= Utc::now() + Duration::seconds(1));
    }

    #[test]
    fn test_serialized_record_carries_derived_fields() {
        let mut patient = Patient::new();
        patient.assign_id("p-1".into());
        patient.insert_visit(Visit::new(at(2024, 1, 1)).with_task("rabies", Task::default()));
        patient.insert_visit(Visit::new(at(2024, 1, 1)));

        let record = patient.serialize();
        assert_eq!(record.visit_dates, vec!["2024-01-01T09:00:00.000Z".to_string()]);
        assert_eq!(record.due["rabies"], "2025-01-01T09:00:00.000Z");
        assert_eq!(record.sex.as_deref(), Some("?+"));
    }

    #[test]
    fn test_round_trip_clears_dirty() {
        let mut patient = Patient::new();
        patient.assign_id("p-1".into());
        patient.set_name("Rex");
        patient.set_species("canine");
        patient.set_active(false);
        patient.insert_visit(Visit::new(at(2024, 2, 1)).with_task("exam", Task::with_charge(45.0)));

        let back = Patient::from_value(patient.to_value().unwrap()).unwrap();
        assert_eq!(back, patient);
        assert!(!back.is_dirty());
    }

    #[test]
    fn test_empty_name_round_trips() {
        let mut patient = Patient::new();
        patient.set_name("");
        assert_eq!(patient.name(), "(unnamed)");

        let back = Patient::from_value(patient.to_value().unwrap()).unwrap();
        assert_eq!(back, patient);
    }

    #[test]
    fn test_bad_records_rejected() {
        let err = Patient::from_value(json!({"type": "patient", "sex": "q+"})).unwrap_err();
        assert!(matches!(err, ModelError::Value(_)));

        let err = Patient::from_value(json!({"type": "client"})).unwrap_err();
        assert!(matches!(err, ModelError::Type { .. }));

        let minimal = Patient::from_value(json!({"type": "patient", "id": "p-1"})).unwrap();
        assert!(minimal.active());
        assert_eq!(minimal.name(), "(unnamed)");
    }
}
