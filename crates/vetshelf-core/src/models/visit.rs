//! Visits and the tasks performed during them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::timestamp;

/// A billable task performed during a visit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default)]
    pub charge: f64,
    #[serde(default, rename = "rabiesTag", skip_serializing_if = "Option::is_none")]
    pub rabies_tag: Option<String>,
}

impl Task {
    pub fn with_charge(charge: f64) -> Self {
        Self {
            charge,
            rabies_tag: None,
        }
    }
}

/// A visit. Values are immutable; derive changed copies with
/// [`Visit::with`] and friends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visit {
    #[serde(default)]
    id: Option<String>,
    #[serde(with = "timestamp")]
    date: DateTime<Utc>,
    #[serde(default, rename = "kg")]
    weight_kg: f64,
    #[serde(default)]
    note: String,
    #[serde(default)]
    tasks: BTreeMap<String, Task>,
}

/// Fields to replace in [`Visit::with`].
#[derive(Debug, Clone, Default)]
pub struct VisitPatch {
    pub date: Option<DateTime<Utc>>,
    pub weight_kg: Option<f64>,
    pub note: Option<String>,
    pub tasks: Option<BTreeMap<String, Task>>,
}

impl Visit {
    /// A visit on `date` with no id, weight, note or tasks.
    pub fn new(date: DateTime<Utc>) -> Self {
        Self {
            id: None,
            date: timestamp::normalize(date),
            weight_kg: 0.0,
            note: String::new(),
            tasks: BTreeMap::new(),
        }
    }

    /// A visit happening now.
    pub fn empty() -> Self {
        Self::new(timestamp::now())
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    pub fn weight_kg(&self) -> f64 {
        self.weight_kg
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn tasks(&self) -> &BTreeMap<String, Task> {
        &self.tasks
    }

    pub fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn has_task(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Sum of task charges.
    pub fn total_charge(&self) -> f64 {
        self.tasks.values().map(|t| t.charge).sum()
    }

    /// A copy with the supplied fields replaced.
    pub fn with(&self, patch: VisitPatch) -> Visit {
        Visit {
            id: self.id.clone(),
            date: patch.date.map(timestamp::normalize).unwrap_or(self.date),
            weight_kg: patch.weight_kg.unwrap_or(self.weight_kg),
            note: patch.note.unwrap_or_else(|| self.note.clone()),
            tasks: patch.tasks.unwrap_or_else(|| self.tasks.clone()),
        }
    }

    pub fn with_id(&self, id: impl Into<String>) -> Visit {
        let mut visit = self.clone();
        visit.id = Some(id.into());
        visit
    }

    /// A copy with `task` recorded under `name`, replacing any task of the
    /// same name.
    pub fn with_task(&self, name: impl Into<String>, task: Task) -> Visit {
        let mut visit = self.clone();
        visit.tasks.insert(name.into(), task);
        visit
    }

    pub fn without_task(&self, name: &str) -> Visit {
        let mut visit = self.clone();
        visit.tasks.remove(name);
        visit
    }
}
