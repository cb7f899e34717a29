//! Periodic care scheduling.
//!
//! Due dates are a pure function of a patient's visit history: for each
//! periodic task kind, the most recent visit that performed the task plus the
//! kind's interval. A kind never performed is due immediately.

use chrono::{DateTime, Months, Utc};
use std::collections::BTreeMap;

use crate::models::Visit;

/// How far apart repetitions of a periodic task are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interval {
    Months(u32),
    Years(u32),
    /// Reuse the interval of another task kind.
    SameAs(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodicTask {
    pub name: &'static str,
    pub interval: Interval,
}

/// Task kinds the clinic tracks due dates for.
pub const PERIODIC_TASKS: &[PeriodicTask] = &[
    PeriodicTask {
        name: "heartworm",
        interval: Interval::Months(6),
    },
    PeriodicTask {
        name: "exam",
        interval: Interval::SameAs("heartworm"),
    },
    PeriodicTask {
        name: "rabies",
        interval: Interval::Years(1),
    },
];

fn find_task(name: &str) -> Option<&'static PeriodicTask> {
    PERIODIC_TASKS.iter().find(|t| t.name == name)
}

/// Interval of a task kind in months, following aliases.
///
/// Returns `None` for unknown kinds and for alias cycles.
pub fn interval_months(name: &str) -> Option<u32> {
    let mut current = find_task(name)?;
    for _ in 0..PERIODIC_TASKS.len() {
        match current.interval {
            Interval::Months(n) => return Some(n),
            Interval::Years(n) => return Some(n * 12),
            Interval::SameAs(other) => current = find_task(other)?,
        }
    }
    None
}

/// Next due date for `kind` given the date it was last performed.
pub fn next_due(kind: &str, last: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let months = interval_months(kind)?;
    last.checked_add_months(Months::new(months))
}

/// Most recent visit whose tasks include `task`.
///
/// Only a strictly later date replaces the current candidate, so among
/// visits sharing a date the earliest in `visits` wins.
pub fn last_visit_with_task<'a>(visits: &'a [Visit], task: &str) -> Option<&'a Visit> {
    let mut best: Option<&Visit> = None;
    for visit in visits.iter().filter(|v| v.has_task(task)) {
        match best {
            Some(b) if visit.date() <= b.date() => {}
            _ => best = Some(visit),
        }
    }
    best
}

/// Due date of every periodic task kind, as of `now`.
pub fn compute_due(visits: &[Visit], now: DateTime<Utc>) -> BTreeMap<String, DateTime<Utc>> {
    let mut due = BTreeMap::new();
    for task in PERIODIC_TASKS {
        let date = last_visit_with_task(visits, task.name)
            .and_then(|v| next_due(task.name, v.date()))
            .unwrap_or(now);
        due.insert(task.name.to_string(), date);
    }
    due
}

/// Task kinds falling due at the same instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueGroup {
    pub due: DateTime<Utc>,
    pub tasks: Vec<String>,
}

/// Collapse a due map into groups sharing a timestamp, earliest first.
pub fn group_by_date(due: &BTreeMap<String, DateTime<Utc>>) -> Vec<DueGroup> {
    let mut groups: BTreeMap<DateTime<Utc>, Vec<String>> = BTreeMap::new();
    for (task, date) in due {
        groups.entry(*date).or_default().push(task.clone());
    }

    groups
        .into_iter()
        .map(|(due, tasks)| DueGroup { due, tasks })
        .collect()
}
