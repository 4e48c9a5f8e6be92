//! Solve adapter: solver request/response shapes and reconciliation.
//!
//! Assignments exchanged with the solver identify events positionally: the
//! n-th event of the schedule travels as assignment/event id `n` (1-based).
//! Reconciliation uses the same mapping on the way back.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::schedule::{set_assignment, Event, Schedule};
use crate::weights::{WeightEncoding, WeightModel};

/// A person as listed by the personnel directory.
///
/// The directory may send its identifier as `id` or `_id`, as a number or a
/// string, or not at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonnelRecord {
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<serde_json::Value>,
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl PersonnelRecord {
    pub fn new(name: impl Into<String>, roles: &[&str]) -> Self {
        Self {
            id: None,
            name: name.into(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    /// Numeric source id, if the directory sent a usable one.
    fn numeric_id(&self) -> Option<i64> {
        match self.id.as_ref()? {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Person entry of a solve request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub roles: Vec<String>,
}

/// Map directory records to solver persons. Records without a numeric id
/// get their 1-based position.
pub fn people_from_records(records: &[PersonnelRecord]) -> Vec<Person> {
    records
        .iter()
        .enumerate()
        .map(|(idx, record)| Person {
            id: record.numeric_id().unwrap_or(idx as i64 + 1),
            name: record.name.clone(),
            roles: record.roles.clone(),
        })
        .collect()
}

/// Event as seen by the solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentEvent {
    pub id: i64,
    pub name: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub required_role: String,
}

/// Person reference in an assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedPerson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Solver exchange unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: i64,
    pub event: AssignmentEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub person: Option<AssignedPerson>,
}

/// Body of `POST /api/assignment/solve`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveRequest {
    pub person_list: Vec<Person>,
    pub assignment_list: Vec<Assignment>,
    pub constraint_settings: serde_json::Value,
}

/// Event reference in a solver reply. Only the id matters here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolvedEvent {
    #[serde(default)]
    pub id: Option<i64>,
}

/// One assignment in a solver reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolvedAssignment {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub event: Option<SolvedEvent>,
    #[serde(default)]
    pub person: Option<AssignedPerson>,
}

impl SolvedAssignment {
    /// Shorthand used by callers building replies by hand.
    pub fn new(event_id: i64, person_name: &str) -> Self {
        Self {
            id: Some(event_id),
            event: Some(SolvedEvent { id: Some(event_id) }),
            person: Some(AssignedPerson {
                id: None,
                name: Some(person_name.to_string()),
            }),
        }
    }

    fn event_id(&self) -> Option<i64> {
        self.event.as_ref().and_then(|e| e.id)
    }

    fn person_name(&self) -> Option<&str> {
        self.person
            .as_ref()
            .and_then(|p| p.name.as_deref())
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

/// Solver reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveResponse {
    #[serde(default)]
    pub assignment_list: Vec<SolvedAssignment>,
    /// Score as reported by the solver (e.g. `"0hard/-4soft"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<String>,
}

/// Build the solver request from the session state.
pub fn build_request(
    schedule: &Schedule,
    people: &[PersonnelRecord],
    weights: &WeightModel,
    encoding: WeightEncoding,
) -> SolveRequest {
    let assignment_list = schedule
        .events()
        .iter()
        .enumerate()
        .map(|(idx, event)| {
            let id = idx as i64 + 1;
            let required_role = schedule.required_role(event).unwrap_or_else(|| {
                warn!(
                    event = %event.id,
                    resource = %event.resource_id,
                    "Event references an unknown resource"
                );
                ""
            });
            Assignment {
                id,
                event: AssignmentEvent {
                    id,
                    name: event
                        .assignee()
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("Event {}", id)),
                    start: event.start,
                    end: event.end,
                    required_role: required_role.to_string(),
                },
                person: None,
            }
        })
        .collect();

    SolveRequest {
        person_list: people_from_records(people),
        assignment_list,
        constraint_settings: weights.encode(encoding),
    }
}

/// Outcome of folding a solver reply into the events.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub events: Vec<Event>,
    /// Assignments written into events.
    pub applied: usize,
    /// Assignments without a usable event reference.
    pub skipped: usize,
}

/// Apply every named assignment of `response` to `events`.
///
/// Assignments without a person are left alone. Event ids outside
/// `1..=events.len()` are skipped and counted, never treated as errors.
pub fn reconcile(response: &SolveResponse, events: &[Event]) -> Reconciliation {
    let mut updated = events.to_vec();
    let mut applied = 0;
    let mut skipped = 0;

    for assignment in &response.assignment_list {
        let Some(name) = assignment.person_name() else {
            continue;
        };

        let target = assignment
            .event_id()
            .and_then(|id| usize::try_from(id).ok())
            .and_then(|id| id.checked_sub(1))
            .and_then(|idx| updated.get(idx))
            .map(|event| event.id.clone());

        match target {
            Some(event_id) => {
                updated = set_assignment(&updated, &event_id, name);
                applied += 1;
            }
            None => {
                warn!(
                    event = ?assignment.event_id(),
                    person = name,
                    "Solver assignment has no matching event, skipped"
                );
                skipped += 1;
            }
        }
    }

    debug!(applied, skipped, "Reconciled solver assignments");

    Reconciliation {
        events: updated,
        applied,
        skipped,
    }
}
