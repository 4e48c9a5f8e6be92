//! Scheduling data model: resources, events and the conflict rule.
//!
//! A resource is a bookable role-slot ("Lawyer shift 1"), an event is a time
//! interval on a resource that may carry an assigned person. Two events
//! conflict when the same person is booked on different resources at
//! overlapping times. Conflict flags are derived: every assignment mutation
//! recomputes them over the whole event set.

use std::collections::HashSet;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ScheduleError;

/// Identifier of a resource (e.g. `"r3"`).
pub type ResourceId = String;

/// Identifier of an event (e.g. `"r3_e2"`).
pub type EventId = String;

/// A bookable slot with a required role label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: ResourceId,
    pub role_name: String,
}

impl Resource {
    pub fn new(id: impl Into<String>, role_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role_name: role_name.into(),
        }
    }

    /// The catalogue the assistant starts with when none is fetched:
    /// two slots for each of five roles.
    pub fn default_catalogue() -> Vec<Resource> {
        [
            ("r1", "Lawyer"),
            ("r2", "Lawyer"),
            ("r3", "Doctor"),
            ("r4", "Doctor"),
            ("r5", "Engineer"),
            ("r6", "Engineer"),
            ("r7", "Electrician"),
            ("r8", "Electrician"),
            ("r9", "Developer"),
            ("r10", "Developer"),
        ]
        .into_iter()
        .map(|(id, role)| Resource::new(id, role))
        .collect()
    }
}

/// A time interval on a resource, optionally assigned to a person.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: EventId,
    pub resource_id: ResourceId,
    /// `None` until assigned. Never `Some("")`.
    pub assigned_person_name: Option<String>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    /// Derived by [`recompute_conflicts`]; callers never set it.
    #[serde(default)]
    pub conflict: bool,
}

impl Event {
    pub fn new(
        id: impl Into<String>,
        resource_id: impl Into<String>,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Self {
        Self {
            id: id.into(),
            resource_id: resource_id.into(),
            assigned_person_name: None,
            start,
            end,
            conflict: false,
        }
    }

    /// Assigned person, if any.
    pub fn assignee(&self) -> Option<&str> {
        self.assigned_person_name.as_deref()
    }

    /// Half-open interval overlap: touching intervals do not overlap.
    pub fn overlaps(&self, other: &Event) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether `self` and `other` violate the conflict rule.
    pub fn conflicts_with(&self, other: &Event) -> bool {
        match (self.assignee(), other.assignee()) {
            (Some(a), Some(b)) => {
                a == b && self.resource_id != other.resource_id && self.overlaps(other)
            }
            _ => false,
        }
    }
}

fn normalize_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Recompute every event's conflict flag against the whole set.
///
/// O(n²) over the events; the expected scale is tens of events per session.
/// Pure and idempotent: the input is left untouched.
pub fn recompute_conflicts(events: &[Event]) -> Vec<Event> {
    events
        .iter()
        .enumerate()
        .map(|(i, event)| {
            let conflict = events
                .iter()
                .enumerate()
                .any(|(j, other)| i != j && other.id != event.id && event.conflicts_with(other));
            Event {
                conflict,
                ..event.clone()
            }
        })
        .collect()
}

/// Set the assigned person of `event_id` and recompute conflicts.
///
/// An empty name clears the assignment. An unknown id leaves the assignments
/// as they were.
pub fn set_assignment(events: &[Event], event_id: &str, person_name: &str) -> Vec<Event> {
    let mut updated = events.to_vec();
    match updated.iter_mut().find(|e| e.id == event_id) {
        Some(event) => event.assigned_person_name = normalize_name(person_name),
        None => debug!(event_id, "Assignment for unknown event ignored"),
    }
    recompute_conflicts(&updated)
}

/// Session-scoped scheduling state: a fixed resource catalogue and the events
/// laid out on it.
///
/// Deserialisation goes through [`Schedule::new`], so incoming conflict flags
/// are recomputed and duplicate event ids are dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "ScheduleParts")]
pub struct Schedule {
    resources: Vec<Resource>,
    events: Vec<Event>,
}

#[derive(Deserialize)]
struct ScheduleParts {
    #[serde(default)]
    resources: Vec<Resource>,
    #[serde(default)]
    events: Vec<Event>,
}

impl From<ScheduleParts> for Schedule {
    fn from(parts: ScheduleParts) -> Self {
        Schedule::new(parts.resources, parts.events)
    }
}

impl Schedule {
    /// Create a schedule; conflict flags are derived immediately.
    ///
    /// Event ids are unique: for a repeated id the first event is kept and
    /// later ones are dropped with a warning.
    pub fn new(resources: Vec<Resource>, events: Vec<Event>) -> Self {
        let mut seen = HashSet::new();
        let events: Vec<Event> = events
            .into_iter()
            .filter(|event| {
                let fresh = seen.insert(event.id.clone());
                if !fresh {
                    warn!(event = %event.id, "Duplicate event id dropped");
                }
                fresh
            })
            .collect();
        let events = recompute_conflicts(&events);
        Self { resources, events }
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn resource(&self, id: &str) -> Option<&Resource> {
        self.resources.iter().find(|r| r.id == id)
    }

    pub fn event(&self, id: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.id == id)
    }

    /// Role required by an event, resolved through its resource.
    pub fn required_role(&self, event: &Event) -> Option<&str> {
        self.resource(&event.resource_id)
            .map(|r| r.role_name.as_str())
    }

    /// Strict assignment: unknown ids are reported instead of ignored.
    pub fn assign(&mut self, event_id: &str, person_name: &str) -> Result<(), ScheduleError> {
        if self.event(event_id).is_none() {
            return Err(ScheduleError::EventNotFound(event_id.to_string()));
        }
        self.events = set_assignment(&self.events, event_id, person_name);
        Ok(())
    }

    /// Replace the event set wholesale (used by reconciliation).
    pub(crate) fn replace_events(&mut self, events: Vec<Event>) {
        self.events = recompute_conflicts(&events);
    }

    pub fn add_event(&mut self, event: Event) -> Result<(), ScheduleError> {
        if self.event(&event.id).is_some() {
            return Err(ScheduleError::DuplicateEvent(event.id));
        }
        if self.resource(&event.resource_id).is_none() {
            return Err(ScheduleError::UnknownResource(event.resource_id));
        }
        if event.end <= event.start {
            return Err(ScheduleError::EmptyInterval(event.id));
        }
        self.events.push(event);
        self.events = recompute_conflicts(&self.events);
        Ok(())
    }

    /// Explicit removal, the only way an event leaves the schedule.
    pub fn remove_event(&mut self, event_id: &str) -> Result<Event, ScheduleError> {
        let idx = self
            .events
            .iter()
            .position(|e| e.id == event_id)
            .ok_or_else(|| ScheduleError::EventNotFound(event_id.to_string()))?;
        let removed = self.events.remove(idx);
        self.events = recompute_conflicts(&self.events);
        Ok(removed)
    }

    /// Ids of events currently flagged as conflicting.
    pub fn conflicts(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter(|e| e.conflict)
            .map(|e| e.id.as_str())
            .collect()
    }

    pub fn assigned_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| e.assigned_person_name.is_some())
            .count()
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Schedule: {} resources, {} events, {} assigned, {} in conflict",
            self.resources.len(),
            self.events.len(),
            self.assigned_count(),
            self.conflicts().len()
        )?;
        for resource in &self.resources {
            writeln!(f, "{} ({}):", resource.id, resource.role_name)?;
            for event in self.events.iter().filter(|e| e.resource_id == resource.id) {
                writeln!(
                    f,
                    "  {} {}-{} {}{}",
                    event.id,
                    event.start.format("%H:%M"),
                    event.end.format("%H:%M"),
                    event.assignee().unwrap_or("[unassigned]"),
                    if event.conflict { " !conflict" } else { "" }
                )?;
            }
        }
        Ok(())
    }
}
