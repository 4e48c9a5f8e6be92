//! Turn reports written after a CLI chat turn.
//!
//! Captures:
//! - The instruction and the reply shown to the user
//! - Every tool call and what happened to it
//! - Weights after the turn
//! - Solve statistics and the resulting assignment/conflict counts

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use roster_kernel::{ExecutedCall, Session, SolveSummary, TurnOutcome};

/// Result of a single turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnReport {
    /// Correlation id of the turn
    pub turn_id: String,
    /// Model used
    pub model: String,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// End time
    pub ended_at: DateTime<Utc>,
    /// User instruction
    pub instruction: String,
    /// Reply shown to the user
    pub reply: String,
    /// Requested calls, in dispatch order
    pub calls: Vec<CallRecord>,
    /// Weights after the turn, in solver text form
    pub weights: BTreeMap<String, String>,
    /// Solve statistics, if the turn solved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solve: Option<SolveRecord>,
    /// Events with an assigned person after the turn
    pub assigned_events: usize,
    /// Events in the schedule
    pub total_events: usize,
    /// Events flagged as conflicting after the turn
    pub conflicts: usize,
}

/// One call as reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallRecord {
    pub name: String,
    pub status: String,
    pub arguments: serde_json::Value,
    #[serde(default)]
    pub synthetic: bool,
}

/// Solve statistics as reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveRecord {
    pub people: usize,
    pub assignments: usize,
    pub applied: usize,
    pub skipped: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<String>,
}

impl From<&ExecutedCall> for CallRecord {
    fn from(call: &ExecutedCall) -> Self {
        let status = serde_json::to_value(call.status)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        Self {
            name: call.name.clone(),
            status,
            arguments: serde_json::Value::Object(call.arguments.clone()),
            synthetic: call.synthetic,
        }
    }
}

impl From<&SolveSummary> for SolveRecord {
    fn from(summary: &SolveSummary) -> Self {
        Self {
            people: summary.people,
            assignments: summary.assignments,
            applied: summary.applied,
            skipped: summary.skipped,
            score: summary.score.clone(),
        }
    }
}

impl TurnReport {
    pub fn new(
        model: &str,
        instruction: &str,
        started_at: DateTime<Utc>,
        outcome: &TurnOutcome,
        session: &Session,
    ) -> Self {
        Self {
            turn_id: outcome.turn_id.clone(),
            model: model.to_string(),
            started_at,
            ended_at: Utc::now(),
            instruction: instruction.to_string(),
            reply: outcome.reply.clone(),
            calls: outcome.calls.iter().map(CallRecord::from).collect(),
            weights: session.weights.serialize(),
            solve: outcome.solve.as_ref().map(SolveRecord::from),
            assigned_events: session.schedule.assigned_count(),
            total_events: session.schedule.events().len(),
            conflicts: session.schedule.conflicts().len(),
        }
    }

    /// Wall-clock duration in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        (self.ended_at - self.started_at).num_milliseconds().max(0) as u64
    }

    /// Save as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load from JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let report = serde_json::from_str(&json)?;
        Ok(report)
    }
}

/// Format milliseconds as human-readable duration.
pub fn format_duration(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        let mins = ms / 60_000;
        let secs = (ms % 60_000) / 1000;
        format!("{}m{}s", mins, secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_kernel::{CallStatus, Schedule, WeightModel};

    fn outcome() -> TurnOutcome {
        TurnOutcome {
            turn_id: "turn_test".to_string(),
            reply: "Optimization complete.".to_string(),
            calls: vec![ExecutedCall {
                name: "solveScheduler".to_string(),
                arguments: serde_json::Map::new(),
                status: CallStatus::Solved,
                output: serde_json::Value::Null,
                synthetic: true,
            }],
            solve: Some(SolveSummary {
                people: 2,
                assignments: 0,
                applied: 0,
                skipped: 0,
                conflicts: 0,
                score: None,
            }),
            messages: Vec::new(),
        }
    }

    #[test]
    fn test_report_save_and_load() {
        let session = Session::new(Schedule::default(), WeightModel::default());
        let report = TurnReport::new("qwen3:8b", "solve", Utc::now(), &outcome(), &session);
        assert_eq!(report.calls[0].status, "solved");
        assert_eq!(report.weights["noOverlap"], "1hard/0soft");

        let path = std::env::temp_dir().join(format!("{}.json", report.turn_id));
        report.save(&path).unwrap();
        let loaded = TurnReport::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.turn_id, "turn_test");
        assert_eq!(loaded.solve.unwrap().people, 2);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(500), "500ms");
        assert_eq!(format_duration(1500), "1.5s");
        assert_eq!(format_duration(125_000), "2m5s");
    }
}
