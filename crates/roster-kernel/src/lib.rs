//! Roster Kernel: natural-language control of a constraint-based scheduler.
//!
//! A chat model turns a user's instruction into calls on a fixed tool
//! vocabulary. Weight tools adjust the hard/soft weights of the solver's
//! constraints; `solveScheduler` sends the schedule, personnel and weights to
//! an external solver and folds the returned assignments back into the
//! schedule. External services sit behind the traits in [`backend`].

pub mod backend;
pub mod config;
pub mod error;
pub mod generator;
pub mod orchestrator;
pub mod prompts;
pub mod schedule;
pub mod solve;
pub mod tools;
pub mod weights;

pub use backend::{ChatBackend, ChatMessage, ChatReply, ChatRequest, PersonnelDirectory, Role, Solver, ToolCall};
pub use config::{OrchestratorConfig, ToolsetConfig, WeightConfig};
pub use error::{BackendError, ScheduleError, ToolError, TurnError, TurnFailure};
pub use generator::{DayGenerator, DayGeneratorConfig};
pub use orchestrator::{CallStatus, ExecutedCall, Orchestrator, Session, SolveSummary, TurnOutcome, TurnState};
pub use schedule::{Event, EventId, Resource, ResourceId, Schedule};
pub use solve::{PersonnelRecord, Reconciliation, SolveRequest, SolveResponse, SolvedAssignment};
pub use tools::{ToolName, ToolRegistry};
pub use weights::{ConstraintName, ConstraintWeight, WeightEncoding, WeightModel};
