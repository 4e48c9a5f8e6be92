//! Orchestrator: runs one natural-language turn against the chat backend.
//!
//! A turn moves through `Idle → AwaitingModelTurn → DispatchingTools →
//! Terminated`:
//! 1. The log (system prompt, prior history, new instruction) goes to the
//!    chat backend together with the tool schema.
//! 2. A plain text reply ends the turn.
//! 3. Tool calls are normalised so the list ends in `solveScheduler`, then
//!    dispatched one by one. Weight tools mutate the session's weights.
//! 4. The first solve fetches personnel, calls the solver, reconciles the
//!    result into the session schedule and ends the turn, optionally after a
//!    separate explanation call made without tools.
//!
//! Every external call runs under a deadline. A failed call aborts the turn
//! with a [`TurnFailure`]; weights already changed stay changed.

use std::sync::Arc;
use std::time::Duration;

use mti::prelude::*;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn, Instrument};

use crate::backend::{ChatBackend, ChatMessage, ChatReply, ChatRequest, PersonnelDirectory, Role, Solver, ToolCall};
use crate::config::OrchestratorConfig;
use crate::error::{TurnError, TurnFailure};
use crate::prompts::FALLBACK_REPLY;
use crate::schedule::Schedule;
use crate::solve::{build_request, reconcile};
use crate::tools::{ensure_terminal_solve, Dispatch, ToolRegistry};
use crate::weights::WeightModel;

/// Lifecycle of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TurnState {
    Idle,
    AwaitingModelTurn,
    DispatchingTools,
    Terminated,
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::AwaitingModelTurn => write!(f, "awaiting_model_turn"),
            Self::DispatchingTools => write!(f, "dispatching_tools"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

/// State owned by one conversation: the schedule, its weights and the
/// user/assistant exchange so far.
#[derive(Debug, Clone)]
pub struct Session {
    pub schedule: Schedule,
    pub weights: WeightModel,
    history: Vec<ChatMessage>,
}

impl Session {
    pub fn new(schedule: Schedule, weights: WeightModel) -> Self {
        Self {
            schedule,
            weights,
            history: Vec::new(),
        }
    }

    /// Completed user/assistant exchanges, oldest first.
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }
}

/// What happened to one requested call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    /// Weight tool applied.
    Applied,
    /// Known tool, unusable arguments.
    Rejected,
    /// Unknown tool.
    Dropped,
    /// The solve that ended the turn.
    Solved,
    /// Not run because a solve already ended the turn.
    Skipped,
}

/// Record of one call in a turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutedCall {
    pub name: String,
    pub arguments: serde_json::Map<String, serde_json::Value>,
    pub status: CallStatus,
    /// Tool-result payload, or the error text for rejected and dropped calls.
    pub output: serde_json::Value,
    /// True for the `solveScheduler` appended when the model omitted it.
    pub synthetic: bool,
}

/// Solve statistics for a turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SolveSummary {
    pub people: usize,
    pub assignments: usize,
    pub applied: usize,
    pub skipped: usize,
    pub conflicts: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<String>,
}

/// A completed turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub turn_id: String,
    /// Text shown to the user.
    pub reply: String,
    pub calls: Vec<ExecutedCall>,
    pub solve: Option<SolveSummary>,
    /// Full message log of the turn.
    pub messages: Vec<ChatMessage>,
}

/// Turn driver. Holds the collaborators and configuration; all mutable
/// state lives in the [`Session`] passed to [`Orchestrator::run_turn`].
pub struct Orchestrator {
    chat: Arc<dyn ChatBackend>,
    solver: Arc<dyn Solver>,
    personnel: Arc<dyn PersonnelDirectory>,
    registry: ToolRegistry,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        chat: Arc<dyn ChatBackend>,
        solver: Arc<dyn Solver>,
        personnel: Arc<dyn PersonnelDirectory>,
        config: OrchestratorConfig,
    ) -> Self {
        let registry = ToolRegistry::from_config(&config.toolset);
        Self {
            chat,
            solver,
            personnel,
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Fresh session over `schedule` with the configured weight defaults.
    pub fn session(&self, schedule: Schedule) -> Session {
        Session::new(schedule, self.config.weights.model())
    }

    /// Run one turn for `instruction`.
    pub async fn run_turn(
        &self,
        session: &mut Session,
        instruction: &str,
    ) -> Result<TurnOutcome, TurnFailure> {
        let turn_id = "turn".create_type_id::<V7>().to_string();
        let span = tracing::info_span!("turn", turn_id = %turn_id);

        let mut messages = Vec::new();
        let result = self
            .drive(session, instruction, &turn_id, &mut messages)
            .instrument(span)
            .await;

        match result {
            Ok((reply, calls, solve)) => {
                session.history.push(ChatMessage::user(instruction));
                session.history.push(ChatMessage::assistant(reply.clone()));
                Ok(TurnOutcome {
                    turn_id,
                    reply,
                    calls,
                    solve,
                    messages,
                })
            }
            Err(error) => {
                warn!(turn_id = %turn_id, error = %error, "Turn failed");
                Err(TurnFailure {
                    turn_id,
                    error,
                    messages,
                })
            }
        }
    }

    /// Solve the session as it stands, without consulting the chat model.
    ///
    /// Uses the session's current weights and the configured deadlines. No
    /// explanation call is made and the history is left alone.
    pub async fn solve_now(&self, session: &mut Session) -> Result<SolveSummary, TurnFailure> {
        let turn_id = "solve".create_type_id::<V7>().to_string();
        let span = tracing::info_span!("solve", turn_id = %turn_id);

        match self.solve(session, &turn_id).instrument(span).await {
            Ok(summary) => Ok(summary),
            Err(error) => {
                warn!(turn_id = %turn_id, error = %error, "Direct solve failed");
                Err(TurnFailure {
                    turn_id,
                    error,
                    messages: Vec::new(),
                })
            }
        }
    }

    async fn drive(
        &self,
        session: &mut Session,
        instruction: &str,
        turn_id: &str,
        messages: &mut Vec<ChatMessage>,
    ) -> Result<(String, Vec<ExecutedCall>, Option<SolveSummary>), TurnError> {
        let mut state = TurnState::Idle;
        info!(turn_id = %turn_id, model = %self.config.model, "Turn started");

        messages.push(ChatMessage::system(self.config.system_prompt.clone()));
        messages.extend(session.history.iter().cloned());
        messages.push(ChatMessage::user(instruction));

        transition(turn_id, &mut state, TurnState::AwaitingModelTurn);
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: messages.clone(),
            tools: Some(self.registry.schema()),
        };
        let reply = self.chat(&request).await?;

        if reply.tool_calls.is_empty() {
            let text = strip_think(&reply.content);
            messages.push(ChatMessage::assistant(text.clone()));
            transition(turn_id, &mut state, TurnState::Terminated);
            info!(turn_id = %turn_id, "Turn ended with a text reply");
            return Ok((text, Vec::new(), None));
        }

        let requested = reply.tool_calls.len();
        let calls = ensure_terminal_solve(&reply.tool_calls);
        messages.push(ChatMessage::assistant_with_calls(
            strip_think(&reply.content),
            calls.clone(),
        ));

        transition(turn_id, &mut state, TurnState::DispatchingTools);
        let mut executed = Vec::with_capacity(calls.len());
        let mut solve = None;

        for (idx, call) in calls.iter().enumerate() {
            let synthetic = idx >= requested;

            if solve.is_some() {
                info!(turn_id = %turn_id, tool = %call.name, "Solve already ran, skipping call");
                executed.push(record(call, CallStatus::Skipped, serde_json::Value::Null, synthetic));
                continue;
            }

            match self.registry.dispatch(call, &mut session.weights) {
                Dispatch::Applied { output, .. } => {
                    messages.push(ChatMessage::tool(output.to_string(), call.id.clone()));
                    executed.push(record(call, CallStatus::Applied, output, synthetic));
                }
                Dispatch::Rejected { error, .. } => {
                    let output = serde_json::json!({ "error": error.to_string() });
                    messages.push(ChatMessage::tool(output.to_string(), call.id.clone()));
                    executed.push(record(call, CallStatus::Rejected, output, synthetic));
                }
                Dispatch::Dropped(error) => {
                    executed.push(record(
                        call,
                        CallStatus::Dropped,
                        serde_json::Value::String(error.to_string()),
                        synthetic,
                    ));
                }
                Dispatch::Solve => {
                    let summary = self.solve(session, turn_id).await?;
                    let output = serde_json::to_value(&summary).unwrap_or_default();
                    messages.push(ChatMessage::tool(output.to_string(), call.id.clone()));
                    executed.push(record(call, CallStatus::Solved, output, synthetic));
                    solve = Some(summary);
                }
            }
        }

        let reply = if solve.is_some() && self.config.summarize {
            self.summarize(instruction, turn_id).await
        } else {
            FALLBACK_REPLY.to_string()
        };
        messages.push(ChatMessage::assistant(reply.clone()));

        transition(turn_id, &mut state, TurnState::Terminated);
        info!(
            turn_id = %turn_id,
            calls = executed.len(),
            solved = solve.is_some(),
            "Turn finished"
        );

        Ok((reply, executed, solve))
    }

    /// Fetch personnel, solve, and fold the result into the session.
    async fn solve(&self, session: &mut Session, turn_id: &str) -> Result<SolveSummary, TurnError> {
        let deadline = Duration::from_millis(self.config.solve_timeout_ms);

        let people = match tokio::time::timeout(deadline, self.personnel.list_people()).await {
            Ok(Ok(people)) => people,
            Ok(Err(e)) => return Err(TurnError::SolveFailed(format!("personnel fetch: {e}"))),
            Err(_) => {
                return Err(TurnError::SolveFailed(format!(
                    "personnel fetch timed out after {} ms",
                    self.config.solve_timeout_ms
                )));
            }
        };

        let request = build_request(
            &session.schedule,
            &people,
            &session.weights,
            self.config.weights.encoding,
        );
        info!(
            turn_id = %turn_id,
            people = request.person_list.len(),
            assignments = request.assignment_list.len(),
            "Calling solver"
        );

        let response = match tokio::time::timeout(deadline, self.solver.solve(&request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(TurnError::SolveFailed(e.to_string())),
            Err(_) => {
                return Err(TurnError::SolveFailed(format!(
                    "solver timed out after {} ms",
                    self.config.solve_timeout_ms
                )));
            }
        };

        let reconciliation = reconcile(&response, session.schedule.events());
        session.schedule.replace_events(reconciliation.events);

        let summary = SolveSummary {
            people: request.person_list.len(),
            assignments: response.assignment_list.len(),
            applied: reconciliation.applied,
            skipped: reconciliation.skipped,
            conflicts: session.schedule.conflicts().len(),
            score: response.score,
        };
        info!(
            turn_id = %turn_id,
            applied = summary.applied,
            skipped = summary.skipped,
            conflicts = summary.conflicts,
            score = ?summary.score,
            "Solve reconciled"
        );
        Ok(summary)
    }

    /// Stateless explanation call, without tools. Never fails the turn.
    async fn summarize(&self, instruction: &str, turn_id: &str) -> String {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage::system(self.config.system_prompt.clone()),
                ChatMessage::user(instruction),
                ChatMessage::user(self.config.summary_directive.clone()),
            ],
            tools: None,
        };

        match self.chat(&request).await {
            Ok(reply) => {
                let text = strip_think(&reply.content);
                if text.is_empty() {
                    FALLBACK_REPLY.to_string()
                } else {
                    text
                }
            }
            Err(e) => {
                warn!(turn_id = %turn_id, error = %e, "Summary call failed, using fallback reply");
                FALLBACK_REPLY.to_string()
            }
        }
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, TurnError> {
        let deadline = Duration::from_millis(self.config.chat_timeout_ms);
        debug!(
            messages = request.messages.len(),
            with_tools = request.tools.is_some(),
            "Chat request"
        );
        match tokio::time::timeout(deadline, self.chat.chat(request)).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(e)) => Err(TurnError::ChatFailed(e.to_string())),
            Err(_) => Err(TurnError::ChatFailed(format!(
                "timed out after {} ms",
                self.config.chat_timeout_ms
            ))),
        }
    }
}

fn transition(turn_id: &str, state: &mut TurnState, next: TurnState) {
    debug!(turn_id = %turn_id, from = %state, to = %next, "Turn state");
    *state = next;
}

fn record(
    call: &ToolCall,
    status: CallStatus,
    output: serde_json::Value,
    synthetic: bool,
) -> ExecutedCall {
    ExecutedCall {
        name: call.name.clone(),
        arguments: call.arguments.clone(),
        status,
        output,
        synthetic,
    }
}

/// Remove `<think>…</think>` reasoning blocks. A dangling `</think>` keeps
/// only the text after it.
pub fn strip_think(text: &str) -> String {
    let cleaned = match Regex::new(r"(?s)<think>.*?</think>").ok() {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    };
    let visible = match cleaned.rfind("</think>") {
        Some(pos) => &cleaned[pos + "</think>".len()..],
        None => cleaned.as_str(),
    };
    visible.trim().to_string()
}

/// Count messages by role in a log.
pub fn count_role(messages: &[ChatMessage], role: Role) -> usize {
    messages.iter().filter(|m| m.role == role).count()
}
