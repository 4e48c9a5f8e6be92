//! Integration tests for full orchestration turns.
//!
//! Drives [`Orchestrator::run_turn`] end to end with in-process fakes:
//! - a scripted chat backend replaying canned replies
//! - a recording solver that keeps every request it receives
//! - a failing solver and a failing personnel directory
//! - a solver and a chat backend that outlive their deadlines
//! - a fixed personnel directory

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use roster_kernel::{
    BackendError, CallStatus, ChatBackend, ChatReply, ChatRequest, ConstraintName, ConstraintWeight,
    DayGenerator, DayGeneratorConfig, Event, Orchestrator, OrchestratorConfig, PersonnelDirectory,
    PersonnelRecord, Resource, Role, Schedule, SolveRequest, SolveResponse, SolvedAssignment, Solver,
    ToolCall, TurnError,
};

/// Chat backend replaying a fixed script.
struct ScriptedChat {
    script: Mutex<Vec<ChatReply>>,
    seen: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChat {
    fn new(replies: Vec<ChatReply>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(replies.into_iter().rev().collect()),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedChat {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, BackendError> {
        self.seen.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop()
            .ok_or_else(|| BackendError::new("no scripted reply left"))
    }
}

/// Solver assigning the given names to events 1.., recording requests.
struct RecordingSolver {
    names: Vec<&'static str>,
    requests: Mutex<Vec<SolveRequest>>,
}

impl RecordingSolver {
    fn new(names: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            names,
            requests: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Solver for RecordingSolver {
    async fn solve(&self, request: &SolveRequest) -> Result<SolveResponse, BackendError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(SolveResponse {
            assignment_list: self
                .names
                .iter()
                .enumerate()
                .map(|(idx, name)| SolvedAssignment::new(idx as i64 + 1, name))
                .collect(),
            score: Some("0hard/-1soft".to_string()),
        })
    }
}

struct FailingSolver;

#[async_trait]
impl Solver for FailingSolver {
    async fn solve(&self, _request: &SolveRequest) -> Result<SolveResponse, BackendError> {
        Err(BackendError::new("solver returned 500"))
    }
}

/// Solver that answers long after any test deadline.
struct SlowSolver;

#[async_trait]
impl Solver for SlowSolver {
    async fn solve(&self, _request: &SolveRequest) -> Result<SolveResponse, BackendError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(SolveResponse::default())
    }
}

/// Chat backend that answers long after any test deadline.
struct SlowChat;

#[async_trait]
impl ChatBackend for SlowChat {
    async fn chat(&self, _request: &ChatRequest) -> Result<ChatReply, BackendError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok(ChatReply::text("too late"))
    }
}

struct UnreachableDirectory;

#[async_trait]
impl PersonnelDirectory for UnreachableDirectory {
    async fn list_people(&self) -> Result<Vec<PersonnelRecord>, BackendError> {
        Err(BackendError::new("connection refused"))
    }
}

struct Directory;

#[async_trait]
impl PersonnelDirectory for Directory {
    async fn list_people(&self) -> Result<Vec<PersonnelRecord>, BackendError> {
        Ok(vec![
            PersonnelRecord::new("Alice", &["Lawyer"]),
            PersonnelRecord::new("Bob", &["Doctor"]),
        ])
    }
}

fn at(hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 8, 18)
        .and_then(|d| d.and_hms_opt(hour, 0, 0))
        .unwrap()
}

fn two_event_schedule() -> Schedule {
    Schedule::new(
        Resource::default_catalogue(),
        vec![
            Event::new("r1_e1", "r1", at(8), at(10)),
            Event::new("r3_e1", "r3", at(9), at(11)),
        ],
    )
}

#[tokio::test]
async fn test_forced_solve_is_final_executed_call() -> Result<()> {
    let chat = ScriptedChat::new(vec![
        ChatReply::calls(vec![
            ToolCall::new("setNoBackToBackHardWeight").arg("hard", 1),
            ToolCall::new("setBalanceSoftWeight").arg("soft", "1"),
        ]),
        ChatReply::text("<think>short</think>No back-to-back shifts, balanced load."),
    ]);
    let solver = RecordingSolver::new(vec!["Alice", "Bob"]);
    let orch = Orchestrator::new(
        chat.clone(),
        solver.clone(),
        Arc::new(Directory),
        OrchestratorConfig::default(),
    );
    let mut session = orch.session(two_event_schedule());

    let outcome = orch.run_turn(&mut session, "avoid back-to-back shifts").await?;

    let last = outcome.calls.last().unwrap();
    assert_eq!(last.name, "solveScheduler");
    assert_eq!(last.status, CallStatus::Solved);
    assert!(last.synthetic);
    assert_eq!(outcome.reply, "No back-to-back shifts, balanced load.");

    let requests = solver.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    let settings = &requests[0].constraint_settings;
    assert_eq!(settings["noBackToBack"], "1hard/0soft");
    assert_eq!(settings["balance"], "0hard/1soft");
    assert_eq!(requests[0].person_list.len(), 2);

    assert_eq!(session.schedule.events()[0].assignee(), Some("Alice"));
    assert_eq!(session.schedule.events()[1].assignee(), Some("Bob"));
    assert!(session.schedule.conflicts().is_empty());

    let solve = outcome.solve.unwrap();
    assert_eq!(solve.applied, 2);
    assert_eq!(solve.score.as_deref(), Some("0hard/-1soft"));
    Ok(())
}

#[tokio::test]
async fn test_calls_after_first_solve_are_skipped() -> Result<()> {
    let chat = ScriptedChat::new(vec![
        ChatReply::calls(vec![
            ToolCall::new("solveScheduler"),
            ToolCall::new("setNoOverlapHardWeight").arg("hard", 0),
            ToolCall::new("solveScheduler"),
        ]),
        ChatReply::text("Solved."),
    ]);
    let solver = RecordingSolver::new(vec!["Alice"]);
    let orch = Orchestrator::new(
        chat,
        solver.clone(),
        Arc::new(Directory),
        OrchestratorConfig::default(),
    );
    let mut session = orch.session(two_event_schedule());

    let outcome = orch.run_turn(&mut session, "just solve").await?;

    let statuses: Vec<CallStatus> = outcome.calls.iter().map(|c| c.status).collect();
    assert_eq!(
        statuses,
        vec![CallStatus::Solved, CallStatus::Skipped, CallStatus::Skipped]
    );
    assert_eq!(solver.requests.lock().unwrap().len(), 1);
    assert_eq!(
        session.weights.get(ConstraintName::NoOverlap),
        ConstraintWeight::new(1, 0)
    );
    Ok(())
}

#[tokio::test]
async fn test_solver_failure_keeps_weights_and_schedule() {
    let chat = ScriptedChat::new(vec![ChatReply::calls(vec![
        ToolCall::new("setBalanceSoftWeight").arg("soft", 7),
        ToolCall::new("solveScheduler"),
    ])]);
    let orch = Orchestrator::new(
        chat,
        Arc::new(FailingSolver),
        Arc::new(Directory),
        OrchestratorConfig::default(),
    );
    let mut session = orch.session(two_event_schedule());
    let before = session.schedule.clone();

    let failure = orch
        .run_turn(&mut session, "balance it")
        .await
        .expect_err("solver failure must fail the turn");

    assert!(matches!(failure.error, TurnError::SolveFailed(_)));
    assert!(failure.turn_id.starts_with("turn_"));
    assert_eq!(session.schedule, before);
    assert_eq!(
        session.weights.get(ConstraintName::Balance),
        ConstraintWeight::new(0, 1)
    );
    // system, user, assistant(calls), tool(balance)
    assert_eq!(failure.messages.len(), 4);
    assert_eq!(failure.messages[3].role, Role::Tool);
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn test_unknown_and_invalid_calls_do_not_abort() -> Result<()> {
    let chat = ScriptedChat::new(vec![
        ChatReply::calls(vec![
            ToolCall::new("deleteEverything"),
            ToolCall::new("setNoOverlapSoftWeight"),
            ToolCall::new("setAversionGroupOverlapHardWeight").arg("hard", -3),
        ]),
        ChatReply::text("Done."),
    ]);
    let orch = Orchestrator::new(
        chat,
        RecordingSolver::new(Vec::new()),
        Arc::new(Directory),
        OrchestratorConfig::default(),
    );
    let mut session = orch.session(two_event_schedule());

    let outcome = orch.run_turn(&mut session, "do things").await?;

    let statuses: Vec<CallStatus> = outcome.calls.iter().map(|c| c.status).collect();
    assert_eq!(
        statuses,
        vec![
            CallStatus::Dropped,
            CallStatus::Rejected,
            CallStatus::Applied,
            CallStatus::Solved
        ]
    );
    assert_eq!(
        session.weights.get(ConstraintName::AversionGroupOverlap),
        ConstraintWeight::new(0, 0)
    );
    Ok(())
}

#[tokio::test]
async fn test_plain_reply_and_history_carry_over() -> Result<()> {
    let chat = ScriptedChat::new(vec![
        ChatReply::text("Which constraints matter to you?"),
        ChatReply::text("Noted."),
    ]);
    let orch = Orchestrator::new(
        chat.clone(),
        RecordingSolver::new(Vec::new()),
        Arc::new(Directory),
        OrchestratorConfig::default(),
    );
    let mut session = orch.session(two_event_schedule());

    let first = orch.run_turn(&mut session, "help me plan").await?;
    assert_eq!(first.reply, "Which constraints matter to you?");
    assert!(first.calls.is_empty());

    orch.run_turn(&mut session, "fairness").await?;

    let requests = chat.requests();
    // system, history (user + assistant), new user
    assert_eq!(requests[1].messages.len(), 4);
    assert_eq!(requests[1].messages[1].content, "help me plan");
    assert_eq!(session.history().len(), 4);
    Ok(())
}

#[tokio::test]
async fn test_generated_day_round_trips_through_solver() -> Result<()> {
    let mut generator = DayGenerator::new(DayGeneratorConfig::default(), 7);
    let schedule = generator.generate_catalogue(Resource::default_catalogue());
    let events = schedule.events().len();
    assert!(events >= 10);

    let chat = ScriptedChat::new(vec![ChatReply::calls(vec![ToolCall::new("solveScheduler")])]);
    let solver = RecordingSolver::new(vec!["Alice"; 3]);
    let config = OrchestratorConfig {
        summarize: false,
        ..OrchestratorConfig::default()
    };
    let orch = Orchestrator::new(chat, solver.clone(), Arc::new(Directory), config);
    let mut session = orch.session(schedule);

    let outcome = orch.run_turn(&mut session, "solve").await?;

    let requests = solver.requests.lock().unwrap();
    assert_eq!(requests[0].assignment_list.len(), events);
    assert_eq!(requests[0].assignment_list[0].event.name, "Event 1");
    assert_eq!(session.schedule.assigned_count(), 3);
    assert_eq!(outcome.reply, "Optimization complete.");
    Ok(())
}

/// Script that sets the balance weight and then solves.
fn balance_then_solve() -> Arc<ScriptedChat> {
    ScriptedChat::new(vec![ChatReply::calls(vec![
        ToolCall::new("setBalanceSoftWeight").arg("soft", 1),
        ToolCall::new("solveScheduler"),
    ])])
}

#[tokio::test]
async fn test_solver_deadline_is_solve_failure() {
    let config = OrchestratorConfig {
        solve_timeout_ms: 50,
        ..OrchestratorConfig::default()
    };
    let orch = Orchestrator::new(
        balance_then_solve(),
        Arc::new(SlowSolver),
        Arc::new(Directory),
        config,
    );
    let mut session = orch.session(two_event_schedule());
    let before = session.schedule.clone();

    let failure = orch
        .run_turn(&mut session, "balance it")
        .await
        .expect_err("solver deadline must fail the turn");

    match &failure.error {
        TurnError::SolveFailed(message) => assert!(message.contains("timed out")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(session.schedule, before);
    assert_eq!(
        session.weights.get(ConstraintName::Balance),
        ConstraintWeight::new(0, 1)
    );
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn test_chat_deadline_is_chat_failure() {
    let config = OrchestratorConfig {
        chat_timeout_ms: 50,
        ..OrchestratorConfig::default()
    };
    let orch = Orchestrator::new(
        Arc::new(SlowChat),
        RecordingSolver::new(Vec::new()),
        Arc::new(Directory),
        config,
    );
    let mut session = orch.session(two_event_schedule());
    session.weights.set_hard(ConstraintName::NoBackToBack, 1);
    let before = session.schedule.clone();
    let weights_before = session.weights.clone();

    let failure = orch
        .run_turn(&mut session, "anything")
        .await
        .expect_err("chat deadline must fail the turn");

    match &failure.error {
        TurnError::ChatFailed(message) => assert!(message.contains("timed out")),
        other => panic!("unexpected error: {other:?}"),
    }
    // system, user
    assert_eq!(failure.messages.len(), 2);
    assert_eq!(session.schedule, before);
    assert_eq!(session.weights, weights_before);
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn test_personnel_failure_is_solve_failure() {
    let solver = RecordingSolver::new(vec!["Alice"]);
    let orch = Orchestrator::new(
        balance_then_solve(),
        solver.clone(),
        Arc::new(UnreachableDirectory),
        OrchestratorConfig::default(),
    );
    let mut session = orch.session(two_event_schedule());
    let before = session.schedule.clone();

    let failure = orch
        .run_turn(&mut session, "balance it")
        .await
        .expect_err("personnel failure must fail the turn");

    match &failure.error {
        TurnError::SolveFailed(message) => assert!(message.contains("connection refused")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(solver.requests.lock().unwrap().is_empty());
    assert_eq!(session.schedule, before);
    assert_eq!(
        session.weights.get(ConstraintName::Balance),
        ConstraintWeight::new(0, 1)
    );
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn test_solve_now_skips_chat() -> Result<()> {
    let chat = ScriptedChat::new(Vec::new());
    let solver = RecordingSolver::new(vec!["Alice", "Bob"]);
    let orch = Orchestrator::new(
        chat.clone(),
        solver.clone(),
        Arc::new(Directory),
        OrchestratorConfig::default(),
    );
    let mut session = orch.session(two_event_schedule());
    session.weights.set_soft(ConstraintName::Balance, 1);

    let summary = orch.solve_now(&mut session).await?;

    assert!(chat.requests().is_empty());
    assert_eq!(summary.applied, 2);
    assert_eq!(summary.people, 2);
    assert_eq!(session.schedule.events()[0].assignee(), Some("Alice"));
    assert_eq!(session.schedule.events()[1].assignee(), Some("Bob"));
    assert!(session.history().is_empty());

    let requests = solver.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].constraint_settings["balance"], "0hard/1soft");
    Ok(())
}

#[tokio::test]
async fn test_solve_now_failure_leaves_schedule() {
    let orch = Orchestrator::new(
        ScriptedChat::new(Vec::new()),
        Arc::new(FailingSolver),
        Arc::new(Directory),
        OrchestratorConfig::default(),
    );
    let mut session = orch.session(two_event_schedule());
    let before = session.schedule.clone();

    let failure = orch
        .solve_now(&mut session)
        .await
        .expect_err("solver failure must surface");

    assert!(matches!(failure.error, TurnError::SolveFailed(_)));
    assert!(failure.turn_id.starts_with("solve_"));
    assert!(failure.messages.is_empty());
    assert_eq!(session.schedule, before);
}
