//! Roster Assistant - HTTP adapters and CLI around the roster kernel.
//!
//! ## Services
//!
//! - Chat: OpenAI-compatible `/v1/chat/completions` (Ollama, vLLM)
//! - Solver: `POST /api/assignment/solve`
//! - Personnel: `GET /api/manpower`, or a local JSON file

pub mod chat_client;
pub mod config;
pub mod report;
pub mod solver_client;

use std::sync::Arc;

use anyhow::Result;
use roster_kernel::{DayGenerator, Orchestrator, PersonnelDirectory, Resource, Session};

pub use chat_client::ChatClient;
pub use config::AssistantConfig;
pub use report::TurnReport;
pub use solver_client::{PersonnelClient, SolverClient, StaticPersonnel};

/// Wire the HTTP clients into an orchestrator.
pub fn connect(config: &AssistantConfig) -> Result<Orchestrator> {
    let personnel: Arc<dyn PersonnelDirectory> = match &config.personnel_file {
        Some(path) => Arc::new(StaticPersonnel::from_file(path)?),
        None => Arc::new(PersonnelClient::new(&config.personnel_url)),
    };

    Ok(Orchestrator::new(
        Arc::new(ChatClient::new(&config.chat_host)),
        Arc::new(SolverClient::new(&config.solver_url)),
        personnel,
        config.orchestrator.clone(),
    ))
}

/// Starting session: a generated day over the default resource catalogue.
pub fn starting_session(orchestrator: &Orchestrator, config: &AssistantConfig) -> Session {
    let mut generator = DayGenerator::new(config.day.clone(), config.seed);
    let schedule = generator.generate_catalogue(Resource::default_catalogue());
    orchestrator.session(schedule)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starting_session_is_seeded() {
        let config = AssistantConfig::default();
        let orchestrator = connect(&config).unwrap();
        let a = starting_session(&orchestrator, &config);
        let b = starting_session(&orchestrator, &config);
        assert_eq!(a.schedule, b.schedule);
        assert_eq!(a.schedule.resources().len(), 10);
        assert_eq!(a.schedule.assigned_count(), 0);
    }
}
