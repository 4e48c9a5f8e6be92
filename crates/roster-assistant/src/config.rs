//! Assistant configuration: service endpoints plus the orchestrator settings.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use roster_kernel::{DayGeneratorConfig, OrchestratorConfig};

/// Runtime configuration of the assistant binary.
///
/// Loaded from an optional JSON file; CLI flags and environment variables
/// override the endpoint fields afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Chat server root (Ollama or vLLM)
    pub chat_host: String,

    /// Solver service root
    pub solver_url: String,

    /// Personnel service root
    pub personnel_url: String,

    /// Read personnel from this JSON file instead of the personnel service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub personnel_file: Option<PathBuf>,

    /// Seed for the generated starting schedule
    pub seed: u64,

    /// Day layout for the generated starting schedule
    pub day: DayGeneratorConfig,

    /// Orchestrator settings
    pub orchestrator: OrchestratorConfig,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            chat_host: "http://localhost:11434".to_string(),
            solver_url: "http://localhost:8080".to_string(),
            personnel_url: "http://localhost:8081".to_string(),
            personnel_file: None,
            seed: 42,
            day: DayGeneratorConfig::default(),
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

impl AssistantConfig {
    /// Load from a JSON file. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Load from `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file() {
        let path = std::env::temp_dir().join("roster-assistant-config-test.json");
        std::fs::write(
            &path,
            r#"{"solver_url": "http://solver:9000", "orchestrator": {"summarize": false}}"#,
        )
        .unwrap();

        let config = AssistantConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.solver_url, "http://solver:9000");
        assert_eq!(config.chat_host, "http://localhost:11434");
        assert!(!config.orchestrator.summarize);
        assert_eq!(config.orchestrator.model, "qwen3:8b");
    }

    #[test]
    fn test_missing_file_is_error() {
        let missing = Path::new("/nonexistent/roster.json");
        assert!(AssistantConfig::load_or_default(Some(missing)).is_err());
        assert_eq!(
            AssistantConfig::load_or_default(None).unwrap(),
            AssistantConfig::default()
        );
    }
}
