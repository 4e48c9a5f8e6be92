//! Configuration types for the orchestration core.

use serde::{Deserialize, Serialize};

use crate::prompts;
use crate::weights::{ConstraintWeight, WeightEncoding, WeightModel};

/// Top-level orchestrator configuration.
///
/// Every field has a default, so a partial JSON document (or none at all)
/// yields a working configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Model name passed to the chat backend
    pub model: String,

    /// System prompt opening every turn
    pub system_prompt: String,

    /// Instruction for the post-solve explanation call
    pub summary_directive: String,

    /// Whether a solve turn ends with a separate explanation call
    pub summarize: bool,

    /// Deadline for each chat call (milliseconds)
    pub chat_timeout_ms: u64,

    /// Deadline for the personnel fetch and the solve call (milliseconds)
    pub solve_timeout_ms: u64,

    /// Which tools are exposed to the model
    pub toolset: ToolsetConfig,

    /// Weight defaults and wire encoding
    pub weights: WeightConfig,
}

/// Optional tool groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsetConfig {
    /// Expose `setRoleMatchHardWeight`
    pub expose_role_match: bool,

    /// Expose the string-valued `set<Name>Weight` tools
    pub legacy_weight_tools: bool,
}

/// Weight options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightConfig {
    /// Default weight of `roleMatch`
    pub role_match: ConstraintWeight,

    /// How constraint settings are sent to the solver
    pub encoding: WeightEncoding,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            role_match: ConstraintWeight::new(1, 0),
            encoding: WeightEncoding::Text,
        }
    }
}

impl WeightConfig {
    /// Fresh weight model with the configured defaults.
    pub fn model(&self) -> WeightModel {
        WeightModel::with_role_match(self.role_match)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            model: "qwen3:8b".to_string(),
            system_prompt: prompts::SYSTEM_PROMPT.to_string(),
            summary_directive: prompts::SUMMARY_DIRECTIVE.to_string(),
            summarize: true,
            chat_timeout_ms: 120_000, // 2 minutes
            solve_timeout_ms: 60_000,
            toolset: ToolsetConfig::default(),
            weights: WeightConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: OrchestratorConfig = serde_json::from_value(serde_json::json!({
            "model": "llama3.1:8b",
            "toolset": {"expose_role_match": true},
            "weights": {"encoding": "structured"}
        }))
        .unwrap();

        assert_eq!(config.model, "llama3.1:8b");
        assert!(config.summarize);
        assert!(config.toolset.expose_role_match);
        assert!(!config.toolset.legacy_weight_tools);
        assert_eq!(config.weights.encoding, WeightEncoding::Structured);
        assert_eq!(config.weights.role_match, ConstraintWeight::new(1, 0));
        assert_eq!(config.system_prompt, prompts::SYSTEM_PROMPT);
    }

    #[test]
    fn test_weight_config_model() {
        let config = WeightConfig {
            role_match: ConstraintWeight::new(0, 1),
            ..WeightConfig::default()
        };
        let model = config.model();
        assert_eq!(
            model.get(crate::weights::ConstraintName::RoleMatch),
            ConstraintWeight::new(0, 1)
        );
    }
}
