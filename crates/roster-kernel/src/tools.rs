//! Tool registry: the fixed vocabulary the chat model may call.
//!
//! Tools are keyed by [`ToolName`], a tagged enum resolved once when the
//! registry is built. Weight setters are applied synchronously against the
//! session's [`WeightModel`]; `solveScheduler` is handed back to the
//! orchestrator because it needs the external solver.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::backend::ToolCall;
use crate::config::ToolsetConfig;
use crate::error::ToolError;
use crate::weights::{ConstraintName, ConstraintWeight, WeightField, WeightModel};

/// Version of the canonical catalogue.
pub const CATALOGUE_VERSION: u32 = 3;

/// Wire name of the terminal solve tool.
pub const SOLVE_TOOL: &str = "solveScheduler";

/// Constraints with tool-adjustable weights, and which halves are exposed.
const CANONICAL: [(ConstraintName, bool, bool); 5] = [
    (ConstraintName::NoOverlap, true, true),
    (ConstraintName::NoBackToBack, true, true),
    (ConstraintName::Balance, false, true),
    (ConstraintName::AffinityGroupOverlap, true, true),
    (ConstraintName::AversionGroupOverlap, true, true),
];

/// Name of a registered tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ToolName {
    /// `set<Constraint>HardWeight(hard: int)`
    SetHard(ConstraintName),
    /// `set<Constraint>SoftWeight(soft: int)`
    SetSoft(ConstraintName),
    /// Legacy `set<Constraint>Weight(value: "1hard/0soft")`
    SetWeight(ConstraintName),
    /// `solveScheduler()`
    SolveScheduler,
}

impl ToolName {
    pub fn is_solve(&self) -> bool {
        matches!(self, Self::SolveScheduler)
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetHard(c) => write!(f, "set{}HardWeight", c.pascal()),
            Self::SetSoft(c) => write!(f, "set{}SoftWeight", c.pascal()),
            Self::SetWeight(c) => write!(f, "set{}Weight", c.pascal()),
            Self::SolveScheduler => f.write_str(SOLVE_TOOL),
        }
    }
}

impl FromStr for ToolName {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == SOLVE_TOOL {
            return Ok(Self::SolveScheduler);
        }
        let unknown = || ToolError::UnknownTool(s.to_string());
        let rest = s.strip_prefix("set").ok_or_else(unknown)?;

        let (pascal, make): (&str, fn(ConstraintName) -> ToolName) =
            if let Some(p) = rest.strip_suffix("HardWeight") {
                (p, Self::SetHard)
            } else if let Some(p) = rest.strip_suffix("SoftWeight") {
                (p, Self::SetSoft)
            } else if let Some(p) = rest.strip_suffix("Weight") {
                (p, Self::SetWeight)
            } else {
                return Err(unknown());
            };

        ConstraintName::ALL
            .into_iter()
            .find(|c| c.pascal() == pascal)
            .map(make)
            .ok_or_else(unknown)
    }
}

/// Primitive parameter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Integer,
    String,
}

impl ParamKind {
    fn json_type(&self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::String => "string",
        }
    }
}

/// A named tool parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolParam {
    pub name: &'static str,
    pub kind: ParamKind,
    pub description: String,
    pub required: bool,
}

/// A registered tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolEntry {
    pub name: ToolName,
    pub description: String,
    pub parameters: Vec<ToolParam>,
}

impl ToolEntry {
    fn for_name(name: ToolName) -> Self {
        let (description, parameters) = match name {
            ToolName::SetHard(c) => (
                format!(
                    "Set the hard weight of the {c} constraint ({}). 1 makes it mandatory, 0 drops the hard requirement.",
                    c.describe()
                ),
                vec![weight_param("hard", WeightField::Hard)],
            ),
            ToolName::SetSoft(c) => (
                format!(
                    "Set the soft weight of the {c} constraint ({}). 1 makes it a preference, 0 ignores it.",
                    c.describe()
                ),
                vec![weight_param("soft", WeightField::Soft)],
            ),
            ToolName::SetWeight(c) => (
                format!(
                    "Set both weights of the {c} constraint ({}) in the form '1hard/0soft'.",
                    c.describe()
                ),
                vec![ToolParam {
                    name: "value",
                    kind: ParamKind::String,
                    description: "The new weight value (e.g. '1hard/0soft')".to_string(),
                    required: true,
                }],
            ),
            ToolName::SolveScheduler => (
                "Solve the event assignment problem with the current constraint weights. Call this last; it ends the conversation.".to_string(),
                Vec::new(),
            ),
        };
        Self {
            name,
            description,
            parameters,
        }
    }

    /// Function-tool schema entry.
    pub fn schema(&self) -> Value {
        let properties: serde_json::Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| {
                (
                    p.name.to_string(),
                    json!({ "type": p.kind.json_type(), "description": p.description }),
                )
            })
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name)
            .collect();

        json!({
            "type": "function",
            "function": {
                "name": self.name.to_string(),
                "description": self.description,
                "parameters": {
                    "type": "object",
                    "properties": properties,
                    "required": required,
                }
            }
        })
    }
}

fn weight_param(name: &'static str, field: WeightField) -> ToolParam {
    ToolParam {
        name,
        kind: ParamKind::Integer,
        description: format!("New {field} weight, 0 or 1"),
        required: true,
    }
}

/// Result of dispatching one call.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// A weight tool ran; `output` becomes the tool-result message.
    Applied { tool: ToolName, output: Value },
    /// A known tool got unusable arguments. Reported back, weights untouched.
    Rejected { tool: ToolName, error: ToolError },
    /// The orchestrator must run the solver.
    Solve,
    /// Unknown tool; the call is dropped.
    Dropped(ToolError),
}

/// The catalogue of tools offered to the chat model.
#[derive(Debug, Clone)]
pub struct ToolRegistry {
    entries: BTreeMap<ToolName, ToolEntry>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::canonical()
    }
}

impl ToolRegistry {
    /// The canonical catalogue.
    pub fn canonical() -> Self {
        Self::from_config(&ToolsetConfig::default())
    }

    pub fn from_config(config: &ToolsetConfig) -> Self {
        let mut names = Vec::new();
        for (constraint, hard, soft) in CANONICAL {
            if hard {
                names.push(ToolName::SetHard(constraint));
            }
            if soft {
                names.push(ToolName::SetSoft(constraint));
            }
        }
        if config.expose_role_match {
            names.push(ToolName::SetHard(ConstraintName::RoleMatch));
        }
        if config.legacy_weight_tools {
            names.extend(ConstraintName::ALL.into_iter().map(ToolName::SetWeight));
        }
        names.push(ToolName::SolveScheduler);

        let entries = names
            .into_iter()
            .map(|name| (name, ToolEntry::for_name(name)))
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &ToolEntry> {
        self.entries.values()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }

    /// Look a wire name up in this catalogue.
    pub fn resolve(&self, name: &str) -> Result<ToolName, ToolError> {
        let tool: ToolName = name.parse()?;
        if self.entries.contains_key(&tool) {
            Ok(tool)
        } else {
            Err(ToolError::UnknownTool(name.to_string()))
        }
    }

    /// Full schema, as sent to the chat backend.
    pub fn schema(&self) -> Value {
        Value::Array(self.entries.values().map(ToolEntry::schema).collect())
    }

    /// Execute one call against the session's weights.
    pub fn dispatch(&self, call: &ToolCall, weights: &mut WeightModel) -> Dispatch {
        let tool = match self.resolve(&call.name) {
            Ok(tool) => tool,
            Err(error) => {
                warn!(tool = %call.name, "Unknown tool requested, dropping call");
                return Dispatch::Dropped(error);
            }
        };

        debug!(tool = %tool, arguments = ?call.arguments, "Dispatching tool");

        let (constraint, result) = match tool {
            ToolName::SetHard(c) => (
                c,
                integer_arg(&tool, &call.arguments, "hard").map(|v| weights.set_hard(c, v).weight),
            ),
            ToolName::SetSoft(c) => (
                c,
                integer_arg(&tool, &call.arguments, "soft").map(|v| weights.set_soft(c, v).weight),
            ),
            ToolName::SetWeight(c) => (
                c,
                pair_arg(&tool, &call.arguments).map(|pair| weights.set_pair(c, pair).0),
            ),
            ToolName::SolveScheduler => return Dispatch::Solve,
        };

        match result {
            Ok(weight) => Dispatch::Applied {
                tool,
                output: weight_output(constraint, weight, weight != weights.default_for(constraint)),
            },
            Err(error) => {
                warn!(tool = %tool, error = %error, "Rejected tool arguments");
                Dispatch::Rejected { tool, error }
            }
        }
    }
}

fn weight_output(constraint: ConstraintName, weight: ConstraintWeight, customised: bool) -> Value {
    let mut output = serde_json::Map::new();
    output.insert(constraint.as_str().to_string(), json!(weight));
    output.insert("customised".to_string(), Value::Bool(customised));
    Value::Object(output)
}

/// Read an integer argument. Integral floats, numeric strings and booleans
/// are accepted; the bare `value` key is accepted as a fallback.
fn integer_arg(
    tool: &ToolName,
    args: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<i64, ToolError> {
    let raw = args
        .get(key)
        .or_else(|| args.get("value"))
        .ok_or_else(|| ToolError::MissingArgument {
            tool: tool.to_string(),
            argument: key.to_string(),
        })?;

    let invalid = || ToolError::InvalidWeightValue {
        tool: tool.to_string(),
        value: raw.to_string(),
    };

    match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .ok_or_else(invalid),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| {
                    s.parse::<f64>()
                        .ok()
                        .filter(|f| f.fract() == 0.0)
                        .map(|f| f as i64)
                })
                .ok_or_else(invalid)
        }
        Value::Bool(b) => Ok(i64::from(*b)),
        _ => Err(invalid()),
    }
}

/// Read the legacy `value` argument: `"1hard/0soft"` or `{hard, soft}`.
fn pair_arg(
    tool: &ToolName,
    args: &serde_json::Map<String, Value>,
) -> Result<ConstraintWeight, ToolError> {
    let raw = args.get("value").ok_or_else(|| ToolError::MissingArgument {
        tool: tool.to_string(),
        argument: "value".to_string(),
    })?;
    let invalid = || ToolError::InvalidWeightValue {
        tool: tool.to_string(),
        value: raw.to_string(),
    };

    match raw {
        Value::String(s) => s.parse().map_err(|_| invalid()),
        Value::Object(_) => serde_json::from_value(raw.clone()).map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

/// Make sure a non-empty call list ends in `solveScheduler`.
///
/// Pure post-processing over the parsed calls; the backend reply itself is
/// never modified.
pub fn ensure_terminal_solve(calls: &[ToolCall]) -> Vec<ToolCall> {
    let mut calls = calls.to_vec();
    match calls.last() {
        Some(last) if last.name != SOLVE_TOOL => calls.push(ToolCall::new(SOLVE_TOOL)),
        _ => {}
    }
    calls
}
