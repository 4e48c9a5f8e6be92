//! Constraint weights: the knobs the chat model turns before a solve.
//!
//! Each named constraint carries a hard and a soft weight. In memory these are
//! always a structured `{hard, soft}` pair; the solver's textual
//! `"<hard>hard/<soft>soft"` form only appears at the serialisation boundary.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Lower bound for tool-driven weight values.
pub const MIN_WEIGHT: i64 = 0;

/// Upper bound for tool-driven weight values.
pub const MAX_WEIGHT: i64 = 1;

/// Named solver constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConstraintName {
    /// Person's roles must include the event's required role.
    RoleMatch,
    /// A person is never in two events at once.
    NoOverlap,
    /// A person does not work consecutive events.
    NoBackToBack,
    /// Spread the workload evenly.
    Balance,
    /// People in the same affinity group should share events.
    AffinityGroupOverlap,
    /// People in the same aversion group should not share events.
    AversionGroupOverlap,
}

impl ConstraintName {
    pub const ALL: [ConstraintName; 6] = [
        ConstraintName::RoleMatch,
        ConstraintName::NoOverlap,
        ConstraintName::NoBackToBack,
        ConstraintName::Balance,
        ConstraintName::AffinityGroupOverlap,
        ConstraintName::AversionGroupOverlap,
    ];

    /// Solver key, e.g. `noBackToBack`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoleMatch => "roleMatch",
            Self::NoOverlap => "noOverlap",
            Self::NoBackToBack => "noBackToBack",
            Self::Balance => "balance",
            Self::AffinityGroupOverlap => "affinityGroupOverlap",
            Self::AversionGroupOverlap => "aversionGroupOverlap",
        }
    }

    /// Tool-name fragment, e.g. `NoBackToBack`.
    pub fn pascal(&self) -> &'static str {
        match self {
            Self::RoleMatch => "RoleMatch",
            Self::NoOverlap => "NoOverlap",
            Self::NoBackToBack => "NoBackToBack",
            Self::Balance => "Balance",
            Self::AffinityGroupOverlap => "AffinityGroupOverlap",
            Self::AversionGroupOverlap => "AversionGroupOverlap",
        }
    }

    /// Human description used in tool schemas.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::RoleMatch => "people are only assigned to events whose role they hold",
            Self::NoOverlap => "nobody is assigned to two overlapping events",
            Self::NoBackToBack => "nobody works two events back to back",
            Self::Balance => "assignments are spread evenly across people",
            Self::AffinityGroupOverlap => "members of an affinity group work together",
            Self::AversionGroupOverlap => "members of an aversion group are kept apart",
        }
    }
}

impl fmt::Display for ConstraintName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConstraintName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown constraint: {s}"))
    }
}

/// Hard/soft weight pair for one constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConstraintWeight {
    pub hard: i64,
    pub soft: i64,
}

impl ConstraintWeight {
    pub const fn new(hard: i64, soft: i64) -> Self {
        Self { hard, soft }
    }
}

/// Solver text form: `1hard/0soft`.
impl fmt::Display for ConstraintWeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}hard/{}soft", self.hard, self.soft)
    }
}

/// Parses the solver text form. Either half may be omitted and then counts
/// as zero (`"2hard"` is `2hard/0soft`).
impl FromStr for ConstraintWeight {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut weight = ConstraintWeight::default();
        let mut seen = false;

        for part in s.split('/').map(str::trim).filter(|p| !p.is_empty()) {
            let lower = part.to_ascii_lowercase();
            let (number, slot) = if let Some(n) = lower.strip_suffix("hard") {
                (n, &mut weight.hard)
            } else if let Some(n) = lower.strip_suffix("soft") {
                (n, &mut weight.soft)
            } else {
                return Err(format!("expected <n>hard or <n>soft, got `{part}`"));
            };
            *slot = number
                .trim()
                .parse()
                .map_err(|_| format!("`{part}` is not a whole number"))?;
            seen = true;
        }

        if seen {
            Ok(weight)
        } else {
            Err(format!("empty weight `{s}`"))
        }
    }
}

/// How weights travel to the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightEncoding {
    /// `{"noOverlap": "1hard/0soft"}`
    #[default]
    Text,
    /// `{"noOverlap": {"hard": 1, "soft": 0}}`
    Structured,
}

/// Which half of a weight a setter touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightField {
    Hard,
    Soft,
}

impl fmt::Display for WeightField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hard => write!(f, "hard"),
            Self::Soft => write!(f, "soft"),
        }
    }
}

/// Outcome of a setter call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WeightUpdate {
    pub constraint: ConstraintName,
    pub field: WeightField,
    pub requested: i64,
    pub stored: i64,
    /// True when `requested` was out of range and got clamped.
    pub clamped: bool,
    pub weight: ConstraintWeight,
}

/// Session-owned constraint weights.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightModel {
    weights: BTreeMap<ConstraintName, ConstraintWeight>,
    role_match_default: ConstraintWeight,
}

impl Default for WeightModel {
    fn default() -> Self {
        Self::with_role_match(ConstraintWeight::new(1, 0))
    }
}

impl WeightModel {
    /// Defaults with an explicit `roleMatch` weight.
    pub fn with_role_match(role_match_default: ConstraintWeight) -> Self {
        let mut model = Self {
            weights: BTreeMap::new(),
            role_match_default,
        };
        model.reset_all();
        model
    }

    /// Documented default for a constraint.
    pub fn default_for(&self, name: ConstraintName) -> ConstraintWeight {
        match name {
            ConstraintName::RoleMatch => self.role_match_default,
            ConstraintName::NoOverlap => ConstraintWeight::new(1, 0),
            _ => ConstraintWeight::new(0, 0),
        }
    }

    pub fn get(&self, name: ConstraintName) -> ConstraintWeight {
        self.weights
            .get(&name)
            .copied()
            .unwrap_or_else(|| self.default_for(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = (ConstraintName, ConstraintWeight)> + '_ {
        self.weights.iter().map(|(k, v)| (*k, *v))
    }

    pub fn set_hard(&mut self, name: ConstraintName, value: i64) -> WeightUpdate {
        self.set_field(name, WeightField::Hard, value)
    }

    pub fn set_soft(&mut self, name: ConstraintName, value: i64) -> WeightUpdate {
        self.set_field(name, WeightField::Soft, value)
    }

    /// Set both halves, clamping each. Returns the stored pair and whether
    /// anything was clamped.
    pub fn set_pair(&mut self, name: ConstraintName, weight: ConstraintWeight) -> (ConstraintWeight, bool) {
        let hard = self.set_hard(name, weight.hard);
        let soft = self.set_soft(name, weight.soft);
        (soft.weight, hard.clamped || soft.clamped)
    }

    fn set_field(&mut self, name: ConstraintName, field: WeightField, value: i64) -> WeightUpdate {
        let stored = value.clamp(MIN_WEIGHT, MAX_WEIGHT);
        let clamped = stored != value;
        if clamped {
            warn!(
                constraint = %name,
                field = %field,
                requested = value,
                stored,
                "Weight out of range, clamped"
            );
        }

        let mut weight = self.get(name);
        match field {
            WeightField::Hard => weight.hard = stored,
            WeightField::Soft => weight.soft = stored,
        }
        self.weights.insert(name, weight);

        WeightUpdate {
            constraint: name,
            field,
            requested: value,
            stored,
            clamped,
            weight,
        }
    }

    pub fn reset(&mut self, name: ConstraintName) {
        self.weights.insert(name, self.default_for(name));
    }

    pub fn reset_all(&mut self) {
        for name in ConstraintName::ALL {
            self.reset(name);
        }
    }

    /// Solver text form for every constraint.
    pub fn serialize(&self) -> BTreeMap<String, String> {
        ConstraintName::ALL
            .into_iter()
            .map(|name| (name.as_str().to_string(), self.get(name).to_string()))
            .collect()
    }

    /// Constraint settings in the requested wire encoding.
    pub fn encode(&self, encoding: WeightEncoding) -> serde_json::Value {
        match encoding {
            WeightEncoding::Text => serde_json::json!(self.serialize()),
            WeightEncoding::Structured => {
                let map: BTreeMap<&str, ConstraintWeight> = ConstraintName::ALL
                    .into_iter()
                    .map(|name| (name.as_str(), self.get(name)))
                    .collect();
                serde_json::json!(map)
            }
        }
    }
}
