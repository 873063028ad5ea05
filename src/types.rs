use std::str::FromStr;
use serde::Deserialize;

/// What the runtime does with the rest of the graph once a task fails.
///
/// - `KeepGoing`: keep dispatching every task that does not descend from the
///   failed one (default behaviour).
/// - `StopDispatch`: let already-running tasks finish, but dispatch nothing
///   new. Everything still pending ends up unreached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    KeepGoing,
    StopDispatch,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::KeepGoing
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "keep_going" => Ok(FailurePolicy::KeepGoing),
            "stop_dispatch" => Ok(FailurePolicy::StopDispatch),
            other => Err(format!(
                "invalid failure_policy: {other} (expected \"keep_going\" or \"stop_dispatch\")"
            )),
        }
    }
}

/// Role of a rule template in the fan-out structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleRole {
    /// Instantiated exactly once; may not reference `{unit}`.
    Single,
    /// Instantiated once per unit identifier.
    PerUnit,
    /// Instantiated once; `{unit}` inputs expand over every unit.
    Join,
}

impl Default for RuleRole {
    fn default() -> Self {
        RuleRole::Single
    }
}
