//! Working-state transition rule
//!
//! "All actually exported" outranks "all exported", and a parent already in
//! the actually-exported state never falls back to merely exported.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome code of an evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionReason {
    ParentNotFound,
    NoMedicines,
    NoStateChangeNeeded,
    AllActualExported,
    AllExported,
}

impl TransitionReason {
    pub fn as_str(self) -> &'static str {
        match self {
            TransitionReason::ParentNotFound => "parent_not_found",
            TransitionReason::NoMedicines => "no_medicines",
            TransitionReason::NoStateChangeNeeded => "no_state_change_needed",
            TransitionReason::AllActualExported => "all_actual_exported",
            TransitionReason::AllExported => "all_exported",
        }
    }

    /// Whether this reason accompanies a persisted transition
    pub fn is_transition(self) -> bool {
        matches!(
            self,
            TransitionReason::AllActualExported | TransitionReason::AllExported
        )
    }
}

impl fmt::Display for TransitionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configured target state ids; `None` disables that branch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateThresholds {
    pub all_exported: Option<i64>,
    pub all_actually_exported: Option<i64>,
}

/// Item-level export facts for one parent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportFacts {
    pub all_exported: bool,
    pub all_actually_exported: bool,
}

/// Pick the target state, if any
pub fn decide(
    current: Option<i64>,
    facts: ExportFacts,
    thresholds: StateThresholds,
) -> Option<(i64, TransitionReason)> {
    if facts.all_actually_exported {
        if let Some(actual) = thresholds.all_actually_exported {
            if current != Some(actual) {
                return Some((actual, TransitionReason::AllActualExported));
            }
        }
    }

    if facts.all_exported {
        if let Some(exported) = thresholds.all_exported {
            let already_actual =
                thresholds.all_actually_exported.is_some() && current == thresholds.all_actually_exported;
            if current != Some(exported) && !already_actual {
                return Some((exported, TransitionReason::AllExported));
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    const EXPORTED: i64 = 20;
    const ACTUAL: i64 = 30;

    fn both() -> StateThresholds {
        StateThresholds {
            all_exported: Some(EXPORTED),
            all_actually_exported: Some(ACTUAL),
        }
    }

    fn facts(all_exported: bool, all_actually_exported: bool) -> ExportFacts {
        ExportFacts {
            all_exported,
            all_actually_exported,
        }
    }

    #[test_case(None, true, true => Some((ACTUAL, TransitionReason::AllActualExported)) ; "actual outranks exported")]
    #[test_case(Some(EXPORTED), true, true => Some((ACTUAL, TransitionReason::AllActualExported)) ; "exported upgrades to actual")]
    #[test_case(None, true, false => Some((EXPORTED, TransitionReason::AllExported)) ; "logical only")]
    #[test_case(Some(ACTUAL), true, false => None ; "never regresses from actual")]
    #[test_case(Some(ACTUAL), true, true => None ; "already actual")]
    #[test_case(Some(EXPORTED), true, false => None ; "already exported")]
    #[test_case(None, false, false => None ; "nothing exported")]
    #[test_case(Some(7), false, true => Some((ACTUAL, TransitionReason::AllActualExported)) ; "actual without logical")]
    fn test_decide_with_both_thresholds(
        current: Option<i64>,
        all_exported: bool,
        all_actual: bool,
    ) -> Option<(i64, TransitionReason)> {
        decide(current, facts(all_exported, all_actual), both())
    }

    #[test]
    fn test_unconfigured_branch_is_disabled() {
        let only_exported = StateThresholds {
            all_exported: Some(EXPORTED),
            all_actually_exported: None,
        };
        assert_eq!(
            decide(None, facts(true, true), only_exported),
            Some((EXPORTED, TransitionReason::AllExported))
        );

        let only_actual = StateThresholds {
            all_exported: None,
            all_actually_exported: Some(ACTUAL),
        };
        assert_eq!(decide(None, facts(true, false), only_actual), None);
        assert_eq!(decide(None, facts(true, true), StateThresholds::default()), None);
    }

    #[test]
    fn test_reason_codes() {
        assert_eq!(TransitionReason::AllActualExported.as_str(), "all_actual_exported");
        assert_eq!(
            serde_json::to_value(TransitionReason::NoStateChangeNeeded).unwrap(),
            serde_json::json!("no_state_change_needed")
        );
        assert!(TransitionReason::AllExported.is_transition());
        assert!(!TransitionReason::NoMedicines.is_transition());
    }
}
