//! Stop conditions for an analysis session.

use serde::{Deserialize, Serialize};

use crate::gateway::LedgerGateway;
use crate::ledger::LedgerStore;

/// Default step ceiling.
pub const DEFAULT_MAX_STEPS: u64 = 20;

/// Why a session stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// A worker recorded the final conclusion.
    ConclusionReached,
    /// The turn count hit the configured ceiling without a conclusion.
    StepCeilingReached { max_steps: u64 },
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConclusionReached => write!(f, "conclusion_reached"),
            Self::StepCeilingReached { max_steps } => {
                write!(f, "step_ceiling_reached ({})", max_steps)
            }
        }
    }
}

/// Pure stop predicate over ledger state and turn count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminationPolicy {
    max_steps: u64,
}

impl Default for TerminationPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STEPS)
    }
}

impl TerminationPolicy {
    pub fn new(max_steps: u64) -> Self {
        Self { max_steps }
    }

    pub fn max_steps(&self) -> u64 {
        self.max_steps
    }

    /// Conclusion first, then the step ceiling.
    pub fn evaluate(&self, has_conclusion: bool, total_turns: u64) -> Option<StopReason> {
        if has_conclusion {
            return Some(StopReason::ConclusionReached);
        }
        if total_turns >= self.max_steps {
            return Some(StopReason::StepCeilingReached {
                max_steps: self.max_steps,
            });
        }
        None
    }

    pub fn should_stop(&self, has_conclusion: bool, total_turns: u64) -> bool {
        self.evaluate(has_conclusion, total_turns).is_some()
    }

    /// Evaluate against a live ledger
    pub fn check<S: LedgerStore>(
        &self,
        gateway: &LedgerGateway<S>,
        total_turns: u64,
    ) -> Option<StopReason> {
        self.evaluate(gateway.has_conclusion(), total_turns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_continue_below_ceiling_without_conclusion() {
        let policy = TerminationPolicy::new(5);
        assert_eq!(policy.evaluate(false, 0), None);
        assert!(!policy.should_stop(false, 4));
    }

    #[test]
    fn test_conclusion_stops_before_ceiling() {
        let policy = TerminationPolicy::new(5);
        assert_eq!(policy.evaluate(true, 1), Some(StopReason::ConclusionReached));
    }

    #[test]
    fn test_ceiling_stops_without_conclusion() {
        let policy = TerminationPolicy::new(5);
        assert_eq!(
            policy.evaluate(false, 5),
            Some(StopReason::StepCeilingReached { max_steps: 5 })
        );
        assert!(policy.should_stop(false, 6));
    }

    #[test]
    fn test_conclusion_wins_at_ceiling() {
        let policy = TerminationPolicy::new(3);
        assert_eq!(policy.evaluate(true, 3), Some(StopReason::ConclusionReached));
    }

    #[test]
    fn test_check_reads_ledger() {
        let policy = TerminationPolicy::default();
        assert_eq!(policy.max_steps(), DEFAULT_MAX_STEPS);
        let gateway = LedgerGateway::open("T");
        assert_eq!(policy.check(&gateway, 1), None);
        gateway.set_conclusion("Done").unwrap();
        assert_eq!(policy.check(&gateway, 1), Some(StopReason::ConclusionReached));
    }

    #[test]
    fn test_stop_reason_display_and_serde() {
        let reason = StopReason::StepCeilingReached { max_steps: 20 };
        assert_eq!(reason.to_string(), "step_ceiling_reached (20)");
        let value = serde_json::to_value(&reason).unwrap();
        assert_eq!(value["reason"], "step_ceiling_reached");
        assert_eq!(value["max_steps"], 20);
    }
}
