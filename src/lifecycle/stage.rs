//! Pool lifecycle stages

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Stage {
    Parsing,
    Postponed,
    AwaitingSafetyCheck,
    AwaitingLPBurn,
    SafetyComplete,
    AwaitingTrend,
    Decided,
    Trading,
    Done,
    Skipped,
    Failed,
}

impl Stage {
    pub const ALL: [Stage; 11] = [
        Stage::Parsing,
        Stage::Postponed,
        Stage::AwaitingSafetyCheck,
        Stage::AwaitingLPBurn,
        Stage::SafetyComplete,
        Stage::AwaitingTrend,
        Stage::Decided,
        Stage::Trading,
        Stage::Done,
        Stage::Skipped,
        Stage::Failed,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Skipped | Stage::Failed)
    }

    /// Edges of the lifecycle graph. Terminal stages have none.
    pub fn can_transition_to(&self, next: Stage) -> bool {
        use Stage::*;
        match self {
            Parsing => matches!(next, Postponed | AwaitingSafetyCheck | Skipped | Failed),
            Postponed => matches!(next, AwaitingSafetyCheck | Skipped | Failed),
            AwaitingSafetyCheck => {
                matches!(next, AwaitingLPBurn | SafetyComplete | Skipped | Failed)
            }
            AwaitingLPBurn => matches!(next, SafetyComplete | Skipped | Failed),
            SafetyComplete => matches!(next, AwaitingTrend | Skipped | Failed),
            AwaitingTrend => matches!(next, Decided | Skipped | Failed),
            Decided => matches!(next, Trading | Skipped | Failed),
            Trading => matches!(next, Done | Failed),
            Done | Skipped | Failed => false,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_is_legal() {
        let path = [
            Stage::Parsing,
            Stage::Postponed,
            Stage::AwaitingSafetyCheck,
            Stage::AwaitingLPBurn,
            Stage::SafetyComplete,
            Stage::AwaitingTrend,
            Stage::Decided,
            Stage::Trading,
            Stage::Done,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_terminal_stages_are_final() {
        for terminal in [Stage::Done, Stage::Skipped, Stage::Failed] {
            assert!(terminal.is_terminal());
            assert!(Stage::ALL.iter().all(|s| !terminal.can_transition_to(*s)));
        }
    }

    #[test]
    fn test_illegal_edges() {
        assert!(!Stage::Parsing.can_transition_to(Stage::Trading));
        assert!(!Stage::Trading.can_transition_to(Stage::Skipped));
        assert!(!Stage::SafetyComplete.can_transition_to(Stage::AwaitingSafetyCheck));
        assert!(!Stage::Postponed.can_transition_to(Stage::Postponed));
    }
}
