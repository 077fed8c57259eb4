//! Safety verdict and trade admission
//!
//! [`evaluate`] turns the safety and trend assessments into a RED /
//! YELLOW / GREEN verdict. [`admit`] decides whether a verdict is traded
//! and with which size.

pub mod admission;
pub mod engine;

use serde::{Deserialize, Serialize};

pub use admission::{admit, AdmissionGate, SizeClass, TradeDecision};
pub use engine::{evaluate, DecisionInput, DecisionThresholds};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VerdictLevel {
    Red,
    Yellow,
    Green,
}

impl std::fmt::Display for VerdictLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerdictLevel::Red => write!(f, "RED"),
            VerdictLevel::Yellow => write!(f, "YELLOW"),
            VerdictLevel::Green => write!(f, "GREEN"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyVerdict {
    pub level: VerdictLevel,
    pub reason: String,
}

impl SafetyVerdict {
    pub fn red(reason: impl Into<String>) -> Self {
        Self {
            level: VerdictLevel::Red,
            reason: reason.into(),
        }
    }

    pub fn yellow(reason: impl Into<String>) -> Self {
        Self {
            level: VerdictLevel::Yellow,
            reason: reason.into(),
        }
    }

    pub fn green(reason: impl Into<String>) -> Self {
        Self {
            level: VerdictLevel::Green,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for SafetyVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.level, self.reason)
    }
}
