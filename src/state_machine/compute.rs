//! Compute lifecycle machine
//!
//! States `{inactive, active, suspended, error}` driven by the compute
//! actions. `restart` delegates unconditionally to `start`, from every
//! state including `suspended` and `error`; that is an explicit transition
//! rule here, not an accident of the match.
//!
//! Fresh observations of provider-native instances enter the machine via
//! [`ComputeState::from_provider`], a fixed mapping from the provider's own
//! state string to an initial state and legal-action list.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{StateMachine, TransitionResult};
use crate::model::category::infrastructure::COMPUTE_ACTION_SCHEME;
use crate::model::category::CategoryId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputeState {
    Inactive,
    Active,
    Suspended,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeAction {
    Start,
    Stop,
    Restart,
    Suspend,
}

impl ComputeAction {
    pub fn term(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::Suspend => "suspend",
        }
    }

    pub fn from_term(term: &str) -> Option<Self> {
        match term {
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            "restart" => Some(Self::Restart),
            "suspend" => Some(Self::Suspend),
            _ => None,
        }
    }

    pub fn category_id(&self) -> CategoryId {
        CategoryId::new(COMPUTE_ACTION_SCHEME, self.term())
    }
}

impl fmt::Display for ComputeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.term())
    }
}

impl ComputeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "inactive" => Some(Self::Inactive),
            "active" => Some(Self::Active),
            "suspended" => Some(Self::Suspended),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Legal actions determined by the post-transition state
    pub fn legal_actions(&self) -> Vec<ComputeAction> {
        use ComputeAction::*;
        match self {
            Self::Active => vec![Stop, Restart, Suspend],
            Self::Inactive | Self::Suspended | Self::Error => vec![Start],
        }
    }

    /// Initial state and legal-action list for a freshly observed
    /// provider-native instance.
    pub fn from_provider(provider_state: &str) -> (Self, Vec<ComputeAction>) {
        use ComputeAction::*;
        match provider_state {
            "active" => (Self::Active, vec![Stop, Restart, Suspend]),
            "build" | "deleted" | "hard_reboot" | "password" | "reboot" | "rebuild"
            | "rescue" | "resize" | "revert_resize" | "shutoff" | "verify_resize" => {
                (Self::Inactive, vec![Restart])
            }
            "suspend" => (Self::Suspended, vec![Start]),
            "error" => (Self::Error, vec![Start]),
            _ => (Self::Inactive, vec![Start]),
        }
    }
}

impl fmt::Display for ComputeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl StateMachine for ComputeState {
    type Input = ComputeAction;
    type Output = Vec<ComputeAction>;

    fn transition(&self, input: &Self::Input) -> TransitionResult<Self, Self::Output> {
        let next = match input {
            // restart delegates to start regardless of current state
            ComputeAction::Start | ComputeAction::Restart => Self::Active,
            ComputeAction::Stop => Self::Inactive,
            ComputeAction::Suspend => Self::Suspended,
        };
        Ok((next, next.legal_actions()))
    }
}
