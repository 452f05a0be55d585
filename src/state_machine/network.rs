//! Network lifecycle machine
//!
//! A symmetric two-state machine: `up`/`down`, each transition resetting the
//! legal-action list to the single opposite action.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{StateMachine, TransitionResult};
use crate::model::category::infrastructure::NETWORK_ACTION_SCHEME;
use crate::model::category::CategoryId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkState {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkAction {
    Up,
    Down,
}

impl NetworkAction {
    pub fn term(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    pub fn from_term(term: &str) -> Option<Self> {
        match term {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }

    pub fn category_id(&self) -> CategoryId {
        CategoryId::new(NETWORK_ACTION_SCHEME, self.term())
    }
}

impl NetworkState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "up" => Some(Self::Up),
            "down" => Some(Self::Down),
            _ => None,
        }
    }

    pub fn legal_actions(&self) -> Vec<NetworkAction> {
        match self {
            Self::Up => vec![NetworkAction::Down],
            Self::Down => vec![NetworkAction::Up],
        }
    }
}

impl fmt::Display for NetworkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl StateMachine for NetworkState {
    type Input = NetworkAction;
    type Output = Vec<NetworkAction>;

    fn transition(&self, input: &Self::Input) -> TransitionResult<Self, Self::Output> {
        let next = match input {
            NetworkAction::Up => Self::Up,
            NetworkAction::Down => Self::Down,
        };
        Ok((next, next.legal_actions()))
    }
}
