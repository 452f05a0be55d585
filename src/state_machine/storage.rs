//! Storage lifecycle machine
//!
//! States `{online, offline}`. After `online` or `offline` the legal list
//! is the opposite transition plus the three instantaneous actions. `backup`
//! and `snapshot` are no-ops on state and legal actions at this layer;
//! `resize` mutates the size attribute only. All three leave the machine
//! exactly where it was.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{StateMachine, TransitionResult};
use crate::model::category::infrastructure::STORAGE_ACTION_SCHEME;
use crate::model::category::CategoryId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageState {
    Online,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageAction {
    Online,
    Offline,
    Backup,
    Snapshot,
    Resize,
}

impl StorageAction {
    pub fn term(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Backup => "backup",
            Self::Snapshot => "snapshot",
            Self::Resize => "resize",
        }
    }

    pub fn from_term(term: &str) -> Option<Self> {
        match term {
            "online" => Some(Self::Online),
            "offline" => Some(Self::Offline),
            "backup" => Some(Self::Backup),
            "snapshot" => Some(Self::Snapshot),
            "resize" => Some(Self::Resize),
            _ => None,
        }
    }

    pub fn category_id(&self) -> CategoryId {
        CategoryId::new(STORAGE_ACTION_SCHEME, self.term())
    }
}

impl StorageState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "online" => Some(Self::Online),
            "offline" => Some(Self::Offline),
            _ => None,
        }
    }

    /// The opposite transition plus the three instantaneous actions
    pub fn legal_actions(&self) -> Vec<StorageAction> {
        use StorageAction::*;
        match self {
            Self::Online => vec![Offline, Backup, Snapshot, Resize],
            Self::Offline => vec![Online, Backup, Snapshot, Resize],
        }
    }
}

impl fmt::Display for StorageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl StateMachine for StorageState {
    type Input = StorageAction;
    type Output = Vec<StorageAction>;

    fn transition(&self, input: &Self::Input) -> TransitionResult<Self, Self::Output> {
        let next = match input {
            StorageAction::Online => Self::Online,
            StorageAction::Offline => Self::Offline,
            // Instantaneous at this layer.
            StorageAction::Backup | StorageAction::Snapshot | StorageAction::Resize => *self,
        };
        Ok((next, next.legal_actions()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_online_exposes_opposite_plus_instantaneous() {
        let (state, legal) = StorageState::Offline
            .transition(&StorageAction::Online)
            .unwrap();
        assert_eq!(state, StorageState::Online);
        assert_eq!(
            legal,
            vec![
                StorageAction::Offline,
                StorageAction::Backup,
                StorageAction::Snapshot,
                StorageAction::Resize
            ]
        );
    }

    #[test]
    fn test_instantaneous_actions_leave_machine_untouched() {
        for action in [
            StorageAction::Backup,
            StorageAction::Snapshot,
            StorageAction::Resize,
        ] {
            let (state, legal) = StorageState::Online.transition(&action).unwrap();
            assert_eq!(state, StorageState::Online);
            assert_eq!(legal, StorageState::Online.legal_actions());
        }
    }
}
