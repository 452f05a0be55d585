//! Action dispatch table
//!
//! Per backend, a mapping from a Kind/Mixin type identifier to the named
//! operations it supports. Resolution is kind-first with a fallback to any
//! attached mixin, and an unknown action name fails before any handler code
//! runs. This table is what lets one generic driver manage heterogeneous
//! backends without per-type conditionals outside the table itself.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::errors::{EngineError, EngineResult};
use crate::model::category::infrastructure::{COMPUTE, MSGLINK, NETWORK, STORAGE};
use crate::model::category::CategoryId;

/// Call parameters passed through to the bound handler
pub type Parameters = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeOp {
    Deploy,
    UpdateState,
    Delete,
    Start,
    Stop,
    Restart,
    Suspend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkOp {
    Deploy,
    UpdateState,
    Delete,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOp {
    Deploy,
    UpdateState,
    Delete,
    Online,
    Offline,
    Backup,
    Snapshot,
    Resize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgLinkOp {
    Link,
    Delete,
    Call,
}

/// An operation bound in the table, routed to the matching adapter role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Compute(ComputeOp),
    Network(NetworkOp),
    Storage(StorageOp),
    MsgLink(MsgLinkOp),
}

#[derive(Debug, Default)]
pub struct DispatchTable {
    entries: HashMap<CategoryId, HashMap<&'static str, Operation>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The operation mapping of the infrastructure backend
    pub fn infrastructure() -> Self {
        use Operation::*;
        let mut table = Self::new();

        table.bind(
            COMPUTE.into(),
            [
                // Generic resource operations
                ("deploy", Compute(ComputeOp::Deploy)),
                ("update_state", Compute(ComputeOp::UpdateState)),
                ("delete", Compute(ComputeOp::Delete)),
                // Compute specific actions
                ("start", Compute(ComputeOp::Start)),
                ("stop", Compute(ComputeOp::Stop)),
                ("restart", Compute(ComputeOp::Restart)),
                ("suspend", Compute(ComputeOp::Suspend)),
            ],
        );

        table.bind(
            NETWORK.into(),
            [
                ("deploy", Network(NetworkOp::Deploy)),
                ("update_state", Network(NetworkOp::UpdateState)),
                ("delete", Network(NetworkOp::Delete)),
                ("up", Network(NetworkOp::Up)),
                ("down", Network(NetworkOp::Down)),
            ],
        );

        table.bind(
            STORAGE.into(),
            [
                ("deploy", Storage(StorageOp::Deploy)),
                ("update_state", Storage(StorageOp::UpdateState)),
                ("delete", Storage(StorageOp::Delete)),
                ("online", Storage(StorageOp::Online)),
                ("offline", Storage(StorageOp::Offline)),
                ("backup", Storage(StorageOp::Backup)),
                ("snapshot", Storage(StorageOp::Snapshot)),
                ("resize", Storage(StorageOp::Resize)),
            ],
        );

        table.bind(
            MSGLINK.into(),
            [
                ("link", MsgLink(MsgLinkOp::Link)),
                ("delete", MsgLink(MsgLinkOp::Delete)),
                ("call", MsgLink(MsgLinkOp::Call)),
            ],
        );

        table
    }

    pub fn bind<const N: usize>(
        &mut self,
        type_identifier: CategoryId,
        operations: [(&'static str, Operation); N],
    ) {
        self.entries
            .entry(type_identifier)
            .or_default()
            .extend(operations);
    }

    /// Resolve `(type, action)` to its bound operation
    ///
    /// The entity's Kind is tried first, then any attached Mixin. Fails with
    /// `ActionNotSupported` and has no side effects otherwise.
    pub fn resolve(
        &self,
        kind: &CategoryId,
        mixins: &BTreeSet<CategoryId>,
        action: &str,
    ) -> EngineResult<Operation> {
        let (type_identifier, actions) = self
            .entries
            .get_key_value(kind)
            .or_else(|| mixins.iter().find_map(|m| self.entries.get_key_value(m)))
            .ok_or_else(|| EngineError::ActionNotSupported {
                type_identifier: kind.to_string(),
                action: action.to_string(),
            })?;
        actions
            .get(action)
            .copied()
            .ok_or_else(|| EngineError::ActionNotSupported {
                type_identifier: type_identifier.to_string(),
                action: action.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_kind_resolution() {
        let table = DispatchTable::infrastructure();
        let op = table
            .resolve(&COMPUTE.into(), &BTreeSet::new(), "start")
            .unwrap();
        assert_eq!(op, Operation::Compute(ComputeOp::Start));
    }

    #[test]
    fn test_mixin_fallback_resolution() {
        let table = DispatchTable::infrastructure();
        let mut mixins = BTreeSet::new();
        mixins.insert(CategoryId::from(MSGLINK));
        // The core link kind has no table entry of its own.
        let op = table
            .resolve(
                &"http://schemas.ogf.org/occi/core#link".into(),
                &mixins,
                "call",
            )
            .unwrap();
        assert_eq!(op, Operation::MsgLink(MsgLinkOp::Call));
    }

    #[test]
    fn test_unknown_action_fails() {
        let table = DispatchTable::infrastructure();
        let err = table
            .resolve(&NETWORK.into(), &BTreeSet::new(), "defragment")
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::ActionNotSupported { type_identifier, action }
                if type_identifier == NETWORK && action == "defragment"
        ));
    }

    #[test]
    fn test_unknown_type_fails() {
        let table = DispatchTable::infrastructure();
        assert!(table
            .resolve(&"http://x#unknown".into(), &BTreeSet::new(), "start")
            .is_err());
    }
}
