//! Entity instances: Resources and Links
//!
//! Entities carry a globally unique, time-ordered identifier generated once
//! at admission, a reference to their Kind, a de-duplicated Mixin set, an
//! attribute map and the legal-action list advertised to clients. A Resource
//! additionally owns the Links attached to it; a Link belongs conceptually
//! to the Resource named by its `source` and is never owned independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use super::attributes::AttributeMap;
use super::category::CategoryId;

/// A standalone OCCI resource (compute, network, storage, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Immutable for the life of the entity
    pub id: Uuid,
    pub kind: CategoryId,
    #[serde(skip_serializing_if = "BTreeSet::is_empty", default)]
    pub mixins: BTreeSet<CategoryId>,
    pub attributes: AttributeMap,
    /// Currently invokable subset of the Kind's + Mixins' actions
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub actions: Vec<CategoryId>,
    /// Ordered collection of Links attached to this Resource
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub links: Vec<Link>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resource {
    pub fn new(kind: CategoryId) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            kind,
            mixins: BTreeSet::new(),
            attributes: AttributeMap::new(),
            actions: Vec::new(),
            links: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.attributes.get_str("occi.core.title")
    }

    /// Drop previously attached action-affordance links
    ///
    /// Stale action affordances must never survive a lifecycle transition,
    /// so every transition strips them before the new legal-action list is
    /// applied.
    pub fn strip_action_links(&mut self) {
        self.links
            .retain(|link| !link.rel.as_str().contains("action"));
    }
}

/// A directed link between two entity locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: Uuid,
    pub kind: CategoryId,
    /// Relation category, e.g. the target's Kind or an action identifier
    pub rel: CategoryId,
    /// Location of the owning Resource
    pub source: String,
    /// Location of the link target
    pub target: String,
    #[serde(skip_serializing_if = "BTreeSet::is_empty", default)]
    pub mixins: BTreeSet<CategoryId>,
    pub attributes: AttributeMap,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub actions: Vec<CategoryId>,
}

impl Link {
    pub fn new(kind: CategoryId, rel: CategoryId, source: String, target: String) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            rel,
            source,
            target,
            mixins: BTreeSet::new(),
            attributes: AttributeMap::new(),
            actions: Vec::new(),
        }
    }

    /// Identifier of the Resource named by `source`, if the location has one
    pub fn source_id(&self) -> Option<Uuid> {
        let (_, tail) = self.source.trim_end_matches('/').rsplit_once('/')?;
        Uuid::parse_str(tail).ok()
    }

    /// Location prefix of `source`, with a trailing slash
    pub fn source_location(&self) -> Option<String> {
        let (head, _) = self.source.trim_end_matches('/').rsplit_once('/')?;
        Some(format!("{head}/"))
    }
}

/// Either variant of an entity, as stored in the per-Kind collections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entity {
    Resource(Resource),
    Link(Link),
}

impl Entity {
    pub fn id(&self) -> Uuid {
        match self {
            Entity::Resource(r) => r.id,
            Entity::Link(l) => l.id,
        }
    }

    pub fn kind(&self) -> &CategoryId {
        match self {
            Entity::Resource(r) => &r.kind,
            Entity::Link(l) => &l.kind,
        }
    }

    pub fn mixins(&self) -> &BTreeSet<CategoryId> {
        match self {
            Entity::Resource(r) => &r.mixins,
            Entity::Link(l) => &l.mixins,
        }
    }

    pub fn attributes(&self) -> &AttributeMap {
        match self {
            Entity::Resource(r) => &r.attributes,
            Entity::Link(l) => &l.attributes,
        }
    }

    pub fn actions(&self) -> &[CategoryId] {
        match self {
            Entity::Resource(r) => &r.actions,
            Entity::Link(l) => &l.actions,
        }
    }

    pub fn as_resource(&self) -> Option<&Resource> {
        match self {
            Entity::Resource(r) => Some(r),
            Entity::Link(_) => None,
        }
    }

    pub fn as_resource_mut(&mut self) -> Option<&mut Resource> {
        match self {
            Entity::Resource(r) => Some(r),
            Entity::Link(_) => None,
        }
    }
}
