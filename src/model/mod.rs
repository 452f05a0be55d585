//! OCCI type system and entity graph
//!
//! [`Model`] is the explicit context object of the engine: the type registry
//! (categories by identifier and by URL location) plus the entity graph
//! (typed instances owned by their Kind). It is owned by the backend and
//! passed by reference; there is no ambient global state.

pub mod attributes;
pub mod category;
pub mod entity;
pub mod graph;
pub mod infrastructure;
pub mod registry;

use std::collections::BTreeSet;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::{EngineError, EngineResult};
use attributes::{AttributeMap, AttributeSchema};
use category::{Category, CategoryId};
use entity::{Entity, Link, Resource};
use graph::EntityGraph;
use registry::Registry;

#[derive(Debug, Default)]
pub struct Model {
    registry: Registry,
    graph: EntityGraph,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    /// A model with the OCCI core + infrastructure categories registered
    pub fn with_infrastructure() -> Self {
        let mut model = Self::new();
        infrastructure::register(&mut model)
            .unwrap_or_else(|e| unreachable!("built-in model must register: {e}"));
        model
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn graph(&self) -> &EntityGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut EntityGraph {
        &mut self.graph
    }

    pub fn register(&mut self, category: Category) -> EngineResult<()> {
        self.registry.register(category)
    }

    /// Unregister a category
    ///
    /// Fails with `CategoryInUse` while any entity of any Kind references it
    /// directly or via its contributed actions; callers must resolve that
    /// first, the model never force-removes. Unregistering a Mixin also
    /// unregisters the actions it contributed. Returns the removed
    /// categories so persisted copies can be cleaned up.
    pub fn unregister(&mut self, id: &CategoryId) -> EngineResult<Vec<Category>> {
        let category = self.registry.get(id)?;

        if self.graph.uses_category(id) {
            return Err(EngineError::CategoryInUse(id.to_string()));
        }
        let contributed: Vec<CategoryId> = match category {
            Category::Mixin(m) => m.actions.clone(),
            Category::Kind(k) => k.actions.clone(),
            Category::Action(_) => Vec::new(),
        };
        for action in &contributed {
            if self.graph.uses_category(action) {
                return Err(EngineError::CategoryInUse(action.to_string()));
            }
        }

        let mut removed = Vec::new();
        if let Some(category) = self.registry.remove(id) {
            removed.push(category);
        }
        for action in &contributed {
            if let Some(category) = self.registry.remove(action) {
                removed.push(category);
            }
        }
        debug!(category = %id, removed = removed.len(), "unregistered category");
        Ok(removed)
    }

    /// Merged attribute schema of a Kind plus attached Mixins, Mixin
    /// definitions layering over the Kind's.
    pub fn merged_schema(
        &self,
        kind: &CategoryId,
        mixins: &BTreeSet<CategoryId>,
    ) -> EngineResult<AttributeSchema> {
        let mut schema = self
            .registry
            .get(kind)?
            .as_kind()
            .ok_or_else(|| EngineError::NotFound(format!("kind {kind}")))?
            .attributes
            .clone();
        for mixin_id in mixins {
            let mixin = self
                .registry
                .get(mixin_id)?
                .as_mixin()
                .ok_or_else(|| EngineError::NotFound(format!("mixin {mixin_id}")))?;
            schema.merge(&mixin.attributes);
        }
        Ok(schema)
    }

    /// Union of the actions declared by a Kind and a set of Mixins
    pub fn declared_actions(
        &self,
        kind: &CategoryId,
        mixins: &BTreeSet<CategoryId>,
    ) -> EngineResult<Vec<CategoryId>> {
        let mut actions: Vec<CategoryId> = self
            .registry
            .get(kind)?
            .as_kind()
            .map(|k| k.actions.clone())
            .unwrap_or_default();
        for mixin_id in mixins {
            if let Some(mixin) = self.registry.get(mixin_id)?.as_mixin() {
                for action in &mixin.actions {
                    if !actions.contains(action) {
                        actions.push(action.clone());
                    }
                }
            }
        }
        Ok(actions)
    }

    /// Admit a new Resource of the given Kind
    ///
    /// The Kind and every Mixin must already be registered; the attribute
    /// map is validated against their merged schema (defaults filled in,
    /// Required and Pattern enforced). The identifier is generated here and
    /// is immutable afterwards.
    pub fn admit(
        &mut self,
        kind: CategoryId,
        mixins: BTreeSet<CategoryId>,
        attributes: AttributeMap,
    ) -> EngineResult<Uuid> {
        let mut resource = Resource::new(kind);
        resource.mixins = mixins;
        resource.attributes = attributes;
        let id = resource.id;
        self.admit_resource(resource)?;
        Ok(id)
    }

    /// Admit a Resource that already carries its identity, e.g. one
    /// reconstructed from live backend state. Re-validates the attribute
    /// map and enforces the legal-action subset invariant.
    pub fn admit_resource(&mut self, mut resource: Resource) -> EngineResult<()> {
        let schema = self.merged_schema(&resource.kind, &resource.mixins)?;
        resource.attributes.validate(&schema)?;

        let declared = self.declared_actions(&resource.kind, &resource.mixins)?;
        resource.actions.retain(|a| declared.contains(a));

        self.graph.insert(Entity::Resource(resource));
        Ok(())
    }

    /// Resolve a link's `source` to its owning Resource and append it
    ///
    /// Fails with `NotFound` if the source location does not resolve to a
    /// registered Kind or the Resource is gone; the caller discards the link
    /// and its persisted copy. This is the startup garbage collection for
    /// stale persisted links.
    pub fn attach_link(&mut self, mut link: Link) -> EngineResult<()> {
        // Links are entities and admit the same way resources do: their
        // Kind and Mixins must be registered and the merged schema holds.
        let schema = self.merged_schema(&link.kind, &link.mixins)?;
        link.attributes.validate(&schema)?;

        let location = link
            .source_location()
            .ok_or_else(|| EngineError::NotFound(format!("link source '{}'", link.source)))?;
        let source_id = link
            .source_id()
            .ok_or_else(|| EngineError::NotFound(format!("link source '{}'", link.source)))?;

        let kind_id = self.registry.get_by_location(&location)?.type_identifier();
        let resource = self
            .graph
            .resource_mut(&kind_id, source_id)
            .ok_or_else(|| {
                warn!(source = %link.source, "discarding link with unresolvable source");
                EngineError::NotFound(format!("resource {source_id} under {location}"))
            })?;
        resource.links.retain(|l| l.id != link.id);
        resource.links.push(link);
        Ok(())
    }

    /// Detach a link from its owning Resource
    pub fn detach_link(&mut self, link_id: Uuid) -> EngineResult<Link> {
        self.graph
            .detach_link(link_id)
            .ok_or_else(|| EngineError::NotFound(format!("link {link_id}")))
    }

    /// Remove an entity and cascade-remove dependent links
    ///
    /// Links owned by the removed Resource die with it; links in other
    /// Resources pointing at its location are purged and returned so the
    /// caller can drop their persisted copies.
    pub fn remove(&mut self, id: Uuid) -> EngineResult<(Entity, Vec<Link>)> {
        let location = self.entity_location(id)?;
        let entity = self
            .graph
            .remove(id)
            .ok_or_else(|| EngineError::NotFound(format!("entity {id}")))?;
        let purged = self.graph.purge_links_referencing(&location);
        Ok((entity, purged))
    }

    /// URL location of an admitted entity: its Kind's location + identifier
    pub fn entity_location(&self, id: Uuid) -> EngineResult<String> {
        let entity = self
            .graph
            .find(id)
            .ok_or_else(|| EngineError::NotFound(format!("entity {id}")))?;
        let kind = self
            .registry
            .get(entity.kind())?
            .as_kind()
            .ok_or_else(|| EngineError::NotFound(format!("kind {}", entity.kind())))?;
        Ok(format!("{}{id}", kind.location))
    }
}
