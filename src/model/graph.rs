//! The entity graph half of the Model
//!
//! In-memory collections of admitted entities, owned by their Kind. Link
//! resolution against locations needs the registry, so the coordinating
//! operations (`admit`, `attach_link`, cascade removal) live on
//! [`Model`](super::Model); this module owns the raw collections.

use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

use super::category::CategoryId;
use super::entity::{Entity, Link, Resource};

#[derive(Debug, Default)]
pub struct EntityGraph {
    entities: HashMap<CategoryId, Vec<Entity>>,
}

impl EntityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entities owned by a Kind
    pub fn collection(&self, kind: &CategoryId) -> &[Entity] {
        self.entities.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Append an entity to its Kind's collection, replacing any previous
    /// entity with the same identifier.
    pub fn insert(&mut self, entity: Entity) {
        let collection = self.entities.entry(entity.kind().clone()).or_default();
        if let Some(existing) = collection.iter_mut().find(|e| e.id() == entity.id()) {
            *existing = entity;
        } else {
            collection.push(entity);
        }
    }

    pub fn find(&self, id: Uuid) -> Option<&Entity> {
        self.entities.values().flatten().find(|e| e.id() == id)
    }

    pub fn find_mut(&mut self, id: Uuid) -> Option<&mut Entity> {
        self.entities
            .values_mut()
            .flatten()
            .find(|e| e.id() == id)
    }

    pub fn resource_mut(&mut self, kind: &CategoryId, id: Uuid) -> Option<&mut Resource> {
        self.entities
            .get_mut(kind)?
            .iter_mut()
            .find(|e| e.id() == id)
            .and_then(Entity::as_resource_mut)
    }

    /// Remove an entity from its Kind's collection
    pub fn remove(&mut self, id: Uuid) -> Option<Entity> {
        for collection in self.entities.values_mut() {
            if let Some(pos) = collection.iter().position(|e| e.id() == id) {
                return Some(collection.remove(pos));
            }
        }
        None
    }

    /// Purge links owned by any resource whose source or target names the
    /// given location; returns the removed links for persistence cleanup.
    pub fn purge_links_referencing(&mut self, location: &str) -> Vec<Link> {
        let mut purged = Vec::new();
        for entity in self.entities.values_mut().flatten() {
            if let Entity::Resource(resource) = entity {
                let (dead, live): (Vec<Link>, Vec<Link>) = resource
                    .links
                    .drain(..)
                    .partition(|l| l.source == location || l.target == location);
                resource.links = live;
                purged.extend(dead);
            }
        }
        purged
    }

    /// Detach a link from whichever resource owns it
    pub fn detach_link(&mut self, link_id: Uuid) -> Option<Link> {
        for entity in self.entities.values_mut().flatten() {
            if let Entity::Resource(resource) = entity {
                if let Some(pos) = resource.links.iter().position(|l| l.id == link_id) {
                    return Some(resource.links.remove(pos));
                }
            }
        }
        None
    }

    pub fn find_link(&self, link_id: Uuid) -> Option<&Link> {
        self.resources()
            .flat_map(|r| r.links.iter())
            .find(|l| l.id == link_id)
    }

    /// True if any entity of any Kind references the category directly
    /// (as its Kind or an attached Mixin) or via its legal-action list.
    /// Links attached to a Resource are entities too and count the same way.
    pub fn uses_category(&self, id: &CategoryId) -> bool {
        fn references(
            kind: &CategoryId,
            mixins: &BTreeSet<CategoryId>,
            actions: &[CategoryId],
            id: &CategoryId,
        ) -> bool {
            kind == id || mixins.contains(id) || actions.iter().any(|a| a == id)
        }
        self.entities.values().flatten().any(|entity| {
            if references(entity.kind(), entity.mixins(), entity.actions(), id) {
                return true;
            }
            entity
                .as_resource()
                .map(|r| {
                    r.links
                        .iter()
                        .any(|l| references(&l.kind, &l.mixins, &l.actions, id))
                })
                .unwrap_or(false)
        })
    }

    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.entities
            .values()
            .flatten()
            .filter_map(Entity::as_resource)
    }

    pub fn len(&self) -> usize {
        self.entities.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::category::infrastructure::{COMPUTE, LINK, NETWORK};

    #[test]
    fn test_insert_replaces_same_id() {
        let mut graph = EntityGraph::new();
        let mut res = Resource::new(COMPUTE.into());
        let id = res.id;
        graph.insert(Entity::Resource(res.clone()));
        res.attributes.set("occi.core.title", "renamed").unwrap();
        graph.insert(Entity::Resource(res));
        assert_eq!(graph.collection(&COMPUTE.into()).len(), 1);
        assert_eq!(
            graph
                .find(id)
                .unwrap()
                .attributes()
                .get_str("occi.core.title"),
            Some("renamed")
        );
    }

    #[test]
    fn test_purge_links_referencing_target() {
        let mut graph = EntityGraph::new();
        let mut res = Resource::new(COMPUTE.into());
        res.links.push(Link::new(
            LINK.into(),
            NETWORK.into(),
            "/compute/a".to_string(),
            "/network/dead".to_string(),
        ));
        res.links.push(Link::new(
            LINK.into(),
            NETWORK.into(),
            "/compute/a".to_string(),
            "/network/live".to_string(),
        ));
        let id = res.id;
        graph.insert(Entity::Resource(res));

        let purged = graph.purge_links_referencing("/network/dead");
        assert_eq!(purged.len(), 1);
        let remaining = graph.find(id).unwrap().as_resource().unwrap();
        assert_eq!(remaining.links.len(), 1);
        assert_eq!(remaining.links[0].target, "/network/live");
    }

    #[test]
    fn test_uses_category_covers_kind_mixin_and_actions() {
        let mut graph = EntityGraph::new();
        let mut res = Resource::new(COMPUTE.into());
        res.mixins.insert("http://example.org#custom".into());
        res.actions
            .push("http://schemas.ogf.org/occi/infrastructure/compute/action#start".into());
        graph.insert(Entity::Resource(res));

        assert!(graph.uses_category(&COMPUTE.into()));
        assert!(graph.uses_category(&"http://example.org#custom".into()));
        assert!(graph.uses_category(
            &"http://schemas.ogf.org/occi/infrastructure/compute/action#start".into()
        ));
        assert!(!graph.uses_category(&NETWORK.into()));
    }

    #[test]
    fn test_uses_category_sees_attached_links() {
        let mut graph = EntityGraph::new();
        let mut res = Resource::new(COMPUTE.into());
        let mut link = Link::new(
            LINK.into(),
            NETWORK.into(),
            "/compute/a".to_string(),
            "/network/b".to_string(),
        );
        link.mixins.insert("http://example.org#msg".into());
        link.actions
            .push("http://example.org/msg/action#call".into());
        res.links.push(link);
        graph.insert(Entity::Resource(res));

        assert!(graph.uses_category(&LINK.into()));
        assert!(graph.uses_category(&"http://example.org#msg".into()));
        assert!(graph.uses_category(&"http://example.org/msg/action#call".into()));
    }
}
