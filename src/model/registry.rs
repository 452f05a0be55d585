//! The type registry half of the Model
//!
//! Holds every registered Category keyed both by type identifier and by URL
//! location prefix, and answers the relation queries used to resolve an
//! entity's owning Kind from a partial URL.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::category::{Category, CategoryId};
use crate::errors::{EngineError, EngineResult};

#[derive(Debug, Default)]
pub struct Registry {
    categories: HashMap<CategoryId, Category>,
    locations: HashMap<String, CategoryId>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a category, overwriting any previous one with the same
    /// type identifier.
    ///
    /// Fails with `DuplicateOrInvalidCategory` if a declared `related`
    /// identifier is not already registered, or if an attribute pattern does
    /// not compile. Relation edges therefore always resolve, which keeps
    /// `is_related` total.
    pub fn register(&mut self, category: Category) -> EngineResult<()> {
        let id = category.type_identifier();

        for related in category.related() {
            if !self.categories.contains_key(related) {
                return Err(EngineError::DuplicateOrInvalidCategory {
                    type_identifier: id.to_string(),
                    reason: format!("related category {related} is not registered"),
                });
            }
        }

        let schema = match &category {
            Category::Kind(k) => Some(&k.attributes),
            Category::Mixin(m) => Some(&m.attributes),
            Category::Action(a) => Some(&a.attributes),
        };
        if let Some(schema) = schema {
            for (path, def) in schema.iter() {
                if let Some(pattern) = &def.pattern {
                    pattern.verify().map_err(|_| {
                        EngineError::DuplicateOrInvalidCategory {
                            type_identifier: id.to_string(),
                            reason: format!(
                                "attribute '{path}' pattern '{}' does not compile",
                                pattern.source()
                            ),
                        }
                    })?;
                }
            }
        }

        // A re-registration may move the location; drop the old index entry
        // so the stale prefix stops resolving.
        if let Some(previous) = self.categories.get(&id) {
            if let Some(old_location) = previous.location() {
                self.locations.remove(old_location);
            }
        }
        if let Some(location) = category.location() {
            self.locations.insert(location.to_string(), id.clone());
        }
        debug!(category = %id, "registered category");
        self.categories.insert(id, category);
        Ok(())
    }

    pub fn get(&self, id: &CategoryId) -> EngineResult<&Category> {
        self.categories
            .get(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))
    }

    pub fn get_by_location(&self, location: &str) -> EngineResult<&Category> {
        let id = self
            .locations
            .get(location)
            .ok_or_else(|| EngineError::NotFound(format!("location {location}")))?;
        self.get(id)
    }

    pub fn contains(&self, id: &CategoryId) -> bool {
        self.categories.contains_key(id)
    }

    /// Transitive closure over `related` edges, reflexive and cycle-safe
    ///
    /// A cycle in `related` is a configuration error in the registered
    /// model, not a runtime fault; the visited set makes the walk terminate
    /// regardless.
    pub fn is_related(&self, a: &CategoryId, b: &CategoryId) -> bool {
        if a == b {
            return true;
        }
        let mut visited: HashSet<&CategoryId> = HashSet::new();
        let mut stack = vec![a];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Ok(category) = self.get(current) else {
                continue;
            };
            for related in category.related() {
                if related == b {
                    return true;
                }
                stack.push(related);
            }
        }
        false
    }

    /// Remove a category from both indexes; the in-use check is the Model's
    /// responsibility.
    pub(crate) fn remove(&mut self, id: &CategoryId) -> Option<Category> {
        let category = self.categories.remove(id)?;
        if let Some(location) = category.location() {
            self.locations.remove(location);
        }
        Some(category)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &super::category::Kind> {
        self.categories.values().filter_map(Category::as_kind)
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::category::{infrastructure, Kind, Mixin};

    fn registry_with_chain() -> Registry {
        let mut reg = Registry::new();
        let base = Kind::new(infrastructure::CORE_SCHEME, "resource", "Resource");
        let mut compute = Kind::new(infrastructure::INFRA_SCHEME, "compute", "Compute");
        compute.related.push(base.type_identifier());
        reg.register(Category::Kind(base)).unwrap();
        reg.register(Category::Kind(compute)).unwrap();
        reg
    }

    #[test]
    fn test_register_requires_related_edges() {
        let mut reg = Registry::new();
        let mut orphan = Mixin::new("http://example.org/occi#", "orphan", "Orphan");
        orphan.related.push(infrastructure::OS_TPL.into());
        let err = reg.register(Category::Mixin(orphan)).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateOrInvalidCategory { .. }));
    }

    #[test]
    fn test_is_related_reflexive_and_transitive() {
        let mut reg = registry_with_chain();
        let mut vm = Kind::new("http://example.org/occi#", "vm", "VM");
        vm.related.push(CategoryId::from(infrastructure::COMPUTE));
        let vm_id = vm.type_identifier();
        reg.register(Category::Kind(vm)).unwrap();

        let compute: CategoryId = infrastructure::COMPUTE.into();
        let resource: CategoryId = infrastructure::RESOURCE.into();
        assert!(reg.is_related(&compute, &compute));
        assert!(reg.is_related(&vm_id, &compute));
        assert!(reg.is_related(&vm_id, &resource));
        assert!(!reg.is_related(&compute, &vm_id));
    }

    #[test]
    fn test_lookup_by_location() {
        let reg = registry_with_chain();
        let category = reg.get_by_location("/compute/").unwrap();
        assert_eq!(
            category.type_identifier(),
            CategoryId::from(infrastructure::COMPUTE)
        );
        assert!(reg.get_by_location("/nonexistent/").is_err());
    }

    #[test]
    fn test_reregister_drops_old_location() {
        let mut reg = Registry::new();
        let kind = Kind::new("http://example.org/occi#", "vm", "VM");
        reg.register(Category::Kind(kind)).unwrap();
        assert!(reg.get_by_location("/vm/").is_ok());

        let mut moved = Kind::new("http://example.org/occi#", "vm", "VM");
        moved.location = "/machines/".to_string();
        reg.register(Category::Kind(moved)).unwrap();

        assert!(reg.get_by_location("/vm/").is_err());
        assert_eq!(
            reg.get_by_location("/machines/").unwrap().type_identifier(),
            CategoryId::from("http://example.org/occi#vm")
        );
    }

    #[test]
    fn test_is_related_survives_cycles() {
        let mut reg = Registry::new();
        let a = Kind::new("http://example.org/occi#", "a", "A");
        let a_id = a.type_identifier();
        reg.register(Category::Kind(a)).unwrap();
        let mut b = Kind::new("http://example.org/occi#", "b", "B");
        b.related.push(a_id.clone());
        let b_id = b.type_identifier();
        reg.register(Category::Kind(b)).unwrap();
        // Introduce the cycle by re-registering a with related = b.
        let mut a2 = Kind::new("http://example.org/occi#", "a", "A");
        a2.related.push(b_id.clone());
        reg.register(Category::Kind(a2)).unwrap();

        assert!(reg.is_related(&a_id, &b_id));
        assert!(reg.is_related(&b_id, &a_id));
        assert!(!reg.is_related(&a_id, &CategoryId::from("http://x#none")));
    }
}
