//! Category taxonomy: Kind, Mixin, Action
//!
//! Every registrable type is a Category identified by `scheme + term`. Kinds
//! are the primary type of an entity, Mixins are dynamically attachable
//! secondary types, Actions are invokable operations. The well-known OCCI
//! infrastructure identifiers live at the bottom of this module.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::attributes::AttributeSchema;

/// Type identifier for a category: `scheme + term`
///
/// Example: `http://schemas.ogf.org/occi/infrastructure#compute`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(String);

impl CategoryId {
    pub fn new(scheme: &str, term: &str) -> Self {
        Self(format!("{scheme}{term}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The term part (everything after the `#`), or the whole identifier if
    /// the scheme carries no fragment marker.
    pub fn term(&self) -> &str {
        self.0.rsplit_once('#').map(|(_, t)| t).unwrap_or(&self.0)
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CategoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CategoryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Shared identity of every category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDef {
    pub scheme: String,
    pub term: String,
    /// Human-readable title
    pub title: String,
}

impl CategoryDef {
    pub fn new(scheme: impl Into<String>, term: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            term: term.into(),
            title: title.into(),
        }
    }

    pub fn type_identifier(&self) -> CategoryId {
        CategoryId::new(&self.scheme, &self.term)
    }
}

/// The primary type of an entity
///
/// Exactly one Kind per entity; Kind identity never changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kind {
    pub category: CategoryDef,
    /// Parent Kind/Mixin identifiers this Kind specializes
    pub related: Vec<CategoryId>,
    pub attributes: AttributeSchema,
    /// Actions declared by this Kind
    pub actions: Vec<CategoryId>,
    /// URL location prefix under which instances live, e.g. `/compute/`
    pub location: String,
}

impl Kind {
    pub fn new(scheme: &str, term: &str, title: &str) -> Self {
        Self {
            category: CategoryDef::new(scheme, term, title),
            related: Vec::new(),
            attributes: AttributeSchema::new(),
            actions: Vec::new(),
            location: format!("/{term}/"),
        }
    }

    pub fn type_identifier(&self) -> CategoryId {
        self.category.type_identifier()
    }
}

/// An attachable secondary type contributing attributes and actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mixin {
    pub category: CategoryDef,
    pub related: Vec<CategoryId>,
    pub attributes: AttributeSchema,
    /// Actions contributed by this Mixin, as plain type identifiers
    pub actions: Vec<CategoryId>,
    pub location: String,
}

impl Mixin {
    pub fn new(scheme: &str, term: &str, title: &str) -> Self {
        Self {
            category: CategoryDef::new(scheme, term, title),
            related: Vec::new(),
            attributes: AttributeSchema::new(),
            actions: Vec::new(),
            location: format!("/mixin/{term}/"),
        }
    }

    pub fn type_identifier(&self) -> CategoryId {
        self.category.type_identifier()
    }
}

/// A named invokable operation, optionally parameterized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub category: CategoryDef,
    /// Call parameter schema
    pub attributes: AttributeSchema,
}

impl Action {
    pub fn new(scheme: &str, term: &str, title: &str) -> Self {
        Self {
            category: CategoryDef::new(scheme, term, title),
            attributes: AttributeSchema::new(),
        }
    }

    pub fn type_identifier(&self) -> CategoryId {
        self.category.type_identifier()
    }
}

/// Any registrable category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum Category {
    Kind(Kind),
    Mixin(Mixin),
    Action(Action),
}

impl Category {
    pub fn type_identifier(&self) -> CategoryId {
        match self {
            Category::Kind(k) => k.type_identifier(),
            Category::Mixin(m) => m.type_identifier(),
            Category::Action(a) => a.type_identifier(),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Category::Kind(k) => &k.category.title,
            Category::Mixin(m) => &m.category.title,
            Category::Action(a) => &a.category.title,
        }
    }

    /// `related` edges, empty for actions
    pub fn related(&self) -> &[CategoryId] {
        match self {
            Category::Kind(k) => &k.related,
            Category::Mixin(m) => &m.related,
            Category::Action(_) => &[],
        }
    }

    /// URL location prefix, if the category class has one
    pub fn location(&self) -> Option<&str> {
        match self {
            Category::Kind(k) => Some(&k.location),
            Category::Mixin(m) => Some(&m.location),
            Category::Action(_) => None,
        }
    }

    pub fn as_kind(&self) -> Option<&Kind> {
        match self {
            Category::Kind(k) => Some(k),
            _ => None,
        }
    }

    pub fn as_mixin(&self) -> Option<&Mixin> {
        match self {
            Category::Mixin(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_action(&self) -> Option<&Action> {
        match self {
            Category::Action(a) => Some(a),
            _ => None,
        }
    }
}

/// Well-known OCCI scheme and identifier constants
pub mod infrastructure {
    pub const CORE_SCHEME: &str = "http://schemas.ogf.org/occi/core#";
    pub const INFRA_SCHEME: &str = "http://schemas.ogf.org/occi/infrastructure#";

    pub const ENTITY: &str = "http://schemas.ogf.org/occi/core#entity";
    pub const RESOURCE: &str = "http://schemas.ogf.org/occi/core#resource";
    pub const LINK: &str = "http://schemas.ogf.org/occi/core#link";

    pub const COMPUTE: &str = "http://schemas.ogf.org/occi/infrastructure#compute";
    pub const NETWORK: &str = "http://schemas.ogf.org/occi/infrastructure#network";
    pub const STORAGE: &str = "http://schemas.ogf.org/occi/infrastructure#storage";
    pub const OS_TPL: &str = "http://schemas.ogf.org/occi/infrastructure#os_tpl";
    pub const RESOURCE_TPL: &str = "http://schemas.ogf.org/occi/infrastructure#resource_tpl";
    /// Link Mixin that forwards actions to a remote queue consumer
    pub const MSGLINK: &str = "http://schemas.ogf.org/occi/infrastructure#msglink";

    pub const COMPUTE_ACTION_SCHEME: &str =
        "http://schemas.ogf.org/occi/infrastructure/compute/action#";
    pub const NETWORK_ACTION_SCHEME: &str =
        "http://schemas.ogf.org/occi/infrastructure/network/action#";
    pub const STORAGE_ACTION_SCHEME: &str =
        "http://schemas.ogf.org/occi/infrastructure/storage/action#";
    pub const MSGLINK_ACTION_SCHEME: &str =
        "http://schemas.ogf.org/occi/infrastructure/msglink/action#";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_identifier_concatenates_scheme_and_term() {
        let kind = Kind::new(infrastructure::INFRA_SCHEME, "compute", "Compute Resource");
        assert_eq!(kind.type_identifier().as_str(), infrastructure::COMPUTE);
    }

    #[test]
    fn test_category_id_term() {
        let id = CategoryId::from(infrastructure::COMPUTE);
        assert_eq!(id.term(), "compute");
    }

    #[test]
    fn test_default_location_derived_from_term() {
        let kind = Kind::new(infrastructure::INFRA_SCHEME, "storage", "Storage Resource");
        assert_eq!(kind.location, "/storage/");
    }
}
