//! Route derivation and hyperlink templates.
//!
//! For a resource `books` mounted on `api` with relationships `author`
//! (to-one `authors`) and `reviews` (to-many `reviews`):
//!
//! ```text
//! POST   /api/books
//! GET    /api/books
//! GET    /api/books/:booksID
//! PATCH  /api/books/:booksID
//! DELETE /api/books/:booksID
//! GET    /api/books/:booksID/author
//! GET    /api/books/:booksID/relationships/author
//! POST   /api/books/:booksID/relationships/author
//! ...
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::attribute::Cardinality;
use crate::config::ResolvedLinks;
use crate::error::ConfigError;
use crate::inflect::singularize;
use crate::registry::{Registry, Resource};
use crate::types::{Action, Method, ResourceId, RouteKind};

/// Hyperlink for one instance: `{prefix}{id}{suffix}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTemplate {
    prefix: String,
    suffix: String,
}

impl LinkTemplate {
    fn new(prefix: String, suffix: String) -> Self {
        Self { prefix, suffix }
    }

    pub fn render(&self, id: &str) -> String {
        format!("{}{}{}", self.prefix, id, self.suffix)
    }
}

/// Paths derived from one relationship attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipRoutes {
    pub key: String,
    pub related: ResourceId,
    pub cardinality: Cardinality,
    /// Path segment naming the related resource under the identifier.
    pub reference: String,
    /// `{identifier}/{reference}`
    pub related_path: String,
    /// `{identifier}/relationships/{reference}`
    pub relationship_path: String,
}

/// Path templates of one resource on one router.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResourceRoutes {
    pub collection: String,
    pub identifier: String,
    pub relationships: Vec<RelationshipRoutes>,
}

impl ResourceRoutes {
    /// Derive every path of `resource` under `/{mount}`.
    ///
    /// # Errors
    ///
    /// `UnresolvedRelationship` if any relationship targets a resource the
    /// registry does not know.
    pub fn derive(
        registry: &Registry,
        mount: &str,
        resource: &Resource,
        links: &ResolvedLinks,
    ) -> Result<Self, ConfigError> {
        let format = links.url_format;
        let collection = format!("{}/{}", mount_prefix(mount), format.apply(resource.name()));
        let identifier = format!("{}/:{}", collection, resource.url_param());

        let mut relationships: Vec<RelationshipRoutes> = Vec::new();
        for (attribute, relation) in resource.relationships() {
            let related =
                relation
                    .related(registry)
                    .ok_or_else(|| ConfigError::UnresolvedRelationship {
                        resource: resource.name().to_string(),
                        key: attribute.key().to_string(),
                        target: relation.target().to_string(),
                    })?;
            let related_name = registry.resource(related).name();
            let mut reference = match relation.cardinality() {
                Cardinality::ToOne => format.apply(&singularize(related_name)),
                Cardinality::ToMany => format.apply(related_name),
            };
            // Two fields aliased to the same resource fall back to their field names
            if relationships.iter().any(|r| r.reference == reference) {
                reference = format.apply(attribute.key());
            }
            relationships.push(RelationshipRoutes {
                key: attribute.key().to_string(),
                related,
                cardinality: relation.cardinality(),
                related_path: format!("{}/{}", identifier, reference),
                relationship_path: format!("{}/relationships/{}", identifier, reference),
                reference,
            });
        }

        Ok(Self {
            collection,
            identifier,
            relationships,
        })
    }

    pub fn relationship(&self, key: &str) -> Option<&RelationshipRoutes> {
        self.relationships.iter().find(|r| r.key == key)
    }

    /// Precompute the hyperlink templates for these routes.
    pub fn links(&self, base_url: &str) -> LinkSet {
        let instance = format!("{}{}/", base_url, self.collection);
        let mut related = HashMap::new();
        let mut relationship = HashMap::new();
        for rel in &self.relationships {
            related.insert(
                rel.key.clone(),
                LinkTemplate::new(instance.clone(), format!("/{}", rel.reference)),
            );
            relationship.insert(
                rel.key.clone(),
                LinkTemplate::new(
                    instance.clone(),
                    format!("/relationships/{}", rel.reference),
                ),
            );
        }
        LinkSet {
            this: LinkTemplate::new(instance, String::new()),
            related,
            relationship,
        }
    }
}

fn mount_prefix(mount: &str) -> String {
    let trimmed = mount.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

/// Link functions of one resource on one router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSet {
    this: LinkTemplate,
    related: HashMap<String, LinkTemplate>,
    relationship: HashMap<String, LinkTemplate>,
}

impl LinkSet {
    pub fn link_to_self(&self, id: &str) -> String {
        self.this.render(id)
    }

    pub fn related(&self, key: &str, id: &str) -> Option<String> {
        self.related.get(key).map(|t| t.render(id))
    }

    pub fn relationship(&self, key: &str, id: &str) -> Option<String> {
        self.relationship.get(key).map(|t| t.render(id))
    }
}

/// What a registered route does when it matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    pub router: String,
    #[serde(skip)]
    pub resource: ResourceId,
    #[serde(rename = "resource")]
    pub resource_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationship: Option<String>,
    pub kind: RouteKind,
    pub action: Action,
}

/// One `{method, path, version}` registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    pub method: Method,
    pub path: String,
    pub version: String,
    pub endpoint: Endpoint,
}

impl fmt::Display for RouteEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<6} {} ({})", self.method, self.path, self.version)
    }
}

/// Ordered route registrations of one router.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the entries for one resource in registration order.
    pub fn extend_with(&mut self, router: &str, resource: &Resource, routes: &ResourceRoutes) {
        let endpoint = |relationship: Option<&str>, kind, action| Endpoint {
            router: router.to_string(),
            resource: resource.id(),
            resource_name: resource.name().to_string(),
            relationship: relationship.map(String::from),
            kind,
            action,
        };
        let mut push = |path: &str, endpoint: Endpoint| {
            self.entries.push(RouteEntry {
                method: endpoint.action.method(),
                path: path.to_string(),
                version: resource.version().to_string(),
                endpoint,
            });
        };

        let object = RouteKind::ResourceObject;
        push(&routes.collection, endpoint(None, object, Action::Create));
        push(&routes.collection, endpoint(None, object, Action::Find));
        push(&routes.identifier, endpoint(None, object, Action::Find));
        push(&routes.identifier, endpoint(None, object, Action::Update));
        push(&routes.identifier, endpoint(None, object, Action::Remove));

        for rel in &routes.relationships {
            let key = Some(rel.key.as_str());
            push(
                &rel.related_path,
                endpoint(key, RouteKind::RelatedObject, Action::Find),
            );
            for action in [Action::Find, Action::Create, Action::Update, Action::Remove] {
                push(
                    &rel.relationship_path,
                    endpoint(key, RouteKind::Relationship, action),
                );
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> + '_ {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find(&self, method: Method, path: &str) -> Option<&RouteEntry> {
        self.entries
            .iter()
            .find(|e| e.method == method && e.path == path)
    }
}

impl<'a> IntoIterator for &'a RouteTable {
    type Item = &'a RouteEntry;
    type IntoIter = std::slice::Iter<'a, RouteEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
