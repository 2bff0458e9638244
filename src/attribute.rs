//! Schema attributes and their serialization into resource objects.
//!
//! Every resource schema starts with the four identity members (`type`,
//! `id`, `meta`, `links`) followed by the declared fields in declaration
//! order. Each attribute writes its own part of the resource object:
//!
//! | Kind | Raw value | Output |
//! |------|-----------|--------|
//! | data | any | `attributes.{key}` |
//! | to-one | `null` | `relationships.{key}.data = null` |
//! | to-one | id or `{id}` | `relationships.{key}.data = {type, id}` |
//! | to-many | list | `relationships.{key}.data = [{type, id}, ...]` |
//! | relationship | absent | `links.related` when relation links are on, empty linkage otherwise |

use std::sync::OnceLock;

use serde_json::{Map, Value};

use crate::document::{Linkage, Links, RelationshipMember, ResourceIdentifier, ResourceObject};
use crate::error::{ConfigError, SerializationError};
use crate::inflect::canonical_name;
use crate::registry::{Registry, Resource};
use crate::router::ResourceState;
use crate::types::{id_to_string, json_type_name, ResourceId};

/// Declaration of one schema field, before it is bound to a resource.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeSpec {
    Data { default: Option<Value> },
    ToOne { target: Option<String> },
    ToMany { target: Option<String> },
}

impl AttributeSpec {
    pub fn data() -> Self {
        AttributeSpec::Data { default: None }
    }

    pub fn to_one() -> Self {
        AttributeSpec::ToOne { target: None }
    }

    pub fn to_many() -> Self {
        AttributeSpec::ToMany { target: None }
    }

    /// Point a relationship at a resource whose name differs from the field
    /// name. No effect on data fields.
    pub fn alias(self, target: impl Into<String>) -> Self {
        match self {
            AttributeSpec::ToOne { .. } => AttributeSpec::ToOne {
                target: Some(target.into()),
            },
            AttributeSpec::ToMany { .. } => AttributeSpec::ToMany {
                target: Some(target.into()),
            },
            data => data,
        }
    }

    /// Value emitted when the raw field is absent. No effect on relationships.
    pub fn with_default(self, value: Value) -> Self {
        match self {
            AttributeSpec::Data { .. } => AttributeSpec::Data {
                default: Some(value),
            },
            relationship => relationship,
        }
    }

    /// Parse a manifest field declaration.
    ///
    /// Accepts the shorthand `"data"`, `"to_one"`, `"to_many"`, or the
    /// object form `{"kind": "to_one", "as": "footnote"}` /
    /// `{"kind": "data", "default": 0}`.
    pub fn from_value(resource: &str, key: &str, value: &Value) -> Result<Self, ConfigError> {
        let unknown = |kind: &str| ConfigError::UnknownAttributeKind {
            resource: resource.to_string(),
            key: key.to_string(),
            kind: kind.to_string(),
        };

        let (kind, params) = match value {
            Value::String(kind) => (kind.as_str(), None),
            Value::Object(map) => match map.get("kind") {
                Some(Value::String(kind)) => (kind.as_str(), Some(map)),
                Some(other) => return Err(unknown(json_type_name(other))),
                None => return Err(unknown("")),
            },
            other => return Err(unknown(json_type_name(other))),
        };

        let target = params
            .and_then(|m| m.get("as"))
            .and_then(Value::as_str)
            .map(String::from);

        match kind {
            "data" => Ok(AttributeSpec::Data {
                default: params.and_then(|m| m.get("default")).cloned(),
            }),
            "to_one" => Ok(AttributeSpec::ToOne { target }),
            "to_many" => Ok(AttributeSpec::ToMany { target }),
            other => Err(unknown(other)),
        }
    }
}

/// Ordered list of field declarations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaSpec {
    fields: Vec<(String, AttributeSpec)>,
}

impl SchemaSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: impl Into<String>, spec: AttributeSpec) -> Self {
        self.fields.push((key.into(), spec));
        self
    }

    pub fn data(self, key: impl Into<String>) -> Self {
        self.field(key, AttributeSpec::data())
    }

    pub fn to_one(self, key: impl Into<String>) -> Self {
        self.field(key, AttributeSpec::to_one())
    }

    pub fn to_many(self, key: impl Into<String>) -> Self {
        self.field(key, AttributeSpec::to_many())
    }

    pub fn fields(&self) -> &[(String, AttributeSpec)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parse a manifest `schema` object, keeping declaration order.
    pub fn from_map(resource: &str, map: &Map<String, Value>) -> Result<Self, ConfigError> {
        let mut schema = SchemaSpec::new();
        for (key, value) in map {
            let spec = AttributeSpec::from_value(resource, key, value)?;
            schema = schema.field(key.clone(), spec);
        }
        Ok(schema)
    }
}

/// Identity member owned by every resource object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityKind {
    Type,
    Id,
    Meta,
    Links,
}

impl IdentityKind {
    pub const ALL: [IdentityKind; 4] = [
        IdentityKind::Type,
        IdentityKind::Id,
        IdentityKind::Meta,
        IdentityKind::Links,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            IdentityKind::Type => "type",
            IdentityKind::Id => "id",
            IdentityKind::Meta => "meta",
            IdentityKind::Links => "links",
        }
    }
}

/// Relationship cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    ToOne,
    ToMany,
}

/// Target of a relationship attribute, resolved once on first use.
#[derive(Debug)]
pub struct Relation {
    cardinality: Cardinality,
    target: String,
    related: OnceLock<ResourceId>,
}

impl Relation {
    fn new(cardinality: Cardinality, target: String) -> Self {
        Self {
            cardinality,
            target,
            related: OnceLock::new(),
        }
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Canonical name of the target resource.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Resolve the related resource, memoizing the result.
    pub fn related(&self, registry: &Registry) -> Option<ResourceId> {
        if let Some(id) = self.related.get() {
            return Some(*id);
        }
        let id = registry.id_of(&self.target)?;
        let _ = self.related.set(id);
        Some(id)
    }
}

impl Clone for Relation {
    fn clone(&self) -> Self {
        Self::new(self.cardinality, self.target.clone())
    }
}

#[derive(Debug, Clone)]
pub enum AttributeKind {
    Data { default: Option<Value> },
    Identity(IdentityKind),
    Relationship(Relation),
}

/// A schema member bound to its owning resource.
#[derive(Debug, Clone)]
pub struct Attribute {
    key: String,
    owner: ResourceId,
    kind: AttributeKind,
}

impl Attribute {
    pub(crate) fn identity(owner: ResourceId, kind: IdentityKind) -> Self {
        Self {
            key: kind.key().to_string(),
            owner,
            kind: AttributeKind::Identity(kind),
        }
    }

    pub(crate) fn declared(owner: ResourceId, key: String, spec: &AttributeSpec) -> Self {
        let kind = match spec {
            AttributeSpec::Data { default } => AttributeKind::Data {
                default: default.clone(),
            },
            AttributeSpec::ToOne { target } => AttributeKind::Relationship(Relation::new(
                Cardinality::ToOne,
                canonical_name(target.as_deref().unwrap_or(&key)),
            )),
            AttributeSpec::ToMany { target } => AttributeKind::Relationship(Relation::new(
                Cardinality::ToMany,
                canonical_name(target.as_deref().unwrap_or(&key)),
            )),
        };
        Self { key, owner, kind }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn owner(&self) -> ResourceId {
        self.owner
    }

    pub fn kind(&self) -> &AttributeKind {
        &self.kind
    }

    pub fn relation(&self) -> Option<&Relation> {
        match &self.kind {
            AttributeKind::Relationship(rel) => Some(rel),
            _ => None,
        }
    }

    /// Write this attribute's part of `dest` from the raw controller object.
    pub fn serialize(
        &self,
        ctx: &AttributeContext<'_>,
        dest: &mut ResourceObject,
        raw: &Map<String, Value>,
    ) -> Result<(), SerializationError> {
        match &self.kind {
            AttributeKind::Data { default } => {
                if let Some(value) = raw.get(&self.key).or(default.as_ref()) {
                    dest.set_attribute(&self.key, value.clone());
                }
                Ok(())
            }
            AttributeKind::Identity(kind) => serialize_identity(*kind, ctx, dest, raw),
            AttributeKind::Relationship(rel) => {
                let member = self.relationship_member(rel, ctx, raw)?;
                dest.set_relationship(&self.key, member);
                Ok(())
            }
        }
    }

    fn relationship_member(
        &self,
        rel: &Relation,
        ctx: &AttributeContext<'_>,
        raw: &Map<String, Value>,
    ) -> Result<RelationshipMember, SerializationError> {
        let Some(value) = raw.get(&self.key) else {
            if ctx.state.config.links.relation_links {
                let id = owner_id(ctx.resource, raw)?;
                if let Some(url) = ctx.state.links.related(&self.key, &id) {
                    return Ok(RelationshipMember::related_link(url));
                }
            }
            return Ok(RelationshipMember::linkage(match rel.cardinality {
                Cardinality::ToOne => Linkage::Null,
                Cardinality::ToMany => Linkage::Many(Vec::new()),
            }));
        };

        let related = rel.related(ctx.registry).ok_or_else(|| self.invalid(ctx, value))?;
        let kind = ctx.registry.resource(related).name();

        let linkage = match (rel.cardinality, value) {
            (Cardinality::ToOne, Value::Null) => Linkage::Null,
            // Tolerate a list on a to-one field by taking its first element
            (Cardinality::ToOne, Value::Array(items)) => match items.first() {
                None | Some(Value::Null) => Linkage::Null,
                Some(item) => Linkage::One(self.identifier(ctx, kind, item)?),
            },
            (Cardinality::ToOne, item) => Linkage::One(self.identifier(ctx, kind, item)?),
            (Cardinality::ToMany, Value::Null) => Linkage::Many(Vec::new()),
            (Cardinality::ToMany, Value::Array(items)) => Linkage::Many(
                items
                    .iter()
                    .map(|item| self.identifier(ctx, kind, item))
                    .collect::<Result<_, _>>()?,
            ),
            (Cardinality::ToMany, other) => return Err(self.invalid(ctx, other)),
        };
        Ok(RelationshipMember::linkage(linkage))
    }

    fn identifier(
        &self,
        ctx: &AttributeContext<'_>,
        kind: &str,
        item: &Value,
    ) -> Result<ResourceIdentifier, SerializationError> {
        match item {
            Value::String(_) | Value::Number(_) => Ok(ResourceIdentifier::new(kind, item.clone())),
            Value::Object(map) => match map.get("id") {
                Some(id @ (Value::String(_) | Value::Number(_))) => {
                    let kind = map.get("type").and_then(Value::as_str).unwrap_or(kind);
                    Ok(ResourceIdentifier::new(kind, id.clone()))
                }
                _ => Err(self.invalid(ctx, item)),
            },
            other => Err(self.invalid(ctx, other)),
        }
    }

    fn invalid(&self, ctx: &AttributeContext<'_>, value: &Value) -> SerializationError {
        SerializationError::InvalidLinkage {
            resource: ctx.resource.name().to_string(),
            key: self.key.clone(),
            actual: json_type_name(value).to_string(),
        }
    }
}

/// What an attribute needs to see while serializing.
pub struct AttributeContext<'a> {
    pub registry: &'a Registry,
    pub resource: &'a Resource,
    pub state: &'a ResourceState,
}

fn serialize_identity(
    kind: IdentityKind,
    ctx: &AttributeContext<'_>,
    dest: &mut ResourceObject,
    raw: &Map<String, Value>,
) -> Result<(), SerializationError> {
    let value = raw.get(kind.key()).filter(|v| !v.is_null());
    match kind {
        IdentityKind::Type => {
            dest.kind = value
                .and_then(Value::as_str)
                .unwrap_or(ctx.resource.name())
                .to_string();
        }
        IdentityKind::Id => dest.id = value.cloned(),
        IdentityKind::Meta => dest.meta = value.cloned(),
        IdentityKind::Links => match value {
            Some(Value::Object(links)) => {
                let links = Links::from_raw(links);
                if !links.is_empty() {
                    dest.links = Some(links);
                }
            }
            _ if ctx.state.config.links.self_links => {
                let id = owner_id(ctx.resource, raw)?;
                dest.links = Some(Links {
                    this: Some(ctx.state.links.link_to_self(&id)),
                    related: None,
                });
            }
            _ => {}
        },
    }
    Ok(())
}

fn owner_id(resource: &Resource, raw: &Map<String, Value>) -> Result<String, SerializationError> {
    raw.get("id")
        .and_then(id_to_string)
        .ok_or_else(|| SerializationError::MissingIdentifier {
            resource: resource.name().to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn spec_from_shorthand() {
        assert_eq!(
            AttributeSpec::from_value("books", "name", &json!("data")).unwrap(),
            AttributeSpec::data()
        );
        assert_eq!(
            AttributeSpec::from_value("books", "author", &json!("to_one")).unwrap(),
            AttributeSpec::to_one()
        );
        assert_eq!(
            AttributeSpec::from_value("books", "reviews", &json!("to_many")).unwrap(),
            AttributeSpec::to_many()
        );
    }

    #[test]
    fn spec_from_object_form() {
        let spec =
            AttributeSpec::from_value("books", "about", &json!({"kind": "to_one", "as": "footnote"}))
                .unwrap();
        assert_eq!(spec, AttributeSpec::to_one().alias("footnote"));

        let spec =
            AttributeSpec::from_value("books", "pages", &json!({"kind": "data", "default": 0}))
                .unwrap();
        assert_eq!(spec, AttributeSpec::data().with_default(json!(0)));
    }

    #[test]
    fn spec_unknown_kind_errors() {
        let result = AttributeSpec::from_value("books", "author", &json!("belongs_to"));
        assert!(matches!(
            result,
            Err(ConfigError::UnknownAttributeKind { kind, .. }) if kind == "belongs_to"
        ));

        let result = AttributeSpec::from_value("books", "author", &json!(3));
        assert!(matches!(
            result,
            Err(ConfigError::UnknownAttributeKind { kind, .. }) if kind == "number"
        ));
    }

    #[test]
    fn alias_ignored_on_data() {
        assert_eq!(AttributeSpec::data().alias("x"), AttributeSpec::data());
        assert_eq!(
            AttributeSpec::to_one().with_default(json!(1)),
            AttributeSpec::to_one()
        );
    }

    #[test]
    fn declared_relationship_target_is_canonical() {
        let attr = Attribute::declared(
            ResourceId(0),
            "about".into(),
            &AttributeSpec::to_one().alias("Footnote"),
        );
        assert_eq!(attr.relation().unwrap().target(), "footnotes");

        let attr = Attribute::declared(ResourceId(0), "author".into(), &AttributeSpec::to_one());
        assert_eq!(attr.relation().unwrap().target(), "authors");
        assert_eq!(attr.relation().unwrap().cardinality(), Cardinality::ToOne);
    }

    #[test]
    fn schema_from_map_keeps_order() {
        let map = json!({"name": "data", "author": "to_one", "reviews": "to_many"});
        let schema = SchemaSpec::from_map("books", map.as_object().unwrap()).unwrap();
        let keys: Vec<&str> = schema.fields().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["name", "author", "reviews"]);
    }
}
