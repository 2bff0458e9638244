//! Turns controller results into response documents.

use serde_json::Value;
use tracing::warn;

use crate::attribute::{AttributeContext, Cardinality};
use crate::controller::ControllerResult;
use crate::document::{Document, Linkage, Links, PrimaryData, ResourceObject};
use crate::error::{Error, SerializationError};
use crate::registry::{Registry, Resource};
use crate::router::{ResourceState, Router};
use crate::types::{id_to_string, json_type_name, ResourceId};

/// Serialization view of one built router.
#[derive(Clone, Copy)]
pub struct DocumentContext<'a> {
    pub registry: &'a Registry,
    pub router: &'a Router,
}

impl<'a> DocumentContext<'a> {
    pub fn new(registry: &'a Registry, router: &'a Router) -> Self {
        Self { registry, router }
    }

    /// Build the document for `resource` from a controller result.
    ///
    /// Null, missing or empty `data` yields an empty document. Any failing
    /// element aborts the whole document.
    ///
    /// # Errors
    ///
    /// `Config` if the resource is not built on this router, `Serialization`
    /// for malformed data or included items.
    pub fn to_document(
        &self,
        resource: ResourceId,
        result: &ControllerResult,
    ) -> Result<Document, Error> {
        let state = self.router.state(self.registry, resource)?;
        let resource = self.registry.resource(resource);

        let data = match &result.data {
            Value::Null => return Ok(Document::default()),
            Value::Array(items) if items.is_empty() => return Ok(Document::default()),
            Value::Array(items) => PrimaryData::Collection(
                items
                    .iter()
                    .map(|item| self.resource_object(resource, state, item))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(_) => {
                PrimaryData::Single(Box::new(self.resource_object(resource, state, &result.data)?))
            }
            other => {
                warn!(
                    resource = resource.name(),
                    actual = json_type_name(other),
                    "Malformed controller result"
                );
                return Err(SerializationError::MalformedControllerResult {
                    resource: resource.name().to_string(),
                    actual: json_type_name(other).to_string(),
                }
                .into());
            }
        };

        Ok(Document {
            data: Some(data),
            links: None,
            included: self.included(result)?,
        })
    }

    /// Build a relationship-linkage document: the `key` member of the
    /// controller's single resource object becomes the primary data.
    pub fn to_relationship_document(
        &self,
        resource: ResourceId,
        key: &str,
        result: &ControllerResult,
    ) -> Result<Document, Error> {
        let state = self.router.state(self.registry, resource)?;
        let resource = self.registry.resource(resource);
        let cardinality = resource
            .relationship(key)
            .map(|rel| rel.cardinality())
            .ok_or_else(|| SerializationError::InvalidLinkage {
                resource: resource.name().to_string(),
                key: key.to_string(),
                actual: "no such relationship".to_string(),
            })?;

        let raw = match &result.data {
            Value::Null => return Ok(Document::default()),
            Value::Array(items) => match items.first() {
                None => return Ok(Document::default()),
                Some(item) => item,
            },
            object @ Value::Object(_) => object,
            other => {
                return Err(SerializationError::MalformedControllerResult {
                    resource: resource.name().to_string(),
                    actual: json_type_name(other).to_string(),
                }
                .into())
            }
        };

        let object = self.resource_object(resource, state, raw)?;
        let linkage = object
            .relationship(key)
            .and_then(|member| member.data.clone())
            .unwrap_or(match cardinality {
                Cardinality::ToOne => Linkage::Null,
                Cardinality::ToMany => Linkage::Many(Vec::new()),
            });

        let id = object.id.as_ref().and_then(id_to_string);
        let links = id.map(|id| Links {
            this: state
                .config
                .links
                .self_links
                .then(|| state.links.relationship(key, &id))
                .flatten(),
            related: state
                .config
                .links
                .relation_links
                .then(|| state.links.related(key, &id))
                .flatten(),
        });

        Ok(Document {
            data: Some(PrimaryData::Linkage(linkage)),
            links: links.filter(|l| !l.is_empty()),
            included: self.included(result)?,
        })
    }

    /// Serialize one raw element with every attribute of the schema, in order.
    pub fn resource_object(
        &self,
        resource: &Resource,
        state: &ResourceState,
        raw: &Value,
    ) -> Result<ResourceObject, SerializationError> {
        let Value::Object(raw) = raw else {
            return Err(SerializationError::MalformedResourceObject {
                resource: resource.name().to_string(),
                actual: json_type_name(raw).to_string(),
            });
        };
        let ctx = AttributeContext {
            registry: self.registry,
            resource,
            state,
        };
        let mut object = ResourceObject::default();
        for attribute in resource.schema() {
            attribute.serialize(&ctx, &mut object, raw)?;
        }
        Ok(object)
    }

    fn included(
        &self,
        result: &ControllerResult,
    ) -> Result<Option<Vec<ResourceObject>>, SerializationError> {
        let Some(items) = &result.included else {
            return Ok(None);
        };
        items
            .iter()
            .enumerate()
            .map(|(index, item)| self.included_object(index, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }

    fn included_object(&self, index: usize, item: &Value) -> Result<ResourceObject, SerializationError> {
        let kind = item
            .as_object()
            .and_then(|obj| obj.get("type"))
            .and_then(Value::as_str)
            .ok_or(SerializationError::MissingIncludedType { index })?;
        let unresolved = || SerializationError::UnresolvedIncludedType {
            name: kind.to_string(),
        };
        let id = self.registry.id_of(kind).ok_or_else(unresolved)?;
        let state = self.router.try_state(id).ok_or_else(unresolved)?;
        self.resource_object(self.registry.resource(id), state, item)
    }
}
