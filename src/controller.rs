//! The controller boundary: where the application supplies raw data.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::error::BoxError;
use crate::query::QueryParams;
use crate::registry::Resource;
use crate::types::Action;

/// Raw controller output: `{ data: object|array, included?: array }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerResult {
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub included: Option<Vec<Value>>,
}

impl ControllerResult {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            included: None,
        }
    }

    pub fn with_included(mut self, included: Vec<Value>) -> Self {
        self.included = Some(included);
        self
    }
}

/// The resource object a related-object request was made through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    /// Canonical name of the owning resource.
    pub resource: String,
    pub id: String,
    /// Relationship key on the owner.
    pub key: String,
}

/// Per-request parameters handed to a controller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ControllerParams {
    /// Values captured from `:param` route segments.
    pub url_params: BTreeMap<String, String>,
    pub body: Option<Value>,
    /// Set when the request came in through `/{owner}/:id/{relationship}`.
    pub parent: Option<ParentRef>,
    /// Set on relationship-linkage routes.
    pub relationship: Option<String>,
}

impl ControllerParams {
    /// The identifier captured for `resource`, if the route had one.
    pub fn id(&self, resource: &Resource) -> Option<&str> {
        self.url_params
            .get(&resource.url_param())
            .map(String::as_str)
    }
}

/// Returned by the default `create`/`update`/`remove` implementations.
#[derive(Debug, Error)]
#[error("resource '{resource}' does not support {action}")]
pub struct UnsupportedAction {
    pub resource: String,
    pub action: Action,
}

fn unsupported(resource: &Resource, action: Action) -> BoxError {
    Box::new(UnsupportedAction {
        resource: resource.name().to_string(),
        action,
    })
}

/// Supplies raw data for a resource.
///
/// Only `find` is required; the write operations default to
/// [`UnsupportedAction`].
#[async_trait]
pub trait Controller: Send + Sync {
    async fn find(
        &self,
        resource: &Resource,
        params: &ControllerParams,
        query: &QueryParams,
    ) -> Result<ControllerResult, BoxError>;

    async fn create(
        &self,
        resource: &Resource,
        _params: &ControllerParams,
        _query: &QueryParams,
    ) -> Result<ControllerResult, BoxError> {
        Err(unsupported(resource, Action::Create))
    }

    async fn update(
        &self,
        resource: &Resource,
        _params: &ControllerParams,
        _query: &QueryParams,
    ) -> Result<ControllerResult, BoxError> {
        Err(unsupported(resource, Action::Update))
    }

    async fn remove(
        &self,
        resource: &Resource,
        _params: &ControllerParams,
        _query: &QueryParams,
    ) -> Result<ControllerResult, BoxError> {
        Err(unsupported(resource, Action::Remove))
    }
}

/// Call the controller operation behind `action`.
pub async fn dispatch(
    controller: &dyn Controller,
    action: Action,
    resource: &Resource,
    params: &ControllerParams,
    query: &QueryParams,
) -> Result<ControllerResult, BoxError> {
    match action {
        Action::Find => controller.find(resource, params, query).await,
        Action::Create => controller.create(resource, params, query).await,
        Action::Update => controller.update(resource, params, query).await,
        Action::Remove => controller.remove(resource, params, query).await,
    }
}
