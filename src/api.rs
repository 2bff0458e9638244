//! Application context: the registry, its routers and the request pipeline.

use std::sync::Arc;

use tracing::{info_span, warn, Instrument};

use crate::attribute::SchemaSpec;
use crate::controller::{dispatch, Controller, ControllerParams, ControllerResult, ParentRef};
use crate::document::Document;
use crate::error::{ConfigError, Error};
use crate::query::{QueryParams, RuleContext};
use crate::registry::{Registry, ResourceOptions, ResourceType};
use crate::router::Router;
use crate::routes::{Endpoint, RouteEntry};
use crate::serializer::DocumentContext;
use crate::server::{HttpServer, Request};
use crate::types::{ResourceId, RouteKind};

/// Owns every resource and router of one application.
#[derive(Debug, Default)]
pub struct Api {
    registry: Registry,
    routers: Vec<Router>,
}

impl Api {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// The router mounted at `path`, created on first reference.
    pub fn router(&mut self, path: &str) -> &mut Router {
        let index = self.router_index(path);
        &mut self.routers[index]
    }

    fn router_index(&mut self, path: &str) -> usize {
        let path = path.trim_matches('/');
        match self.routers.iter().position(|r| r.path() == path) {
            Some(index) => index,
            None => {
                self.routers.push(Router::new(path));
                self.routers.len() - 1
            }
        }
    }

    pub fn find_router(&self, path: &str) -> Option<&Router> {
        let path = path.trim_matches('/');
        self.routers.iter().find(|r| r.path() == path)
    }

    /// # Errors
    ///
    /// `DuplicateRouter` if a router already uses the path.
    pub fn add_router(&mut self, router: Router) -> Result<&mut Router, ConfigError> {
        if self.find_router(router.path()).is_some() {
            return Err(ConfigError::DuplicateRouter {
                path: router.path().to_string(),
            });
        }
        self.routers.push(router);
        let last = self.routers.len() - 1;
        Ok(&mut self.routers[last])
    }

    pub fn routers(&self) -> &[Router] {
        &self.routers
    }

    pub fn define(
        &mut self,
        name: &str,
        schema: SchemaSpec,
        options: ResourceOptions,
    ) -> Result<ResourceId, ConfigError> {
        self.registry.define(name, schema, options)
    }

    pub fn define_type<T: ResourceType>(&mut self) -> Result<ResourceId, ConfigError> {
        self.registry.define_type::<T>()
    }

    /// Attach a defined resource to the router at `path`.
    pub fn mount(&mut self, path: &str, id: ResourceId) -> Result<(), ConfigError> {
        let index = self.router_index(path);
        self.routers[index].mount(&self.registry, id)
    }

    /// Define a resource and mount it in one step.
    pub fn resource(
        &mut self,
        path: &str,
        name: &str,
        schema: SchemaSpec,
        options: ResourceOptions,
    ) -> Result<ResourceId, ConfigError> {
        let id = self.define(name, schema, options)?;
        self.mount(path, id)?;
        Ok(id)
    }

    pub fn set_global_controller(&mut self, controller: Arc<dyn Controller>) {
        self.registry.set_global_controller(controller);
    }

    pub fn set_controller(
        &mut self,
        id: ResourceId,
        controller: Arc<dyn Controller>,
    ) -> Result<(), ConfigError> {
        self.registry.set_controller(id, controller)
    }

    /// Build every router. Stops at the first router that fails.
    pub fn build(&mut self) -> Result<(), ConfigError> {
        for router in &mut self.routers {
            router.build(&self.registry)?;
        }
        Ok(())
    }

    /// Route entries of every router, in router creation order.
    pub fn routes(&self) -> impl Iterator<Item = &RouteEntry> + '_ {
        self.routers.iter().flat_map(|r| r.routes().iter())
    }

    /// Build, then register every route on `server`.
    pub fn attach<S: HttpServer + ?Sized>(&mut self, server: &mut S) -> Result<(), ConfigError> {
        self.build()?;
        for entry in self.routes() {
            server.route(entry);
        }
        Ok(())
    }

    fn built_router(&self, path: &str) -> Result<&Router, ConfigError> {
        self.find_router(path)
            .filter(|r| r.is_built())
            .ok_or_else(|| ConfigError::NotBuilt {
                router: path.to_string(),
            })
    }

    /// Run the request rules of `resource` over `query`.
    ///
    /// Accepted `include` values are replaced by their parsed paths.
    pub fn validate_query(
        &self,
        router: &str,
        resource: ResourceId,
        query: &mut QueryParams,
    ) -> Result<(), Error> {
        let router = self.built_router(router)?;
        let state = router.state(&self.registry, resource)?;
        let ctx = RuleContext {
            registry: &self.registry,
            resource: self.registry.resource(resource),
            cache: router.include_cache(),
        };
        state.rules.validate_request(&ctx, query)?;
        Ok(())
    }

    /// Serialize a controller result and check it against the response
    /// rules of an already validated query.
    pub fn respond(
        &self,
        router: &str,
        resource: ResourceId,
        query: &QueryParams,
        result: &ControllerResult,
    ) -> Result<Document, Error> {
        let router = self.built_router(router)?;
        let document = DocumentContext::new(&self.registry, router).to_document(resource, result)?;
        self.check_response(router, resource, query, &document)?;
        Ok(document)
    }

    fn check_response(
        &self,
        router: &Router,
        resource: ResourceId,
        query: &QueryParams,
        document: &Document,
    ) -> Result<(), Error> {
        let state = router.state(&self.registry, resource)?;
        let ctx = RuleContext {
            registry: &self.registry,
            resource: self.registry.resource(resource),
            cache: router.include_cache(),
        };
        state
            .rules
            .validate_response(&ctx, query, document)
            .inspect_err(|err| warn!(%err, "Response rejected"))?;
        Ok(())
    }

    /// Full pipeline for one matched route: validate the query, call the
    /// controller, serialize and validate the response.
    pub async fn handle(&self, endpoint: &Endpoint, request: Request) -> Result<Document, Error> {
        let span = info_span!(
            "request",
            router = %endpoint.router,
            resource = %endpoint.resource_name,
            kind = ?endpoint.kind,
            action = %endpoint.action,
        );
        self.run(endpoint, request).instrument(span).await
    }

    async fn run(&self, endpoint: &Endpoint, request: Request) -> Result<Document, Error> {
        let router = self.built_router(&endpoint.router)?;
        let owner = self.registry.resource(endpoint.resource);

        let mut params = ControllerParams {
            url_params: request.url_params,
            body: request.body,
            parent: None,
            relationship: None,
        };
        let target = match (endpoint.kind, endpoint.relationship.as_deref()) {
            (RouteKind::RelatedObject, Some(key)) => {
                let related = owner
                    .relationship(key)
                    .and_then(|rel| rel.related(&self.registry))
                    .ok_or_else(|| ConfigError::UnresolvedRelationship {
                        resource: owner.name().to_string(),
                        key: key.to_string(),
                        target: String::new(),
                    })?;
                params.parent = params.id(owner).map(|id| ParentRef {
                    resource: owner.name().to_string(),
                    id: id.to_string(),
                    key: key.to_string(),
                });
                related
            }
            (RouteKind::Relationship, Some(key)) => {
                params.relationship = Some(key.to_string());
                endpoint.resource
            }
            _ => endpoint.resource,
        };

        let mut query = request.query;
        self.validate_query(&endpoint.router, target, &mut query)?;

        let resource = self.registry.resource(target);
        let controller = self.registry.controller_for(target)?;
        let result = dispatch(controller.as_ref(), endpoint.action, resource, &params, &query)
            .await
            .map_err(|err| {
                warn!(%err, "Controller failed");
                Error::Controller(err)
            })?;

        let ctx = DocumentContext::new(&self.registry, router);
        let document = match (endpoint.kind, params.relationship.as_deref()) {
            (RouteKind::Relationship, Some(key)) => ctx.to_relationship_document(target, key, &result),
            _ => ctx.to_document(target, &result),
        }
        .inspect_err(|err| warn!(%err, "Serialization failed"))?;

        self.check_response(router, target, &query, &document)?;
        Ok(document)
    }
}
