//! Routers: named mount paths with their own configuration defaults.

use std::collections::HashMap;

use tracing::info;

use crate::config::{cascade, LinkOptions, QueryOptions, ResolvedConfig, Settings};
use crate::error::ConfigError;
use crate::query::{IncludeCache, RuleSet};
use crate::registry::Registry;
use crate::routes::{LinkSet, ResourceRoutes, RouteTable};
use crate::types::{ResourceId, DEFAULT_ROUTER};

/// Build output for one resource on one router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceState {
    /// Resource settings mixed over the router's.
    pub config: ResolvedConfig,
    pub rules: RuleSet,
    pub routes: ResourceRoutes,
    pub links: LinkSet,
}

/// A mount path, its mounted resources and their built state.
#[derive(Debug)]
pub struct Router {
    path: String,
    settings: Settings,
    resources: Vec<ResourceId>,
    states: HashMap<ResourceId, ResourceState>,
    routes: RouteTable,
    include_cache: IncludeCache,
    built: bool,
}

impl Router {
    /// Surrounding slashes are dropped, so `"/v1/"` mounts at `/v1`.
    pub fn new(path: impl AsRef<str>) -> Self {
        Self {
            path: path.as_ref().trim_matches('/').to_string(),
            settings: Settings::default(),
            resources: Vec::new(),
            states: HashMap::new(),
            routes: RouteTable::new(),
            include_cache: IncludeCache::new(),
            built: false,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Router-wide defaults; takes effect on the next [`build`](Self::build).
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn query_options_mut(&mut self) -> &mut QueryOptions {
        &mut self.settings.query
    }

    pub fn link_options_mut(&mut self) -> &mut LinkOptions {
        &mut self.settings.links
    }

    /// Attach a resource.
    ///
    /// # Errors
    ///
    /// `NotFound` for a handle the registry did not issue, `AlreadyMounted`
    /// if the resource is already attached here.
    pub fn mount(&mut self, registry: &Registry, id: ResourceId) -> Result<(), ConfigError> {
        let resource = registry.get(id).ok_or_else(|| ConfigError::NotFound {
            name: format!("#{}", id.0),
        })?;
        if self.resources.contains(&id) {
            return Err(ConfigError::AlreadyMounted {
                router: self.path.clone(),
                resource: resource.name().to_string(),
            });
        }
        self.resources.push(id);
        Ok(())
    }

    pub fn resources(&self) -> &[ResourceId] {
        &self.resources
    }

    pub fn is_mounted(&self, id: ResourceId) -> bool {
        self.resources.contains(&id)
    }

    /// Recompute configuration, routes, links and rules for every mounted
    /// resource.
    ///
    /// Nothing is replaced unless every resource builds.
    ///
    /// # Errors
    ///
    /// `UnresolvedRelationship` if any relationship targets an unknown
    /// resource, `RelationshipNotMounted` if it targets a resource that is
    /// not attached to this router.
    pub fn build(&mut self, registry: &Registry) -> Result<(), ConfigError> {
        let mut states = HashMap::with_capacity(self.resources.len());
        let mut table = RouteTable::new();

        for &id in &self.resources {
            let resource = registry.resource(id);
            let config = cascade(resource.settings(), &self.settings);
            let routes = ResourceRoutes::derive(registry, &self.path, resource, &config.links)?;
            let unmounted = routes.relationships.iter().find(|r| !self.is_mounted(r.related));
            if let Some(rel) = unmounted {
                return Err(ConfigError::RelationshipNotMounted {
                    router: self.path.clone(),
                    resource: resource.name().to_string(),
                    key: rel.key.clone(),
                    target: registry.resource(rel.related).name().to_string(),
                });
            }
            table.extend_with(&self.path, resource, &routes);
            states.insert(
                id,
                ResourceState {
                    rules: RuleSet::from(&config.query),
                    links: routes.links(&config.links.base_url),
                    routes,
                    config,
                },
            );
        }

        self.states = states;
        self.routes = table;
        self.include_cache.clear();
        self.built = true;
        info!(
            router = %self.path,
            resources = self.resources.len(),
            routes = self.routes.len(),
            "Built router"
        );
        Ok(())
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    /// # Errors
    ///
    /// `NotMounted` if the resource is not attached here, `NotBuilt` if it
    /// was attached after the last build.
    pub fn state(&self, registry: &Registry, id: ResourceId) -> Result<&ResourceState, ConfigError> {
        if !self.is_mounted(id) {
            return Err(ConfigError::NotMounted {
                router: self.path.clone(),
                resource: registry.resource(id).name().to_string(),
            });
        }
        self.states.get(&id).ok_or_else(|| ConfigError::NotBuilt {
            router: self.path.clone(),
        })
    }

    pub(crate) fn try_state(&self, id: ResourceId) -> Option<&ResourceState> {
        self.states.get(&id)
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn include_cache(&self) -> &IncludeCache {
        &self.include_cache
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new(DEFAULT_ROUTER)
    }
}
