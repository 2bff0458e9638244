//! Resource definitions and the registry that owns them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::attribute::{Attribute, IdentityKind, Relation, SchemaSpec};
use crate::config::Settings;
use crate::controller::Controller;
use crate::error::ConfigError;
use crate::inflect::canonical_name;
use crate::types::{ResourceId, DEFAULT_VERSION, RESERVED_MEMBERS};

/// Registration options for a resource.
#[derive(Clone, Default)]
pub struct ResourceOptions {
    /// Route namespace tag, `"0.0.0"` when unset.
    pub version: Option<String>,
    /// Falls back to the registry's global controller when unset.
    pub controller: Option<Arc<dyn Controller>>,
    /// Resource-level overrides of the router defaults.
    pub settings: Settings,
}

impl ResourceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn controller(mut self, controller: Arc<dyn Controller>) -> Self {
        self.controller = Some(controller);
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }
}

impl fmt::Debug for ResourceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceOptions")
            .field("version", &self.version)
            .field("controller", &self.controller.is_some())
            .field("settings", &self.settings)
            .finish()
    }
}

/// A named, schema-bearing resource.
pub struct Resource {
    id: ResourceId,
    name: String,
    schema: Vec<Attribute>,
    version: String,
    controller: Option<Arc<dyn Controller>>,
    settings: Settings,
}

impl Resource {
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Canonical name, also the `type` of its resource objects.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the identifier placeholder in route templates.
    pub fn url_param(&self) -> String {
        format!("{}ID", self.name)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// All members in serialization order, identity members first.
    pub fn schema(&self) -> &[Attribute] {
        &self.schema
    }

    pub fn attribute(&self, key: &str) -> Option<&Attribute> {
        self.schema.iter().find(|a| a.key() == key)
    }

    /// Relationship attributes in declaration order.
    pub fn relationships(&self) -> impl Iterator<Item = (&Attribute, &Relation)> + '_ {
        self.schema
            .iter()
            .filter_map(|a| a.relation().map(|rel| (a, rel)))
    }

    pub fn relationship(&self, key: &str) -> Option<&Relation> {
        self.attribute(key).and_then(Attribute::relation)
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("schema", &self.schema)
            .field("version", &self.version)
            .field("controller", &self.controller.is_some())
            .finish()
    }
}

/// A Rust type that declares its own resource schema.
///
/// The resource name is derived from the type name, so `struct Book`
/// registers as `books`.
pub trait ResourceType {
    fn schema() -> SchemaSpec;

    fn options() -> ResourceOptions {
        ResourceOptions::default()
    }
}

/// Owns every resource definition and the controller bindings.
#[derive(Default)]
pub struct Registry {
    resources: Vec<Resource>,
    by_name: HashMap<String, ResourceId>,
    global_controller: Option<Arc<dyn Controller>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource.
    ///
    /// # Errors
    ///
    /// `DuplicateResource` when the canonical name is taken, `ReservedMember`
    /// when the schema redeclares `type`, `id`, `meta` or `links`, and
    /// `InvalidSchema` for empty or repeated field names.
    pub fn define(
        &mut self,
        name: &str,
        schema: SchemaSpec,
        options: ResourceOptions,
    ) -> Result<ResourceId, ConfigError> {
        let name = canonical_name(name);
        if name.is_empty() {
            return Err(ConfigError::InvalidSchema {
                resource: name,
                message: "resource name is empty".to_string(),
            });
        }
        if self.by_name.contains_key(&name) {
            return Err(ConfigError::DuplicateResource { name });
        }

        let id = ResourceId(self.resources.len());
        let mut attributes: Vec<Attribute> = IdentityKind::ALL
            .iter()
            .map(|kind| Attribute::identity(id, *kind))
            .collect();

        for (key, spec) in schema.fields() {
            if RESERVED_MEMBERS.contains(&key.as_str()) {
                return Err(ConfigError::ReservedMember {
                    resource: name,
                    member: key.clone(),
                });
            }
            if key.is_empty() {
                return Err(ConfigError::InvalidSchema {
                    resource: name,
                    message: "field name is empty".to_string(),
                });
            }
            if attributes.iter().any(|a| a.key() == key) {
                return Err(ConfigError::InvalidSchema {
                    resource: name,
                    message: format!("field '{}' declared twice", key),
                });
            }
            attributes.push(Attribute::declared(id, key.clone(), spec));
        }

        debug!(resource = %name, fields = schema.fields().len(), "Defined resource");
        self.by_name.insert(name.clone(), id);
        self.resources.push(Resource {
            id,
            name,
            schema: attributes,
            version: options
                .version
                .unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            controller: options.controller,
            settings: options.settings,
        });
        Ok(id)
    }

    /// Register a [`ResourceType`], naming it after the Rust type.
    pub fn define_type<T: ResourceType>(&mut self) -> Result<ResourceId, ConfigError> {
        let type_name = std::any::type_name::<T>();
        let name = type_name.rsplit("::").next().unwrap_or(type_name);
        self.define(name, T::schema(), T::options())
    }

    /// Look up a resource by any spelling of its name.
    ///
    /// # Errors
    ///
    /// `NotFound` if no resource has that canonical name.
    pub fn find_by_name(&self, name: &str) -> Result<&Resource, ConfigError> {
        self.id_of(name)
            .map(|id| self.resource(id))
            .ok_or_else(|| ConfigError::NotFound {
                name: canonical_name(name),
            })
    }

    pub fn id_of(&self, name: &str) -> Option<ResourceId> {
        self.by_name
            .get(name)
            .or_else(|| self.by_name.get(&canonical_name(name)))
            .copied()
    }

    /// Resource behind a handle issued by this registry.
    pub fn resource(&self, id: ResourceId) -> &Resource {
        &self.resources[id.0]
    }

    pub fn get(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> + '_ {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Controller used by every resource without one of its own.
    pub fn set_global_controller(&mut self, controller: Arc<dyn Controller>) {
        self.global_controller = Some(controller);
    }

    /// Rebind one resource's controller.
    pub fn set_controller(
        &mut self,
        id: ResourceId,
        controller: Arc<dyn Controller>,
    ) -> Result<(), ConfigError> {
        let resource = self
            .resources
            .get_mut(id.0)
            .ok_or_else(|| ConfigError::NotFound {
                name: format!("#{}", id.0),
            })?;
        resource.controller = Some(controller);
        Ok(())
    }

    /// # Errors
    ///
    /// `NoController` when neither the resource nor the registry has one.
    pub fn controller_for(&self, id: ResourceId) -> Result<Arc<dyn Controller>, ConfigError> {
        let resource = self.resource(id);
        resource
            .controller
            .clone()
            .or_else(|| self.global_controller.clone())
            .ok_or_else(|| ConfigError::NoController {
                resource: resource.name.clone(),
            })
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("resources", &self.resources)
            .field("global_controller", &self.global_controller.is_some())
            .finish()
    }
}
