//! Resource Graph
//!
//! Schema-driven routing and JSON:API document serialization.
//!
//! Resources are registered with an ordered schema of data fields and
//! to-one/to-many relationships. Routers mount resources under a path,
//! cascade their configuration defaults into each resource, and derive the
//! full route table from the relationship topology. At request time query
//! parameters are checked against the cascaded rules, the controller is
//! called, and its raw data is serialized into a response document.
//!
//! # Example
//!
//! ```
//! use resource_graph::{Api, ControllerResult, QueryParams, ResourceOptions, SchemaSpec};
//! use serde_json::json;
//!
//! let mut api = Api::new();
//! let book = api.resource(
//!     "api",
//!     "Book",
//!     SchemaSpec::new().data("name").to_one("author").to_many("reviews"),
//!     ResourceOptions::default(),
//! )?;
//! api.resource("api", "Author", SchemaSpec::new().data("name"), ResourceOptions::default())?;
//! api.resource("api", "Review", SchemaSpec::new().data("text"), ResourceOptions::default())?;
//! api.build()?;
//!
//! let result = ControllerResult::new(json!({
//!     "id": "book:1",
//!     "name": "First Book",
//!     "author": "author:1",
//!     "reviews": []
//! }));
//! let document = api.respond("api", book, &QueryParams::new(), &result)?;
//!
//! assert_eq!(
//!     document.to_value(),
//!     json!({
//!         "data": {
//!             "type": "books",
//!             "id": "book:1",
//!             "attributes": { "name": "First Book" },
//!             "relationships": {
//!                 "author": { "data": { "type": "authors", "id": "author:1" } },
//!                 "reviews": { "data": [] }
//!             }
//!         }
//!     })
//! );
//! # Ok::<(), resource_graph::Error>(())
//! ```
//!
//! # Routes
//!
//! | Method | Path | Kind |
//! |--------|------|------|
//! | `POST`, `GET` | `/api/books` | resource object |
//! | `GET`, `PATCH`, `DELETE` | `/api/books/:booksID` | resource object |
//! | `GET` | `/api/books/:booksID/author` | related object |
//! | `GET`, `POST`, `PATCH`, `DELETE` | `/api/books/:booksID/relationships/author` | relationship |

mod api;
mod attribute;
mod config;
mod controller;
mod document;
mod error;
mod inflect;
mod lint;
mod loader;
mod query;
mod registry;
mod router;
mod routes;
mod serializer;
mod server;
mod types;

pub use api::Api;
pub use attribute::{
    Attribute, AttributeContext, AttributeKind, AttributeSpec, Cardinality, IdentityKind,
    Relation, SchemaSpec,
};
pub use config::{
    cascade, IncludeSetting, LinkOptions, QueryOptions, ResolvedConfig, ResolvedLinks,
    ResolvedQuery, Settings, DEFAULT_NESTING_LIMIT,
};
pub use controller::{
    dispatch, Controller, ControllerParams, ControllerResult, ParentRef, UnsupportedAction,
};
pub use document::{
    Document, Linkage, Links, PrimaryData, RelationshipMember, ResourceIdentifier, ResourceObject,
};
pub use error::{
    BoxError, ConfigError, Error, IncludeRejection, LoadError, ManifestError, RequestError,
    ResponseValidationError, SerializationError,
};
pub use inflect::{canonical_name, pluralize, singularize};
pub use lint::{lint, lint_source, lint_value, Diagnostic, LintResult, LintStatus, Severity};
pub use loader::{
    is_url, load_json, load_json_auto, load_manifest, load_manifest_auto, load_manifest_str,
    manifest_schema, parse_manifest, validate_manifest, Manifest, ResourceManifest,
    RouterManifest,
};
pub use query::{
    parse_include, IncludeCache, IncludePaths, QueryParams, QueryRule, QueryValue, RuleContext,
    RuleSet,
};
pub use registry::{Registry, Resource, ResourceOptions, ResourceType};
pub use router::{ResourceState, Router};
pub use routes::{
    Endpoint, LinkSet, LinkTemplate, RelationshipRoutes, ResourceRoutes, RouteEntry, RouteTable,
};
pub use serializer::DocumentContext;
pub use server::{HttpServer, MemoryServer, Request};
pub use types::{
    Action, Method, ResourceId, RouteKind, UrlFormat, DEFAULT_ROUTER, DEFAULT_VERSION,
    QUERY_KEYS, RESERVED_MEMBERS,
};

#[cfg(feature = "remote")]
pub use loader::{load_json_url, load_manifest_url};
