//! Core types shared across the schema, routing and serialization layers.

use std::fmt;

use heck::{ToKebabCase, ToLowerCamelCase, ToSnakeCase};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Member names every resource object owns; schemas cannot redeclare them.
pub const RESERVED_MEMBERS: &[&str] = &["type", "id", "meta", "links"];

/// Query parameter keys understood by the query rules.
pub const QUERY_KEYS: &[&str] = &["include", "sort", "page", "filter", "fields"];

/// Version tag used when a resource does not declare one.
pub const DEFAULT_VERSION: &str = "0.0.0";

/// Mount path used when a router is created without one.
pub const DEFAULT_ROUTER: &str = "api";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Renders an identifier value as it appears in a URL.
///
/// Strings are used verbatim, numbers are printed; anything else is not an
/// identifier.
pub fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Opaque handle to a resource registered in a [`Registry`](crate::Registry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub(crate) usize);

/// String formatting strategy for URL path segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UrlFormat {
    /// `book-reviews`
    #[default]
    #[serde(rename = "dashed")]
    Dashed,
    /// `bookReviews`
    #[serde(rename = "camelCase")]
    CamelCase,
    /// `book_reviews`
    #[serde(rename = "underscored")]
    Underscored,
}

impl UrlFormat {
    /// Parse a strategy name (`dashed`, `camelCase`, `underscored`).
    ///
    /// Returns `None` for unknown values.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "dashed" => Some(UrlFormat::Dashed),
            "camelCase" => Some(UrlFormat::CamelCase),
            "underscored" => Some(UrlFormat::Underscored),
            _ => None,
        }
    }

    pub fn apply(&self, value: &str) -> String {
        match self {
            UrlFormat::Dashed => value.to_kebab_case(),
            UrlFormat::CamelCase => value.to_lower_camel_case(),
            UrlFormat::Underscored => value.to_snake_case(),
        }
    }
}

/// HTTP method a route is registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            "PATCH" => Some(Method::Patch),
            "DELETE" => Some(Method::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        };
        f.pad(s)
    }
}

/// Controller operation an endpoint dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Find,
    Create,
    Update,
    Remove,
}

impl Action {
    pub fn method(&self) -> Method {
        match self {
            Action::Find => Method::Get,
            Action::Create => Method::Post,
            Action::Update => Method::Patch,
            Action::Remove => Method::Delete,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Find => "find",
            Action::Create => "create",
            Action::Update => "update",
            Action::Remove => "remove",
        };
        f.pad(s)
    }
}

/// Shape of the response a route produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    /// `/books` and `/books/:booksID`
    ResourceObject,
    /// `/books/:booksID/author`
    RelatedObject,
    /// `/books/:booksID/relationships/author`
    Relationship,
}
