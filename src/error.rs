//! Error types for schema registration, routing, request handling and
//! manifest loading.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed error returned by controllers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Fatal configuration errors raised while registering resources or
/// building routers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("resource '{name}' already exists")]
    DuplicateResource { name: String },

    #[error("invalid schema for resource '{resource}': {message}")]
    InvalidSchema { resource: String, message: String },

    #[error("resource '{resource}' redeclares reserved member '{member}'")]
    ReservedMember { resource: String, member: String },

    #[error("resource '{name}' not found")]
    NotFound { name: String },

    #[error("no controller bound for resource '{resource}'")]
    NoController { resource: String },

    #[error("relationship '{resource}.{key}' points at unknown resource '{target}'")]
    UnresolvedRelationship {
        resource: String,
        key: String,
        target: String,
    },

    #[error("relationship '{resource}.{key}' points at '{target}', which is not mounted on router '/{router}'")]
    RelationshipNotMounted {
        router: String,
        resource: String,
        key: String,
        target: String,
    },

    #[error("unknown attribute kind \"{kind}\" for '{resource}.{key}': expected data, to_one or to_many")]
    UnknownAttributeKind {
        resource: String,
        key: String,
        kind: String,
    },

    #[error("router '/{path}' already in use")]
    DuplicateRouter { path: String },

    #[error("resource '{resource}' is already mounted on router '/{router}'")]
    AlreadyMounted { router: String, resource: String },

    #[error("resource '{resource}' is not mounted on router '/{router}'")]
    NotMounted { router: String, resource: String },

    #[error("router '/{router}' has not been built")]
    NotBuilt { router: String },
}

impl ConfigError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Why an `include` value was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncludeRejection {
    /// The path has more segments than the nesting limit allows.
    NestingLimit,
    /// A segment names the resource being walked from.
    SelfInclusion,
    /// A segment is not a relationship of the current resource.
    UnknownRelationship,
    /// The value or one of its paths is empty.
    EmptyPath,
}

impl std::fmt::Display for IncludeRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IncludeRejection::NestingLimit => "nesting limit exceeded",
            IncludeRejection::SelfInclusion => "self inclusion",
            IncludeRejection::UnknownRelationship => "unknown relationship",
            IncludeRejection::EmptyPath => "empty path",
        };
        f.write_str(s)
    }
}

/// Rejected query parameters. Always a client error.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("unknown query parameter '{key}'")]
    UnknownParameter { key: String },

    #[error("query parameter '{key}' is not enabled for this resource")]
    InactiveParameter { key: String },

    #[error("invalid include \"{value}\" at segment '{segment}': {reason}")]
    InvalidInclude {
        value: String,
        segment: String,
        reason: IncludeRejection,
    },

    #[error("invalid value for query parameter '{key}': {message}")]
    Rejected { key: String, message: String },
}

/// A serialized document that an active query rule refuses to send.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("response violates '{key}' rule: {message}")]
pub struct ResponseValidationError {
    pub key: String,
    pub message: String,
}

/// Controller output that cannot be turned into a document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SerializationError {
    #[error("malformed controller result for '{resource}': expected object or array data, got {actual}")]
    MalformedControllerResult { resource: String, actual: String },

    #[error("malformed resource object for '{resource}': expected object, got {actual}")]
    MalformedResourceObject { resource: String, actual: String },

    #[error("invalid linkage for '{resource}.{key}': got {actual}")]
    InvalidLinkage {
        resource: String,
        key: String,
        actual: String,
    },

    #[error("resource object of '{resource}' has no usable id")]
    MissingIdentifier { resource: String },

    #[error("included resource at index {index} has no type")]
    MissingIncludedType { index: usize },

    #[error("included resource type '{name}' is not available on this router")]
    UnresolvedIncludedType { name: String },
}

/// Errors surfaced by the request pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Request(#[from] RequestError),

    #[error("controller error: {0}")]
    Controller(#[source] BoxError),

    #[error(transparent)]
    ResponseValidation(#[from] ResponseValidationError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

impl Error {
    /// HTTP status code for an error response.
    pub fn status(&self) -> u16 {
        match self {
            Error::Request(_) => 400,
            _ => 500,
        }
    }
}

/// Single manifest problem with path context.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ManifestError {
    /// JSON Pointer (RFC 6901) to the offending value.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for ManifestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Errors while loading a manifest.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid manifest with {} error(s)", errors.len())]
    InvalidManifest { errors: Vec<ManifestError> },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            #[cfg(feature = "remote")]
            LoadError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_exit_codes() {
        let err = LoadError::FileNotFound {
            path: PathBuf::from("api.json"),
        };
        assert_eq!(err.exit_code(), 3);

        let err = LoadError::InvalidManifest { errors: vec![] };
        assert_eq!(err.exit_code(), 2);

        let err = LoadError::Config(ConfigError::NotFound {
            name: "authors".into(),
        });
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn pipeline_status_codes() {
        let err = Error::from(RequestError::UnknownParameter { key: "q".into() });
        assert_eq!(err.status(), 400);

        let err = Error::from(SerializationError::MissingIncludedType { index: 0 });
        assert_eq!(err.status(), 500);

        let err = Error::from(ResponseValidationError {
            key: "include".into(),
            message: "unexpected type".into(),
        });
        assert_eq!(err.status(), 500);

        let err = Error::Controller("database offline".into());
        assert_eq!(err.status(), 500);
        assert_eq!(err.to_string(), "controller error: database offline");
    }

    #[test]
    fn include_rejection_display() {
        let err = RequestError::InvalidInclude {
            value: "author.books,self".into(),
            segment: "self".into(),
            reason: IncludeRejection::UnknownRelationship,
        };
        assert_eq!(
            err.to_string(),
            "invalid include \"author.books,self\" at segment 'self': unknown relationship"
        );
    }

    #[test]
    fn manifest_error_display() {
        let err = ManifestError {
            path: "/resources/0/schema".into(),
            message: "expected object".into(),
        };
        assert_eq!(err.to_string(), "/resources/0/schema: expected object");
    }
}
