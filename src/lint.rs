//! Manifest linting - static analysis of resource manifests.
//!
//! Unlike [`Manifest::build_api`], which stops at the first configuration
//! error, linting reports every problem it finds:
//! - JSON syntax and IO errors
//! - Structural errors against the manifest schema
//! - Unknown attribute kinds, reserved members, duplicate resources and
//!   routers, relationships to undeclared resources or to resources missing
//!   from one of the owner's routers
//! - Resources mounted nowhere and routers with nothing mounted (warnings)

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use serde_json::Value;

use crate::attribute::AttributeSpec;
use crate::error::LoadError;
use crate::inflect::canonical_name;
use crate::loader::{load_json_auto, validate_manifest, Manifest};
use crate::types::RESERVED_MEMBERS;

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from linting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    /// JSON Pointer to the issue (e.g., "/resources/0/schema/author")
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn error(code: &str, path: String, message: String) -> Self {
        Self {
            severity: Severity::Error,
            code: code.to_string(),
            path,
            message,
        }
    }

    fn warning(code: &str, path: String, message: String) -> Self {
        Self {
            severity: Severity::Warning,
            code: code.to_string(),
            path,
            message,
        }
    }
}

/// Overall outcome of a lint run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LintStatus {
    Ok,
    Error,
    Warning,
}

/// Result of linting one manifest source.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub source: String,
    pub status: LintStatus,
    pub errors: usize,
    pub warnings: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl LintResult {
    fn new(source: &str, diagnostics: Vec<Diagnostic>) -> Self {
        let errors = diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count();
        let warnings = diagnostics.len() - errors;
        let status = if errors > 0 {
            LintStatus::Error
        } else if warnings > 0 {
            LintStatus::Warning
        } else {
            LintStatus::Ok
        };
        Self {
            source: source.to_string(),
            status,
            errors,
            warnings,
            diagnostics,
        }
    }

    /// Returns true if there are no errors (or, if `strict`, no warnings
    /// either).
    pub fn is_ok(&self, strict: bool) -> bool {
        match self.status {
            LintStatus::Ok => true,
            LintStatus::Warning => !strict,
            LintStatus::Error => false,
        }
    }
}

/// Lint a manifest file or URL.
pub fn lint_source(source: &str) -> LintResult {
    let value = match load_json_auto(source) {
        Ok(value) => value,
        Err(e) => {
            let diagnostic =
                Diagnostic::error("E001", "/".to_string(), format!("cannot load: {}", e));
            return LintResult::new(source, vec![diagnostic]);
        }
    };
    LintResult::new(source, lint_value(&value))
}

/// Lint a raw manifest document.
pub fn lint_value(value: &Value) -> Vec<Diagnostic> {
    if let Err(LoadError::InvalidManifest { errors }) = validate_manifest(value) {
        return errors
            .into_iter()
            .map(|e| Diagnostic::error("E002", e.path, e.message))
            .collect();
    }
    match serde_json::from_value::<Manifest>(value.clone()) {
        Ok(manifest) => lint(&manifest),
        Err(e) => vec![Diagnostic::error("E002", "/".to_string(), e.to_string())],
    }
}

/// Semantic checks over a structurally valid manifest.
pub fn lint(manifest: &Manifest) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let mut routers: HashSet<String> = HashSet::new();
    for (i, router) in manifest.routers.iter().enumerate() {
        let path = router.path.trim_matches('/').to_string();
        if routers.contains(&path) {
            diagnostics.push(Diagnostic::error(
                "E007",
                format!("/routers/{}/path", i),
                format!("router '/{}' declared twice", path),
            ));
        } else {
            routers.insert(path);
        }
    }

    let mut names: HashSet<String> = HashSet::new();
    let mut mounts: HashMap<String, HashSet<&str>> = HashMap::new();
    for (i, resource) in manifest.resources.iter().enumerate() {
        let name = canonical_name(&resource.name);
        mounts
            .entry(name.clone())
            .or_default()
            .extend(resource.mount.iter().map(|p| p.trim_matches('/')));
        if !names.insert(name.clone()) {
            diagnostics.push(Diagnostic::error(
                "E005",
                format!("/resources/{}/name", i),
                format!("resource '{}' declared twice", name),
            ));
        }
    }

    let mut mounted: HashSet<String> = HashSet::new();
    for (i, resource) in manifest.resources.iter().enumerate() {
        let name = canonical_name(&resource.name);
        for (key, value) in &resource.schema {
            let path = format!("/resources/{}/schema/{}", i, escape_pointer(key));
            if RESERVED_MEMBERS.contains(&key.as_str()) {
                diagnostics.push(Diagnostic::error(
                    "E004",
                    path,
                    format!("'{}' is a reserved member", key),
                ));
                continue;
            }
            let spec = match AttributeSpec::from_value(&name, key, value) {
                Ok(spec) => spec,
                Err(e) => {
                    diagnostics.push(Diagnostic::error("E003", path, e.to_string()));
                    continue;
                }
            };
            let target = match &spec {
                AttributeSpec::Data { .. } => continue,
                AttributeSpec::ToOne { target } | AttributeSpec::ToMany { target } => {
                    canonical_name(target.as_deref().unwrap_or(key))
                }
            };
            if !names.contains(&target) {
                diagnostics.push(Diagnostic::error(
                    "E006",
                    path,
                    format!("relationship points at undeclared resource '{}'", target),
                ));
                continue;
            }
            let target_mounts = mounts.get(&target);
            for router in &resource.mount {
                let router = router.trim_matches('/');
                if !target_mounts.is_some_and(|m| m.contains(router)) {
                    diagnostics.push(Diagnostic::error(
                        "E008",
                        path.clone(),
                        format!("'{}' is not mounted on router '/{}'", target, router),
                    ));
                }
            }
        }

        if resource.mount.is_empty() {
            diagnostics.push(Diagnostic::warning(
                "W001",
                format!("/resources/{}/mount", i),
                format!("resource '{}' is not mounted on any router", name),
            ));
        }
        mounted.extend(resource.mount.iter().map(|p| p.trim_matches('/').to_string()));
    }

    for (i, router) in manifest.routers.iter().enumerate() {
        let path = router.path.trim_matches('/');
        if !mounted.contains(path) {
            diagnostics.push(Diagnostic::warning(
                "W002",
                format!("/routers/{}", i),
                format!("router '/{}' has no resources", path),
            ));
        }
    }

    diagnostics
}

/// `~` and `/` escaping for JSON Pointer segments.
fn escape_pointer(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}
