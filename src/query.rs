//! Query parameters and the rules that validate them.
//!
//! Each of `include`, `sort`, `page`, `filter` and `fields` has one rule.
//! A request is accepted only if every parameter it carries maps to an
//! active rule that accepts the value. Bracketed keys such as
//! `fields[books]` or `page[number]` are checked by the rule of their base
//! key.
//!
//! `include` is the only rule that inspects its value: each comma-separated
//! path is walked through the resource graph, and accepted values are
//! replaced in place by their parsed paths.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::debug;

use crate::config::ResolvedQuery;
use crate::document::Document;
use crate::error::{IncludeRejection, RequestError, ResponseValidationError};
use crate::registry::{Registry, Resource};

/// Parsed `include` value: one list of relationship keys per path.
pub type IncludePaths = Vec<Vec<String>>;

/// Value of one query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Raw(String),
    /// Accepted `include` value.
    Include(Arc<IncludePaths>),
}

impl QueryValue {
    pub fn as_raw(&self) -> Option<&str> {
        match self {
            QueryValue::Raw(s) => Some(s),
            QueryValue::Include(_) => None,
        }
    }
}

/// Query parameters of one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    params: BTreeMap<String, QueryValue>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a URL query string (with or without the leading `?`).
    ///
    /// Repeated keys keep their last value.
    pub fn parse(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let params = url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), QueryValue::Raw(v.into_owned())))
            .collect();
        Self { params }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), QueryValue::Raw(value.into()));
    }

    pub fn get(&self, key: &str) -> Option<&QueryValue> {
        self.params.get(key)
    }

    /// Paths of an accepted `include` parameter.
    pub fn include_paths(&self) -> Option<&IncludePaths> {
        match self.params.get(INCLUDE)? {
            QueryValue::Include(paths) => Some(paths),
            QueryValue::Raw(_) => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &QueryValue)> + '_ {
        self.params.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

const INCLUDE: &str = "include";

/// `fields[books]` -> `fields`
fn base_key(key: &str) -> &str {
    key.split_once('[').map_or(key, |(base, _)| base)
}

/// Memoized `include` parses, keyed by `resource:raw`.
#[derive(Debug)]
pub struct IncludeCache {
    entries: RwLock<HashMap<String, (Arc<IncludePaths>, Instant)>>,
    ttl: Duration,
    walks: AtomicUsize,
}

impl IncludeCache {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

    pub fn new() -> Self {
        Self::with_ttl(Self::DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            walks: AtomicUsize::new(0),
        }
    }

    /// Number of relationship-graph walks performed so far.
    pub fn walks(&self) -> usize {
        self.walks.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    fn get(&self, key: &str) -> Option<Arc<IncludePaths>> {
        let entries = self.entries.read();
        let (paths, stored) = entries.get(key)?;
        (stored.elapsed() < self.ttl).then(|| Arc::clone(paths))
    }

    fn insert(&self, key: String, paths: Arc<IncludePaths>) {
        let mut entries = self.entries.write();
        let ttl = self.ttl;
        entries.retain(|_, (_, stored)| stored.elapsed() < ttl);
        entries.insert(key, (paths, Instant::now()));
    }
}

impl Default for IncludeCache {
    fn default() -> Self {
        Self::new()
    }
}

/// What a rule needs to see while validating.
#[derive(Clone, Copy)]
pub struct RuleContext<'a> {
    pub registry: &'a Registry,
    pub resource: &'a Resource,
    pub cache: &'a IncludeCache,
}

/// One query option rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryRule {
    Include { active: bool, nesting_limit: usize },
    Sort { active: bool },
    Page { active: bool },
    Filter { active: bool },
    Fields { active: bool },
}

impl QueryRule {
    pub fn key(&self) -> &'static str {
        match self {
            QueryRule::Include { .. } => INCLUDE,
            QueryRule::Sort { .. } => "sort",
            QueryRule::Page { .. } => "page",
            QueryRule::Filter { .. } => "filter",
            QueryRule::Fields { .. } => "fields",
        }
    }

    pub fn is_active(&self) -> bool {
        match *self {
            QueryRule::Include { active, .. }
            | QueryRule::Sort { active }
            | QueryRule::Page { active }
            | QueryRule::Filter { active }
            | QueryRule::Fields { active } => active,
        }
    }

    /// Check one request parameter. `include` values are replaced by their
    /// parsed paths.
    pub fn validate_request(
        &self,
        ctx: &RuleContext<'_>,
        key: &str,
        value: &mut QueryValue,
    ) -> Result<(), RequestError> {
        match *self {
            QueryRule::Include { nesting_limit, .. } => {
                if key != INCLUDE {
                    return Err(RequestError::Rejected {
                        key: key.to_string(),
                        message: "include does not take a member name".to_string(),
                    });
                }
                if let QueryValue::Raw(raw) = value {
                    let paths = parse_include(ctx, raw, nesting_limit)?;
                    *value = QueryValue::Include(paths);
                }
                Ok(())
            }
            // Presence-gated only
            _ => Ok(()),
        }
    }

    /// Check the assembled document against the parameter that shaped it.
    pub fn validate_response(
        &self,
        ctx: &RuleContext<'_>,
        value: &QueryValue,
        document: &Document,
    ) -> Result<(), ResponseValidationError> {
        match (self, value) {
            (QueryRule::Include { .. }, QueryValue::Include(paths)) => {
                check_included(ctx, paths, document)
            }
            _ => Ok(()),
        }
    }
}

/// The five rules of one (router, resource) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSet {
    rules: [QueryRule; 5],
}

impl RuleSet {
    pub fn rules(&self) -> &[QueryRule] {
        &self.rules
    }

    pub fn rule(&self, key: &str) -> Option<&QueryRule> {
        let base = base_key(key);
        self.rules.iter().find(|r| r.key() == base)
    }

    /// Validate every parameter of a request.
    ///
    /// # Errors
    ///
    /// `UnknownParameter` for keys no rule covers, `InactiveParameter` for
    /// keys whose rule is disabled, or the rule's own rejection.
    pub fn validate_request(
        &self,
        ctx: &RuleContext<'_>,
        params: &mut QueryParams,
    ) -> Result<(), RequestError> {
        for (key, value) in params.params.iter_mut() {
            let rule = self.rule(key).ok_or_else(|| RequestError::UnknownParameter {
                key: key.clone(),
            })?;
            if !rule.is_active() {
                debug!(resource = ctx.resource.name(), key = %key, "Inactive query parameter");
                return Err(RequestError::InactiveParameter { key: key.clone() });
            }
            rule.validate_request(ctx, key, value).inspect_err(|err| {
                debug!(resource = ctx.resource.name(), %err, "Query parameter rejected");
            })?;
        }
        Ok(())
    }

    pub fn validate_response(
        &self,
        ctx: &RuleContext<'_>,
        params: &QueryParams,
        document: &Document,
    ) -> Result<(), ResponseValidationError> {
        for (key, value) in params.iter() {
            if let Some(rule) = self.rule(key) {
                rule.validate_response(ctx, value, document)?;
            }
        }
        Ok(())
    }
}

impl From<&ResolvedQuery> for RuleSet {
    fn from(query: &ResolvedQuery) -> Self {
        Self {
            rules: [
                QueryRule::Include {
                    active: query.include.enabled,
                    nesting_limit: query.include.nesting_limit,
                },
                QueryRule::Sort { active: query.sort },
                QueryRule::Page { active: query.page },
                QueryRule::Filter {
                    active: query.filter,
                },
                QueryRule::Fields {
                    active: query.fields,
                },
            ],
        }
    }
}

/// Resolve an `include` value against the relationship graph.
///
/// Accepted values are cached, so a repeated value returns the same `Arc`
/// without walking the graph again.
pub fn parse_include(
    ctx: &RuleContext<'_>,
    raw: &str,
    nesting_limit: usize,
) -> Result<Arc<IncludePaths>, RequestError> {
    let cache_key = format!("{}:{}", ctx.resource.name(), raw);
    if let Some(paths) = ctx.cache.get(&cache_key) {
        debug!(key = %cache_key, "Include cache hit");
        return Ok(paths);
    }

    ctx.cache.walks.fetch_add(1, Ordering::Relaxed);
    let paths = Arc::new(walk_include(ctx, raw, nesting_limit)?);
    debug!(key = %cache_key, paths = paths.len(), "Include cache miss");
    ctx.cache.insert(cache_key, Arc::clone(&paths));
    Ok(paths)
}

fn walk_include(
    ctx: &RuleContext<'_>,
    raw: &str,
    nesting_limit: usize,
) -> Result<IncludePaths, RequestError> {
    let reject = |segment: &str, reason| RequestError::InvalidInclude {
        value: raw.to_string(),
        segment: segment.to_string(),
        reason,
    };

    let root = ctx.resource;
    let mut paths = Vec::new();
    for path in raw.split(',') {
        let segments: Vec<&str> = path.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(reject(path, IncludeRejection::EmptyPath));
        }
        if segments.len() > nesting_limit {
            return Err(reject(path, IncludeRejection::NestingLimit));
        }

        let mut current = root;
        for segment in &segments {
            if *segment == root.name() || *segment == current.name() {
                return Err(reject(segment, IncludeRejection::SelfInclusion));
            }
            let next = current
                .relationship(segment)
                .and_then(|rel| rel.related(ctx.registry))
                .ok_or_else(|| reject(segment, IncludeRejection::UnknownRelationship))?;
            current = ctx.registry.resource(next);
        }
        paths.push(segments.into_iter().map(String::from).collect());
    }
    Ok(paths)
}

/// Every included object must be of a type reachable along `paths`.
fn check_included(
    ctx: &RuleContext<'_>,
    paths: &IncludePaths,
    document: &Document,
) -> Result<(), ResponseValidationError> {
    let Some(included) = &document.included else {
        return Ok(());
    };

    let mut reachable = HashSet::new();
    for path in paths {
        let mut current = ctx.resource;
        for segment in path {
            let Some(next) = current
                .relationship(segment)
                .and_then(|rel| rel.related(ctx.registry))
            else {
                break;
            };
            current = ctx.registry.resource(next);
            reachable.insert(current.id());
        }
    }

    for object in included {
        let known = ctx
            .registry
            .id_of(&object.kind)
            .is_some_and(|id| reachable.contains(&id));
        if !known {
            return Err(ResponseValidationError {
                key: INCLUDE.to_string(),
                message: format!(
                    "included type '{}' is not reachable from the requested paths",
                    object.kind
                ),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::SchemaSpec;
    use crate::config::IncludeSetting;
    use crate::document::ResourceObject;
    use crate::registry::ResourceOptions;
    use crate::types::ResourceId;

    fn library() -> (Registry, ResourceId) {
        let mut registry = Registry::new();
        let book = registry
            .define(
                "Book",
                SchemaSpec::new().data("name").to_one("author").to_many("reviews"),
                ResourceOptions::default(),
            )
            .unwrap();
        registry
            .define(
                "Author",
                SchemaSpec::new().data("name").to_many("books"),
                ResourceOptions::default(),
            )
            .unwrap();
        registry
            .define(
                "Review",
                SchemaSpec::new().data("text").to_one("author"),
                ResourceOptions::default(),
            )
            .unwrap();
        (registry, book)
    }

    fn rules(include: bool, limit: usize) -> RuleSet {
        RuleSet::from(&ResolvedQuery {
            include: IncludeSetting::new(include, limit),
            sort: true,
            ..Default::default()
        })
    }

    #[test]
    fn parse_query_string() {
        let params = QueryParams::parse("?include=author%2Creviews&fields[books]=name");
        assert_eq!(
            params.get("include"),
            Some(&QueryValue::Raw("author,reviews".into()))
        );
        assert_eq!(
            params.get("fields[books]").and_then(QueryValue::as_raw),
            Some("name")
        );
        assert!(QueryParams::parse("").is_empty());
    }

    #[test]
    fn include_replaced_by_paths() {
        let (registry, book) = library();
        let cache = IncludeCache::new();
        let ctx = RuleContext {
            registry: &registry,
            resource: registry.resource(book),
            cache: &cache,
        };
        let mut params = QueryParams::parse("include=author,reviews.author");
        rules(true, 2).validate_request(&ctx, &mut params).unwrap();
        assert_eq!(
            params.include_paths().unwrap(),
            &vec![
                vec!["author".to_string()],
                vec!["reviews".to_string(), "author".to_string()],
            ]
        );
    }

    #[test]
    fn unknown_and_inactive_keys() {
        let (registry, book) = library();
        let cache = IncludeCache::new();
        let ctx = RuleContext {
            registry: &registry,
            resource: registry.resource(book),
            cache: &cache,
        };

        let mut params = QueryParams::parse("q=1");
        assert_eq!(
            rules(true, 2).validate_request(&ctx, &mut params),
            Err(RequestError::UnknownParameter { key: "q".into() })
        );

        let mut params = QueryParams::parse("page[number]=2");
        assert_eq!(
            rules(true, 2).validate_request(&ctx, &mut params),
            Err(RequestError::InactiveParameter {
                key: "page[number]".into()
            })
        );

        let mut params = QueryParams::parse("include=author");
        assert_eq!(
            rules(false, 2).validate_request(&ctx, &mut params),
            Err(RequestError::InactiveParameter {
                key: "include".into()
            })
        );

        let mut params = QueryParams::parse("sort=-name");
        assert!(rules(false, 2).validate_request(&ctx, &mut params).is_ok());
    }

    #[test]
    fn empty_include_rejected() {
        let (registry, book) = library();
        let cache = IncludeCache::new();
        let ctx = RuleContext {
            registry: &registry,
            resource: registry.resource(book),
            cache: &cache,
        };
        for raw in ["", "author,", "author..reviews"] {
            let err = parse_include(&ctx, raw, 2).unwrap_err();
            assert!(
                matches!(
                    err,
                    RequestError::InvalidInclude {
                        reason: IncludeRejection::EmptyPath,
                        ..
                    }
                ),
                "{raw}: {err}"
            );
        }
    }

    #[test]
    fn cache_expires_after_ttl() {
        let (registry, book) = library();
        let cache = IncludeCache::with_ttl(Duration::ZERO);
        let ctx = RuleContext {
            registry: &registry,
            resource: registry.resource(book),
            cache: &cache,
        };
        parse_include(&ctx, "author", 2).unwrap();
        parse_include(&ctx, "author", 2).unwrap();
        assert_eq!(cache.walks(), 2);
    }

    #[test]
    fn rejected_values_are_not_cached() {
        let (registry, book) = library();
        let cache = IncludeCache::new();
        let ctx = RuleContext {
            registry: &registry,
            resource: registry.resource(book),
            cache: &cache,
        };
        assert!(parse_include(&ctx, "publisher", 2).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn response_rejects_unreachable_included_type() {
        let (registry, book) = library();
        let cache = IncludeCache::new();
        let ctx = RuleContext {
            registry: &registry,
            resource: registry.resource(book),
            cache: &cache,
        };
        let paths = Arc::new(vec![vec!["author".to_string()]]);
        let value = QueryValue::Include(paths);
        let rule = QueryRule::Include {
            active: true,
            nesting_limit: 2,
        };

        let mut document = Document {
            included: Some(vec![ResourceObject {
                kind: "authors".into(),
                ..Default::default()
            }]),
            ..Default::default()
        };
        assert!(rule.validate_response(&ctx, &value, &document).is_ok());

        document.included = Some(vec![ResourceObject {
            kind: "reviews".into(),
            ..Default::default()
        }]);
        let err = rule.validate_response(&ctx, &value, &document).unwrap_err();
        assert_eq!(err.key, "include");
    }
}
