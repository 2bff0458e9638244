//! Cascading query and link configuration.
//!
//! Every option is an `Option<T>`: `None` means "no preference" and falls
//! through to the next layer. A resource's settings are mixed with the
//! router's settings and then resolved against the built-in defaults, so the
//! [`ResolvedConfig`] consulted at request time never holds an unset value.
//!
//! | Layer | Source |
//! |-------|--------|
//! | resource | [`ResourceOptions::settings`](crate::ResourceOptions) |
//! | router | [`Router::settings_mut`](crate::Router::settings_mut) |
//! | defaults | [`ResolvedQuery::default`], [`ResolvedLinks::default`] |

use serde::{Deserialize, Serialize};

use crate::types::UrlFormat;

/// Relationship path depth accepted when none is configured.
pub const DEFAULT_NESTING_LIMIT: usize = 2;

fn default_nesting_limit() -> usize {
    DEFAULT_NESTING_LIMIT
}

/// Relationship inclusion switch and its nesting limit.
///
/// Deserialized values go through [`IncludeSetting::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawIncludeSetting")]
pub struct IncludeSetting {
    pub enabled: bool,
    pub nesting_limit: usize,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawIncludeSetting {
    enabled: bool,
    #[serde(default = "default_nesting_limit")]
    nesting_limit: usize,
}

impl From<RawIncludeSetting> for IncludeSetting {
    fn from(raw: RawIncludeSetting) -> Self {
        Self::new(raw.enabled, raw.nesting_limit)
    }
}

impl IncludeSetting {
    /// A zero nesting limit always disables inclusion.
    pub fn new(enabled: bool, nesting_limit: usize) -> Self {
        Self {
            enabled: enabled && nesting_limit > 0,
            nesting_limit,
        }
    }
}

impl Default for IncludeSetting {
    fn default() -> Self {
        Self {
            enabled: false,
            nesting_limit: DEFAULT_NESTING_LIMIT,
        }
    }
}

/// Per-layer query option preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryOptions {
    pub include: Option<IncludeSetting>,
    pub sort: Option<bool>,
    pub page: Option<bool>,
    pub filter: Option<bool>,
    pub fields: Option<bool>,
}

impl QueryOptions {
    /// Enable or disable relationship inclusion.
    ///
    /// When `nesting_limit` is `None` the previously configured limit (or
    /// the default) is kept. A limit of zero forces inclusion off.
    pub fn set_include_related(&mut self, enabled: bool, nesting_limit: Option<usize>) {
        let limit = nesting_limit
            .or(self.include.map(|i| i.nesting_limit))
            .unwrap_or(DEFAULT_NESTING_LIMIT);
        self.include = Some(IncludeSetting::new(enabled, limit));
    }

    pub fn set_sorting(&mut self, enabled: bool) {
        self.sort = Some(enabled);
    }

    pub fn set_pagination(&mut self, enabled: bool) {
        self.page = Some(enabled);
    }

    pub fn set_filtering(&mut self, enabled: bool) {
        self.filter = Some(enabled);
    }

    pub fn set_sparse_fields(&mut self, enabled: bool) {
        self.fields = Some(enabled);
    }

    /// Fill every unset field from `fallback`.
    pub fn mixin(&self, fallback: &QueryOptions) -> QueryOptions {
        QueryOptions {
            include: self.include.or(fallback.include),
            sort: self.sort.or(fallback.sort),
            page: self.page.or(fallback.page),
            filter: self.filter.or(fallback.filter),
            fields: self.fields.or(fallback.fields),
        }
    }

    pub fn resolve(&self) -> ResolvedQuery {
        let defaults = ResolvedQuery::default();
        ResolvedQuery {
            include: self
                .include
                .map(|i| IncludeSetting::new(i.enabled, i.nesting_limit))
                .unwrap_or(defaults.include),
            sort: self.sort.unwrap_or(defaults.sort),
            page: self.page.unwrap_or(defaults.page),
            filter: self.filter.unwrap_or(defaults.filter),
            fields: self.fields.unwrap_or(defaults.fields),
        }
    }
}

/// Per-layer link generation preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LinkOptions {
    pub url_format: Option<UrlFormat>,
    pub self_links: Option<bool>,
    pub relation_links: Option<bool>,
    /// Prefix for generated hyperlinks, e.g. `https://example.com`.
    pub base_url: Option<String>,
}

impl LinkOptions {
    pub fn set_url_format(&mut self, format: UrlFormat) {
        self.url_format = Some(format);
    }

    pub fn set_include_self_links(&mut self, enabled: bool) {
        self.self_links = Some(enabled);
    }

    pub fn set_include_relation_links(&mut self, enabled: bool) {
        self.relation_links = Some(enabled);
    }

    pub fn set_base_url(&mut self, base_url: impl Into<String>) {
        self.base_url = Some(base_url.into());
    }

    /// Fill every unset field from `fallback`.
    pub fn mixin(&self, fallback: &LinkOptions) -> LinkOptions {
        LinkOptions {
            url_format: self.url_format.or(fallback.url_format),
            self_links: self.self_links.or(fallback.self_links),
            relation_links: self.relation_links.or(fallback.relation_links),
            base_url: self.base_url.clone().or_else(|| fallback.base_url.clone()),
        }
    }

    pub fn resolve(&self) -> ResolvedLinks {
        let defaults = ResolvedLinks::default();
        ResolvedLinks {
            url_format: self.url_format.unwrap_or(defaults.url_format),
            self_links: self.self_links.unwrap_or(defaults.self_links),
            relation_links: self.relation_links.unwrap_or(defaults.relation_links),
            base_url: self
                .base_url
                .as_deref()
                .map(|b| b.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
        }
    }
}

/// Query and link preferences for one layer of the cascade.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub query: QueryOptions,
    pub links: LinkOptions,
}

impl Settings {
    pub fn mixin(&self, fallback: &Settings) -> Settings {
        Settings {
            query: self.query.mixin(&fallback.query),
            links: self.links.mixin(&fallback.links),
        }
    }

    pub fn resolve(&self) -> ResolvedConfig {
        ResolvedConfig {
            query: self.query.resolve(),
            links: self.links.resolve(),
        }
    }
}

/// Fully resolved query options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResolvedQuery {
    pub include: IncludeSetting,
    pub sort: bool,
    pub page: bool,
    pub filter: bool,
    pub fields: bool,
}

/// Fully resolved link options.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedLinks {
    pub url_format: UrlFormat,
    pub self_links: bool,
    pub relation_links: bool,
    /// Empty for root-relative links.
    pub base_url: String,
}

/// Effective configuration of one resource on one router.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedConfig {
    pub query: ResolvedQuery,
    pub links: ResolvedLinks,
}

/// Merge resource-level settings over router-level settings.
pub fn cascade(resource: &Settings, router: &Settings) -> ResolvedConfig {
    resource.mixin(router).resolve()
}
