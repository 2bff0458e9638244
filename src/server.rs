//! HTTP server adapter seam and an in-memory implementation.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::query::QueryParams;
use crate::routes::{Endpoint, RouteEntry};
use crate::types::Method;

/// Whatever accepts route registrations.
pub trait HttpServer {
    fn route(&mut self, entry: &RouteEntry);
}

/// What the handler chain reads from an incoming request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    pub url_params: BTreeMap<String, String>,
    pub query: QueryParams,
    pub body: Option<Value>,
}

/// Records routes and resolves concrete request paths against them.
#[derive(Debug, Clone, Default)]
pub struct MemoryServer {
    routes: Vec<RouteEntry>,
}

impl MemoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// First route whose template matches `path`, with its captured params.
    pub fn match_route(
        &self,
        method: Method,
        path: &str,
    ) -> Option<(&RouteEntry, BTreeMap<String, String>)> {
        self.routes
            .iter()
            .filter(|entry| entry.method == method)
            .find_map(|entry| match_template(&entry.path, path).map(|params| (entry, params)))
    }

    /// Resolve `uri` (path plus optional query string) into an endpoint and
    /// the request it carries.
    pub fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Option<(Endpoint, Request)> {
        let (path, query) = uri.split_once('?').unwrap_or((uri, ""));
        let (entry, url_params) = self.match_route(method, path)?;
        Some((
            entry.endpoint.clone(),
            Request {
                url_params,
                query: QueryParams::parse(query),
                body,
            },
        ))
    }
}

impl HttpServer for MemoryServer {
    fn route(&mut self, entry: &RouteEntry) {
        self.routes.push(entry.clone());
    }
}

impl fmt::Display for MemoryServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.routes {
            writeln!(f, "{}", entry)?;
        }
        Ok(())
    }
}

fn match_template(template: &str, path: &str) -> Option<BTreeMap<String, String>> {
    let mut params = BTreeMap::new();
    let mut template = template.trim_end_matches('/').split('/');
    let mut path = path.trim_end_matches('/').split('/');
    loop {
        match (template.next(), path.next()) {
            (None, None) => return Some(params),
            (Some(t), Some(p)) => {
                if let Some(name) = t.strip_prefix(':') {
                    if p.is_empty() {
                        return None;
                    }
                    // Percent-encoded bytes that are not UTF-8 match nothing
                    let value = urlencoding::decode(p).ok()?;
                    params.insert(name.to_string(), value.into_owned());
                } else if t != p {
                    return None;
                }
            }
            _ => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_captures_params() {
        let params = match_template("/api/books/:booksID/author", "/api/books/7/author").unwrap();
        assert_eq!(params.get("booksID").map(String::as_str), Some("7"));

        assert!(match_template("/api/books/:booksID", "/api/books").is_none());
        assert!(match_template("/api/books/:booksID", "/api/books/7/author").is_none());
        assert!(match_template("/api/books", "/api/books/").is_some());
        assert!(match_template("/api/books/:booksID", "/api/books//").is_none());
    }

    #[test]
    fn captured_params_are_percent_decoded() {
        let params = match_template("/api/books/:booksID", "/api/books/book%3A1").unwrap();
        assert_eq!(params.get("booksID").map(String::as_str), Some("book:1"));

        let params = match_template("/api/books/:booksID", "/api/books/a+b%20c").unwrap();
        assert_eq!(params.get("booksID").map(String::as_str), Some("a+b c"));

        assert!(match_template("/api/books/:booksID", "/api/books/%FF").is_none());
    }

    #[test]
    fn request_decodes_path_and_query() {
        let mut server = MemoryServer::new();
        server.route(&RouteEntry {
            method: Method::Get,
            path: "/api/books/:booksID".into(),
            version: "0.0.0".into(),
            endpoint: Endpoint {
                router: "api".into(),
                resource: crate::types::ResourceId(0),
                resource_name: "books".into(),
                relationship: None,
                kind: crate::types::RouteKind::ResourceObject,
                action: crate::types::Action::Find,
            },
        });

        let (_, request) = server
            .request(Method::Get, "/api/books/book%3A1?filter%5Bname%5D=Dune", None)
            .unwrap();
        assert_eq!(request.url_params["booksID"], "book:1");
        assert!(request.query.get("filter[name]").is_some());
    }
}
