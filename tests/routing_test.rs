//! Tests for route derivation, configuration cascading and query rules.

use std::sync::Arc;

use resource_graph::{
    parse_include, Api, ConfigError, Error, IncludeRejection, MemoryServer, Method, QueryParams,
    QueryValue, RequestError, ResourceOptions, RouteKind, Router, RuleContext, SchemaSpec,
    Settings, UrlFormat,
};

fn library(api: &mut Api, path: &str) {
    api.resource(
        path,
        "Book",
        SchemaSpec::new().data("name").to_one("author").to_many("reviews"),
        ResourceOptions::default(),
    )
    .unwrap();
    api.resource(
        path,
        "Author",
        SchemaSpec::new().data("name").to_many("books"),
        ResourceOptions::default(),
    )
    .unwrap();
    api.resource(
        path,
        "Review",
        SchemaSpec::new().data("text").to_one("author"),
        ResourceOptions::default(),
    )
    .unwrap();
}

fn paths(api: &Api, resource: &str) -> Vec<String> {
    api.routes()
        .filter(|e| e.endpoint.resource_name == resource)
        .map(|e| format!("{} {}", e.method, e.path))
        .collect()
}

mod routes {
    use super::*;

    #[test]
    fn book_route_table() {
        let mut api = Api::new();
        library(&mut api, "api");
        api.build().unwrap();

        assert_eq!(
            paths(&api, "books"),
            vec![
                "POST /api/books",
                "GET /api/books",
                "GET /api/books/:booksID",
                "PATCH /api/books/:booksID",
                "DELETE /api/books/:booksID",
                "GET /api/books/:booksID/author",
                "GET /api/books/:booksID/relationships/author",
                "POST /api/books/:booksID/relationships/author",
                "PATCH /api/books/:booksID/relationships/author",
                "DELETE /api/books/:booksID/relationships/author",
                "GET /api/books/:booksID/reviews",
                "GET /api/books/:booksID/relationships/reviews",
                "POST /api/books/:booksID/relationships/reviews",
                "PATCH /api/books/:booksID/relationships/reviews",
                "DELETE /api/books/:booksID/relationships/reviews",
            ]
        );
    }

    #[test]
    fn entries_carry_resource_version() {
        let mut api = Api::new();
        api.resource(
            "api",
            "Book",
            SchemaSpec::new().data("name"),
            ResourceOptions::new().version("2.1.0"),
        )
        .unwrap();
        api.resource("api", "Author", SchemaSpec::new(), ResourceOptions::default())
            .unwrap();
        api.build().unwrap();

        for entry in api.routes() {
            let expected = if entry.endpoint.resource_name == "books" {
                "2.1.0"
            } else {
                "0.0.0"
            };
            assert_eq!(entry.version, expected, "{}", entry);
        }
    }

    #[test]
    fn url_format_applies_to_segments() {
        let mut api = Api::new();
        api.router("v1")
            .link_options_mut()
            .set_url_format(UrlFormat::CamelCase);
        api.resource(
            "v1",
            "book_review",
            SchemaSpec::new().to_one("book_author"),
            ResourceOptions::default(),
        )
        .unwrap();
        api.resource("v1", "BookAuthor", SchemaSpec::new(), ResourceOptions::default())
            .unwrap();
        api.build().unwrap();

        let reviews = paths(&api, "book_reviews");
        assert_eq!(reviews[0], "POST /v1/bookReviews");
        assert_eq!(reviews[5], "GET /v1/bookReviews/:book_reviewsID/bookAuthor");
    }

    #[test]
    fn to_one_segment_is_singular_form() {
        let mut api = Api::new();
        api.resource(
            "api",
            "Order",
            SchemaSpec::new().to_one("status").to_many("statuses"),
            ResourceOptions::default(),
        )
        .unwrap();
        api.resource("api", "Status", SchemaSpec::new(), ResourceOptions::default())
            .unwrap();
        api.build().unwrap();

        let orders = paths(&api, "orders");
        assert!(orders.contains(&"GET /api/orders/:ordersID/status".to_string()));
        assert!(orders.contains(&"GET /api/orders/:ordersID/relationships/status".to_string()));
        assert!(orders.contains(&"GET /api/orders/:ordersID/statuses".to_string()));
    }

    #[test]
    fn relationship_to_unknown_resource_fails_build() {
        let mut api = Api::new();
        api.resource(
            "api",
            "Book",
            SchemaSpec::new().to_one("publisher"),
            ResourceOptions::default(),
        )
        .unwrap();
        let err = api.build().unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnresolvedRelationship {
                resource: "books".into(),
                key: "publisher".into(),
                target: "publishers".into(),
            }
        );
        assert!(api.routes().next().is_none());
    }

    #[test]
    fn related_resource_must_share_the_router() {
        let mut api = Api::new();
        let book = api
            .resource(
                "api",
                "Book",
                SchemaSpec::new().data("name").to_one("author"),
                ResourceOptions::default(),
            )
            .unwrap();
        api.resource("api", "Author", SchemaSpec::new().data("name"), ResourceOptions::default())
            .unwrap();
        api.mount("admin", book).unwrap();

        let err = api.build().unwrap_err();
        assert_eq!(
            err,
            ConfigError::RelationshipNotMounted {
                router: "admin".into(),
                resource: "books".into(),
                key: "author".into(),
                target: "authors".into(),
            }
        );
        assert!(api.find_router("admin").unwrap().routes().is_empty());
    }

    #[test]
    fn mounting_twice_is_rejected() {
        let mut api = Api::new();
        let id = api
            .resource("api", "Book", SchemaSpec::new(), ResourceOptions::default())
            .unwrap();
        let err = api.mount("/api/", id).unwrap_err();
        assert!(matches!(err, ConfigError::AlreadyMounted { .. }));
    }

    #[test]
    fn same_resource_on_two_routers() {
        let mut api = Api::new();
        api.add_router(Router::new("public")).unwrap();
        api.router("admin")
            .link_options_mut()
            .set_include_self_links(true);
        library(&mut api, "public");
        for name in ["books", "authors", "reviews"] {
            let id = api.registry().find_by_name(name).unwrap().id();
            api.mount("admin", id).unwrap();
        }
        api.build().unwrap();

        let book = api.registry().find_by_name("Book").unwrap().id();
        let public = api.find_router("public").unwrap();
        let admin = api.find_router("admin").unwrap();
        assert!(!public.state(api.registry(), book).unwrap().config.links.self_links);
        assert!(admin.state(api.registry(), book).unwrap().config.links.self_links);
        assert_eq!(public.routes().len(), admin.routes().len());
        assert!(admin
            .routes()
            .find(Method::Get, "/admin/books/:booksID")
            .is_some());
    }
}

mod registry {
    use super::*;

    #[test]
    fn names_are_canonical() {
        let mut api = Api::new();
        let id = api
            .define("Book", SchemaSpec::new(), ResourceOptions::default())
            .unwrap();
        for name in ["Book", "book", "books", "Books"] {
            assert_eq!(api.registry().find_by_name(name).unwrap().id(), id);
        }
        assert_eq!(
            api.define("books", SchemaSpec::new(), ResourceOptions::default())
                .unwrap_err(),
            ConfigError::DuplicateResource {
                name: "books".into()
            }
        );
    }

    #[test]
    fn reserved_members_are_rejected() {
        for member in ["type", "id", "meta", "links"] {
            let mut api = Api::new();
            let err = api
                .define("Book", SchemaSpec::new().data(member), ResourceOptions::default())
                .unwrap_err();
            assert_eq!(
                err,
                ConfigError::ReservedMember {
                    resource: "books".into(),
                    member: member.into(),
                }
            );
        }
    }
}

mod cascading {
    use super::*;

    #[test]
    fn resource_setting_wins_and_unset_inherits() {
        let mut api = Api::new();
        {
            let router = api.router("api");
            router.query_options_mut().set_sorting(true);
            router.query_options_mut().set_pagination(true);
            router.link_options_mut().set_include_self_links(true);
        }
        let mut settings = Settings::default();
        settings.query.set_sorting(false);
        let id = api
            .resource(
                "api",
                "Book",
                SchemaSpec::new(),
                ResourceOptions::new().settings(settings),
            )
            .unwrap();
        api.build().unwrap();

        let router = api.find_router("api").unwrap();
        let config = &router.state(api.registry(), id).unwrap().config;
        assert!(!config.query.sort);
        assert!(config.query.page);
        assert!(!config.query.filter);
        assert!(config.links.self_links);
    }

    #[test]
    fn rebuild_picks_up_router_changes() {
        let mut api = Api::new();
        let id = api
            .resource("api", "Book", SchemaSpec::new(), ResourceOptions::default())
            .unwrap();
        api.build().unwrap();
        api.router("api").query_options_mut().set_filtering(true);
        api.build().unwrap();

        let router = api.find_router("api").unwrap();
        assert!(router.state(api.registry(), id).unwrap().config.query.filter);
    }
}

mod query_rules {
    use super::*;

    fn built(limit: Option<usize>) -> Api {
        let mut api = Api::new();
        api.router("api")
            .query_options_mut()
            .set_include_related(true, limit);
        library(&mut api, "api");
        api.build().unwrap();
        api
    }

    fn validate(api: &Api, resource: &str, query: &str) -> Result<QueryParams, Error> {
        let id = api.registry().find_by_name(resource).unwrap().id();
        let mut query = QueryParams::parse(query);
        api.validate_query("api", id, &mut query)?;
        Ok(query)
    }

    fn rejection(err: Error) -> IncludeRejection {
        match err {
            Error::Request(RequestError::InvalidInclude { reason, .. }) => reason,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn include_is_replaced_by_paths() {
        let api = built(None);
        let query = validate(&api, "books", "include=author,reviews.author").unwrap();
        let paths = query.include_paths().unwrap();
        assert_eq!(
            *paths,
            vec![
                vec!["author".to_string()],
                vec!["reviews".to_string(), "author".to_string()],
            ]
        );
        assert!(matches!(query.get("include"), Some(QueryValue::Include(_))));
    }

    #[test]
    fn nesting_limit_boundary() {
        let api = built(Some(2));
        assert!(validate(&api, "reviews", "include=author.books").is_ok());
        let err = validate(&api, "books", "include=reviews.author.books").unwrap_err();
        assert_eq!(rejection(err), IncludeRejection::NestingLimit);
    }

    #[test]
    fn self_inclusion_is_rejected() {
        let api = built(None);
        let err = validate(&api, "books", "include=books").unwrap_err();
        assert_eq!(rejection(err), IncludeRejection::SelfInclusion);

        let err = validate(&api, "books", "include=author.books").unwrap_err();
        assert_eq!(rejection(err), IncludeRejection::SelfInclusion);
    }

    #[test]
    fn self_inclusion_among_other_paths() {
        let api = built(None);
        let err = validate(&api, "books", "include=author.books,self").unwrap_err();
        assert_eq!(err.status(), 400);
        assert_eq!(rejection(err), IncludeRejection::SelfInclusion);
    }

    #[test]
    fn one_bad_path_rejects_the_value() {
        let api = built(None);
        let err = validate(&api, "authors", "include=books,publisher").unwrap_err();
        assert_eq!(err.status(), 400);
        assert_eq!(rejection(err), IncludeRejection::UnknownRelationship);

        let err = validate(&api, "authors", "include=books,").unwrap_err();
        assert_eq!(rejection(err), IncludeRejection::EmptyPath);
    }

    #[test]
    fn zero_limit_disables_include() {
        let api = built(Some(0));
        let err = validate(&api, "books", "include=author").unwrap_err();
        assert!(matches!(
            err,
            Error::Request(RequestError::InactiveParameter { .. })
        ));
    }

    #[test]
    fn inactive_and_unknown_parameters() {
        let api = built(None);
        assert!(matches!(
            validate(&api, "books", "sort=-name").unwrap_err(),
            Error::Request(RequestError::InactiveParameter { key }) if key == "sort"
        ));
        assert!(matches!(
            validate(&api, "books", "fields[books]=name").unwrap_err(),
            Error::Request(RequestError::InactiveParameter { .. })
        ));
        assert!(matches!(
            validate(&api, "books", "debug=1").unwrap_err(),
            Error::Request(RequestError::UnknownParameter { key }) if key == "debug"
        ));
    }

    #[test]
    fn repeated_include_uses_cache() {
        let api = built(None);
        let router = api.find_router("api").unwrap();
        let book = api.registry().find_by_name("books").unwrap();
        let ctx = RuleContext {
            registry: api.registry(),
            resource: book,
            cache: router.include_cache(),
        };

        let first = parse_include(&ctx, "author,reviews", 2).unwrap();
        let second = parse_include(&ctx, "author,reviews", 2).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(router.include_cache().walks(), 1);

        parse_include(&ctx, "author", 2).unwrap();
        assert_eq!(router.include_cache().walks(), 2);
        assert_eq!(router.include_cache().len(), 2);
    }

    #[test]
    fn rejected_include_is_not_cached() {
        let api = built(None);
        let router = api.find_router("api").unwrap();
        let book = api.registry().find_by_name("books").unwrap();
        let ctx = RuleContext {
            registry: api.registry(),
            resource: book,
            cache: router.include_cache(),
        };

        assert!(parse_include(&ctx, "publisher", 2).is_err());
        assert!(parse_include(&ctx, "publisher", 2).is_err());
        assert_eq!(router.include_cache().walks(), 2);
        assert!(router.include_cache().is_empty());
    }
}

mod server {
    use super::*;

    #[test]
    fn request_matches_template_and_captures_params() {
        let mut api = Api::new();
        library(&mut api, "api");
        let mut server = MemoryServer::new();
        api.attach(&mut server).unwrap();

        let (endpoint, request) = server
            .request(Method::Get, "/api/books/book:1/author?include=books", None)
            .unwrap();
        assert_eq!(endpoint.kind, RouteKind::RelatedObject);
        assert_eq!(endpoint.relationship.as_deref(), Some("author"));
        assert_eq!(request.url_params["booksID"], "book:1");
        assert_eq!(
            request.query.get("include").and_then(QueryValue::as_raw),
            Some("books")
        );

        assert!(server.request(Method::Patch, "/api/books", None).is_none());
        assert!(server.request(Method::Get, "/api/shelves", None).is_none());
    }

    #[test]
    fn listing_shows_every_route() {
        let mut api = Api::new();
        library(&mut api, "api");
        let mut server = MemoryServer::new();
        api.attach(&mut server).unwrap();

        let listing = server.to_string();
        assert_eq!(listing.lines().count(), server.len());
        assert!(listing.contains("DELETE /api/reviews/:reviewsID/relationships/author (0.0.0)"));
    }
}
