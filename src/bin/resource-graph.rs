//! Resource Graph CLI
//!
//! Command-line interface for inspecting manifests: list routes, run a
//! request through the full pipeline against fixture data, and lint.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use resource_graph::{
    lint_source, load_json, load_manifest_auto, Api, BoxError, Controller, ControllerParams,
    ControllerResult, Error, LintStatus, MemoryServer, Method, QueryParams, Resource, Severity,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "resource-graph")]
#[command(about = "Inspect resource manifests, their routes and documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every route a manifest produces
    Routes {
        /// Manifest source: file path or URL (http:// or https://)
        manifest: String,

        /// Output routes as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run one request through the pipeline with fixture controller data
    Get {
        /// Manifest source: file path or URL (http:// or https://)
        manifest: String,

        /// Request path with optional query string, e.g. /api/books/1?include=author
        path: String,

        /// Controller result fixture: {"data": ..., "included": [...]}
        #[arg(long)]
        data: PathBuf,

        /// HTTP method to match
        #[arg(long, default_value = "GET")]
        method: String,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Lint a manifest for errors (syntax, structure, schema graph)
    Lint {
        /// Manifest source: file path or URL (http:// or https://)
        manifest: String,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Suppress progress output, only show errors
        #[arg(long, short)]
        quiet: bool,
    },
}

fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn main() -> ExitCode {
    setup_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Routes { manifest, json } => run_routes(&manifest, json),
        Commands::Get {
            manifest,
            path,
            data,
            method,
            pretty,
        } => run_get(&manifest, &path, &data, &method, pretty),
        Commands::Lint {
            manifest,
            format,
            strict,
            quiet,
        } => run_lint(&manifest, &format, strict, quiet),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn load_api(source: &str) -> Result<Api, u8> {
    let manifest = load_manifest_auto(source).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    manifest.build_api().map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

fn attach(api: &mut Api) -> Result<MemoryServer, u8> {
    let mut server = MemoryServer::new();
    api.attach(&mut server).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    Ok(server)
}

fn run_routes(source: &str, json: bool) -> Result<(), u8> {
    let mut api = load_api(source)?;
    let server = attach(&mut api)?;

    if json {
        let output = serde_json::to_string_pretty(server.routes()).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", output);
    } else {
        print!("{}", server);
    }
    Ok(())
}

/// Answers every action with the same fixture result.
struct FixtureController {
    result: ControllerResult,
}

#[async_trait]
impl Controller for FixtureController {
    async fn find(
        &self,
        _resource: &Resource,
        _params: &ControllerParams,
        _query: &QueryParams,
    ) -> Result<ControllerResult, BoxError> {
        Ok(self.result.clone())
    }

    async fn create(
        &self,
        _resource: &Resource,
        _params: &ControllerParams,
        _query: &QueryParams,
    ) -> Result<ControllerResult, BoxError> {
        Ok(self.result.clone())
    }

    async fn update(
        &self,
        _resource: &Resource,
        _params: &ControllerParams,
        _query: &QueryParams,
    ) -> Result<ControllerResult, BoxError> {
        Ok(self.result.clone())
    }

    async fn remove(
        &self,
        _resource: &Resource,
        _params: &ControllerParams,
        _query: &QueryParams,
    ) -> Result<ControllerResult, BoxError> {
        Ok(self.result.clone())
    }
}

fn load_fixture(path: &Path) -> Result<ControllerResult, u8> {
    let value = load_json(path).map_err(|e| {
        eprintln!("Error loading data: {}", e);
        e.exit_code() as u8
    })?;
    serde_json::from_value(value).map_err(|e| {
        eprintln!("Error: invalid controller result: {}", e);
        2u8
    })
}

fn run_get(source: &str, uri: &str, data: &Path, method: &str, pretty: bool) -> Result<(), u8> {
    let method = Method::parse(method).ok_or_else(|| {
        eprintln!("Error: unknown method '{}'", method);
        2u8
    })?;
    let result = load_fixture(data)?;

    let mut api = load_api(source)?;
    api.set_global_controller(Arc::new(FixtureController { result }));
    let server = attach(&mut api)?;

    let (endpoint, request) = server.request(method, uri, None).ok_or_else(|| {
        eprintln!("Error: no route for {} {}", method, uri);
        1u8
    })?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .map_err(|e| {
            eprintln!("Error starting runtime: {}", e);
            3u8
        })?;

    let document = runtime
        .block_on(api.handle(&endpoint, request))
        .map_err(|e| {
            eprintln!("Error ({}): {}", e.status(), e);
            match e {
                Error::Request(_) => 1u8,
                _ => 2u8,
            }
        })?;

    let output = if pretty {
        serde_json::to_string_pretty(&document)
    } else {
        serde_json::to_string(&document)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;
    println!("{}", output);
    Ok(())
}

fn run_lint(source: &str, format: &str, strict: bool, quiet: bool) -> Result<(), u8> {
    let result = lint_source(source);

    if format == "json" {
        let output = serde_json::to_string_pretty(&result).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", output);
    } else {
        if !quiet {
            println!("Linting {} ...\n", source);
        }

        let status_icon = match result.status {
            LintStatus::Ok => "\x1b[32m✓\x1b[0m",
            LintStatus::Warning => "\x1b[33m⚠\x1b[0m",
            LintStatus::Error => "\x1b[31m✗\x1b[0m",
        };
        if !quiet || result.status != LintStatus::Ok {
            println!("  {} {}", status_icon, source);
        }

        for diag in &result.diagnostics {
            let (color, label) = match diag.severity {
                Severity::Error => ("\x1b[31m", "error"),
                Severity::Warning => ("\x1b[33m", "warning"),
            };
            if !quiet || diag.severity == Severity::Error {
                println!(
                    "    {}{}[{}]\x1b[0m: {} - {}",
                    color, label, diag.code, diag.path, diag.message
                );
            }
        }

        println!();
        if result.is_ok(strict) {
            println!(
                "\x1b[32m✓ passed ({} warnings)\x1b[0m",
                result.warnings
            );
        } else {
            println!(
                "\x1b[31m✗ {} errors, {} warnings\x1b[0m",
                result.errors, result.warnings
            );
        }
    }

    if result.is_ok(strict) {
        Ok(())
    } else {
        Err(1)
    }
}
