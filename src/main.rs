#![warn(
    rust_2024_compatibility,
    clippy::all,
    clippy::future_not_send,
    clippy::mod_module_files,
    clippy::needless_pass_by_ref_mut,
    clippy::unused_async
)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use forgegate::config::{self, Config, LoggingConfig};
use forgegate::{forge, server};
use forgegate_adapter::default_version;
use opentelemetry::{KeyValue, global, trace::TracerProvider};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{resource::Resource, trace as sdktrace};
use tracing_subscriber::{
    EnvFilter,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Code registry gateway for GitHub and GitLab repositories")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the registry server
    Serve {
        /// Path to the configuration file
        #[arg(long, default_value = config::DEFAULT_CONFIG_FILE)]
        config: PathBuf,
    },
    /// Perform a health check against a running instance
    Health {
        /// URL of the health endpoint
        #[arg(long, default_value = "http://127.0.0.1:8000/up")]
        url: String,
        /// Timeout in seconds for the request
        #[arg(long, default_value_t = 5)]
        timeout: u64,
    },
    /// List the versions of a package through the configured backend
    Versions {
        /// Path to the configuration file
        #[arg(long, default_value = config::DEFAULT_CONFIG_FILE)]
        config: PathBuf,
        /// Package name
        package: String,
        /// Token passed to the backend, as a registry client would
        #[arg(long, env = "FORGEGATE_TOKEN")]
        token: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve { config } => run_server(config),
        Command::Health { url, timeout } => run_health(url, timeout),
        Command::Versions {
            config,
            package,
            token,
        } => run_versions(config, package, token),
    }
}

fn run_server(config_path: PathBuf) -> Result<()> {
    let config = Config::load(Some(config_path)).context("loading configuration")?;
    config.validate().context("validating configuration")?;
    init_tracing(&config.logging)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.server.workers.max(1))
        .enable_all()
        .build()
        .context("constructing server runtime")?;

    rt.block_on(async move {
        tracing::info!(
            backend = config.backend.kind(),
            workers = config.server.workers,
            redirect_browsers = config.server.redirect_browsers,
            "configuration loaded"
        );

        let registry = forge::build_registry(&config).context("creating registry")?;
        let addr = format!("{}:{}", config.server.host, config.server.port);
        server::serve(registry, &addr).await
    })
}

fn run_health(url: String, timeout: u64) -> Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(timeout))
        .build()
        .context("building health check client")?;

    let response = client
        .get(&url)
        .send()
        .context("sending health check request")?;

    if response.status().is_success() {
        println!("forgegate healthy: {}", response.status());
        Ok(())
    } else {
        bail!("health endpoint returned status {}", response.status());
    }
}

fn run_versions(config_path: PathBuf, package: String, token: Option<String>) -> Result<()> {
    let config = Config::load(Some(config_path)).context("loading configuration")?;
    config.validate().context("validating configuration")?;
    init_tracing(&config.logging)?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("constructing runtime")?;

    let backend = forge::connect_backend(&config)?;
    let versions = rt
        .block_on(backend.get_versions(&package, token.as_deref()))
        .with_context(|| format!("fetching versions of {package}"))?;

    if versions.is_empty() {
        println!("{package} has no versions");
        return Ok(());
    }

    let default = default_version(&versions).map(|version| version.name.clone());
    println!("Versions of {package} ({}):", backend.name());
    for version in &versions {
        let marker = if Some(&version.name) == default.as_ref() {
            " (default)"
        } else {
            ""
        };
        println!("  {}{}", version.name, marker);
    }
    Ok(())
}

/// Installs the global subscriber: log lines on stdout, plus request spans
/// shipped to an OTLP collector when one is configured.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .with_context(|| format!("invalid log filter {:?}", logging.level))?;

    let fmt_layer = if logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().compact().boxed()
    };

    let otel_layer = match logging.otlp_endpoint.as_deref() {
        Some(endpoint) => {
            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_http()
                .with_endpoint(endpoint)
                .build()
                .context("building OTLP span exporter")?;
            let provider = sdktrace::SdkTracerProvider::builder()
                .with_batch_exporter(exporter)
                .with_resource(
                    Resource::builder_empty()
                        .with_attributes([
                            KeyValue::new("service.name", env!("CARGO_PKG_NAME")),
                            KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                        ])
                        .build(),
                )
                .build();
            let tracer = provider.tracer(env!("CARGO_PKG_NAME"));
            global::set_tracer_provider(provider);
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()
        .context("installing tracing subscriber")?;

    if let Some(endpoint) = &logging.otlp_endpoint {
        tracing::info!(endpoint, "exporting request spans over OTLP");
    }
    Ok(())
}
