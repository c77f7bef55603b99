use std::{collections::HashMap, time::Duration};

use color_eyre::{
    eyre::{eyre, Context},
    Result,
};
use opentelemetry_otlp::WithExportConfig;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::{prelude::*, EnvFilter, Registry};
use tracing_tree::HierarchicalLayer;

pub use sentry;

/// Starts Sentry when `SENTRY_DSN` is set. The returned guard flushes
/// pending events on drop, so hold it for the life of the process.
pub fn setup_sentry() -> Option<sentry::ClientInitGuard> {
    let dsn = std::env::var("SENTRY_DSN").ok()?;

    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            traces_sample_rate: 0.5,
            ..Default::default()
        },
    )))
}

const HONEYCOMB_ENDPOINT: &str = "https://api.honeycomb.io/v1/traces";

/// Filter used when `RUST_LOG` is unset: the binary crate and `db` at info,
/// request spans from `tower_http` at debug, everything else at warn.
fn default_directives(crate_name: &str) -> String {
    format!("warn,{crate_name}=info,db=info,tower_http=debug")
}

fn honeycomb_headers(api_key: String, dataset: &str) -> HashMap<String, String> {
    HashMap::from([
        ("x-honeycomb-team".to_string(), api_key),
        ("x-honeycomb-dataset".to_string(), dataset.to_string()),
    ])
}

/// Installs the global subscriber: a hierarchical stdout layer, Sentry
/// breadcrumbs and events, and OTLP export to Honeycomb when
/// `HONEYCOMB_API_KEY` is set.
pub fn setup_tracing(crate_name: &str) -> Result<()> {
    let rust_log =
        std::env::var("RUST_LOG").unwrap_or_else(|_| default_directives(crate_name));

    let env_filter = EnvFilter::builder()
        .parse(&rust_log)
        .wrap_err_with(|| eyre!("Couldn't create env filter from {rust_log}"))?;

    let opentelemetry_layer = if let Ok(honeycomb_key) = std::env::var("HONEYCOMB_API_KEY") {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(
                opentelemetry_otlp::new_exporter()
                    .http()
                    .with_endpoint(HONEYCOMB_ENDPOINT)
                    .with_timeout(Duration::from_secs(3))
                    .with_headers(honeycomb_headers(honeycomb_key, crate_name)),
            )
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .wrap_err("Failed to install the OTLP pipeline")?;

        println!("Honeycomb layer configured");

        Some(OpenTelemetryLayer::new(tracer))
    } else {
        println!("Skipping Honeycomb layer");

        None
    };

    let hierarchical = HierarchicalLayer::default()
        .with_writer(std::io::stdout)
        .with_indent_lines(true)
        .with_indent_amount(2)
        .with_thread_names(true)
        .with_thread_ids(true)
        .with_verbose_exit(true)
        .with_verbose_entry(true)
        .with_targets(true);

    Registry::default()
        .with(hierarchical)
        .with(opentelemetry_layer)
        .with(sentry_tracing::layer())
        .with(env_filter)
        .try_init()?;

    Ok(())
}
