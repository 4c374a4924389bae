// Telemetry module for structured logging, metrics, and tracing

use anyhow::Result;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    trace::{RandomIdGenerator, Sampler, TracerProvider},
    Resource,
};
use std::net::SocketAddr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const SERVICE_NAME: &str = "recording-sync";

/// Initialize structured logging with JSON formatting.
///
/// Called once at process start. When `preconfigured` is true the host
/// environment already owns the global subscriber and nothing is installed.
/// `RUST_LOG` takes precedence over `log_level`.
pub fn init_logging(
    log_level: &str,
    preconfigured: bool,
    tracing_endpoint: Option<&str>,
) -> Result<()> {
    if preconfigured {
        tracing::debug!("Logging already configured by the host, skipping subscriber setup");
        return Ok(());
    }

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    // JSON to stderr; stdout carries the invocation response
    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_target(true)
        .with_writer(std::io::stderr)
        .with_filter(env_filter);

    let registry = tracing_subscriber::registry().with(json_layer);

    if let Some(endpoint) = tracing_endpoint {
        let tracer = init_tracer(endpoint)?;
        let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);
        registry
            .with(telemetry_layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    } else {
        registry
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    }

    tracing::info!(
        log_level = log_level,
        tracing_endpoint = tracing_endpoint,
        "Structured logging initialized"
    );

    Ok(())
}

/// Initialize OpenTelemetry tracer with OTLP exporter
fn init_tracer(endpoint: &str) -> Result<opentelemetry_sdk::trace::Tracer> {
    use opentelemetry_sdk::runtime::Tokio;

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint)
        .build_span_exporter()
        .map_err(|e| anyhow::anyhow!("Failed to build span exporter: {}", e))?;

    let tracer_provider = TracerProvider::builder()
        .with_batch_exporter(exporter, Tokio)
        .with_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(Sampler::AlwaysOn)
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(Resource::new(vec![
                    KeyValue::new("service.name", SERVICE_NAME),
                    KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                ])),
        )
        .build();

    global::set_tracer_provider(tracer_provider.clone());

    Ok(tracer_provider.tracer(SERVICE_NAME))
}

/// Flush remaining spans before the process exits
pub fn shutdown_tracer() {
    global::shutdown_tracer_provider();
}

/// Initialize Prometheus metrics exporter and describe the sync metrics
pub fn init_metrics(metrics_port: u16) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", metrics_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid metrics port: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    describe_counter!(
        "recordings_transferred_total",
        "Total number of recordings copied to object storage"
    );
    describe_counter!(
        "recordings_failed_total",
        "Total number of recordings whose transfer failed"
    );
    describe_counter!("batch_runs_total", "Total number of batch runs by outcome");
    describe_histogram!("batch_duration_seconds", "Duration of batch runs in seconds");

    tracing::info!(metrics_port = metrics_port, "Prometheus metrics exporter initialized");

    Ok(())
}

#[inline]
pub fn record_item_transferred(bucket: &str) {
    counter!("recordings_transferred_total", "bucket" => bucket.to_string()).increment(1);
}

#[inline]
pub fn record_item_failed(kind: &'static str) {
    counter!("recordings_failed_total", "kind" => kind).increment(1);
}

/// Record the end of a batch run; `outcome` is one of
/// `exhausted`, `cutoff_reached`, `stopped_on_failure` or `failed`
#[inline]
pub fn record_batch_finished(outcome: &'static str, duration_seconds: f64) {
    counter!("batch_runs_total", "outcome" => outcome).increment(1);
    histogram!("batch_duration_seconds", "outcome" => outcome).record(duration_seconds);
}
