// Telemetry module for structured logging, metrics, and tracing

use crate::models::{NotificationCategory, NotificationChannel};
use anyhow::Result;
use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    trace::{RandomIdGenerator, Sampler, TracerProvider},
    Resource,
};
use std::net::SocketAddr;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const SERVICE_NAME: &str = "medicine-tracker";

/// Initialize structured logging
///
/// * `log_level` - default filter when `RUST_LOG` is not set
/// * `json` - JSON lines with span context instead of the human-readable format
/// * `tracing_endpoint` - OTLP collector; spans are exported when present
#[tracing::instrument(skip_all)]
pub fn init_logging(log_level: &str, json: bool, tracing_endpoint: Option<&str>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let fmt_layer = if json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(env_filter)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_filter(env_filter)
            .boxed()
    };

    let registry = tracing_subscriber::registry().with(fmt_layer);

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
        json = json,
        tracing_endpoint = tracing_endpoint,
        "Structured logging initialized"
    );

    Ok(())
}

/// OTLP span exporter with batch processing on the Tokio runtime
#[tracing::instrument(skip_all)]
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
    let tracer = tracer_provider.tracer(SERVICE_NAME);

    tracing::info!(endpoint = endpoint, "OpenTelemetry tracer initialized");
    Ok(tracer)
}

/// Flush remaining spans on shutdown
pub fn shutdown_tracer() {
    global::shutdown_tracer_provider();
}

/// Serve Prometheus metrics on a dedicated port (scheduler binary)
#[tracing::instrument(skip_all)]
pub fn init_metrics(metrics_port: u16) -> Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", metrics_port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid metrics port: {}", e))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    describe_metrics();

    tracing::info!(
        metrics_port = metrics_port,
        "Prometheus metrics exporter initialized"
    );
    Ok(())
}

/// Install the global recorder and hand back a handle for rendering
/// (API binary, which serves `/metrics` from its own router)
pub fn install_metrics_recorder() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    describe_metrics();
    Ok(handle)
}

fn describe_metrics() {
    describe_counter!(
        "scheduler_ticks_total",
        "Notification ticks by outcome (skipped, completed, failed)"
    );
    describe_counter!(
        "notifications_sent_total",
        "Reminders delivered, by category and channel"
    );
    describe_counter!(
        "notifications_failed_total",
        "Reminder deliveries that failed, by category and channel"
    );
    describe_counter!(
        "medicine_extractions_total",
        "Package photo extractions by outcome"
    );
}

#[inline]
pub fn record_tick(outcome: &'static str) {
    counter!("scheduler_ticks_total", "outcome" => outcome).increment(1);
}

#[inline]
pub fn record_notification_sent(category: NotificationCategory, channel: NotificationChannel) {
    counter!(
        "notifications_sent_total",
        "category" => category.to_string(),
        "channel" => channel.to_string()
    )
    .increment(1);
}

#[inline]
pub fn record_notification_failed(category: NotificationCategory, channel: NotificationChannel) {
    counter!(
        "notifications_failed_total",
        "category" => category.to_string(),
        "channel" => channel.to_string()
    )
    .increment(1);
}

#[inline]
pub fn record_extraction(outcome: &'static str) {
    counter!("medicine_extractions_total", "outcome" => outcome).increment(1);
}
