//! Observability: logging, distributed tracing and metrics.

use opentelemetry_otlp::WithExportConfig;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Initialize the observability stack.
///
/// `RUST_LOG` overrides the configured log level when set.
pub fn init(service_name: &str, config: &ObservabilityConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;

    // Set up OpenTelemetry tracing if endpoint is provided
    let telemetry_layer = match config.otlp_endpoint.as_deref() {
        Some(endpoint) => {
            let tracer = opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(
                    opentelemetry_otlp::new_exporter()
                        .tonic()
                        .with_endpoint(endpoint),
                )
                .with_trace_config(
                    opentelemetry_sdk::trace::config().with_resource(
                        opentelemetry_sdk::Resource::new(vec![opentelemetry::KeyValue::new(
                            "service.name",
                            service_name.to_string(),
                        )]),
                    ),
                )
                .install_batch(opentelemetry_sdk::runtime::Tokio)?;
            Some(tracing_opentelemetry::layer().with_tracer(tracer))
        }
        None => None,
    };

    let json_layer = config.json_logging.then(|| fmt::layer().json());
    let pretty_layer = (!config.json_logging).then(|| fmt::layer().pretty());

    tracing_subscriber::registry()
        .with(filter)
        .with(telemetry_layer)
        .with(json_layer)
        .with(pretty_layer)
        .try_init()?;

    Ok(())
}

/// Shutdown OpenTelemetry.
pub fn shutdown() {
    opentelemetry::global::shutdown_tracer_provider();
}

/// Metrics registry and helpers.
pub mod metrics {
    use metrics::{counter, describe_counter, describe_histogram, histogram};
    use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

    use crate::config::ObservabilityConfig;

    /// Install the Prometheus recorder when metrics are enabled.
    pub fn init_metrics(config: &ObservabilityConfig) -> anyhow::Result<Option<PrometheusHandle>> {
        if !config.metrics_enabled {
            return Ok(None);
        }

        let handle = PrometheusBuilder::new().install_recorder()?;
        register_metrics();
        tracing::info!("Metrics initialized");
        Ok(Some(handle))
    }

    /// Register all metric descriptions.
    pub fn register_metrics() {
        describe_counter!(
            "housing_auth_failures_total",
            "Rejected authentication attempts by reason"
        );
        describe_counter!("housing_logins_total", "Login attempts by outcome");
        describe_counter!(
            "housing_access_decisions_total",
            "Authorization decisions by outcome"
        );
        describe_counter!("housing_errors_total", "Service errors by code and category");
        describe_histogram!(
            "housing_password_hash_seconds",
            "Time spent hashing or verifying a password"
        );
    }

    pub fn record_auth_failure(reason: &'static str) {
        counter!("housing_auth_failures_total", "reason" => reason).increment(1);
    }

    pub fn record_login(outcome: &'static str) {
        counter!("housing_logins_total", "outcome" => outcome).increment(1);
    }

    pub fn record_access_decision(decision: &'static str) {
        counter!("housing_access_decisions_total", "decision" => decision).increment(1);
    }

    pub fn record_password_work(operation: &'static str, seconds: f64) {
        histogram!("housing_password_hash_seconds", "operation" => operation).record(seconds);
    }
}
