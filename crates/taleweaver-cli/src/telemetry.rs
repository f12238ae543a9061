//! Tracing subscriber and optional OpenTelemetry span export.
//!
//! Logs are JSON on stderr, filtered by `RUST_LOG` (default `warn`); stdout
//! belongs to the story. When an OTLP endpoint is configured, spans are also
//! exported over gRPC.

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{KeyValue, global};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::AppError;

const SERVICE_NAME: &str = "taleweaver";

/// Handle to the installed telemetry pipeline. Call [`Telemetry::shutdown`]
/// before exiting so buffered spans are flushed.
#[derive(Debug)]
pub struct Telemetry {
    provider: Option<SdkTracerProvider>,
}

impl Telemetry {
    /// Installs the global subscriber.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Telemetry` if the OTLP exporter cannot be built or
    /// a global subscriber is already installed.
    pub fn init(otlp_endpoint: Option<&str>) -> Result<Self, AppError> {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let fmt_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr);

        let provider = otlp_endpoint.map(build_provider).transpose()?;
        let otel_layer = provider.as_ref().map(|provider| {
            tracing_opentelemetry::layer().with_tracer(provider.tracer(SERVICE_NAME))
        });

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .with(otel_layer)
            .try_init()
            .map_err(|e| AppError::Telemetry(e.to_string()))?;

        Ok(Self { provider })
    }

    /// Flushes and stops span export, if enabled.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Telemetry` if the exporter fails to flush.
    pub fn shutdown(self) -> Result<(), AppError> {
        match self.provider {
            Some(provider) => provider
                .shutdown()
                .map_err(|e| AppError::Telemetry(e.to_string())),
            None => Ok(()),
        }
    }
}

fn build_provider(endpoint: &str) -> Result<SdkTracerProvider, AppError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| AppError::Telemetry(format!("cannot build OTLP exporter: {e}")))?;

    let resource = Resource::builder()
        .with_service_name(SERVICE_NAME)
        .with_attributes(vec![KeyValue::new(
            "service.version",
            env!("CARGO_PKG_VERSION"),
        )])
        .build();

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(resource)
        .build();
    global::set_tracer_provider(provider.clone());
    Ok(provider)
}
