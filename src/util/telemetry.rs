use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{Protocol, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::util::env::Config;

const DEFAULT_FILTER: &str = "scoreboard_server=debug,tower_http=debug,axum=debug,info";
const EXPORT_TIMEOUT: Duration = Duration::from_secs(5);

pub type TelemetryResult<T> = core::result::Result<T, TelemetryError>;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error(transparent)]
    Exporter(#[from] opentelemetry_otlp::ExporterBuildError),

    #[error(transparent)]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Console logging plus, when a collector is configured, OTLP export of traces, logs and metrics.
#[derive(Debug)]
pub struct Telemetry {
    pub service_name: String,
    pub base_resource: Resource,
    pub collector_url: Option<String>,

    providers: Option<Providers>,
}

#[derive(Debug, Clone)]
struct Providers {
    logger_provider: SdkLoggerProvider,
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
}

impl Telemetry {
    pub fn new(config: &Config) -> TelemetryResult<Telemetry> {
        let service_name = config.service_name.clone();
        let service_version = env!("CARGO_PKG_VERSION");
        let base_resource = base_attrs(&service_name, service_version);

        let providers = match config.otel_endpoint.as_deref() {
            Some(url) => Some(Providers {
                logger_provider: build_logger_provider(url, base_resource.clone())?,
                tracer_provider: build_tracer_provider(url, base_resource.clone())?,
                meter_provider: build_meter_provider(url, base_resource.clone())?,
            }),
            None => None,
        };

        Ok(Self {
            service_name,
            base_resource,
            collector_url: config.otel_endpoint.clone(),
            providers,
        })
    }

    pub fn is_exporting(&self) -> bool {
        self.providers.is_some()
    }

    /// Installs the global subscriber. Fails if one is already installed.
    pub fn register(self) -> TelemetryResult<Self> {
        let trace_layer = self.providers.as_ref().map(|p| {
            global::set_tracer_provider(p.tracer_provider.clone());
            let tracer = p.tracer_provider.tracer(self.service_name.clone());
            tracing_opentelemetry::layer().with_tracer(tracer)
        });
        let log_layer = self
            .providers
            .as_ref()
            .map(|p| OpenTelemetryTracingBridge::new(&p.logger_provider));
        let meter_layer = self
            .providers
            .as_ref()
            .map(|p| tracing_opentelemetry::MetricsLayer::new(p.meter_provider.clone()));

        tracing_subscriber::registry()
            .with(trace_layer)
            .with(log_layer)
            .with(meter_layer)
            .with(env_filter())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_line_number(true),
            )
            .try_init()?;

        tracing::debug!(
            service = %self.service_name,
            collector = ?self.collector_url,
            "telemetry registered"
        );

        Ok(self)
    }

    pub fn shutdown(self) {
        let Some(providers) = self.providers else {
            return;
        };

        if let Err(e) = providers.meter_provider.shutdown() {
            tracing::error!(error = ?e, "error during metering shutdown");
        }

        if let Err(e) = providers.tracer_provider.shutdown() {
            tracing::error!(error = ?e, "error during tracing shutdown");
        }

        // last, so the errors above can still be exported
        if let Err(e) = providers.logger_provider.shutdown() {
            eprintln!("error during logging shutdown: {e:?}");
        }
    }
}

/// `RUST_LOG` when set and valid, otherwise debug output for this crate and the HTTP stack.
fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

fn build_logger_provider(
    collector_url: &str,
    base_resource: Resource,
) -> TelemetryResult<SdkLoggerProvider> {
    let exporter = opentelemetry_otlp::LogExporter::builder()
        .with_tonic()
        .with_protocol(Protocol::Grpc)
        .with_endpoint(collector_url)
        .with_timeout(EXPORT_TIMEOUT)
        .build()?;

    Ok(SdkLoggerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(base_resource)
        .build())
}

fn build_tracer_provider(
    collector_url: &str,
    base_resource: Resource,
) -> TelemetryResult<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_protocol(Protocol::Grpc)
        .with_endpoint(collector_url)
        .with_timeout(EXPORT_TIMEOUT)
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(base_resource)
        .build())
}

fn build_meter_provider(
    collector_url: &str,
    base_resource: Resource,
) -> TelemetryResult<SdkMeterProvider> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_protocol(Protocol::Grpc)
        .with_endpoint(collector_url)
        .with_timeout(EXPORT_TIMEOUT)
        .build()?;

    Ok(SdkMeterProvider::builder()
        .with_periodic_exporter(exporter)
        .with_resource(base_resource)
        .build())
}

fn base_attrs(name: &str, version: &'static str) -> Resource {
    Resource::builder()
        .with_attributes([
            KeyValue::new("service.name", name.to_owned()),
            KeyValue::new("service.version", version),
        ])
        .build()
}
