use axum::{body::Body, http::Request};
use color_eyre::Result;
use color_eyre::eyre::Context;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing::Span;
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Shape of the console output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Multi-line, colored output for a terminal
    #[default]
    Pretty,
    /// One line per event, for log collectors
    Compact,
}

fn fmt_layer(format: LogFormat) -> Box<dyn Layer<Registry> + Send + Sync> {
    let layer = tracing_subscriber::fmt::layer().with_target(true);
    match format {
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().with_ansi(false).boxed(),
    }
}

/// Install the global tracing subscriber.
///
/// `log` records are forwarded into tracing as well. When `otlp_endpoint` is
/// set, spans are also exported over OTLP/gRPC and the returned provider must
/// be shut down before exit to flush pending spans.
pub fn init_tracing(
    service_name: &str,
    otlp_endpoint: Option<&str>,
    filter: &str,
    format: LogFormat,
) -> Result<Option<SdkTracerProvider>> {
    let filter_layer = EnvFilter::try_new(filter)
        .wrap_err_with(|| format!("Invalid log filter: {filter}"))?;

    let (telemetry_layer, tracer_provider) = match otlp_endpoint {
        Some(otlp_endpoint) => {
            let otlp_exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(otlp_endpoint)
                .build()
                .wrap_err("Failed to create OTLP span exporter")?;

            let resource = Resource::builder()
                .with_attributes(vec![KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                    service_name.to_string(),
                )])
                .build();

            let tracer_provider = SdkTracerProvider::builder()
                .with_batch_exporter(otlp_exporter)
                .with_resource(resource)
                .build();
            opentelemetry::global::set_tracer_provider(tracer_provider.clone());

            let tracer = opentelemetry::global::tracer(service_name.to_string());
            (
                Some(tracing_opentelemetry::layer().with_tracer(tracer)),
                Some(tracer_provider),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer(format))
        .with(filter_layer)
        .with(telemetry_layer)
        .try_init()
        .wrap_err("Failed to install tracing subscriber")?;

    Ok(tracer_provider)
}

/// Span wrapping one HTTP request.
pub fn http_request_span(request: &Request<Body>) -> Span {
    tracing::info_span!(
        "http_request",
        method = %request.method(),
        path = %request.uri().path(),
    )
}
