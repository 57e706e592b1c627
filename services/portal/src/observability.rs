//! Tracing, trace-context propagation and Prometheus metrics for the portal.
//!
//! # Notes
//! Initialization is guarded by `OnceLock`, so tests and the binary can call
//! [`init_observability`] more than once. The OTLP exporter is optional: when
//! it cannot be built the portal logs to stdout only.
use metrics_exporter_prometheus::PrometheusBuilder;
use metrics_exporter_prometheus::PrometheusHandle;
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::propagation::Extractor;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::Resource;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const SERVICE_NAME: &str = "prepdesk-portal";

/// Counter, labelled by `game`.
pub const SCORES_SUBMITTED: &str = "prepdesk_scores_submitted_total";
/// Counter, labelled by `outcome` (`granted`, `no_access`, `rejected`).
pub const SIGNINS: &str = "prepdesk_signins_total";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static OBS_INIT: OnceLock<()> = OnceLock::new();
static PROPAGATOR_INIT: OnceLock<()> = OnceLock::new();

pub fn init_observability(environment: &str) -> PrometheusHandle {
    OBS_INIT.get_or_init(|| {
        global::set_text_map_propagator(
            opentelemetry_sdk::propagation::TraceContextPropagator::new(),
        );

        let provider = build_tracer_provider(environment);
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let fmt_layer = tracing_subscriber::fmt::layer();
        let registry = tracing_subscriber::registry().with(filter).with(fmt_layer);
        if let Some(provider) = provider {
            let tracer = provider.tracer(SERVICE_NAME);
            let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
            let _ = registry.with(otel_layer).try_init();
        } else {
            let _ = registry.try_init();
        }
    });

    let handle = install_metrics_recorder();
    describe_metrics();
    handle
}

fn describe_metrics() {
    metrics::describe_counter!(SCORES_SUBMITTED, "Score submissions accepted, per game");
    metrics::describe_counter!(SIGNINS, "Sign-in attempts, per outcome");
    metrics::describe_gauge!(crate::store::USERS_GAUGE, "Stored user records");
}

fn build_tracer_provider(
    environment: &str,
) -> Option<opentelemetry_sdk::trace::SdkTracerProvider> {
    let resource = Resource::builder_empty()
        .with_attributes(resource_attributes(environment))
        .build();
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()
        .ok()?;
    Some(
        opentelemetry_sdk::trace::SdkTracerProvider::builder()
            .with_batch_exporter(exporter)
            .with_resource(resource)
            .build(),
    )
}

fn resource_attributes(environment: &str) -> Vec<KeyValue> {
    let mut attrs = vec![
        KeyValue::new("service.name", SERVICE_NAME),
        KeyValue::new("deployment.environment", environment.to_string()),
    ];
    if let Ok(value) =
        std::env::var("PREPDESK_SERVICE_INSTANCE_ID").or_else(|_| std::env::var("HOSTNAME"))
    {
        attrs.push(KeyValue::new("service.instance.id", value));
    }
    attrs
}

pub fn trace_context_from_headers(headers: &axum::http::HeaderMap) -> opentelemetry::Context {
    PROPAGATOR_INIT.get_or_init(|| {
        global::set_text_map_propagator(
            opentelemetry_sdk::propagation::TraceContextPropagator::new(),
        );
    });
    global::get_text_map_propagator(|prop| prop.extract(&HeaderMapExtractor(headers)))
}

struct HeaderMapExtractor<'a>(&'a axum::http::HeaderMap);

impl Extractor for HeaderMapExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|name| name.as_str()).collect()
    }
}

/// Serves `/metrics` on its own listener until `shutdown` resolves.
pub async fn serve_metrics<F>(
    handle: PrometheusHandle,
    addr: SocketAddr,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "metrics listening");
    serve_metrics_with_listener(handle, listener, shutdown).await
}

async fn serve_metrics_with_listener<F>(
    handle: PrometheusHandle,
    listener: tokio::net::TcpListener,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = axum::Router::new().route(
        "/metrics",
        axum::routing::get(move || async move { handle.render() }),
    );
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
}

fn install_metrics_recorder() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => handle,
            Err(err) => {
                // Another recorder owns the global slot; render an unattached one.
                tracing::warn!(error = %err, "metrics recorder already installed");
                PrometheusBuilder::new().build_recorder().handle()
            }
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::{TraceContextExt, TraceId};
    use serial_test::serial;
    use std::time::Duration;
    use tokio::sync::oneshot;

    struct EnvGuard {
        key: &'static str,
        prev: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let prev = std::env::var(key).ok();
            unsafe {
                std::env::set_var(key, value);
            }
            Self { key, prev }
        }

        fn unset(key: &'static str) -> Self {
            let prev = std::env::var(key).ok();
            unsafe {
                std::env::remove_var(key);
            }
            Self { key, prev }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.prev {
                Some(value) => unsafe {
                    std::env::set_var(self.key, value);
                },
                None => unsafe {
                    std::env::remove_var(self.key);
                },
            }
        }
    }

    fn attribute(attrs: &[KeyValue], key: &str) -> Option<String> {
        attrs
            .iter()
            .find(|attr| attr.key.as_str() == key)
            .map(|attr| attr.value.to_string())
    }

    #[test]
    #[serial]
    fn resource_attributes_capture_env() {
        let _guard = EnvGuard::set("PREPDESK_SERVICE_INSTANCE_ID", "portal-1");
        let attrs = resource_attributes("staging");
        assert_eq!(attribute(&attrs, "service.name").as_deref(), Some(SERVICE_NAME));
        assert_eq!(
            attribute(&attrs, "deployment.environment").as_deref(),
            Some("staging")
        );
        assert_eq!(
            attribute(&attrs, "service.instance.id").as_deref(),
            Some("portal-1")
        );
    }

    #[test]
    #[serial]
    fn resource_attributes_hostname_fallback() {
        let _g1 = EnvGuard::unset("PREPDESK_SERVICE_INSTANCE_ID");
        let _g2 = EnvGuard::set("HOSTNAME", "host-1");
        let attrs = resource_attributes("development");
        assert_eq!(
            attribute(&attrs, "service.instance.id").as_deref(),
            Some("host-1")
        );
    }

    #[test]
    fn header_extractor_ignores_invalid_utf8() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            "traceparent",
            axum::http::HeaderValue::from_bytes(b"\xFF").unwrap(),
        );
        headers.insert("tracestate", "congo=t61rcWkgMzE".parse().unwrap());
        let extractor = HeaderMapExtractor(&headers);
        assert!(extractor.get("traceparent").is_none());
        assert!(extractor.get("tracestate").is_some());
        assert_eq!(extractor.keys().len(), 2);
    }

    #[test]
    fn trace_context_extracts_span_context() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(
            "traceparent",
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"
                .parse()
                .unwrap(),
        );
        let context = trace_context_from_headers(&headers);
        let binding = context.span();
        let span_ctx = binding.span_context();
        assert!(span_ctx.is_valid());
        assert_eq!(
            span_ctx.trace_id(),
            TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap()
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    #[serial]
    async fn init_observability_is_idempotent() {
        let handle1 = init_observability("test");
        let handle2 = init_observability("test");
        let _ = (handle1.render(), handle2.render());
    }

    #[tokio::test(flavor = "multi_thread")]
    #[serial]
    async fn metrics_listener_renders() {
        let handle = init_observability("test");
        metrics::counter!(SCORES_SUBMITTED, "game" => "math").increment(1);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve_metrics_with_listener(handle, listener, async move {
            let _ = shutdown_rx.await;
        }));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .no_proxy()
            .build()
            .unwrap();
        let body = client
            .get(format!("http://{addr}/metrics"))
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(body.contains(SCORES_SUBMITTED));

        let _ = shutdown_tx.send(());
        let _ = tokio::time::timeout(Duration::from_secs(1), server).await;
    }
}
