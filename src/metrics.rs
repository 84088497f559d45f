//! Prometheus metrics for the cleaner.
//!
//! Exposes:
//! - `telegram_cleaner_workflow_duration_seconds` (histogram)
//! - `telegram_cleaner_workflow_total` (counter with status)
//! - `telegram_cleaner_workflow_inflight` (gauge)
//! - `telegram_cleaner_remote_calls_total` (counter with status: ok, flood, error)
//! - `telegram_cleaner_governor_delay_seconds` (gauge)
//! - `telegram_cleaner_items_total` (counter per workflow and outcome)
//! - process metrics via `process` collector

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use once_cell::sync::Lazy;
use prometheus::process_collector::ProcessCollector;
use prometheus::{
    default_registry, register_gauge, register_histogram_vec, register_int_counter_vec,
    register_int_gauge_vec, Encoder, Gauge, HistogramVec, IntCounterVec, IntGaugeVec,
    TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

static PROCESS_COLLECTOR: Lazy<()> = Lazy::new(|| {
    if let Err(err) = default_registry().register(Box::new(ProcessCollector::for_self())) {
        warn!("Failed to register process collector: {}", err);
    }
});

static WORKFLOW_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    // Exponential buckets from 100ms up to ~7 hours; bulk runs are slow.
    let buckets =
        prometheus::exponential_buckets(0.1, 2.0, 18).expect("failed to create histogram buckets");
    register_histogram_vec!(
        "telegram_cleaner_workflow_duration_seconds",
        "Workflow duration in seconds",
        &["workflow"],
        buckets
    )
    .expect("failed to register workflow duration histogram")
});

static WORKFLOW_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "telegram_cleaner_workflow_total",
        "Total workflow runs by status",
        &["workflow", "status"]
    )
    .expect("failed to register workflow counter")
});

static WORKFLOW_INFLIGHT: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "telegram_cleaner_workflow_inflight",
        "Number of running workflows",
        &["workflow"]
    )
    .expect("failed to register inflight gauge")
});

static REMOTE_CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "telegram_cleaner_remote_calls_total",
        "Governed remote call attempts by status",
        &["status"]
    )
    .expect("failed to register remote call counter")
});

static GOVERNOR_DELAY: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "telegram_cleaner_governor_delay_seconds",
        "Current adaptive backoff delay"
    )
    .expect("failed to register governor delay gauge")
});

static ITEMS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "telegram_cleaner_items_total",
        "Items processed by workflows",
        &["workflow", "outcome"]
    )
    .expect("failed to register item counter")
});

/// Ensure collectors are registered.
fn init_collectors() {
    Lazy::force(&PROCESS_COLLECTOR);
    Lazy::force(&WORKFLOW_DURATION);
    Lazy::force(&WORKFLOW_TOTAL);
    Lazy::force(&WORKFLOW_INFLIGHT);
    Lazy::force(&REMOTE_CALLS);
    Lazy::force(&GOVERNOR_DELAY);
    Lazy::force(&ITEMS);
}

/// Increment inflight gauge for a workflow.
pub fn record_workflow_start(workflow: &'static str) {
    init_collectors();
    WORKFLOW_INFLIGHT.with_label_values(&[workflow]).inc();
}

/// Record workflow completion with duration and status.
pub fn record_workflow_result(workflow: &'static str, duration: Duration, success: bool) {
    init_collectors();
    WORKFLOW_INFLIGHT.with_label_values(&[workflow]).dec();
    WORKFLOW_DURATION
        .with_label_values(&[workflow])
        .observe(duration.as_secs_f64());
    WORKFLOW_TOTAL
        .with_label_values(&[workflow, if success { "ok" } else { "error" }])
        .inc();
}

pub fn record_remote_call(status: &'static str) {
    REMOTE_CALLS.with_label_values(&[status]).inc();
}

pub fn set_governor_delay(seconds: f64) {
    GOVERNOR_DELAY.set(seconds);
}

pub fn record_item(workflow: &'static str, outcome: &'static str) {
    ITEMS.with_label_values(&[workflow, outcome]).inc();
}

fn plain_response(status: StatusCode, body: Full<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
}

async fn metrics_response() -> Result<Response<Full<Bytes>>, Infallible> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", err);
        return Ok(plain_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            Full::from("encode error"),
        ));
    }

    let mut response = plain_response(StatusCode::OK, Full::from(buffer));
    if let Ok(value) = HeaderValue::from_str(encoder.format_type()) {
        response.headers_mut().insert(CONTENT_TYPE, value);
    }
    Ok(response)
}

async fn handle_request(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    match req.uri().path() {
        "/metrics" => metrics_response().await,
        _ => Ok(plain_response(StatusCode::NOT_FOUND, Full::new(Bytes::new()))),
    }
}

async fn serve(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "Prometheus metrics endpoint started");

    loop {
        let (stream, peer) = listener.accept().await?;
        let service = service_fn(handle_request);
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(?peer, "Metrics connection error: {}", err);
            }
        });
    }
}

/// Spawn the metrics HTTP endpoint on the given address.
pub fn spawn_metrics_server(addr: SocketAddr) {
    init_collectors();
    tokio::spawn(async move {
        if let Err(err) = serve(addr).await {
            error!(%addr, "Metrics server failed: {}", err);
        }
    });
}
