//! Prometheus metrics for the docwire server.
//!
//! This module provides:
//! - Metrics registry with counters, gauges, and histograms
//! - HTTP server to expose metrics at `/metrics` endpoint

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// Request duration histogram buckets (in seconds).
const DURATION_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Prometheus metrics for the docwire server.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    /// Total connections accepted.
    pub connections_total: Counter,
    /// Currently active connections.
    pub connections_active: Gauge,
    /// Total requests by opcode.
    pub requests_total: CounterVec,
    /// Total commands by canonical name.
    pub commands_total: CounterVec,
    /// Total error replies and recorded errors by error code name.
    pub errors_total: CounterVec,
    /// Request duration histogram by opcode.
    pub request_duration: HistogramVec,
    /// Frames whose body failed to parse.
    pub decode_failures_total: Counter,
    /// Strings currently held by the intern pool.
    pub interned_strings: Gauge,
}

impl Metrics {
    /// Creates a new Metrics instance with all metrics registered.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let connections_total = Counter::with_opts(Opts::new(
            "docwire_connections_total",
            "Total number of connections accepted",
        ))?;
        registry.register(Box::new(connections_total.clone()))?;

        let connections_active = Gauge::with_opts(Opts::new(
            "docwire_connections_active",
            "Number of currently active connections",
        ))?;
        registry.register(Box::new(connections_active.clone()))?;

        let requests_total = CounterVec::new(
            Opts::new("docwire_requests_total", "Total requests by opcode"),
            &["opcode"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let commands_total = CounterVec::new(
            Opts::new("docwire_commands_total", "Total commands by name"),
            &["command"],
        )?;
        registry.register(Box::new(commands_total.clone()))?;

        let errors_total = CounterVec::new(
            Opts::new("docwire_errors_total", "Total errors by error code"),
            &["code"],
        )?;
        registry.register(Box::new(errors_total.clone()))?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "docwire_request_duration_seconds",
                "Request duration in seconds by opcode",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
            &["opcode"],
        )?;
        registry.register(Box::new(request_duration.clone()))?;

        let decode_failures_total = Counter::with_opts(Opts::new(
            "docwire_decode_failures_total",
            "Total frames whose body could not be parsed",
        ))?;
        registry.register(Box::new(decode_failures_total.clone()))?;

        let interned_strings = Gauge::with_opts(Opts::new(
            "docwire_interned_strings",
            "Number of strings held by the intern pool",
        ))?;
        registry.register(Box::new(interned_strings.clone()))?;

        Ok(Self {
            registry,
            connections_total,
            connections_active,
            requests_total,
            commands_total,
            errors_total,
            request_duration,
            decode_failures_total,
            interned_strings,
        })
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<Vec<u8>, prometheus::Error> {
        let mut buffer = Vec::new();
        let metric_families = self.registry.gather();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;
        Ok(buffer)
    }

    /// Returns a reference to the registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

/// Runs the HTTP metrics server.
///
/// The server listens on the given address and serves metrics at `/metrics`.
pub async fn run_metrics_server(
    addr: SocketAddr,
    metrics: Arc<Metrics>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _)) => {
                        let metrics = metrics.clone();
                        tokio::spawn(async move {
                            let io = TokioIo::new(stream);
                            let service = service_fn(move |req| {
                                let metrics = metrics.clone();
                                async move { handle_request(req, metrics).await }
                            });
                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                tracing::debug!("Metrics connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        tracing::error!("Metrics server accept error: {}", e);
                    }
                }
            }
            _ = shutdown.recv() => {
                tracing::info!("Metrics server shutting down");
                break;
            }
        }
    }

    Ok(())
}

fn text_response(status: StatusCode, content_type: &str, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    if let Ok(value) = content_type.parse() {
        response.headers_mut().insert(hyper::header::CONTENT_TYPE, value);
    }
    response
}

/// Handles an HTTP request to the metrics server.
async fn handle_request(
    req: Request<hyper::body::Incoming>,
    metrics: Arc<Metrics>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    Ok(route(req.uri().path(), &metrics))
}

fn route(path: &str, metrics: &Metrics) -> Response<Full<Bytes>> {
    match path {
        "/metrics" => match metrics.encode() {
            Ok(body) => text_response(
                StatusCode::OK,
                "text/plain; version=0.0.4; charset=utf-8",
                body,
            ),
            Err(e) => {
                tracing::warn!("Failed to encode metrics: {}", e);
                text_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "text/plain",
                    e.to_string(),
                )
            }
        },
        "/health" | "/healthz" => text_response(StatusCode::OK, "text/plain", "OK"),
        _ => text_response(StatusCode::NOT_FOUND, "text/plain", "Not Found"),
    }
}
