//! Prometheus metrics endpoint for observability (bd-v299)
//!
//! Exposes internal metrics in Prometheus text format for integration with
//! monitoring systems like Grafana.
//!
//! # Metrics Exposed
//!
//! ## Gauges (current values)
//! - `run_engine_active_streams`: Current number of active document streams
//!
//! ## Counters (monotonically increasing)
//! - `run_engine_documents_total`: Total documents converted and streamed
//! - `run_engine_lag_events_total`: Total lag events (client fell behind)
//!
//! # Usage
//!
//! Start the metrics server alongside the gRPC server:
//! ```rust,ignore
//! use daq_server::grpc::metrics_service::{start_metrics_server, DaqMetrics};
//!
//! let metrics = DaqMetrics::new();
//! let handle = start_metrics_server(9091, metrics.clone()).await?;
//! ```
//!
//! Then scrape metrics at `http://localhost:9091/metrics`

use lazy_static::lazy_static;
use prometheus::{
    Encoder, IntCounter, IntGauge, Registry, TextEncoder, register_int_counter_with_registry,
    register_int_gauge_with_registry,
};
use std::convert::Infallible;
use std::net::SocketAddr;

lazy_static! {
    /// Global metrics registry for DAQ server
    pub static ref REGISTRY: Registry = Registry::new();
}

/// DAQ server metrics collection
///
/// Thread-safe struct containing all observability metrics.
/// Clone this to share across services.
#[derive(Clone)]
pub struct DaqMetrics {
    /// Current number of active document streams
    pub active_streams: IntGauge,

    /// Total documents converted and sent to clients
    pub documents_total: IntCounter,

    /// Total lag events (clients fell behind broadcast)
    pub lag_events_total: IntCounter,

    /// Total bytes streamed to clients
    pub bytes_streamed: IntCounter,

    /// Current gRPC connections
    pub grpc_connections: IntGauge,

    /// RunEngine state (0=Idle, 1=Running, 2=Paused, 3=Error)
    pub engine_state: IntGauge,
}

impl DaqMetrics {
    /// Create a new metrics collection registered with the global registry
    pub fn new() -> Self {
        Self::with_registry(&REGISTRY)
    }

    /// Create a new metrics collection with a custom registry
    pub fn with_registry(registry: &Registry) -> Self {
        let active_streams = register_int_gauge_with_registry!(
            "run_engine_active_streams",
            "Current number of active document streams",
            registry
        )
        .expect("Failed to create active_streams gauge");

        let documents_total = register_int_counter_with_registry!(
            "run_engine_documents_total",
            "Total documents converted and streamed to clients",
            registry
        )
        .expect("Failed to create documents_total counter");

        let lag_events_total = register_int_counter_with_registry!(
            "run_engine_lag_events_total",
            "Total lag events where clients fell behind broadcast",
            registry
        )
        .expect("Failed to create lag_events_total counter");

        let bytes_streamed = register_int_counter_with_registry!(
            "run_engine_bytes_streamed_total",
            "Total bytes streamed to clients",
            registry
        )
        .expect("Failed to create bytes_streamed counter");

        let grpc_connections = register_int_gauge_with_registry!(
            "daq_server_grpc_connections",
            "Current number of gRPC connections",
            registry
        )
        .expect("Failed to create grpc_connections gauge");

        let engine_state = register_int_gauge_with_registry!(
            "run_engine_state",
            "Current RunEngine state (0=Idle, 1=Running, 2=Paused, 3=Error)",
            registry
        )
        .expect("Failed to create engine_state gauge");

        Self {
            active_streams,
            documents_total,
            lag_events_total,
            bytes_streamed,
            grpc_connections,
            engine_state,
        }
    }

    /// Increment active streams count
    pub fn stream_started(&self) {
        self.active_streams.inc();
    }

    /// Decrement active streams count
    pub fn stream_ended(&self) {
        self.active_streams.dec();
    }

    /// Record a document being sent
    pub fn document_sent(&self) {
        self.documents_total.inc();
    }

    /// Record a lag event
    pub fn lag_occurred(&self) {
        self.lag_events_total.inc();
    }

    /// Set engine state
    pub fn set_engine_state(&self, state: EngineState) {
        self.engine_state.set(state as i64);
    }
}

impl Default for DaqMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Engine state enum for metrics
#[derive(Clone, Copy, Debug)]
#[repr(i64)]
pub enum EngineState {
    Idle = 0,
    Running = 1,
    Paused = 2,
    Error = 3,
}

/// Handle returned by start_metrics_server for cleanup
pub struct MetricsServerHandle {
    _shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

/// Start the Prometheus metrics HTTP server
///
/// Spawns a lightweight HTTP server that exposes metrics at `/metrics` endpoint.
/// Returns a handle that will stop the server when dropped.
///
/// # Arguments
/// * `port` - Port to listen on (default: 9091)
///
/// # Example
/// ```rust,ignore
/// let handle = start_metrics_server(9091).await?;
/// // Server runs in background
/// // Dropping handle stops the server
/// ```
pub async fn start_metrics_server(
    port: u16,
) -> Result<MetricsServerHandle, Box<dyn std::error::Error + Send + Sync>> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    // Create a simple HTTP service
    let make_service = hyper::service::make_service_fn(|_conn| async {
        Ok::<_, Infallible>(hyper::service::service_fn(handle_metrics_request))
    });

    let server = hyper::Server::bind(&addr)
        .serve(make_service)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });

    tracing::info!(
        port = port,
        "Starting Prometheus metrics server at /metrics"
    );

    tokio::spawn(async move {
        if let Err(e) = server.await {
            tracing::error!("Metrics server error: {}", e);
        }
    });

    Ok(MetricsServerHandle {
        _shutdown_tx: shutdown_tx,
    })
}

/// Handle incoming HTTP requests for metrics
async fn handle_metrics_request(
    req: hyper::Request<hyper::Body>,
) -> Result<hyper::Response<hyper::Body>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&hyper::Method::GET, "/metrics") => {
            // Gather and encode metrics
            let encoder = TextEncoder::new();
            let metric_families = REGISTRY.gather();
            let mut buffer = Vec::new();

            match encoder.encode(&metric_families, &mut buffer) {
                Ok(()) => Ok(hyper::Response::builder()
                    .status(200)
                    .header("Content-Type", encoder.format_type())
                    .body(hyper::Body::from(buffer))
                    .unwrap()),
                Err(e) => {
                    tracing::error!("Failed to encode metrics: {}", e);
                    Ok(hyper::Response::builder()
                        .status(500)
                        .body(hyper::Body::from(format!(
                            "Failed to encode metrics: {}",
                            e
                        )))
                        .unwrap())
                }
            }
        }
        (&hyper::Method::GET, "/health") => Ok(hyper::Response::builder()
            .status(200)
            .body(hyper::Body::from("OK"))
            .unwrap()),
        _ => Ok(hyper::Response::builder()
            .status(404)
            .body(hyper::Body::from("Not Found"))
            .unwrap()),
    }
}
