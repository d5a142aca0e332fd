use std::net::SocketAddr;

use crate::wire::Route;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: HTTP requests served. Labels: route, status.
pub const REQUESTS_TOTAL: &str = "roomd_requests_total";

/// Histogram: request handling latency in seconds. Labels: route.
pub const REQUEST_DURATION_SECONDS: &str = "roomd_request_duration_seconds";

/// Counter: finished booking attempts. Labels: outcome (committed, rejected, conflict, failed).
pub const BOOKINGS_TOTAL: &str = "roomd_bookings_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: open TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "roomd_connections_active";

/// Counter: connections accepted.
pub const CONNECTIONS_TOTAL: &str = "roomd_connections_total";

/// Counter: connections dropped at the limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "roomd_connections_rejected_total";

/// Gauge: rooms currently booked.
pub const ROOMS_BOOKED: &str = "roomd_rooms_booked";

/// Histogram: WAL append + fsync duration in seconds.
pub const WAL_APPEND_DURATION_SECONDS: &str = "roomd_wal_append_duration_seconds";

/// Install the Prometheus exporter on `port`. No-op when unset.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    if let Err(e) = metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        tracing::error!("failed to install Prometheus exporter on {addr}: {e}");
        return;
    }
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Short metric label for a route.
pub fn route_label(route: &Route) -> &'static str {
    match route {
        Route::Root => "root",
        Route::BookRooms => "book_rooms",
        Route::GetBookings => "get_bookings",
        Route::ResetBookings => "reset_bookings",
        Route::RandomOccupancy => "random_occupancy",
        Route::Preflight => "preflight",
        Route::MethodNotAllowed => "method_not_allowed",
        Route::NotFound => "not_found",
    }
}
