use std::net::SocketAddr;

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "salonslot_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "salonslot_query_duration_seconds";

/// Histogram: time spent computing one slot list, in seconds.
pub const SLOT_QUERY_DURATION_SECONDS: &str = "salonslot_slot_query_duration_seconds";

/// Histogram: number of slots returned per query.
pub const SLOTS_RETURNED: &str = "salonslot_slots_returned";

/// Counter: bookings rejected because the time was already taken.
pub const BOOKING_CONFLICTS_TOTAL: &str = "salonslot_booking_conflicts_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "salonslot_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "salonslot_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "salonslot_connections_rejected_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertStylist { .. } => "insert_stylist",
        Command::DeleteStylist { .. } => "delete_stylist",
        Command::InsertWindow { .. } => "insert_schedule",
        Command::DeleteWindow { .. } => "delete_schedule",
        Command::InsertOffering { .. } => "insert_offering",
        Command::DeleteOffering { .. } => "delete_offering",
        Command::InsertAppointment { .. } => "insert_appointment",
        Command::SetAppointmentStatus { .. } => "set_appointment_status",
        Command::DeleteAppointment { .. } => "delete_appointment",
        Command::SelectSlots { .. } => "select_slots",
        Command::SelectStylists => "select_stylists",
        Command::SelectOfferings => "select_offerings",
        Command::SelectSchedules { .. } => "select_schedules",
        Command::SelectAppointments { .. } => "select_appointments",
    }
}
