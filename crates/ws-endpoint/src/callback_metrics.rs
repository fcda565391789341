//! Callback endpoint counters. No exporter is installed here; whichever
//! recorder the process sets up receives them.

use metrics::counter;

/// Record a hub verification or denial callback
pub fn record_callback(mode: &'static str, outcome: &'static str) {
    counter!(
        "websub_callbacks_total",
        "mode" => mode,
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a stored content update
pub fn record_content_update(bytes: usize) {
    counter!("websub_content_updates_total").increment(1);
    counter!("websub_content_bytes_total").increment(bytes as u64);
}

/// Record a content delivery that was not stored
pub fn record_delivery_rejected(reason: &'static str) {
    counter!(
        "websub_content_deliveries_rejected_total",
        "reason" => reason
    )
    .increment(1);
}
