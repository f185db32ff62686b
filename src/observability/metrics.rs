//! Admission metrics.
//!
//! # Metrics
//! - `connlimit_admission_total` (counter): admission decisions by `id`, `result`
//! - `connlimit_established_total` (counter): recorded connections by `id`
//! - `connlimit_lost_total` (counter): released connections by `id`
//! - `connlimit_rejected_total` (counter): connections dropped by the gated
//!   listener, by `id`

pub const ADMISSION_TOTAL: &str = "connlimit_admission_total";
pub const ESTABLISHED_TOTAL: &str = "connlimit_established_total";
pub const LOST_TOTAL: &str = "connlimit_lost_total";
pub const REJECTED_TOTAL: &str = "connlimit_rejected_total";

/// Count one admission decision (`result` is `allowed` or `denied`).
pub fn record_admission(id: &str, allowed: bool) {
    let result = if allowed { "allowed" } else { "denied" };
    ::metrics::counter!(ADMISSION_TOTAL, "id" => id.to_string(), "result" => result).increment(1);
}

/// Count one recorded connection.
pub fn record_established(id: &str) {
    ::metrics::counter!(ESTABLISHED_TOTAL, "id" => id.to_string()).increment(1);
}

/// Count one released connection.
pub fn record_lost(id: &str) {
    ::metrics::counter!(LOST_TOTAL, "id" => id.to_string()).increment(1);
}

/// Count one peer closed by the gated listener.
pub fn record_rejected(id: &str) {
    ::metrics::counter!(REJECTED_TOTAL, "id" => id.to_string()).increment(1);
}
