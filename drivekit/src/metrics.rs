use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

lazy_static! {
    pub static ref SCHEMA_AGREEMENT_CHECKS: IntCounterVec = register_int_counter_vec!(
        "schema_agreement_checks_total",
        "Schema agreement checks by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref SCHEMA_AGREEMENT_DURATION: HistogramVec = register_histogram_vec!(
        "schema_agreement_duration_seconds",
        "Time spent waiting for schema agreement",
        &["outcome"]
    ).unwrap();

    pub static ref REQUESTS: IntCounterVec = register_int_counter_vec!(
        "driver_requests_total",
        "Executed statements by result shape and status",
        &["shape", "status"]
    ).unwrap();

    pub static ref REQUEST_DURATION: HistogramVec = register_histogram_vec!(
        "driver_request_duration_seconds",
        "Statement execution duration in seconds",
        &["shape", "status"]
    ).unwrap();
}

pub fn record_agreement(outcome: &str, duration: f64) {
    SCHEMA_AGREEMENT_CHECKS.with_label_values(&[outcome]).inc();
    SCHEMA_AGREEMENT_DURATION
        .with_label_values(&[outcome])
        .observe(duration);
}

pub fn record_request(shape: &str, success: bool, duration: f64) {
    let status = if success { "success" } else { "failure" };
    REQUESTS.with_label_values(&[shape, status]).inc();
    REQUEST_DURATION
        .with_label_values(&[shape, status])
        .observe(duration);
}

/// Text exposition of everything in the default registry.
pub fn render() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if encoder.encode(&prometheus::gather(), &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_agreement_shows_up_in_render() {
        record_agreement("agreed", 0.01);
        let text = render();
        assert!(text.contains("schema_agreement_checks_total"));
    }
}
