//! Gateway metrics
//!
//! Recorded through the `metrics` facade; without an installed recorder
//! these are no-ops.
//!
//! - `gateway_requests_total` (counter): label `outcome`
//! - `gateway_request_duration_seconds` (histogram): label `outcome`

/// Record one finished gateway request. `outcome` is `success` or an
/// `UpstreamErrorKind` label.
pub fn record_request(outcome: &'static str, duration_secs: f64) {
    metrics::counter!("gateway_requests_total", "outcome" => outcome).increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "outcome" => outcome)
        .record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_without_recorder_is_a_no_op() {
        record_request("success", 0.05);
        record_request("rate_limited", 0.01);
    }
}
