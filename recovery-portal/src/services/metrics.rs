use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

// Global registry
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

// Metrics
pub static HTTP_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static HTTP_REQUEST_DURATION_SECONDS: OnceLock<HistogramVec> = OnceLock::new();
pub static RECOVERY_ESTABLISH_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static RECOVERY_PASSWORD_UPDATE_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static RECOVERY_REQUEST_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

pub fn init_metrics() -> Result<(), prometheus::Error> {
    let registry = Registry::new();

    let requests_total = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    )?;

    let request_duration = HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        ),
        &["method", "path", "status"],
    )?;

    let establish_total = IntCounterVec::new(
        Opts::new(
            "recovery_establish_total",
            "Recovery session establishment attempts by outcome and winning strategy",
        ),
        &["outcome", "strategy"],
    )?;

    let password_update_total = IntCounterVec::new(
        Opts::new(
            "recovery_password_update_total",
            "Password update submissions by result",
        ),
        &["result"],
    )?;

    let request_total = IntCounterVec::new(
        Opts::new("recovery_request_total", "Recovery email requests by result"),
        &["result"],
    )?;

    registry.register(Box::new(requests_total.clone()))?;
    registry.register(Box::new(request_duration.clone()))?;
    registry.register(Box::new(establish_total.clone()))?;
    registry.register(Box::new(password_update_total.clone()))?;
    registry.register(Box::new(request_total.clone()))?;

    // Initialize globals
    let _ = REGISTRY.set(registry);
    let _ = HTTP_REQUESTS_TOTAL.set(requests_total);
    let _ = HTTP_REQUEST_DURATION_SECONDS.set(request_duration);
    let _ = RECOVERY_ESTABLISH_TOTAL.set(establish_total);
    let _ = RECOVERY_PASSWORD_UPDATE_TOTAL.set(password_update_total);
    let _ = RECOVERY_REQUEST_TOTAL.set(request_total);

    Ok(())
}

// Recording helpers are no-ops until `init_metrics` has run (e.g. in tests).

pub fn record_http_request(method: &str, path: &str, status: u16, seconds: f64) {
    let status = status.to_string();
    if let Some(counter) = HTTP_REQUESTS_TOTAL.get() {
        counter.with_label_values(&[method, path, &status]).inc();
    }
    if let Some(histogram) = HTTP_REQUEST_DURATION_SECONDS.get() {
        histogram
            .with_label_values(&[method, path, &status])
            .observe(seconds);
    }
}

pub fn record_establish(outcome: &str, strategy: &str) {
    if let Some(counter) = RECOVERY_ESTABLISH_TOTAL.get() {
        counter.with_label_values(&[outcome, strategy]).inc();
    }
}

pub fn record_password_update(result: &str) {
    if let Some(counter) = RECOVERY_PASSWORD_UPDATE_TOTAL.get() {
        counter.with_label_values(&[result]).inc();
    }
}

pub fn record_recovery_request(result: &str) {
    if let Some(counter) = RECOVERY_REQUEST_TOTAL.get() {
        counter.with_label_values(&[result]).inc();
    }
}

pub fn get_metrics() -> Result<String, prometheus::Error> {
    let Some(registry) = REGISTRY.get() else {
        return Ok(String::new());
    };

    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
