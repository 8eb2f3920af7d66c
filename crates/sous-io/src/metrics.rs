//! Prometheus metrics for the cooker.
//!
//! Gauges mirror the state mapping; counters track the heater relay and the
//! sample stream.

use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use sous_core::{tags, CookerState, EngineStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use std::thread;
use std::time::Duration;
use tiny_http::{Header, Response, Server};

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn tag_gauge(tag: tags::Tag) -> Gauge {
    let gauge = Gauge::new(tag.metric, tag.help).unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
}

// ============================================================================
// State Metrics
// ============================================================================

pub static SAMPLE_TIME: LazyLock<Gauge> = LazyLock::new(|| tag_gauge(tags::SAMPLE_TIME));
pub static TEMPERATURE_F: LazyLock<Gauge> = LazyLock::new(|| tag_gauge(tags::TEMPERATURE));
pub static TARGET_F: LazyLock<Gauge> = LazyLock::new(|| tag_gauge(tags::TARGET));
pub static HEATER_SETTING: LazyLock<Gauge> = LazyLock::new(|| tag_gauge(tags::SETTING));
pub static PROPORTIONAL: LazyLock<Gauge> = LazyLock::new(|| tag_gauge(tags::PROPORTIONAL));
pub static OFFSET: LazyLock<Gauge> = LazyLock::new(|| tag_gauge(tags::OFFSET));
pub static KP: LazyLock<Gauge> = LazyLock::new(|| tag_gauge(tags::KP));
pub static KI: LazyLock<Gauge> = LazyLock::new(|| tag_gauge(tags::KI));

// ============================================================================
// Heater Metrics
// ============================================================================

/// Relay level (1 = high, 0 = low, -1 = pin not held)
pub static HEATER_LEVEL: LazyLock<IntGauge> = LazyLock::new(|| {
    let gauge = IntGauge::new(
        "sousvide_heater_level",
        "Heater relay level (1=high, 0=low, -1=released)",
    )
    .unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

pub static HEATER_TRANSITIONS: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "sousvide_heater_transitions_total",
        "Heater relay level changes",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

pub static HEATER_WRITE_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "sousvide_heater_write_failures_total",
        "Failed writes to the heater relay pin",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

pub static HEATER_SPECS_APPLIED: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "sousvide_heater_specs_applied_total",
        "Duty cycles taken up by the relay worker",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

// ============================================================================
// Sample Metrics
// ============================================================================

pub static SAMPLES: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "sousvide_samples_total",
        "Temperature samples fed to the controller",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

pub static SAMPLES_REJECTED: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "sousvide_samples_rejected_total",
        "Temperature samples rejected as non-finite",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Copy a state snapshot into the state gauges.
pub fn record_state(state: &CookerState) {
    if let Some(time) = state.sample_time {
        SAMPLE_TIME.set(time);
    }
    if let Some(temperature) = state.temperature {
        TEMPERATURE_F.set(temperature);
    }
    TARGET_F.set(state.target);
    HEATER_SETTING.set(state.setting);
    PROPORTIONAL.set(state.proportional);
    OFFSET.set(state.offset);
    KP.set(state.kp);
    KI.set(state.ki);
}

/// Copy engine status into the heater metrics. Counters only move forward, so
/// the published totals are advanced by the difference.
pub fn record_engine(status: &EngineStatus) {
    HEATER_LEVEL.set(match status.level {
        Some(true) => 1,
        Some(false) => 0,
        None => -1,
    });
    advance(&HEATER_TRANSITIONS, status.transitions);
    advance(&HEATER_WRITE_FAILURES, status.write_failures);
    advance(&HEATER_SPECS_APPLIED, status.specs_applied);
}

pub fn record_samples(total: u64) {
    advance(&SAMPLES, total);
}

pub fn record_samples_rejected(total: u64) {
    advance(&SAMPLES_REJECTED, total);
}

fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

pub fn encode() -> Result<Vec<u8>, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(buffer)
}

// ============================================================================
// Metrics HTTP Server
// ============================================================================

/// Start the metrics HTTP server on the given address.
/// The thread exits once `stop` is set.
pub fn serve_metrics(bind_addr: String, stop: Arc<AtomicBool>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let server = match Server::http(&bind_addr) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to start metrics server on {}: {}", bind_addr, e);
                return;
            }
        };

        tracing::info!("Metrics server listening on http://{}/metrics", bind_addr);

        while !stop.load(Ordering::Relaxed) {
            let request = match server.recv_timeout(Duration::from_millis(200)) {
                Ok(Some(request)) => request,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!("Metrics server receive failed: {}", e);
                    break;
                }
            };

            match request.url() {
                "/metrics" => match encode() {
                    Ok(buffer) => {
                        let mut response = Response::from_data(buffer);
                        if let Ok(header) = Header::from_bytes(
                            &b"Content-Type"[..],
                            &b"text/plain; version=0.0.4"[..],
                        ) {
                            response = response.with_header(header);
                        }
                        let _ = request.respond(response);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to encode metrics: {}", e);
                        let _ = request.respond(
                            Response::from_string("Internal Server Error").with_status_code(500),
                        );
                    }
                },
                "/health" => {
                    let _ = request.respond(Response::from_string("OK"));
                }
                _ => {
                    let _ =
                        request.respond(Response::from_string("Not Found").with_status_code(404));
                }
            }
        }
    })
}

/// Initialize all metrics (forces lazy initialization)
pub fn init_metrics() {
    let _ = SAMPLE_TIME.get();
    let _ = TEMPERATURE_F.get();
    let _ = TARGET_F.get();
    let _ = HEATER_SETTING.get();
    let _ = PROPORTIONAL.get();
    let _ = OFFSET.get();
    let _ = KP.get();
    let _ = KI.get();
    let _ = HEATER_LEVEL.get();
    let _ = HEATER_TRANSITIONS.get();
    let _ = HEATER_WRITE_FAILURES.get();
    let _ = HEATER_SPECS_APPLIED.get();
    let _ = SAMPLES.get();
    let _ = SAMPLES_REJECTED.get();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposition_contains_state_gauges() {
        init_metrics();
        let state = CookerState {
            sample_time: Some(1.0e9),
            temperature: Some(70.0),
            target: 78.0,
            setting: 0.25,
            proportional: 1.6,
            offset: 0.0,
            kp: 0.2,
            ki: 0.004,
        };
        record_state(&state);
        let text = String::from_utf8(encode().unwrap()).unwrap();
        assert!(text.contains(tags::TARGET.metric));
        assert!(text.contains(tags::SETTING.metric));
        assert!(text.contains("sousvide_heater_level"));
    }

    #[test]
    fn counters_follow_totals_without_going_back() {
        let counter = IntCounter::new("test_total", "test").unwrap();
        advance(&counter, 3);
        advance(&counter, 5);
        advance(&counter, 4);
        assert_eq!(counter.get(), 5);
    }

    #[test]
    fn engine_and_sample_totals_reach_the_registry() {
        init_metrics();
        let status = EngineStatus {
            specs_applied: 4,
            transitions: 2,
            ..EngineStatus::default()
        };
        record_engine(&status);
        record_samples(7);
        record_samples(6);
        assert!(HEATER_SPECS_APPLIED.get() >= 4);
        assert!(SAMPLES.get() >= 7);
        let text = String::from_utf8(encode().unwrap()).unwrap();
        assert!(text.contains("sousvide_heater_specs_applied_total"));
        assert!(text.contains("sousvide_samples_total"));
    }
}
