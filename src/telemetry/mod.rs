use crate::config::TelemetryConfig;
use log::error;
use std::error::Error;
use std::sync::atomic::{ AtomicU64, Ordering };
use uuid::Uuid;

/// Side-effect sink for failures nobody else handles.
pub trait ErrorReporter: Send + Sync {
    fn capture(&self, error: &(dyn Error + 'static), context: &[(&str, &str)]);
}

/// Reports sampled failures as structured log records on the `telemetry`
/// target, each tagged with an event id and the deployment environment.
pub struct Telemetry {
    enabled: bool,
    sample_rate: f64,
    environment: String,
    seen: AtomicU64,
    reported: AtomicU64,
}

impl Telemetry {
    pub fn new(config: &TelemetryConfig) -> Self {
        Self {
            enabled: config.enabled,
            sample_rate: config.sample_rate.clamp(0.0, 1.0),
            environment: config.environment.clone(),
            seen: AtomicU64::new(0),
            reported: AtomicU64::new(0),
        }
    }

    pub fn disabled() -> Self {
        Self::new(
            &(TelemetryConfig {
                enabled: false,
                sample_rate: 0.0,
                environment: String::new(),
            })
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn reported_count(&self) -> u64 {
        self.reported.load(Ordering::Relaxed)
    }

    // Deterministic sampling: over n failures, floor(n * rate) are reported.
    fn should_sample(&self) -> bool {
        let n = self.seen.fetch_add(1, Ordering::Relaxed) as f64;
        ((n + 1.0) * self.sample_rate).floor() > (n * self.sample_rate).floor()
    }
}

impl ErrorReporter for Telemetry {
    fn capture(&self, err: &(dyn Error + 'static), context: &[(&str, &str)]) {
        if !self.enabled || !self.should_sample() {
            return;
        }
        self.reported.fetch_add(1, Ordering::Relaxed);

        let mut chain = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            chain.push_str(": ");
            chain.push_str(&cause.to_string());
            source = cause.source();
        }
        let extra: Vec<String> = context
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        error!(
            target: "telemetry",
            "event_id={} environment={} error=\"{}\" {}",
            Uuid::new_v4().simple(),
            self.environment,
            chain,
            extra.join(" ")
        );
    }
}
