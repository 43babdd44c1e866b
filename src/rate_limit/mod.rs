use crate::config::RateLimitConfig;
use dashmap::DashMap;
use governor::clock::{ Clock, DefaultClock, Reference };
use log::{ debug, warn };
use std::fmt;
use std::time::Duration;

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Minute,
    Hour,
    Day,
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Window::Minute => write!(f, "minute"),
            Window::Hour => write!(f, "hour"),
            Window::Day => write!(f, "day"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed {
        /// Set when the soft daily limit is exceeded.
        warning: Option<&'static str>,
    },
    Limited {
        window: Window,
        retry_after: Duration,
    },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }

    /// Whole seconds for the Retry-After header, rounded up.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            RateLimitDecision::Limited { retry_after, .. } => {
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                Some(secs.max(1))
            }
            RateLimitDecision::Allowed { .. } => None,
        }
    }
}

/// Requests counted since `window_start`; the count resets once the window
/// has fully elapsed.
#[derive(Debug, Clone, Copy)]
struct FixedWindow<I> {
    count: u32,
    window_start: I,
}

impl<I: Reference> FixedWindow<I> {
    fn new(now: I) -> Self {
        Self { count: 0, window_start: now }
    }

    fn elapsed(&self, now: I) -> Duration {
        Duration::from(now.duration_since(self.window_start))
    }

    fn roll(&mut self, now: I, length: Duration) {
        if self.elapsed(now) >= length {
            self.count = 0;
            self.window_start = now;
        }
    }

    fn retry_after(&self, now: I, length: Duration) -> Duration {
        length.saturating_sub(self.elapsed(now))
    }
}

#[derive(Debug)]
struct ClientWindows<I> {
    minute: FixedWindow<I>,
    hour: FixedWindow<I>,
    day: FixedWindow<I>,
}

impl<I: Reference> ClientWindows<I> {
    fn new(now: I) -> Self {
        Self { minute: FixedWindow::new(now), hour: FixedWindow::new(now), day: FixedWindow::new(now) }
    }
}

/// Per-IP fixed-window limiter with hard minute and hour windows and a soft
/// daily window. Every window is checked before any counter moves, so a
/// rejected attempt consumes nothing.
pub struct ChatRateLimiter<C: Clock = DefaultClock> {
    limits: RateLimitConfig,
    clients: DashMap<String, ClientWindows<C::Instant>>,
    clock: C,
}

impl ChatRateLimiter<DefaultClock> {
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, DefaultClock::default())
    }
}

impl<C: Clock> ChatRateLimiter<C> {
    pub fn with_clock(config: RateLimitConfig, clock: C) -> Self {
        Self { limits: config, clients: DashMap::new(), clock }
    }

    pub fn check_rate_limit(&self, ip: &str) -> RateLimitDecision {
        let now = self.clock.now();
        // the entry guard holds the shard lock for the whole check-and-commit
        let mut entry = self.clients.entry(ip.to_string()).or_insert_with(|| ClientWindows::new(now));
        let windows = entry.value_mut();
        windows.minute.roll(now, MINUTE);
        windows.hour.roll(now, HOUR);
        windows.day.roll(now, DAY);

        if windows.minute.count >= self.limits.per_minute.get() {
            debug!("Minute limit hit for {}", redact_ip(ip));
            return RateLimitDecision::Limited {
                window: Window::Minute,
                retry_after: windows.minute.retry_after(now, MINUTE),
            };
        }
        if windows.hour.count >= self.limits.per_hour.get() {
            debug!("Hourly limit hit for {}", redact_ip(ip));
            return RateLimitDecision::Limited {
                window: Window::Hour,
                retry_after: windows.hour.retry_after(now, HOUR),
            };
        }

        windows.minute.count += 1;
        windows.hour.count += 1;
        windows.day.count = windows.day.count.saturating_add(1);

        if windows.day.count > self.limits.per_day.get() {
            warn!("Daily limit exceeded for IP: {}", redact_ip(ip));
            return RateLimitDecision::Allowed {
                warning: Some("Daily limit reached. Responses may be slower."),
            };
        }

        RateLimitDecision::Allowed { warning: None }
    }

    /// Drops clients whose longest window has elapsed.
    pub fn purge_stale(&self) {
        let now = self.clock.now();
        self.clients.retain(|_, windows| windows.day.elapsed(now) < DAY);
        self.clients.shrink_to_fit();
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }
}

fn redact_ip(ip: &str) -> String {
    let prefix: String = ip.chars().take(8).collect();
    format!("{}...", prefix)
}
