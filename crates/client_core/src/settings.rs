use std::time::Duration;

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_LOG_DISPLAY_LIMIT: usize = 100;
pub const DEFAULT_LOG_CAPACITY: usize = 1000;
pub const DEFAULT_STOPPED_RUN_STATUS: &str = "stopped";

/// How many log entries the sink keeps once they scroll past the display window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRetention {
    Bounded(usize),
    Unbounded,
}

impl Default for LogRetention {
    fn default() -> Self {
        Self::Bounded(DEFAULT_LOG_CAPACITY)
    }
}

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub backend_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub log_display_limit: usize,
    pub log_retention: LogRetention,
    /// `run_status` label that, with `alarm_code == 0`, ends a polling session.
    pub stopped_run_status: String,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            log_display_limit: DEFAULT_LOG_DISPLAY_LIMIT,
            log_retention: LogRetention::default(),
            stopped_run_status: DEFAULT_STOPPED_RUN_STATUS.into(),
        }
    }
}
