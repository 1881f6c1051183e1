use reqwest::header::HeaderMap;

/// Seconds before expiry at which the expiry warning is raised.
pub const DEFAULT_WARNING_THRESHOLD_SECS: i64 = 60;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the API, e.g. `http://localhost:3114`. Trailing slashes are ignored.
    pub base_url: String,
    pub warning_threshold_secs: i64,
    /// Countdown period (default 1s).
    pub tick_period: std::time::Duration,
    /// Sent on every request, typically the primary session credential.
    pub default_headers: HeaderMap,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            warning_threshold_secs: DEFAULT_WARNING_THRESHOLD_SECS,
            tick_period: std::time::Duration::from_secs(1),
            default_headers: HeaderMap::new(),
        }
    }

    pub fn with_default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = headers;
        self
    }
}
