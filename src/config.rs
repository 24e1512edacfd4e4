use std::time::Duration;

/// Regular poll period, and the retry period after an unclassified failure.
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(30 * 60);
/// Retry period after the service reported itself unavailable.
pub const DEFAULT_BACKOFF_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_DEBOUNCE_COOLDOWN: Duration = Duration::from_millis(500);
pub const DEFAULT_PUSH_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Label for logs; never written unredacted to diagnostics.
    pub account: String,
    pub update_interval: Duration,
    pub backoff_interval: Duration,
    pub debounce_cooldown: Duration,
    /// Capacity of the push message channel.
    pub push_buffer: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            account: "default".to_string(),
            update_interval: DEFAULT_UPDATE_INTERVAL,
            backoff_interval: DEFAULT_BACKOFF_INTERVAL,
            debounce_cooldown: DEFAULT_DEBOUNCE_COOLDOWN,
            push_buffer: DEFAULT_PUSH_BUFFER,
        }
    }
}
