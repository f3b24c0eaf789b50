use crate::config::PollSettings;
use std::time::Duration;

/// Delay before the next status poll, doubling from the initial delay and
/// capped at the configured maximum.
pub fn next_poll_delay(attempt: u32, settings: &PollSettings) -> Duration {
    let multiplier = 2_u64.saturating_pow(attempt);
    let delay = settings.initial_delay_ms.saturating_mul(multiplier);
    Duration::from_millis(delay.min(settings.max_delay_ms))
}
