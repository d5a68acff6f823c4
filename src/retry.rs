//! Exponential backoff for the IRC connection layer
//!
//! Failed connection attempts to an external IRC network are retryable, never
//! fatal. Delays grow exponentially per consecutive failure, are capped, and
//! carry optional jitter to avoid synchronized reconnect storms. Individual
//! transfers never retry automatically; this policy applies to the connection
//! layer only.

use crate::config::RetryConfig;
use rand::Rng;
use std::time::Duration;

/// Delay before reconnect attempt number `attempt` (1-based).
///
/// `attempt` counts consecutive failures since the last successful
/// connection; callers reset it to zero once a connection is established.
pub fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let base = config.initial_delay.as_secs_f64() * config.backoff_multiplier.powi(exponent as i32);
    let capped = base.min(config.max_delay.as_secs_f64());

    let secs = if config.jitter {
        // 50%..150% of the nominal delay
        capped * rand::thread_rng().gen_range(0.5..1.5)
    } else {
        capped
    };

    Duration::from_secs_f64(secs.min(config.max_delay.as_secs_f64()))
}
