//! Reconnect backoff for the point stream.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// First reconnect delay.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(100);

/// Reconnect delays never exceed this.
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(5);

/// Delay before reconnect attempt `attempt` (0-based).
///
/// The ceiling doubles per attempt up to `max`; the delay is drawn from the
/// upper half of it, so sensors that lost the actuator together do not all
/// redial at the same instant.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    let ceiling = base.saturating_mul(2u32.saturating_pow(attempt)).min(max);
    spread(ceiling, jitter_fraction())
}

/// Map `fraction` in [0, 1) onto [ceiling / 2, ceiling).
fn spread(ceiling: Duration, fraction: f64) -> Duration {
    let half = ceiling / 2;
    half + half.mul_f64(fraction.clamp(0.0, 1.0))
}

/// Sub-second clock noise. Good enough to spread reconnects.
fn jitter_fraction() -> f64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    f64::from(nanos % 1000) / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_attempt() {
        let delay = calculate_backoff(0, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MAX);
        assert!(delay >= Duration::from_millis(50));
        assert!(delay <= Duration::from_millis(100));
    }

    #[test]
    fn test_ceiling_doubles() {
        let third = calculate_backoff(2, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MAX);
        assert!(third >= Duration::from_millis(200));
        assert!(third <= Duration::from_millis(400));
    }

    #[test]
    fn test_respects_max() {
        let delay = calculate_backoff(30, DEFAULT_BACKOFF_BASE, DEFAULT_BACKOFF_MAX);
        assert!(delay <= DEFAULT_BACKOFF_MAX);
        assert!(delay >= DEFAULT_BACKOFF_MAX / 2);
    }

    #[test]
    fn test_spread_covers_upper_half() {
        let ceiling = Duration::from_millis(800);
        assert_eq!(spread(ceiling, 0.0), Duration::from_millis(400));
        assert_eq!(spread(ceiling, 0.5), Duration::from_millis(600));
        assert!(spread(ceiling, 0.999) < ceiling);
    }
}
