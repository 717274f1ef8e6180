//! Position drain: the decay function.
//!
//! A session's current position is a pure function of wall-clock time, not
//! a tick counter: `position_at` linearly decays the initial position to
//! zero over the configured duration, anchored to the session's entry
//! time. Backgrounding a tab or device sleep therefore cannot stall or
//! distort progress; re-evaluating after any gap immediately reflects the
//! true elapsed time.

use chrono::{DateTime, Utc};

/// Compute `(position, progress_percent)` for a session at `now`.
///
/// - position is an integer ≥ 0, never negative, clamped to zero at or
///   after `entered_at + duration_secs`
/// - progress is `100 * (initial - position) / initial`
///
/// Integer truncation makes the result non-increasing in `now` for a
/// fixed session. A `now` before `entered_at` (client clock skew) reports
/// the initial position.
#[must_use]
pub fn position_at(
    initial_position: u32,
    entered_at: DateTime<Utc>,
    duration_secs: u32,
    now: DateTime<Utc>,
) -> (u32, u8) {
    if initial_position == 0 {
        return (0, 100);
    }

    let duration_ms = u64::from(duration_secs) * 1000;
    if duration_ms == 0 {
        return (0, 100);
    }

    let elapsed_ms = (now - entered_at).num_milliseconds().max(0).unsigned_abs();
    if elapsed_ms >= duration_ms {
        return (0, 100);
    }

    let remaining_ms = duration_ms - elapsed_ms;
    #[allow(clippy::cast_possible_truncation)]
    let position = (u64::from(initial_position) * remaining_ms / duration_ms) as u32;

    let progress =
        u8::try_from(100 * u64::from(initial_position - position) / u64::from(initial_position))
            .unwrap_or(100);

    (position, progress)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use hype_queue_core::environment::{Clock, SystemClock};

    fn t0() -> DateTime<Utc> {
        SystemClock.now()
    }

    #[test]
    fn starts_at_initial_position() {
        let entered = t0();
        let (position, progress) = position_at(1200, entered, 45, entered);
        assert_eq!(position, 1200);
        assert_eq!(progress, 0);
    }

    #[test]
    fn halfway_reports_half() {
        let entered = t0();
        let (position, progress) =
            position_at(1200, entered, 45, entered + Duration::milliseconds(22_500));
        assert_eq!(position, 600);
        assert_eq!(progress, 50);
    }

    #[test]
    fn exactly_duration_reaches_zero() {
        let entered = t0();
        let (position, progress) = position_at(1200, entered, 45, entered + Duration::seconds(45));
        assert_eq!(position, 0);
        assert_eq!(progress, 100);
    }

    #[test]
    fn clamps_after_duration() {
        let entered = t0();
        let (position, _) = position_at(1200, entered, 45, entered + Duration::hours(2));
        assert_eq!(position, 0);
    }

    #[test]
    fn clock_skew_before_entry_reports_initial() {
        let entered = t0();
        let (position, progress) = position_at(1200, entered, 45, entered - Duration::seconds(30));
        assert_eq!(position, 1200);
        assert_eq!(progress, 0);
    }

    #[test]
    fn zero_initial_position_is_done() {
        let entered = t0();
        assert_eq!(position_at(0, entered, 45, entered), (0, 100));
    }

    #[test]
    fn zero_duration_is_done_immediately() {
        let entered = t0();
        assert_eq!(position_at(1200, entered, 0, entered), (0, 100));
    }
}
