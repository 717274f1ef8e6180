//! Property tests for the position drain.
//!
//! The invariants clients depend on: a position never increases while
//! waiting, never exceeds its allocation, and always reaches zero by the
//! configured duration regardless of starting point.

#![allow(clippy::unwrap_used)]

use chrono::{Duration, TimeZone, Utc};
use hype_queue::drain::position_at;
use proptest::prelude::*;

fn entered() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
}

proptest! {
    #[test]
    fn position_never_increases_over_time(
        initial in 1u32..2_000_000,
        duration_secs in 1u32..86_400,
        t1 in 0i64..200_000_000,
        dt in 0i64..200_000_000,
    ) {
        let entered = entered();
        let earlier = entered + Duration::milliseconds(t1);
        let later = earlier + Duration::milliseconds(dt);

        let (p1, _) = position_at(initial, entered, duration_secs, earlier);
        let (p2, _) = position_at(initial, entered, duration_secs, later);
        prop_assert!(p2 <= p1, "position rose from {p1} to {p2}");
    }

    #[test]
    fn position_is_bounded_by_the_allocation(
        initial in 0u32..2_000_000,
        duration_secs in 0u32..86_400,
        elapsed_ms in 0i64..200_000_000,
    ) {
        let entered = entered();
        let now = entered + Duration::milliseconds(elapsed_ms);
        let (position, progress) = position_at(initial, entered, duration_secs, now);
        prop_assert!(position <= initial);
        prop_assert!(progress <= 100);
    }

    #[test]
    fn position_is_zero_once_the_duration_elapses(
        initial in 1u32..2_000_000,
        duration_secs in 1u32..86_400,
        extra_ms in 0i64..200_000_000,
    ) {
        let entered = entered();
        let now = entered
            + Duration::seconds(i64::from(duration_secs))
            + Duration::milliseconds(extra_ms);
        let (position, progress) = position_at(initial, entered, duration_secs, now);
        prop_assert_eq!(position, 0);
        prop_assert_eq!(progress, 100);
    }

    #[test]
    fn progress_and_position_move_in_opposite_directions(
        initial in 1u32..2_000_000,
        duration_secs in 1u32..86_400,
        t1 in 0i64..100_000_000,
        dt in 1i64..100_000_000,
    ) {
        let entered = entered();
        let earlier = entered + Duration::milliseconds(t1);
        let later = earlier + Duration::milliseconds(dt);

        let (_, g1) = position_at(initial, entered, duration_secs, earlier);
        let (_, g2) = position_at(initial, entered, duration_secs, later);
        prop_assert!(g2 >= g1, "progress regressed from {} to {}", g1, g2);
    }
}
