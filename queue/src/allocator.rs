//! Starting-position allocation.
//!
//! Assigns a new session's initial queue position. Two requirements pull
//! against each other: positions must be monotonically related to arrival
//! order on average (later arrivals must not be statistically favored),
//! and a burst of simultaneous arrivals must not land on identical
//! positions, which would make the drain function degenerate and invite
//! gaming. The policy is a deterministic per-arrival spacing derived from
//! event capacity plus independent uniform jitter bounded well below that
//! spacing.

use rand::Rng;

/// Scale constant relating capacity to per-arrival position spacing.
/// A capacity-500 event spaces arrivals ~1000 positions apart.
pub const POSITION_SCALE: u32 = 500_000;

/// Allocate a starting position.
///
/// `arrival_seq` is the per-event arrival sequence number (0 for the first
/// client to enter). The deterministic component grows linearly with it,
/// so the jitter (at most half the spacing) can never reorder arrivals by
/// more than one slot on average.
pub fn allocate<R: Rng + ?Sized>(capacity: u32, arrival_seq: u64, rng: &mut R) -> u32 {
    let spacing = u64::from((POSITION_SCALE / capacity.max(1)).max(2));
    let monotone = spacing.saturating_mul(arrival_seq + 1);
    let jitter = rng.gen_range(0..spacing / 2);

    u32::try_from(monotone.saturating_add(jitter)).unwrap_or(u32::MAX)
}
