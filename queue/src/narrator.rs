//! Status narration: cosmetic feedback derived from position deltas.
//!
//! Everything here is strictly downstream of phase/position changes and
//! never feeds back into the state machine: estimated-wait copy, the
//! transient "N people just got through" message, and the near-front
//! highlight. The core admission logic is testable without it.

use chrono::{DateTime, Duration, Utc};

/// Tunables for the narrator.
#[derive(Clone, Copy, Debug)]
pub struct NarratorConfig {
    /// Position drop between two consecutive observations that counts as
    /// a visible batch getting through.
    pub batch_threshold: u32,
    /// How long the batch message stays on screen.
    pub message_ttl: Duration,
    /// Positions at or below this value flag `near_front`.
    pub near_front_threshold: u32,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            batch_threshold: 25,
            message_ttl: Duration::seconds(4),
            near_front_threshold: 50,
        }
    }
}

/// Cosmetic feedback for one observation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusFeedback {
    /// Human estimated-wait string ("about 2 min", "any moment now")
    pub estimated_wait: String,
    /// Near-front advisory flag (styling only, not a state)
    pub near_front: bool,
    /// "N people just got through", while its display TTL is live
    pub just_released: Option<u32>,
}

/// Per-client narrator state: the previously observed position and any
/// live batch message.
#[derive(Clone, Debug, Default)]
pub struct Narrator {
    last_position: Option<u32>,
    message: Option<BatchMessage>,
}

#[derive(Clone, Debug)]
struct BatchMessage {
    count: u32,
    expires_at: DateTime<Utc>,
}

impl Narrator {
    /// Create a narrator with no prior observation.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_position: None,
            message: None,
        }
    }

    /// Observe the current position and derive display feedback.
    ///
    /// `drain_rate` is positions per second (`initial_position /
    /// duration_secs` for a linear drain).
    pub fn observe(
        &mut self,
        position: u32,
        drain_rate: f64,
        now: DateTime<Utc>,
        config: &NarratorConfig,
    ) -> StatusFeedback {
        if let Some(last) = self.last_position {
            let dropped = last.saturating_sub(position);
            if dropped >= config.batch_threshold {
                self.message = Some(BatchMessage {
                    count: dropped,
                    expires_at: now + config.message_ttl,
                });
            }
        }
        self.last_position = Some(position);

        // Expire the batch message independently of any position change.
        if self.message.as_ref().is_some_and(|m| m.expires_at <= now) {
            self.message = None;
        }

        StatusFeedback {
            estimated_wait: estimate_wait(position, drain_rate),
            near_front: position <= config.near_front_threshold,
            just_released: self.message.as_ref().map(|m| m.count),
        }
    }
}

/// Human-friendly wait estimate from position and drain rate.
#[must_use]
pub fn estimate_wait(position: u32, drain_rate: f64) -> String {
    if position == 0 {
        return "any moment now".to_string();
    }
    if drain_rate <= 0.0 {
        return "estimating...".to_string();
    }

    let secs = (f64::from(position) / drain_rate).ceil();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let secs = secs as u64;

    if secs < 60 {
        format!("about {secs} sec")
    } else {
        format!("about {} min", secs.div_ceil(60))
    }
}
