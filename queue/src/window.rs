//! Queue window evaluation.
//!
//! Decides, for an arriving client, whether the queue must be shown at all
//! versus sending the client straight to the purchase flow. The check runs
//! server-side against the engine's clock before any session is minted; a
//! client-observed "now" is never authoritative for window boundaries.

use crate::types::{EventQueueConfig, QueueWindow};
use chrono::{DateTime, Utc};

/// Outcome of evaluating the queue window for an arrival.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WindowDecision {
    /// No gating: straight to the purchase flow.
    NoQueue,
    /// The client must pass through the queue.
    MustQueue,
    /// Admin preview: run the full queue cycle regardless of the real
    /// window, resetting any prior released record first.
    ForcedPreview,
}

/// Evaluate the queue window for an arriving client.
///
/// `already_released` is the [`ClientQueueStateStore`](crate::state_store::ClientQueueStateStore)
/// verdict for this (event, client); a released client short-circuits past
/// a live window.
///
/// Rules, in priority order:
/// 1. forced preview override
/// 2. explicit configured window, unless already released
/// 3. auto-after-announcement, unless already released
/// 4. otherwise no queue
#[must_use]
pub fn evaluate(
    config: &EventQueueConfig,
    already_released: bool,
    now: DateTime<Utc>,
) -> WindowDecision {
    if config.forced_preview {
        return WindowDecision::ForcedPreview;
    }

    if !config.enabled {
        return WindowDecision::NoQueue;
    }

    let window_open = match config.window {
        QueueWindow::Disabled => false,
        QueueWindow::Explicit { start, end } => start <= now && now < end,
        QueueWindow::AutoAfterAnnouncement {
            announcement_ends_at,
        } => announcement_ends_at <= now,
    };

    if window_open && !already_released {
        WindowDecision::MustQueue
    } else {
        WindowDecision::NoQueue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QueueCopy;
    use chrono::Duration;

    fn config(window: QueueWindow) -> EventQueueConfig {
        EventQueueConfig {
            enabled: true,
            window,
            duration_secs: 45,
            capacity: 500,
            forced_preview: false,
            near_front_threshold: 50,
            copy: QueueCopy::default(),
        }
    }

    fn now() -> DateTime<Utc> {
        hype_queue_core::environment::Clock::now(
            &hype_queue_core::environment::SystemClock,
        )
    }

    #[test]
    fn inside_explicit_window_must_queue() {
        let t = now();
        let cfg = config(QueueWindow::Explicit {
            start: t - Duration::minutes(1),
            end: t + Duration::minutes(10),
        });
        assert_eq!(evaluate(&cfg, false, t), WindowDecision::MustQueue);
    }

    #[test]
    fn before_window_no_queue() {
        let t = now();
        let cfg = config(QueueWindow::Explicit {
            start: t + Duration::minutes(1),
            end: t + Duration::minutes(10),
        });
        assert_eq!(evaluate(&cfg, false, t), WindowDecision::NoQueue);
    }

    #[test]
    fn window_end_is_exclusive() {
        let t = now();
        let cfg = config(QueueWindow::Explicit {
            start: t - Duration::minutes(10),
            end: t,
        });
        assert_eq!(evaluate(&cfg, false, t), WindowDecision::NoQueue);
    }

    #[test]
    fn released_client_short_circuits_live_window() {
        let t = now();
        let cfg = config(QueueWindow::Explicit {
            start: t - Duration::minutes(1),
            end: t + Duration::minutes(10),
        });
        assert_eq!(evaluate(&cfg, true, t), WindowDecision::NoQueue);
    }

    #[test]
    fn auto_mode_engages_after_announcement() {
        let t = now();
        let cfg = config(QueueWindow::AutoAfterAnnouncement {
            announcement_ends_at: t - Duration::seconds(1),
        });
        assert_eq!(evaluate(&cfg, false, t), WindowDecision::MustQueue);

        let pending = config(QueueWindow::AutoAfterAnnouncement {
            announcement_ends_at: t + Duration::seconds(1),
        });
        assert_eq!(evaluate(&pending, false, t), WindowDecision::NoQueue);
    }

    #[test]
    fn disabled_flag_beats_open_window() {
        let t = now();
        let mut cfg = config(QueueWindow::Explicit {
            start: t - Duration::minutes(1),
            end: t + Duration::minutes(10),
        });
        cfg.enabled = false;
        assert_eq!(evaluate(&cfg, false, t), WindowDecision::NoQueue);
    }

    #[test]
    fn forced_preview_wins_even_when_released() {
        let t = now();
        let mut cfg = config(QueueWindow::Disabled);
        cfg.forced_preview = true;
        assert_eq!(evaluate(&cfg, true, t), WindowDecision::ForcedPreview);
    }
}
