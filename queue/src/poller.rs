//! Resilient status polling.
//!
//! The waiting page polls the status endpoint; this module is the
//! client-side loop that keeps the displayed state sane when the transport
//! is not: transient fetch failures are retried with backoff, a stale
//! response can never move the phase backwards, and between authoritative
//! snapshots the displayed position keeps draining by interpolation so the
//! page never freezes.

use crate::engine::QueueSnapshot;
use crate::error::Result;
use async_trait::async_trait;
use hype_queue_runtime::retry::{RetryPolicy, retry_with_backoff};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Where snapshots come from. Production implementations wrap an HTTP
/// client; tests script the responses.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Fetch the current authoritative snapshot.
    async fn fetch(&self) -> Result<QueueSnapshot>;
}

/// Tunables for the polling loop.
#[derive(Clone, Debug)]
pub struct PollerConfig {
    /// Poll period between successful fetches
    pub interval: Duration,
    /// Backoff policy for failed fetches
    pub retry: RetryPolicy,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            retry: RetryPolicy::default(),
        }
    }
}

/// Polling loop publishing merged snapshots on a watch channel.
pub struct QueuePoller<S> {
    source: Arc<S>,
    config: PollerConfig,
    latest: watch::Sender<Option<QueueSnapshot>>,
}

impl<S: StatusSource> QueuePoller<S> {
    /// Create a poller and the receiver observers subscribe to.
    #[must_use]
    pub fn new(source: Arc<S>, config: PollerConfig) -> (Self, watch::Receiver<Option<QueueSnapshot>>) {
        let (latest, rx) = watch::channel(None);
        (
            Self {
                source,
                config,
                latest,
            },
            rx,
        )
    }

    /// Run the loop until `shutdown` flips to `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let source = Arc::clone(&self.source);
                    let fetched = retry_with_backoff(&self.config.retry, || {
                        let source = Arc::clone(&source);
                        async move { source.fetch().await }
                    })
                    .await;

                    match fetched {
                        Ok(snapshot) => self.publish(snapshot),
                        Err(error) => {
                            // Keep showing the last snapshot; interpolation
                            // carries the drain until the next success.
                            tracing::warn!(%error, "status fetch failed, keeping last snapshot");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    /// Merge an incoming snapshot, refusing phase regressions.
    fn publish(&self, incoming: QueueSnapshot) {
        self.latest.send_modify(|current| match current {
            Some(prev) if incoming.phase < prev.phase => {
                tracing::debug!(
                    prev = %prev.phase,
                    incoming = %incoming.phase,
                    "discarding stale snapshot"
                );
            }
            _ => *current = Some(incoming),
        });
    }
}

/// Interpolate the displayed position `elapsed` after a snapshot was
/// taken, continuing the linear drain locally.
#[must_use]
pub fn interpolate_position(snapshot: &QueueSnapshot, elapsed: Duration) -> u32 {
    if snapshot.position == 0 || snapshot.progress >= 100 {
        return 0;
    }

    // Remaining drain time implied by the snapshot's progress.
    let remaining_ms =
        u64::from(snapshot.duration_secs) * 1000 * u64::from(100 - u32::from(snapshot.progress))
            / 100;
    if remaining_ms == 0 {
        return 0;
    }

    let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    if elapsed_ms >= remaining_ms {
        return 0;
    }

    let left = u128::from(snapshot.position) * u128::from(remaining_ms - elapsed_ms)
        / u128::from(remaining_ms);
    u32::try_from(left).unwrap_or(u32::MAX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::QueueError;
    use crate::types::{QueueCopy, QueuePhase};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn snapshot(phase: QueuePhase, position: u32, progress: u8) -> QueueSnapshot {
        QueueSnapshot {
            queue_required: true,
            phase,
            position,
            progress,
            duration_secs: 45,
            estimated_wait: String::new(),
            near_front: false,
            just_released: None,
            token: None,
            token_expires_at: None,
            copy: QueueCopy::default(),
        }
    }

    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<QueueSnapshot>>>,
    }

    #[async_trait]
    impl StatusSource for ScriptedSource {
        async fn fetch(&self) -> Result<QueueSnapshot> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(QueueError::StateStoreUnavailable("drained".into())))
        }
    }

    #[tokio::test]
    async fn publish_never_regresses_the_phase() {
        let source = Arc::new(ScriptedSource {
            responses: Mutex::new(VecDeque::new()),
        });
        let (poller, rx) = QueuePoller::new(source, PollerConfig::default());

        poller.publish(snapshot(QueuePhase::Releasing, 0, 100));
        // Stale in-flight response arriving after the phase advanced.
        poller.publish(snapshot(QueuePhase::Waiting, 120, 40));

        let current = rx.borrow().clone().unwrap();
        assert_eq!(current.phase, QueuePhase::Releasing);
    }

    #[tokio::test]
    async fn publish_accepts_forward_progress() {
        let source = Arc::new(ScriptedSource {
            responses: Mutex::new(VecDeque::new()),
        });
        let (poller, rx) = QueuePoller::new(source, PollerConfig::default());

        poller.publish(snapshot(QueuePhase::Waiting, 120, 40));
        poller.publish(snapshot(QueuePhase::Waiting, 80, 60));
        poller.publish(snapshot(QueuePhase::Released, 0, 100));

        let current = rx.borrow().clone().unwrap();
        assert_eq!(current.phase, QueuePhase::Released);
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let source = Arc::new(ScriptedSource {
            responses: Mutex::new(VecDeque::from([
                Err(QueueError::StateStoreUnavailable("blip".into())),
                Ok(snapshot(QueuePhase::Waiting, 100, 50)),
            ])),
        });
        let policy = RetryPolicy::builder()
            .initial_delay(Duration::from_millis(1))
            .build();

        let fetched = retry_with_backoff(&policy, || {
            let source = Arc::clone(&source);
            async move { source.fetch().await }
        })
        .await
        .unwrap();

        assert_eq!(fetched.position, 100);
    }

    #[test]
    fn interpolation_continues_the_drain() {
        let snap = snapshot(QueuePhase::Waiting, 600, 50);
        // 50% progress over 45s leaves 22.5s; halfway through that the
        // position should have halved again.
        let midway = interpolate_position(&snap, Duration::from_millis(11_250));
        assert_eq!(midway, 300);
        assert_eq!(interpolate_position(&snap, Duration::from_secs(23)), 0);
        assert_eq!(interpolate_position(&snap, Duration::ZERO), 600);
    }

    #[test]
    fn interpolation_is_already_done_at_full_progress() {
        let snap = snapshot(QueuePhase::Releasing, 0, 100);
        assert_eq!(interpolate_position(&snap, Duration::ZERO), 0);
    }
}
