//! Answer-timeout watches for second legs
//!
//! Each placed second leg gets its own delayed task keyed by the leg id.
//! Whoever takes the entry first (the timer, a timeout or hangup webhook, or
//! the answer webhook) owns the outcome, so the no-answer transition runs at
//! most once per call attempt in this process.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// What to do with the originating leg when the second leg is not answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoAnswer {
    /// Send the caller to the subscriber's voicemail.
    Voicemail { subscriber_id: i64 },
    /// Outbound attempt: hang up the originating leg.
    HangUp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAnswer {
    /// The ringing second leg.
    pub leg_id: String,
    /// The leg that is hearing ringback.
    pub origin_leg: String,
    pub bridge_id: String,
    pub on_no_answer: NoAnswer,
}

struct Watch {
    id: Uuid,
    pending: PendingAnswer,
    token: CancellationToken,
}

#[derive(Clone, Default)]
pub struct AnswerWatches {
    watches: Arc<Mutex<HashMap<String, Watch>>>,
}

impl AnswerWatches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `on_fire` after `delay` unless the watch is taken first.
    pub fn schedule<F, Fut>(&self, pending: PendingAnswer, delay: Duration, on_fire: F)
    where
        F: FnOnce(PendingAnswer) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = Uuid::new_v4();
        let token = CancellationToken::new();
        let leg_id = pending.leg_id.clone();

        let replaced = self.lock().insert(
            leg_id.clone(),
            Watch { id, pending, token: token.clone() },
        );
        if let Some(old) = replaced {
            old.token.cancel();
        }

        let watches = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if let Some(pending) = watches.take_scheduled(&leg_id, id) {
                        tracing::info!("Answer timeout elapsed for leg {}", leg_id);
                        on_fire(pending).await;
                    }
                }
            }
        });
    }

    /// Take the watch on a second leg, cancelling its timer.
    pub fn take(&self, leg_id: &str) -> Option<PendingAnswer> {
        let watch = self.lock().remove(leg_id)?;
        watch.token.cancel();
        Some(watch.pending)
    }

    /// Take the watch whose originating leg is `origin_leg`.
    pub fn take_by_origin(&self, origin_leg: &str) -> Option<PendingAnswer> {
        let mut watches = self.lock();
        let leg_id = watches
            .iter()
            .find(|(_, watch)| watch.pending.origin_leg == origin_leg)
            .map(|(leg_id, _)| leg_id.clone())?;
        let watch = watches.remove(&leg_id)?;
        watch.token.cancel();
        Some(watch.pending)
    }

    #[cfg(test)]
    pub fn is_pending(&self, leg_id: &str) -> bool {
        self.lock().contains_key(leg_id)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn take_scheduled(&self, leg_id: &str, id: Uuid) -> Option<PendingAnswer> {
        let mut watches = self.lock();
        if watches.get(leg_id).map(|watch| watch.id) != Some(id) {
            return None;
        }
        watches.remove(leg_id).map(|watch| watch.pending)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Watch>> {
        self.watches.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
