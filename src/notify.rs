//! Transient toast and error notifications with auto-expiry.
//!
//! Every notification patches the shared document immediately and schedules
//! one deferred clear. Overlapping calls are last-write-wins for content,
//! and each call bumps a generation counter so a stale timer from an
//! earlier, longer-lived notification cannot clear a newer one — only the
//! timer whose generation is still current performs the clear.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::event::GameEvent;
use crate::store::GameStore;

/// How long a notification stays visible unless replaced.
pub const DEFAULT_NOTIFICATION_TIMEOUT: Duration = Duration::from_millis(4000);

/// Handle for raising toasts and errors against a [`GameStore`].
#[derive(Debug, Clone)]
pub struct Notifier {
    store: GameStore,
    events: mpsc::Sender<GameEvent>,
    generation: Arc<AtomicU64>,
}

impl Notifier {
    pub fn new(store: GameStore, events: mpsc::Sender<GameEvent>) -> Self {
        Self {
            store,
            events,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Show an informational toast for the default timeout.
    pub async fn toast(&self, message: impl Into<String>) {
        self.show(message.into(), false, DEFAULT_NOTIFICATION_TIMEOUT)
            .await;
    }

    /// Show an error toast for the default timeout.
    pub async fn error(&self, message: impl Into<String>) {
        self.show(message.into(), true, DEFAULT_NOTIFICATION_TIMEOUT)
            .await;
    }

    /// Show an informational toast with an explicit timeout.
    pub async fn toast_with_timeout(&self, message: impl Into<String>, timeout: Duration) {
        self.show(message.into(), false, timeout).await;
    }

    /// Show an error toast with an explicit timeout.
    pub async fn error_with_timeout(&self, message: impl Into<String>, timeout: Duration) {
        self.show(message.into(), true, timeout).await;
    }

    async fn show(&self, message: String, is_error: bool, timeout: Duration) {
        // Claim a new generation; any pending clear from an earlier call
        // becomes a no-op.
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        debug!(%message, is_error, ?timeout, "notification shown");
        {
            let message = message.clone();
            self.store
                .update(move |state| {
                    state.notification.toast = message;
                    state.notification.is_error = is_error;
                })
                .await;
        }
        emit(&self.events, GameEvent::Notification { message, is_error });

        let store = self.store.clone();
        let events = self.events.clone();
        let counter = Arc::clone(&self.generation);
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if counter.load(Ordering::SeqCst) != generation {
                // A newer notification owns the slot now.
                return;
            }
            debug!("notification expired");
            store.update(|state| state.notification.clear()).await;
            emit(&events, GameEvent::StateChanged);
        });
    }
}

/// Forward an event without blocking; drop with a warning on backpressure.
fn emit(events: &mpsc::Sender<GameEvent>, event: GameEvent) {
    match events.try_send(event) {
        Ok(()) => {}
        Err(mpsc::error::TrySendError::Full(dropped)) => {
            warn!("event channel full, dropping event: {dropped:?}");
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!("event channel closed, receiver dropped");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    fn notifier() -> (Notifier, GameStore, mpsc::Receiver<GameEvent>) {
        let store = GameStore::new();
        let (tx, rx) = mpsc::channel(16);
        (Notifier::new(store.clone(), tx), store, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn toast_is_visible_then_expires() {
        let (notifier, store, _rx) = notifier();

        notifier
            .toast_with_timeout("Game created!", Duration::from_millis(100))
            .await;

        let state = store.snapshot().await;
        assert_eq!(state.notification.toast, "Game created!");
        assert!(!state.notification.is_error);

        tokio::time::sleep(Duration::from_millis(150)).await;

        let state = store.snapshot().await;
        assert_eq!(state.notification.toast, "");
        assert!(!state.notification.is_error);
    }

    #[tokio::test(start_paused = true)]
    async fn error_sets_error_flag_and_clears_it() {
        let (notifier, store, _rx) = notifier();

        notifier
            .error_with_timeout("Could not connect to Game Server!", Duration::from_millis(50))
            .await;

        assert!(store.snapshot().await.notification.is_error);

        tokio::time::sleep(Duration::from_millis(100)).await;

        let state = store.snapshot().await;
        assert_eq!(state.notification.toast, "");
        assert!(!state.notification.is_error);
    }

    #[tokio::test(start_paused = true)]
    async fn newer_toast_survives_older_stale_timer() {
        let (notifier, store, _rx) = notifier();

        notifier
            .toast_with_timeout("first", Duration::from_millis(100))
            .await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        notifier
            .toast_with_timeout("second", Duration::from_millis(200))
            .await;

        // The first toast's deadline passes; the second must still be shown.
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert_eq!(store.snapshot().await.notification.toast, "second");

        // And the second clears on its own schedule.
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(store.snapshot().await.notification.toast, "");
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_content_is_last_write_wins() {
        let (notifier, store, _rx) = notifier();

        notifier.toast("first").await;
        notifier.error("second").await;

        let state = store.snapshot().await;
        assert_eq!(state.notification.toast, "second");
        assert!(state.notification.is_error);
    }

    #[tokio::test(start_paused = true)]
    async fn full_event_channel_does_not_block_or_panic() {
        let store = GameStore::new();
        let (tx, mut rx) = mpsc::channel(1);
        // Fill the channel so the notification event has nowhere to go.
        tx.try_send(GameEvent::StateChanged).unwrap();
        let notifier = Notifier::new(store.clone(), tx);

        notifier.error("boom").await;

        // The document is still patched even though the event was dropped.
        assert_eq!(store.snapshot().await.notification.toast, "boom");
        assert_eq!(rx.recv().await, Some(GameEvent::StateChanged));
    }

    #[tokio::test(start_paused = true)]
    async fn notification_event_is_emitted() {
        let (notifier, _store, mut rx) = notifier();

        notifier.error("boom").await;

        assert_eq!(
            rx.recv().await,
            Some(GameEvent::Notification {
                message: "boom".into(),
                is_error: true
            })
        );
    }
}
