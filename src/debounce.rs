use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Sender half of a debounced action. Cheap to clone.
///
/// The channel holds at most one pending request, so a burst of calls while
/// one is already queued collapses into that one.
#[derive(Clone, Debug)]
pub(crate) struct DebounceTrigger {
    tx: mpsc::Sender<()>,
}

impl DebounceTrigger {
    pub(crate) fn channel() -> (Self, mpsc::Receiver<()>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, rx)
    }

    /// Returns false when the request was absorbed by one already pending.
    pub(crate) fn trigger(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(())) => {
                trace!("refresh already pending, absorbed");
                false
            }
            Err(mpsc::error::TrySendError::Closed(())) => false,
        }
    }
}

/// Run `action` once per burst of triggers, `cooldown` after the first one.
pub(crate) fn spawn_debouncer<F, Fut>(
    mut rx: mpsc::Receiver<()>,
    cooldown: Duration,
    cancel: CancellationToken,
    action: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                req = rx.recv() => {
                    if req.is_none() {
                        break;
                    }
                }
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(cooldown) => {}
            }

            // Requests that landed during the cooldown ride along with this run.
            while rx.try_recv().is_ok() {}

            action().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_debouncer(
        cooldown: Duration,
    ) -> (DebounceTrigger, Arc<AtomicUsize>, CancellationToken) {
        let (trigger, rx) = DebounceTrigger::channel();
        let runs = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();
        let counter = runs.clone();
        spawn_debouncer(rx, cooldown, cancel.clone(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        (trigger, runs, cancel)
    }

    #[tokio::test(start_paused = true)]
    async fn burst_collapses_into_one_run() {
        let (trigger, runs, _cancel) = counting_debouncer(Duration::from_millis(500));

        trigger.trigger();
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.trigger();
        trigger.trigger();
        tokio::time::sleep(Duration::from_secs(2)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_runs_before_cooldown() {
        let (trigger, runs, _cancel) = counting_debouncer(Duration::from_millis(500));

        trigger.trigger();
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn separate_bursts_run_separately() {
        let (trigger, runs, _cancel) = counting_debouncer(Duration::from_millis(500));

        trigger.trigger();
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.trigger();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_debouncer_drops_pending_request() {
        let (trigger, runs, cancel) = counting_debouncer(Duration::from_millis(500));

        trigger.trigger();
        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }
}
