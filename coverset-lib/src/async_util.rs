//! Drive a long-running async task while consuming the events it emits.
//!
//! The crawl reports progress over an unbounded channel; the CLI renders
//! those events while the crawl future runs on the same task.

use std::future::Future;

use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};

/// How long to keep draining after the task has finished. Bounds the wait if
/// a sender clone outlives the task.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Run `task` to completion, calling `on_event` for every event received on
/// `event_rx`, including events still buffered when the task returns.
pub async fn run_with_events<F, E, R>(
    task: F,
    mut event_rx: mpsc::UnboundedReceiver<E>,
    mut on_event: impl FnMut(E),
) -> R
where
    F: Future<Output = R>,
{
    tokio::pin!(task);

    let result = loop {
        tokio::select! {
            r = &mut task => break Some(r),
            event = event_rx.recv() => match event {
                Some(e) => on_event(e),
                None => break None,
            },
        }
    };

    let result = match result {
        Some(r) => r,
        // Every sender dropped while the task was still running
        None => return task.await,
    };

    let deadline = Instant::now() + DRAIN_TIMEOUT;
    loop {
        match tokio::time::timeout_at(deadline, event_rx.recv()).await {
            Ok(Some(e)) => on_event(e),
            Ok(None) => break,
            Err(_) => {
                log::warn!(
                    "run_with_events: gave up draining events after {}s",
                    DRAIN_TIMEOUT.as_secs()
                );
                break;
            }
        }
    }
    result
}
