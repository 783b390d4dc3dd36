//! Watch session for a single generation.
//!
//! A session subscribes to the record's status changes, then reads the
//! record. While it is pending, a ticker drives the progress estimator and
//! a `generation_progress` message goes out every tick. The first terminal
//! state ends the session with `generation_completed` or
//! `generation_failed`. One [`CancellationToken`] stops the ticker and
//! releases the subscription together.

use std::sync::Arc;
use std::time::Duration;

use adreel_core::generation::GenerationView;
use adreel_core::job_events::{
    MSG_TYPE_GENERATION_COMPLETED, MSG_TYPE_GENERATION_FAILED, MSG_TYPE_GENERATION_PROGRESS,
};
use adreel_core::progress::{format_elapsed, ProgressEstimator, ProgressSnapshot};
use adreel_core::types::GenerationId;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::engine::GenerationLifecycle;
use crate::notifications::{StatusEvent, StatusNotifier};

/// A message pushed to a watching client.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchMessage {
    Progress {
        generation_id: GenerationId,
        snapshot: ProgressSnapshot,
    },
    Completed {
        generation_id: GenerationId,
        video_url: String,
        percent: f64,
    },
    Failed {
        generation_id: GenerationId,
        error: String,
    },
}

impl WatchMessage {
    fn terminal(generation_id: GenerationId, view: GenerationView, percent: f64) -> Option<Self> {
        match view {
            GenerationView::Completed { video_url } => Some(WatchMessage::Completed {
                generation_id,
                video_url,
                percent,
            }),
            GenerationView::Failed { message } => Some(WatchMessage::Failed {
                generation_id,
                error: message,
            }),
            GenerationView::Pending => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, WatchMessage::Progress { .. })
    }

    /// Wire form sent over the WebSocket.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            WatchMessage::Progress {
                generation_id,
                snapshot,
            } => json!({
                "type": MSG_TYPE_GENERATION_PROGRESS,
                "generation_id": generation_id,
                "percent": snapshot.percent,
                "phase": snapshot.phase,
                "elapsed_secs": snapshot.elapsed_secs,
                "elapsed": format_elapsed(snapshot.elapsed_secs),
            }),
            WatchMessage::Completed {
                generation_id,
                video_url,
                percent,
            } => json!({
                "type": MSG_TYPE_GENERATION_COMPLETED,
                "generation_id": generation_id,
                "video_url": video_url,
                "percent": percent,
            }),
            WatchMessage::Failed {
                generation_id,
                error,
            } => json!({
                "type": MSG_TYPE_GENERATION_FAILED,
                "generation_id": generation_id,
                "error": error,
            }),
        }
    }
}

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// A terminal message was sent.
    Terminal,
    /// The caller cancelled the session.
    Cancelled,
    /// The client channel or the status subscription closed first.
    Disconnected,
}

/// Everything one watch session needs.
pub struct WatchSession {
    pub generation_id: GenerationId,
    pub lifecycle: Arc<GenerationLifecycle>,
    pub notifier: Arc<StatusNotifier>,
    pub tick: Duration,
}

impl WatchSession {
    /// Run until a terminal state, cancellation or disconnect.
    ///
    /// `observer` identifies the client to the notifier (its connection
    /// id). The subscription is released on every exit path.
    pub async fn run(
        self,
        observer: &str,
        out: mpsc::UnboundedSender<WatchMessage>,
        cancel: CancellationToken,
    ) -> SessionEnd {
        let id = self.generation_id;
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let handle = self.notifier.subscribe(id, observer, events_tx).await;

        let end = self.drive(&out, &mut events_rx, &cancel).await;

        self.notifier.unsubscribe(&handle).await;
        tracing::debug!(generation_id = %id, observer, ?end, "Watch session ended");
        end
    }

    async fn drive(
        &self,
        out: &mpsc::UnboundedSender<WatchMessage>,
        events: &mut mpsc::UnboundedReceiver<StatusEvent>,
        cancel: &CancellationToken,
    ) -> SessionEnd {
        let id = self.generation_id;
        let mut estimator = ProgressEstimator::new();

        // Subscribed already, so nothing applied after this read is missed.
        let view = match self.lifecycle.find(id).await {
            Ok(Some(record)) => record.view(),
            Ok(None) => {
                tracing::info!(generation_id = %id, "Watch requested for unknown generation");
                GenerationView::unknown()
            }
            Err(e) => {
                tracing::error!(generation_id = %id, error = %e, "Failed to load generation");
                GenerationView::unknown()
            }
        };
        if view.is_terminal() {
            return finish(out, id, &mut estimator, view);
        }

        let mut ticker = interval_at(Instant::now() + self.tick, self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return SessionEnd::Cancelled,
                event = events.recv() => {
                    let Some(event) = event else {
                        return SessionEnd::Disconnected;
                    };
                    let view = event.generation.view();
                    if view.is_terminal() {
                        return finish(out, id, &mut estimator, view);
                    }
                }
                _ = ticker.tick() => {
                    let snapshot = estimator.tick();
                    if out.send(WatchMessage::Progress { generation_id: id, snapshot }).is_err() {
                        return SessionEnd::Disconnected;
                    }
                }
            }
        }
    }
}

fn finish(
    out: &mpsc::UnboundedSender<WatchMessage>,
    id: GenerationId,
    estimator: &mut ProgressEstimator,
    view: GenerationView,
) -> SessionEnd {
    estimator.settle(&view);
    let percent = estimator.snapshot().percent;
    let Some(message) = WatchMessage::terminal(id, view, percent) else {
        return SessionEnd::Disconnected;
    };
    match out.send(message) {
        Ok(()) => SessionEnd::Terminal,
        Err(_) => SessionEnd::Disconnected,
    }
}
