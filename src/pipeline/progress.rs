//! Progress sink collaborator interface with rate throttling.
//!
//! The core publishes `{stage, completed, total, message?}` updates; the
//! embedder renders them. Updates are throttled to at most one per second,
//! except on start, completion, and stage transitions, which always pass
//! through. The most recent suppressed update is flushed on the next stage
//! transition so a stalled consumer still converges.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Collaborator that renders progress somewhere.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn publish(&self, stage: &str, completed: u64, total: u64, message: Option<&str>);
}

/// Default sink that logs through `tracing`.
pub struct TracingProgress;

#[async_trait]
impl ProgressSink for TracingProgress {
    async fn publish(&self, stage: &str, completed: u64, total: u64, message: Option<&str>) {
        tracing::info!(stage, completed, total, message = message.unwrap_or(""), "progress");
    }
}

/// A sink that collects updates, for tests.
#[derive(Default)]
pub struct RecordingProgress {
    pub updates: Mutex<Vec<(String, u64, u64)>>,
}

#[async_trait]
impl ProgressSink for RecordingProgress {
    async fn publish(&self, stage: &str, completed: u64, total: u64, _message: Option<&str>) {
        self.updates
            .lock()
            .await
            .push((stage.to_string(), completed, total));
    }
}

#[derive(Clone)]
struct Update {
    stage: String,
    completed: u64,
    total: u64,
    message: Option<String>,
}

struct ThrottleState {
    last_emit: Option<Instant>,
    last_stage: Option<String>,
    suppressed: Option<Update>,
}

/// Wraps a sink with the one-update-per-second policy.
pub struct ThrottledProgress {
    inner: Arc<dyn ProgressSink>,
    min_interval: Duration,
    state: Mutex<ThrottleState>,
}

impl ThrottledProgress {
    pub fn new(inner: Arc<dyn ProgressSink>) -> Self {
        Self::with_interval(inner, Duration::from_secs(1))
    }

    pub fn with_interval(inner: Arc<dyn ProgressSink>, min_interval: Duration) -> Self {
        Self {
            inner,
            min_interval,
            state: Mutex::new(ThrottleState {
                last_emit: None,
                last_stage: None,
                suppressed: None,
            }),
        }
    }

    async fn emit(&self, state: &mut ThrottleState, update: Update) {
        self.inner
            .publish(
                &update.stage,
                update.completed,
                update.total,
                update.message.as_deref(),
            )
            .await;
        state.last_emit = Some(Instant::now());
        state.last_stage = Some(update.stage);
        state.suppressed = None;
    }
}

#[async_trait]
impl ProgressSink for ThrottledProgress {
    async fn publish(&self, stage: &str, completed: u64, total: u64, message: Option<&str>) {
        let update = Update {
            stage: stage.to_string(),
            completed,
            total,
            message: message.map(String::from),
        };
        let mut state = self.state.lock().await;

        let stage_transition = state.last_stage.as_deref() != Some(stage);
        if stage_transition {
            if let Some(pending) = state.suppressed.take() {
                self.emit(&mut state, pending).await;
            }
            self.emit(&mut state, update).await;
            return;
        }

        let is_start = completed == 0;
        let is_complete = total > 0 && completed >= total;
        let interval_elapsed = state
            .last_emit
            .map(|t| t.elapsed() >= self.min_interval)
            .unwrap_or(true);

        if is_start || is_complete || interval_elapsed {
            self.emit(&mut state, update).await;
        } else {
            state.suppressed = Some(update);
        }
    }
}
