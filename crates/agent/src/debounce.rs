//! Message debouncing.
//!
//! Users on chat channels send thoughts as rapid bursts of short messages.
//! The buffer collapses a burst into one logical turn: every new message
//! extends the quiet window, and only a gap of at least the configured delay
//! flushes the aggregated text downstream.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

use totem_core::pacing::BACKLOG_THRESHOLD_MS;

/// One aggregated unit of user input, ready for processing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlushedTurn {
    pub user_id: String,
    /// Buffered texts, space-joined in arrival order.
    pub text: String,
    /// Arrival time of the oldest message in the burst.
    pub oldest_timestamp: DateTime<Utc>,
    pub oldest_message_age_ms: i64,
    /// Set when the oldest message was already stale (> 10 min) at flush.
    pub is_backlog: bool,
}

#[async_trait]
pub trait FlushHandler: Send + Sync {
    async fn on_turn(&self, turn: FlushedTurn);
}

#[derive(Clone, Debug)]
struct BufferedMessage {
    text: String,
    timestamp: DateTime<Utc>,
}

struct PendingBurst {
    messages: Vec<BufferedMessage>,
    /// Bumped on every append; a firing timer only flushes when its captured
    /// generation still matches, so superseded timers can never double-flush.
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

struct BufferInner {
    delay: Duration,
    handler: Arc<dyn FlushHandler>,
    buffers: Mutex<HashMap<String, PendingBurst>>,
}

/// Per-user burst buffer. An owned component: each instance has its own map
/// and timers, nothing is process-global.
///
/// Invariant: at most one `PendingBurst` per user, and the previous timer is
/// always cancelled before a new message extends the window.
#[derive(Clone)]
pub struct DebounceBuffer {
    inner: Arc<BufferInner>,
}

impl DebounceBuffer {
    pub fn new(delay: Duration, handler: Arc<dyn FlushHandler>) -> Self {
        Self { inner: Arc::new(BufferInner { delay, handler, buffers: Mutex::new(HashMap::new()) }) }
    }

    /// Append a message to the user's burst and restart the flush window.
    pub async fn on_message(&self, user_id: &str, text: &str, timestamp: DateTime<Utc>) {
        let mut buffers = self.inner.buffers.lock().await;
        let burst = buffers.entry(user_id.to_owned()).or_insert_with(|| PendingBurst {
            messages: Vec::new(),
            generation: 0,
            timer: None,
        });

        if let Some(previous) = burst.timer.take() {
            previous.abort();
        }
        burst.messages.push(BufferedMessage { text: text.to_owned(), timestamp });
        burst.generation += 1;

        let generation = burst.generation;
        let inner = Arc::clone(&self.inner);
        let user = user_id.to_owned();
        burst.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.delay).await;
            flush_if_current(inner, user, generation).await;
        }));
    }

    /// Drop the user's pending burst without flushing. Used when a session is
    /// cleared; the handler is never invoked for discarded messages.
    pub async fn clear(&self, user_id: &str) {
        let mut buffers = self.inner.buffers.lock().await;
        if let Some(burst) = buffers.remove(user_id) {
            if let Some(timer) = burst.timer {
                timer.abort();
            }
            debug!(user_id, discarded = burst.messages.len(), "cleared pending burst");
        }
    }

    /// Number of users with a pending burst. Test hook for the lifecycle
    /// invariant (entries are destroyed on flush or clear).
    pub async fn pending_users(&self) -> usize {
        self.inner.buffers.lock().await.len()
    }
}

async fn flush_if_current(inner: Arc<BufferInner>, user_id: String, generation: u64) {
    let burst = {
        let mut buffers = inner.buffers.lock().await;
        match buffers.get(&user_id) {
            Some(current) if current.generation == generation => {}
            _ => return,
        }
        match buffers.remove(&user_id) {
            Some(burst) => burst,
            None => return,
        }
    };

    let text = burst
        .messages
        .iter()
        .map(|message| message.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let oldest_timestamp = burst
        .messages
        .iter()
        .map(|message| message.timestamp)
        .min()
        .unwrap_or_else(Utc::now);

    let now = Utc::now();
    let oldest_message_age_ms =
        now.signed_duration_since(oldest_timestamp).num_milliseconds().max(0);
    let is_backlog = oldest_message_age_ms > BACKLOG_THRESHOLD_MS;

    debug!(
        user_id = %user_id,
        messages = burst.messages.len(),
        oldest_message_age_ms,
        is_backlog,
        "flushing debounced turn"
    );

    inner
        .handler
        .on_turn(FlushedTurn {
            user_id,
            text,
            oldest_timestamp,
            oldest_message_age_ms,
            is_backlog,
        })
        .await;
}
