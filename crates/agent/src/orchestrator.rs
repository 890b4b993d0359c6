//! End-to-end turn orchestration.
//!
//! `MessagePipeline` is the channel-facing entry point: raw messages go into
//! the debounce buffer, and each flushed turn runs through the orchestrator
//! under the user's serial lock. Within the lock a turn loads the
//! conversation, resets expired sessions, runs the enrichment loop, pads the
//! reply to the target latency, and executes the resulting commands.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{error, info, warn};

use totem_core::pacing::response_delay;
use totem_core::PhaseTransition;

use crate::debounce::{DebounceBuffer, FlushHandler, FlushedTurn};
use crate::enrichment::{EnrichmentLoop, EnrichmentLoopError};
use crate::executor::{ChannelTransport, CommandExecutor, ExecuteError};
use crate::locks::KeyedSerialLock;
use crate::store::{ConversationStore, StoreError};

/// One debounced turn, addressed and timestamped for processing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IncomingMessage {
    pub user_id: String,
    pub content: String,
    /// Arrival time of the oldest message in the turn. Drives backlog
    /// detection and response pacing.
    pub timestamp: DateTime<Utc>,
    pub message_id: String,
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Enrichment(#[from] EnrichmentLoopError),
    #[error(transparent)]
    Execute(#[from] ExecuteError),
}

pub struct Orchestrator<T> {
    locks: KeyedSerialLock,
    store: Arc<dyn ConversationStore>,
    transport: Arc<dyn ChannelTransport>,
    enrichment: EnrichmentLoop<T>,
    executor: CommandExecutor,
    response_delay_ms: i64,
}

impl<T> Orchestrator<T>
where
    T: PhaseTransition,
{
    pub fn new(
        store: Arc<dyn ConversationStore>,
        transport: Arc<dyn ChannelTransport>,
        enrichment: EnrichmentLoop<T>,
        executor: CommandExecutor,
        response_delay_ms: u64,
    ) -> Self {
        Self {
            locks: KeyedSerialLock::new(),
            store,
            transport,
            enrichment,
            executor,
            response_delay_ms: response_delay_ms as i64,
        }
    }

    /// Process one turn. Turns for the same user are serialized in arrival
    /// order; the lock is held across command execution, so a later turn can
    /// never interleave its sends with an earlier one.
    pub async fn handle_incoming(&self, message: &IncomingMessage) -> Result<(), OrchestratorError> {
        self.locks
            .with_lock(&message.user_id, || self.process_turn(message))
            .await
    }

    async fn process_turn(&self, message: &IncomingMessage) -> Result<(), OrchestratorError> {
        let mut record = self.store.get_or_create(&message.user_id).await?;

        if self.store.is_session_timed_out(&record.metadata) {
            info!(user_id = %message.user_id, "session expired, starting fresh");
            self.store.reset_session(&message.user_id).await?;
            record = self.store.get_or_create(&message.user_id).await?;
            record.metadata.is_returning_user = true;
            self.store
                .update(&message.user_id, record.phase.clone(), record.metadata.clone())
                .await?;
        }

        // Read receipts are cosmetic; a failure must not block the turn.
        if let Err(receipt_error) =
            self.transport.mark_read_and_show_typing(&message.message_id).await
        {
            warn!(
                user_id = %message.user_id,
                error = %receipt_error,
                "read receipt failed, continuing"
            );
        }

        let result = self
            .enrichment
            .run(record.phase.clone(), &message.content, &record.metadata, &message.user_id)
            .await?;

        let delay = response_delay(message.timestamp, Utc::now(), self.response_delay_ms);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.executor
            .execute(&result, &message.user_id, &record.metadata, record.is_simulation)
            .await?;
        Ok(())
    }
}

struct TurnFlushHandler<T> {
    orchestrator: Arc<Orchestrator<T>>,
}

#[async_trait]
impl<T> FlushHandler for TurnFlushHandler<T>
where
    T: PhaseTransition + 'static,
{
    async fn on_turn(&self, turn: FlushedTurn) {
        let message = IncomingMessage {
            message_id: format!("turn-{}-{}", turn.user_id, turn.oldest_timestamp.timestamp_millis()),
            user_id: turn.user_id,
            content: turn.text,
            timestamp: turn.oldest_timestamp,
        };
        if let Err(turn_error) = self.orchestrator.handle_incoming(&message).await {
            error!(
                user_id = %message.user_id,
                error = %turn_error,
                "turn processing failed"
            );
        }
    }
}

/// Channel-facing facade: debounce in front of the orchestrator.
pub struct MessagePipeline<T> {
    debounce: DebounceBuffer,
    orchestrator: Arc<Orchestrator<T>>,
}

impl<T> MessagePipeline<T>
where
    T: PhaseTransition + 'static,
{
    pub fn new(orchestrator: Arc<Orchestrator<T>>, debounce_delay: Duration) -> Self {
        let handler = Arc::new(TurnFlushHandler { orchestrator: Arc::clone(&orchestrator) });
        Self { debounce: DebounceBuffer::new(debounce_delay, handler), orchestrator }
    }

    /// Feed one raw channel message into the user's burst.
    pub async fn on_message(&self, user_id: &str, text: &str, timestamp: DateTime<Utc>) {
        self.debounce.on_message(user_id, text, timestamp).await;
    }

    /// Discard the user's pending burst without processing it.
    pub async fn clear(&self, user_id: &str) {
        self.debounce.clear(user_id).await;
    }

    /// Bypass the debounce buffer and process a turn directly.
    pub async fn handle_turn(&self, message: &IncomingMessage) -> Result<(), OrchestratorError> {
        self.orchestrator.handle_incoming(message).await
    }
}
