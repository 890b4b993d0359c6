//! Command execution.
//!
//! The state machine returns pure data commands; this module performs the
//! side effects. Commands of one result run strictly in order, with a fixed
//! pacing gap between directly adjacent message sends so multi-bubble
//! replies read like a human typing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{error, info, warn};

use totem_core::{Command, ConversationMetadata, ConversationPhase, ProductOffer, TransitionResult};

use crate::enrichment::DEV_CHANNEL;
use crate::store::{ConversationStore, StoreError};

/// Gap between two directly adjacent message sends.
pub const MESSAGE_PACING_GAP_MS: u64 = 1_000;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("channel send failed: {0}")]
    Send(String),
    #[error("channel image send failed: {0}")]
    SendImages(String),
    #[error("channel receipt update failed: {0}")]
    Receipt(String),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("team notification failed: {0}")]
    Notify(String),
}

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("analytics delivery failed: {0}")]
    Track(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageSendRequest {
    pub user_id: String,
    pub segment: String,
    pub category: String,
    pub credit_line: Decimal,
    pub is_simulation: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageSendResult {
    pub success: bool,
    /// Products actually shown; recorded on the phase for reply validation.
    pub products: Vec<ProductOffer>,
}

/// Outbound side of the chat channel.
#[async_trait]
pub trait ChannelTransport: Send + Sync {
    async fn send(&self, user_id: &str, text: &str) -> Result<(), TransportError>;
    async fn send_images(
        &self,
        request: &ImageSendRequest,
    ) -> Result<ImageSendResult, TransportError>;
    async fn mark_read_and_show_typing(&self, message_id: &str) -> Result<(), TransportError>;

    /// Simulation conversations record the outbound text instead of sending.
    fn log_simulated_message(&self, user_id: &str, text: &str) {
        info!(user_id = %user_id, text = %text, "simulated outbound message");
    }
}

#[async_trait]
pub trait Analytics: Send + Sync {
    async fn track(
        &self,
        user_id: &str,
        event: &str,
        metadata: Map<String, Value>,
    ) -> Result<(), AnalyticsError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, channel: &str, message: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
enum CommandError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct CommandExecutor {
    transport: Arc<dyn ChannelTransport>,
    analytics: Arc<dyn Analytics>,
    notifier: Arc<dyn Notifier>,
    store: Arc<dyn ConversationStore>,
    pacing_gap: Duration,
}

impl CommandExecutor {
    pub fn new(
        transport: Arc<dyn ChannelTransport>,
        analytics: Arc<dyn Analytics>,
        notifier: Arc<dyn Notifier>,
        store: Arc<dyn ConversationStore>,
    ) -> Self {
        Self {
            transport,
            analytics,
            notifier,
            store,
            pacing_gap: Duration::from_millis(MESSAGE_PACING_GAP_MS),
        }
    }

    /// Apply a terminal transition result: persist the phase change, then run
    /// its commands in order.
    ///
    /// Individual command failures are logged and do not abort the rest of
    /// the list (best-effort policy); only a failure to persist the phase
    /// update propagates.
    pub async fn execute(
        &self,
        result: &TransitionResult,
        user_id: &str,
        metadata: &ConversationMetadata,
        is_simulation: bool,
    ) -> Result<(), ExecuteError> {
        let (next_phase, commands) = match result {
            TransitionResult::NeedEnrichment { request, .. } => {
                // Contract violation: only the enrichment loop may consume
                // these. Alert the dev channel and take no customer-visible
                // action.
                error!(
                    user_id = %user_id,
                    kind = request.kind(),
                    "enrichment request escaped to the command executor"
                );
                let alert = format!(
                    "CRITICAL: need_enrichment reached the command executor for {user_id}"
                );
                if let Err(notify_error) = self.notifier.notify(DEV_CHANNEL, &alert).await {
                    warn!(user_id = %user_id, error = %notify_error, "dev alert failed");
                }
                return Ok(());
            }
            TransitionResult::Update { next_phase, commands } => (next_phase, commands),
        };

        let current = self.store.get_or_create(user_id).await?;
        if current.phase != *next_phase {
            self.store.update(user_id, next_phase.clone(), metadata.clone()).await?;
        }

        for (index, command) in commands.iter().enumerate() {
            let follows_send = index > 0 && commands[index - 1].is_send_message();
            if command.is_send_message() && follows_send {
                tokio::time::sleep(self.pacing_gap).await;
            }

            if let Err(command_error) = self
                .execute_command(command, user_id, next_phase, metadata, is_simulation)
                .await
            {
                warn!(
                    user_id = %user_id,
                    command = command.label(),
                    error = %command_error,
                    "command failed, continuing with remaining commands"
                );
            }
        }

        Ok(())
    }

    async fn execute_command(
        &self,
        command: &Command,
        user_id: &str,
        phase: &ConversationPhase,
        metadata: &ConversationMetadata,
        is_simulation: bool,
    ) -> Result<(), CommandError> {
        match command {
            Command::SendMessage { text } => {
                if is_simulation {
                    self.transport.log_simulated_message(user_id, text);
                } else {
                    self.transport.send(user_id, text).await?;
                }
            }
            Command::SendImages { category } => {
                self.send_images(user_id, category, phase, is_simulation).await?;
            }
            Command::TrackEvent { event, metadata: event_metadata } => {
                let mut merged = Map::new();
                merged.insert("segment".to_owned(), Value::String(metadata.segment.clone()));
                merged.extend(event_metadata.clone());
                self.analytics.track(user_id, event, merged).await?;
            }
            Command::NotifyTeam { channel, message } => {
                self.notifier.notify(channel, message).await?;
            }
            Command::Escalate { reason } => {
                // Phase change was persisted up front; nothing else to do.
                info!(user_id = %user_id, reason = %reason, "escalation acknowledged");
            }
        }
        Ok(())
    }

    async fn send_images(
        &self,
        user_id: &str,
        category: &str,
        phase: &ConversationPhase,
        is_simulation: bool,
    ) -> Result<(), CommandError> {
        let Some((segment, credit)) = phase.offer_context() else {
            warn!(
                user_id = %user_id,
                phase = phase.label(),
                "images requested outside an offering stage, skipping"
            );
            return Ok(());
        };

        let result = self
            .transport
            .send_images(&ImageSendRequest {
                user_id: user_id.to_owned(),
                segment: segment.to_owned(),
                category: category.to_owned(),
                credit_line: credit,
                is_simulation,
            })
            .await?;

        if result.success && !result.products.is_empty() {
            let record = self.store.get_or_create(user_id).await?;
            let updated = phase.clone().with_sent_products(result.products);
            self.store.update(user_id, updated, record.metadata).await?;
        }
        Ok(())
    }
}
