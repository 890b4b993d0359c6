//! Enrichment feedback loop.
//!
//! The state machine is pure and cannot call out. When it needs external
//! data it returns `need_enrichment`; this loop fetches the data and feeds
//! it back until the machine produces a terminal result. Checkpoint phases
//! are persisted before the external call is issued, so a crash mid-fetch
//! cannot regress visible conversation state.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error};

use totem_core::{
    Command, ConversationMetadata, ConversationPhase, EnrichmentRequest, EnrichmentResult,
    PhaseTransition, TransitionInput, TransitionResult,
};

use crate::store::{ConversationStore, StoreError};

/// Ceiling on transition iterations per turn. A decision function stuck
/// requesting enrichment forever becomes a bounded, human-routed failure
/// instead of an infinite loop.
pub const MAX_ENRICHMENT_LOOPS: usize = 10;

pub const LOOP_EXCEEDED_REASON: &str = "enrichment_loop_exceeded";
pub const DEV_CHANNEL: &str = "dev";

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("enrichment fetch failed for {kind}: {message}")]
    Fetch { kind: String, message: String },
    #[error("no fetcher registered for enrichment kind `{0}`")]
    Unsupported(String),
}

#[derive(Debug, Error)]
pub enum EnrichmentLoopError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Fetch(#[from] EnrichmentError),
}

/// Resolves one enrichment request against the outside world.
#[async_trait]
pub trait EnrichmentFetcher: Send + Sync {
    async fn fetch(
        &self,
        request: &EnrichmentRequest,
        user_id: &str,
    ) -> Result<EnrichmentResult, EnrichmentError>;
}

pub struct EnrichmentLoop<T> {
    transition: Arc<T>,
    store: Arc<dyn ConversationStore>,
    fetcher: Arc<dyn EnrichmentFetcher>,
}

impl<T> EnrichmentLoop<T>
where
    T: PhaseTransition,
{
    pub fn new(
        transition: Arc<T>,
        store: Arc<dyn ConversationStore>,
        fetcher: Arc<dyn EnrichmentFetcher>,
    ) -> Self {
        Self { transition, store, fetcher }
    }

    /// Iterate the decision function until it returns a terminal result.
    pub async fn run(
        &self,
        phase: ConversationPhase,
        message: &str,
        metadata: &ConversationMetadata,
        user_id: &str,
    ) -> Result<TransitionResult, EnrichmentLoopError> {
        let mut current_phase = phase;
        let mut enrichment: Option<EnrichmentResult> = None;

        for iteration in 1..=MAX_ENRICHMENT_LOOPS {
            let result = self.transition.transition(&TransitionInput {
                phase: &current_phase,
                message,
                metadata,
                enrichment: enrichment.as_ref(),
            });

            let (request, pending_phase) = match result {
                TransitionResult::NeedEnrichment { request, pending_phase } => {
                    (request, pending_phase)
                }
                terminal => return Ok(terminal),
            };

            debug!(
                user_id = %user_id,
                kind = request.kind(),
                iteration,
                "enrichment needed"
            );

            // Checkpoint: durably advance the phase before the slow external
            // call so a crash mid-fetch cannot regress the conversation.
            if let Some(pending) = pending_phase {
                current_phase = pending;
                self.store.update(user_id, current_phase.clone(), metadata.clone()).await?;
            }

            enrichment = Some(self.fetcher.fetch(&request, user_id).await?);
        }

        error!(user_id = %user_id, "enrichment loop ceiling reached, escalating");
        Ok(loop_exceeded_result(user_id))
    }
}

fn loop_exceeded_result(user_id: &str) -> TransitionResult {
    TransitionResult::Update {
        next_phase: ConversationPhase::Escalated { reason: LOOP_EXCEEDED_REASON.to_owned() },
        commands: vec![
            Command::NotifyTeam {
                channel: DEV_CHANNEL.to_owned(),
                message: format!("Max enrichment loops for {user_id}"),
            },
            Command::Escalate { reason: LOOP_EXCEEDED_REASON.to_owned() },
        ],
    }
}
