//! Conversation record storage seam.
//!
//! Persistence of conversation records is a collaborator concern; the
//! orchestrator only needs this narrow interface. The in-memory backend is
//! used by tests and single-process deployments.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use thiserror::Error;
use tokio::sync::Mutex;

use totem_core::{ConversationMetadata, ConversationPhase};

pub const DEFAULT_SEGMENT: &str = "fnb";

#[derive(Clone, Debug, PartialEq)]
pub struct ConversationRecord {
    pub phase: ConversationPhase,
    pub metadata: ConversationMetadata,
    /// Simulation conversations log outbound messages instead of sending.
    pub is_simulation: bool,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("conversation store backend failure: {0}")]
    Backend(String),
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn get_or_create(&self, user_id: &str) -> Result<ConversationRecord, StoreError>;
    async fn update(
        &self,
        user_id: &str,
        phase: ConversationPhase,
        metadata: ConversationMetadata,
    ) -> Result<(), StoreError>;
    fn is_session_timed_out(&self, metadata: &ConversationMetadata) -> bool;
    /// Return the conversation to `Greeting` with fresh session timestamps,
    /// keeping the segment and last browsed category.
    async fn reset_session(&self, user_id: &str) -> Result<(), StoreError>;
}

pub struct InMemoryConversationStore {
    records: Mutex<HashMap<String, ConversationRecord>>,
    session_timeout: Duration,
}

impl InMemoryConversationStore {
    pub fn new(session_timeout: Duration) -> Self {
        Self { records: Mutex::new(HashMap::new()), session_timeout }
    }

    /// Seed a record directly, bypassing `get_or_create` defaults.
    pub async fn insert(&self, user_id: &str, record: ConversationRecord) {
        self.records.lock().await.insert(user_id.to_owned(), record);
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn get_or_create(&self, user_id: &str) -> Result<ConversationRecord, StoreError> {
        let mut records = self.records.lock().await;
        let record = records.entry(user_id.to_owned()).or_insert_with(|| ConversationRecord {
            phase: ConversationPhase::Greeting,
            metadata: ConversationMetadata::new(DEFAULT_SEGMENT, Utc::now()),
            is_simulation: false,
        });
        Ok(record.clone())
    }

    async fn update(
        &self,
        user_id: &str,
        phase: ConversationPhase,
        metadata: ConversationMetadata,
    ) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        let record = records.entry(user_id.to_owned()).or_insert_with(|| ConversationRecord {
            phase: ConversationPhase::Greeting,
            metadata: metadata.clone(),
            is_simulation: false,
        });
        record.phase = phase;
        record.metadata = metadata;
        record.metadata.last_activity = Utc::now();
        Ok(())
    }

    fn is_session_timed_out(&self, metadata: &ConversationMetadata) -> bool {
        let idle = Utc::now().signed_duration_since(metadata.last_activity);
        idle > TimeDelta::from_std(self.session_timeout).unwrap_or(TimeDelta::MAX)
    }

    async fn reset_session(&self, user_id: &str) -> Result<(), StoreError> {
        let mut records = self.records.lock().await;
        let Some(record) = records.get_mut(user_id) else {
            return Ok(());
        };

        let mut metadata = ConversationMetadata::new(record.metadata.segment.clone(), Utc::now());
        metadata.last_category = record.metadata.last_category.clone();
        record.phase = ConversationPhase::Greeting;
        record.metadata = metadata;
        Ok(())
    }
}
