//! Totem Core - conversation domain for the sales agent
//!
//! This crate holds the pure side of the message-orchestration system:
//! - **Conversation model** (`conversation`) - phases, commands, transition results
//! - **Response pacing** (`pacing`) - human-like reply delay calculation
//! - **Eligibility classification** (`eligibility`) - outage vs. business decline
//! - **Configuration** (`config`) - typed settings with file + env loading
//!
//! # Design Principle
//!
//! The conversation state machine is pure data-in/data-out. It never performs
//! I/O: external needs are expressed as `need_enrichment` results, and side
//! effects as a closed set of serializable `Command` variants. The async
//! runtime that feeds and drains it lives in `totem-agent`.

pub mod config;
pub mod conversation;
pub mod eligibility;
pub mod pacing;

pub use config::{AgentConfig, ConfigError, LoadOptions};
pub use conversation::command::Command;
pub use conversation::phase::{
    ConversationMetadata, ConversationPhase, InterestedProduct, ProductOffer, SelectedProduct,
};
pub use conversation::transition::{
    EligibilityEnrichment, EnrichmentRequest, EnrichmentResult, PhaseTransition, TransitionInput,
    TransitionResult,
};
pub use eligibility::{
    evaluate_results, DeclineReason, DegradationWarning, EligibilityEvaluation, EligibilitySource,
    ProviderCheckResult, ProviderError, ProviderResults, SystemOutageError,
};
