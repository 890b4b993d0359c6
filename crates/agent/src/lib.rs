//! Totem Agent - async orchestration runtime for the sales conversation
//!
//! This crate drives the pure state machine in `totem-core` against the real
//! world:
//! - **Debounce** (`debounce`) - collapse rapid message bursts into one turn
//! - **Locks** (`locks`) - per-user serialization so turns never race
//! - **Store** (`store`) - conversation record seam + in-memory backend
//! - **Enrichment** (`enrichment`) - feedback loop feeding external data
//!   into the decision function, with crash-safe checkpoints
//! - **Executor** (`executor`) - dispatches commands with human-like pacing
//! - **Orchestrator** (`orchestrator`) - the end-to-end entry point
//! - **Eligibility** (`eligibility`) - provider handler on top of the
//!   outage-vs-decline classification in `totem-core`
//!
//! # Architecture
//!
//! ```text
//! channel -> MessagePipeline::on_message -> DebounceBuffer
//!                                              | flush (one turn)
//!                                              v
//!              KeyedSerialLock[user] -> EnrichmentLoop <-> EnrichmentFetcher
//!                                              |
//!                                       response pacing
//!                                              v
//!                                       CommandExecutor -> channel/analytics/notifier
//! ```
//!
//! Per user, side effects run in debounced turn order; turn N+1 cannot start
//! before turn N finished executing its commands. Cross-user work is
//! independent.

pub mod debounce;
pub mod eligibility;
pub mod enrichment;
pub mod executor;
pub mod locks;
pub mod orchestrator;
pub mod store;

pub use debounce::{DebounceBuffer, FlushHandler, FlushedTurn};
pub use eligibility::{CheckEligibilityHandler, EligibilityProvider};
pub use enrichment::{EnrichmentError, EnrichmentFetcher, EnrichmentLoop, EnrichmentLoopError};
pub use executor::{
    Analytics, AnalyticsError, ChannelTransport, CommandExecutor, ExecuteError, ImageSendRequest,
    ImageSendResult, Notifier, NotifyError, TransportError,
};
pub use locks::KeyedSerialLock;
pub use orchestrator::{IncomingMessage, MessagePipeline, Orchestrator, OrchestratorError};
pub use store::{ConversationRecord, ConversationStore, InMemoryConversationStore, StoreError};
