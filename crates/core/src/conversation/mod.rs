//! Conversation state machine data model.
//!
//! A conversation is a `ConversationPhase` plus `ConversationMetadata`. The
//! decision function (`PhaseTransition`) consumes both together with the
//! aggregated user message and optional enrichment data, and produces either
//! a phase update with commands or a request for more external data.

pub mod command;
pub mod phase;
pub mod transition;
