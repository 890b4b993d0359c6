use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::conversation::command::Command;
use crate::conversation::phase::{ConversationMetadata, ConversationPhase, ProductOffer};

/// External data the state machine asked for before it can decide.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnrichmentRequest {
    EligibilityCheck { document_id: String },
    ProductCatalog { segment: String, category: String },
}

impl EnrichmentRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EligibilityCheck { .. } => "eligibility_check",
            Self::ProductCatalog { .. } => "product_catalog",
        }
    }
}

/// Outcome of an eligibility enrichment, already classified for the state
/// machine: a concrete credit line, a business decline, or an operational
/// outage that routes the customer to a human.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EligibilityEnrichment {
    Eligible { credit: Decimal, name: String },
    NotQualified,
    SystemOutage { handoff_reason: String },
}

/// Payload satisfying a pending `EnrichmentRequest`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnrichmentResult {
    Eligibility(EligibilityEnrichment),
    Products { products: Vec<ProductOffer> },
}

/// Everything the decision function sees for one turn.
#[derive(Clone, Debug)]
pub struct TransitionInput<'a> {
    pub phase: &'a ConversationPhase,
    pub message: &'a str,
    pub metadata: &'a ConversationMetadata,
    pub enrichment: Option<&'a EnrichmentResult>,
}

/// Decision function output: either a phase update with commands to execute,
/// or a request for external data with an optional crash-safe checkpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransitionResult {
    Update {
        next_phase: ConversationPhase,
        commands: Vec<Command>,
    },
    NeedEnrichment {
        request: EnrichmentRequest,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pending_phase: Option<ConversationPhase>,
    },
}

impl TransitionResult {
    pub fn is_enrichment_request(&self) -> bool {
        matches!(self, Self::NeedEnrichment { .. })
    }
}

/// The phase-transition decision function. Pure and synchronous: no I/O, no
/// clocks, no randomness. Anything external arrives through `enrichment`.
pub trait PhaseTransition: Send + Sync {
    fn transition(&self, input: &TransitionInput<'_>) -> TransitionResult;
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{EligibilityEnrichment, EnrichmentRequest, EnrichmentResult, TransitionResult};
    use crate::conversation::phase::ConversationPhase;

    #[test]
    fn enrichment_requests_expose_a_stable_kind() {
        let request = EnrichmentRequest::EligibilityCheck { document_id: "44556677".to_owned() };
        assert_eq!(request.kind(), "eligibility_check");

        let request = EnrichmentRequest::ProductCatalog {
            segment: "fnb".to_owned(),
            category: "cocinas".to_owned(),
        };
        assert_eq!(request.kind(), "product_catalog");
    }

    #[test]
    fn need_enrichment_is_flagged_as_non_terminal() {
        let result = TransitionResult::NeedEnrichment {
            request: EnrichmentRequest::EligibilityCheck { document_id: "44556677".to_owned() },
            pending_phase: Some(ConversationPhase::WaitingForRecovery),
        };
        assert!(result.is_enrichment_request());

        let result = TransitionResult::Update {
            next_phase: ConversationPhase::Greeting,
            commands: Vec::new(),
        };
        assert!(!result.is_enrichment_request());
    }

    #[test]
    fn eligibility_enrichment_serializes_by_status() {
        let json = serde_json::to_value(EnrichmentResult::Eligibility(
            EligibilityEnrichment::Eligible {
                credit: Decimal::new(2_500_00, 2),
                name: "Maria".to_owned(),
            },
        ))
        .expect("serialize enrichment");

        assert_eq!(json["kind"], "eligibility");
        assert_eq!(json["status"], "eligible");
    }
}
