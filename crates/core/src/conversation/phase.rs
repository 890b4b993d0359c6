use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Installment months mapped to the price per installment.
pub type InstallmentSchedule = BTreeMap<u32, Decimal>;

/// A product shown or offered to the customer during the funnel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductOffer {
    pub product_id: String,
    pub name: String,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installment_schedule: Option<InstallmentSchedule>,
}

/// A product the customer committed to, including the chosen installment plan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedProduct {
    pub offer: ProductOffer,
    pub installments: u32,
    pub price_per_installment: Decimal,
}

/// Lightweight record of a product the customer showed interest in while
/// still browsing categories.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestedProduct {
    pub product_id: String,
    pub name: String,
    pub price: Decimal,
    pub explored_categories_count: u32,
}

/// Current stage of the conversation funnel.
///
/// Created on first contact, mutated by transitions and command execution,
/// never deleted: terminal stages (`Escalated`, `WaitingForRecovery`) simply
/// stop advancing until a human or a recovery flow takes over.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ConversationPhase {
    Greeting,
    OfferingProducts {
        segment: String,
        credit: Decimal,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        interested_product: Option<InterestedProduct>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        sent_products: Vec<ProductOffer>,
    },
    HandlingObjection {
        segment: String,
        credit: Decimal,
        name: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        sent_products: Vec<ProductOffer>,
    },
    SelectingInstallments {
        segment: String,
        credit: Decimal,
        name: String,
        selected_product: ProductOffer,
    },
    ConfirmingSelection {
        segment: String,
        credit: Decimal,
        name: String,
        selected_product: SelectedProduct,
    },
    WaitingForRecovery,
    Escalated {
        reason: String,
    },
}

impl ConversationPhase {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::OfferingProducts { .. } => "offering_products",
            Self::HandlingObjection { .. } => "handling_objection",
            Self::SelectingInstallments { .. } => "selecting_installments",
            Self::ConfirmingSelection { .. } => "confirming_selection",
            Self::WaitingForRecovery => "waiting_for_recovery",
            Self::Escalated { .. } => "escalated",
        }
    }

    /// Image sends are only valid while the customer is being shown or is
    /// objecting to products.
    pub fn is_offering_stage(&self) -> bool {
        matches!(self, Self::OfferingProducts { .. } | Self::HandlingObjection { .. })
    }

    /// Segment and credit line backing an image send, when the phase carries
    /// them.
    pub fn offer_context(&self) -> Option<(&str, Decimal)> {
        match self {
            Self::OfferingProducts { segment, credit, .. }
            | Self::HandlingObjection { segment, credit, .. } => Some((segment, *credit)),
            _ => None,
        }
    }

    /// Record the products actually shown to the customer. Later transitions
    /// validate replies against this list. No-op outside offering stages.
    pub fn with_sent_products(self, products: Vec<ProductOffer>) -> Self {
        match self {
            Self::OfferingProducts { segment, credit, name, interested_product, .. } => {
                Self::OfferingProducts {
                    segment,
                    credit,
                    name,
                    interested_product,
                    sent_products: products,
                }
            }
            Self::HandlingObjection { segment, credit, name, .. } => {
                Self::HandlingObjection { segment, credit, name, sent_products: products }
            }
            other => other,
        }
    }
}

/// Session bookkeeping carried alongside the phase.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMetadata {
    pub segment: String,
    pub session_started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub is_returning_user: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_category: Option<String>,
}

impl ConversationMetadata {
    pub fn new(segment: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            segment: segment.into(),
            session_started_at: now,
            last_activity: now,
            is_returning_user: false,
            last_category: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{ConversationMetadata, ConversationPhase, ProductOffer};

    fn offering_phase() -> ConversationPhase {
        ConversationPhase::OfferingProducts {
            segment: "fnb".to_owned(),
            credit: Decimal::new(1_200_00, 2),
            name: "Maria".to_owned(),
            interested_product: None,
            sent_products: Vec::new(),
        }
    }

    #[test]
    fn offering_stages_accept_image_sends() {
        assert!(offering_phase().is_offering_stage());
        assert!(ConversationPhase::HandlingObjection {
            segment: "fnb".to_owned(),
            credit: Decimal::ZERO,
            name: "Maria".to_owned(),
            sent_products: Vec::new(),
        }
        .is_offering_stage());
        assert!(!ConversationPhase::Greeting.is_offering_stage());
        assert!(!ConversationPhase::WaitingForRecovery.is_offering_stage());
    }

    #[test]
    fn sent_products_are_recorded_only_in_offering_stages() {
        let products = vec![ProductOffer {
            product_id: "stove-01".to_owned(),
            name: "Cocina 4 hornillas".to_owned(),
            price: Decimal::new(899_00, 2),
            installment_schedule: None,
        }];

        let updated = offering_phase().with_sent_products(products.clone());
        assert!(matches!(
            updated,
            ConversationPhase::OfferingProducts { ref sent_products, .. }
                if *sent_products == products
        ));

        let unchanged = ConversationPhase::Greeting.with_sent_products(products);
        assert_eq!(unchanged, ConversationPhase::Greeting);
    }

    #[test]
    fn phase_serializes_with_snake_case_tag() {
        let json = serde_json::to_value(ConversationPhase::Escalated {
            reason: "enrichment_loop_exceeded".to_owned(),
        })
        .expect("serialize phase");

        assert_eq!(json["phase"], "escalated");
        assert_eq!(json["reason"], "enrichment_loop_exceeded");
    }

    #[test]
    fn fresh_metadata_starts_with_current_session() {
        let now = Utc::now();
        let metadata = ConversationMetadata::new("fnb", now);
        assert_eq!(metadata.session_started_at, now);
        assert_eq!(metadata.last_activity, now);
        assert!(!metadata.is_returning_user);
        assert!(metadata.last_category.is_none());
    }
}
