//! Eligibility check handler.
//!
//! Wraps the credit provider call and the outage-vs-decline classification
//! from `totem-core` into the enrichment fetcher the loop consumes. A system
//! outage never surfaces to the customer as a rejection: it alerts ops and
//! hands the conversation to a human instead.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use totem_core::{
    evaluate_results, EligibilityEnrichment, EnrichmentRequest, EnrichmentResult, ProviderCheckResult,
    ProviderError, ProviderResults,
};

use crate::enrichment::{EnrichmentError, EnrichmentFetcher};
use crate::executor::Notifier;

pub const OPS_CHANNEL: &str = "ops";
pub const FNB_DOWN_HANDOFF: &str = "fnb_provider_down";

/// Credit provider seam. `user_id` is passed through for request tracing
/// only; the lookup is keyed by the national identity document.
#[async_trait]
pub trait EligibilityProvider: Send + Sync {
    async fn check_eligibility(
        &self,
        identity_id: &str,
        user_id: Option<&str>,
    ) -> Result<ProviderCheckResult, ProviderError>;
}

pub struct CheckEligibilityHandler {
    provider: Arc<dyn EligibilityProvider>,
    notifier: Arc<dyn Notifier>,
}

impl CheckEligibilityHandler {
    pub fn new(provider: Arc<dyn EligibilityProvider>, notifier: Arc<dyn Notifier>) -> Self {
        Self { provider, notifier }
    }

    /// Check one document against the provider and classify the outcome.
    pub async fn execute(&self, document_id: &str, user_id: &str) -> EligibilityEnrichment {
        let fnb = self.provider.check_eligibility(document_id, Some(user_id)).await;
        let results = ProviderResults { fnb };

        match evaluate_results(results) {
            Err(outage) => {
                error!(
                    user_id = %user_id,
                    error = %outage,
                    "eligibility provider outage, handing off to a human"
                );
                let alert = format!(
                    "Eligibility provider outage while serving {user_id}: {outage}"
                );
                if let Err(notify_error) = self.notifier.notify(OPS_CHANNEL, &alert).await {
                    warn!(user_id = %user_id, error = %notify_error, "ops alert failed");
                }
                EligibilityEnrichment::SystemOutage {
                    handoff_reason: FNB_DOWN_HANDOFF.to_owned(),
                }
            }
            Ok(evaluation) if evaluation.result.eligible => {
                info!(
                    user_id = %user_id,
                    source = ?evaluation.source,
                    "customer is eligible"
                );
                EligibilityEnrichment::Eligible {
                    credit: evaluation.result.credit,
                    name: evaluation.result.name.unwrap_or_default(),
                }
            }
            Ok(_) => EligibilityEnrichment::NotQualified,
        }
    }
}

#[async_trait]
impl EnrichmentFetcher for CheckEligibilityHandler {
    async fn fetch(
        &self,
        request: &EnrichmentRequest,
        user_id: &str,
    ) -> Result<EnrichmentResult, EnrichmentError> {
        match request {
            EnrichmentRequest::EligibilityCheck { document_id } => {
                let enrichment = self.execute(document_id, user_id).await;
                Ok(EnrichmentResult::Eligibility(enrichment))
            }
            other => Err(EnrichmentError::Unsupported(other.kind().to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use tokio::sync::Mutex;

    use totem_core::{
        DeclineReason, EligibilityEnrichment, EnrichmentRequest, EnrichmentResult,
        ProviderCheckResult, ProviderError,
    };

    use super::{CheckEligibilityHandler, EligibilityProvider, FNB_DOWN_HANDOFF, OPS_CHANNEL};
    use crate::enrichment::EnrichmentFetcher;
    use crate::executor::{Notifier, NotifyError};

    struct FakeProvider {
        response: Mutex<Option<Result<ProviderCheckResult, ProviderError>>>,
    }

    impl FakeProvider {
        fn returning(response: Result<ProviderCheckResult, ProviderError>) -> Arc<Self> {
            Arc::new(Self { response: Mutex::new(Some(response)) })
        }
    }

    #[async_trait]
    impl EligibilityProvider for FakeProvider {
        async fn check_eligibility(
            &self,
            _identity_id: &str,
            _user_id: Option<&str>,
        ) -> Result<ProviderCheckResult, ProviderError> {
            self.response.lock().await.take().expect("single call expected")
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        notifications: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, channel: &str, message: &str) -> Result<(), NotifyError> {
            self.notifications.lock().await.push((channel.to_owned(), message.to_owned()));
            Ok(())
        }
    }

    fn eligible_result() -> ProviderCheckResult {
        ProviderCheckResult {
            eligible: true,
            credit: Decimal::new(2_500_00, 2),
            name: Some("Maria".to_owned()),
            reason: None,
        }
    }

    #[tokio::test]
    async fn eligible_customer_gets_credit_and_name() {
        let handler = CheckEligibilityHandler::new(
            FakeProvider::returning(Ok(eligible_result())),
            Arc::new(RecordingNotifier::default()),
        );

        let enrichment = handler.execute("44556677", "51999").await;

        assert_eq!(
            enrichment,
            EligibilityEnrichment::Eligible {
                credit: Decimal::new(2_500_00, 2),
                name: "Maria".to_owned(),
            }
        );
    }

    #[tokio::test]
    async fn genuine_decline_maps_to_not_qualified_without_alerts() {
        let notifier = Arc::new(RecordingNotifier::default());
        let handler = CheckEligibilityHandler::new(
            FakeProvider::returning(Ok(ProviderCheckResult {
                eligible: false,
                credit: Decimal::ZERO,
                name: None,
                reason: Some(DeclineReason::NotQualified),
            })),
            notifier.clone(),
        );

        let enrichment = handler.execute("44556677", "51999").await;

        assert_eq!(enrichment, EligibilityEnrichment::NotQualified);
        assert!(notifier.notifications.lock().await.is_empty());
    }

    #[tokio::test]
    async fn provider_failure_alerts_ops_and_hands_off() {
        let notifier = Arc::new(RecordingNotifier::default());
        let handler = CheckEligibilityHandler::new(
            FakeProvider::returning(Err(ProviderError::Timeout(5_000))),
            notifier.clone(),
        );

        let enrichment = handler.execute("44556677", "51999").await;

        assert_eq!(
            enrichment,
            EligibilityEnrichment::SystemOutage { handoff_reason: FNB_DOWN_HANDOFF.to_owned() }
        );
        let notifications = notifier.notifications.lock().await.clone();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].0, OPS_CHANNEL);
        assert!(notifications[0].1.contains("51999"));
    }

    #[tokio::test]
    async fn technical_decline_reason_is_treated_as_an_outage() {
        let notifier = Arc::new(RecordingNotifier::default());
        let handler = CheckEligibilityHandler::new(
            FakeProvider::returning(Ok(ProviderCheckResult {
                eligible: false,
                credit: Decimal::ZERO,
                name: None,
                reason: Some(DeclineReason::ProviderForcedDown),
            })),
            notifier.clone(),
        );

        let enrichment = handler.execute("44556677", "51999").await;

        assert_eq!(
            enrichment,
            EligibilityEnrichment::SystemOutage { handoff_reason: FNB_DOWN_HANDOFF.to_owned() }
        );
        assert_eq!(notifier.notifications.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn fetcher_rejects_non_eligibility_requests() {
        let handler = CheckEligibilityHandler::new(
            FakeProvider::returning(Ok(eligible_result())),
            Arc::new(RecordingNotifier::default()),
        );

        let error = handler
            .fetch(
                &EnrichmentRequest::ProductCatalog {
                    segment: "fnb".to_owned(),
                    category: "cocinas".to_owned(),
                },
                "51999",
            )
            .await
            .expect_err("only eligibility checks are supported");

        assert!(error.to_string().contains("product_catalog"));
    }

    #[tokio::test]
    async fn fetcher_wraps_the_classification_as_an_enrichment_result() {
        let handler = CheckEligibilityHandler::new(
            FakeProvider::returning(Ok(eligible_result())),
            Arc::new(RecordingNotifier::default()),
        );

        let result = handler
            .fetch(
                &EnrichmentRequest::EligibilityCheck { document_id: "44556677".to_owned() },
                "51999",
            )
            .await
            .expect("eligibility check");

        assert!(matches!(
            result,
            EnrichmentResult::Eligibility(EligibilityEnrichment::Eligible { .. })
        ));
    }
}
