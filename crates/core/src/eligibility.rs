//! Eligibility check classification.
//!
//! A provider outcome is either a business decision (eligible / not
//! qualified) or an operational failure. The two must never be conflated:
//! telling a customer "the system is down" when they were declined, or
//! hiding a real outage behind a polite decline, are both incidents.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured reason codes returned by the provider alongside a
/// non-eligible result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclineReason {
    ApiError,
    ProviderUnavailable,
    ProviderForcedDown,
    NotQualified,
}

impl DeclineReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiError => "api_error",
            Self::ProviderUnavailable => "provider_unavailable",
            Self::ProviderForcedDown => "provider_forced_down",
            Self::NotQualified => "not_qualified",
        }
    }

    /// Reasons that describe the provider's own health rather than the
    /// customer's standing.
    pub fn is_technical(&self) -> bool {
        matches!(self, Self::ApiError | Self::ProviderUnavailable | Self::ProviderForcedDown)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProviderError {
    #[error("provider call failed: {0}")]
    Call(String),
    #[error("provider call timed out after {0} ms")]
    Timeout(u64),
    #[error("provider returned an invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderCheckResult {
    pub eligible: bool,
    pub credit: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<DeclineReason>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilitySource {
    Fnb,
}

/// Raised when a working provider had to cover for a failed one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradationWarning {
    pub failed_provider: String,
    pub working_provider: String,
    pub errors: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EligibilityEvaluation {
    pub result: ProviderCheckResult,
    pub source: EligibilitySource,
    pub warnings: Vec<DegradationWarning>,
}

/// Raw outcome per provider. FNB is the required one.
#[derive(Debug)]
pub struct ProviderResults {
    pub fnb: Result<ProviderCheckResult, ProviderError>,
}

/// The required provider technically failed. Callers must alert operations
/// and tell the customer a human will follow up; this is never a decline.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("system outage: required eligibility provider failed")]
pub struct SystemOutageError {
    #[source]
    pub fnb_error: ProviderError,
}

/// Classify the eligibility check.
///
/// Technical failure of the required provider becomes `SystemOutageError`.
/// A successful check passes through when eligible, and is normalized to a
/// `not_qualified` business decline when not.
pub fn evaluate_results(
    results: ProviderResults,
) -> Result<EligibilityEvaluation, SystemOutageError> {
    let fnb = match results.fnb {
        Err(error) => return Err(SystemOutageError { fnb_error: error }),
        Ok(result) => result,
    };

    if let Some(reason) = fnb.reason.filter(DeclineReason::is_technical) {
        return Err(SystemOutageError {
            fnb_error: ProviderError::Call(format!(
                "provider reported failure reason {}",
                reason.as_str()
            )),
        });
    }

    if fnb.eligible {
        return Ok(EligibilityEvaluation {
            result: fnb,
            source: EligibilitySource::Fnb,
            warnings: Vec::new(),
        });
    }

    Ok(EligibilityEvaluation {
        result: ProviderCheckResult {
            eligible: false,
            credit: Decimal::ZERO,
            name: None,
            reason: Some(DeclineReason::NotQualified),
        },
        source: EligibilitySource::Fnb,
        warnings: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{
        evaluate_results, DeclineReason, EligibilitySource, ProviderCheckResult, ProviderError,
        ProviderResults,
    };

    fn eligible_result() -> ProviderCheckResult {
        ProviderCheckResult {
            eligible: true,
            credit: Decimal::new(3_500_00, 2),
            name: Some("Maria Quispe".to_owned()),
            reason: None,
        }
    }

    #[test]
    fn provider_error_is_a_system_outage() {
        let outage = evaluate_results(ProviderResults {
            fnb: Err(ProviderError::Timeout(8_000)),
        })
        .expect_err("errored call must classify as outage");

        assert_eq!(outage.fnb_error, ProviderError::Timeout(8_000));
    }

    #[test]
    fn structured_technical_reason_is_a_system_outage() {
        let outage = evaluate_results(ProviderResults {
            fnb: Ok(ProviderCheckResult {
                eligible: false,
                credit: Decimal::ZERO,
                name: None,
                reason: Some(DeclineReason::ProviderUnavailable),
            }),
        })
        .expect_err("provider_unavailable is operational, not a decline");

        assert!(matches!(outage.fnb_error, ProviderError::Call(ref message)
            if message.contains("provider_unavailable")));
    }

    #[test]
    fn eligible_result_passes_through_with_source() {
        let evaluation = evaluate_results(ProviderResults { fnb: Ok(eligible_result()) })
            .expect("eligible result is not an outage");

        assert_eq!(evaluation.result, eligible_result());
        assert_eq!(evaluation.source, EligibilitySource::Fnb);
        assert!(evaluation.warnings.is_empty());
    }

    #[test]
    fn ineligible_result_becomes_a_business_decline() {
        let evaluation = evaluate_results(ProviderResults {
            fnb: Ok(ProviderCheckResult {
                eligible: false,
                credit: Decimal::new(100_00, 2),
                name: Some("Jose".to_owned()),
                reason: None,
            }),
        })
        .expect("decline is a business decision, not an outage");

        assert!(!evaluation.result.eligible);
        assert_eq!(evaluation.result.credit, Decimal::ZERO);
        assert_eq!(evaluation.result.reason, Some(DeclineReason::NotQualified));
    }

    #[test]
    fn forced_down_reason_is_technical() {
        assert!(DeclineReason::ProviderForcedDown.is_technical());
        assert!(DeclineReason::ApiError.is_technical());
        assert!(!DeclineReason::NotQualified.is_technical());
    }
}
