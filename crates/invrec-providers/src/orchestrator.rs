//! Extraction orchestrator: timeout, retry, and fallback across providers.

use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{OrchestratorError, ProviderError};
use crate::provider::ExtractionProvider;
use crate::types::{
    AttemptOutcome, DraftExtraction, ExtractionAttempt, ExtractionOptions, ProviderResponse,
};

/// Retry/timeout/fallback policy, parameterized per deployment rather than
/// hardcoded per provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorPolicy {
    /// Hard timeout per provider call, in seconds.
    pub timeout_secs: u64,

    /// Retries after a transient failure before falling to the next
    /// provider. Permanent failures never retry.
    pub max_retries: u32,
}

impl Default for OrchestratorPolicy {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_retries: 1,
        }
    }
}

impl OrchestratorPolicy {
    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Drives extraction for one page group across an ordered provider list.
///
/// Providers are tried in configuration order; the first syntactically valid
/// result wins regardless of which provider produced it. Every call is
/// recorded as an [`ExtractionAttempt`], and exactly one attempt is marked
/// accepted once extraction concludes.
pub struct Orchestrator {
    providers: Vec<Box<dyn ExtractionProvider>>,
    policy: OrchestratorPolicy,
    options: ExtractionOptions,
}

impl Orchestrator {
    /// Create an orchestrator over an ordered provider priority list.
    pub fn new(providers: Vec<Box<dyn ExtractionProvider>>, policy: OrchestratorPolicy) -> Self {
        Self {
            providers,
            policy,
            options: ExtractionOptions::default(),
        }
    }

    /// Override the options passed to every provider call.
    pub fn with_options(mut self, options: ExtractionOptions) -> Self {
        self.options = options;
        self
    }

    /// Extract structured fields from one page group's text.
    ///
    /// Fails with [`OrchestratorError::Exhausted`] only when every provider
    /// in the list has failed; the caller must then surface a manual-entry
    /// path rather than skipping extraction silently.
    pub async fn extract_invoice(&self, text: &str) -> Result<DraftExtraction, OrchestratorError> {
        if self.providers.is_empty() {
            return Err(OrchestratorError::NoProviders);
        }

        let mut attempts: Vec<ExtractionAttempt> = Vec::new();

        for provider in &self.providers {
            let mut tries = 0u32;

            loop {
                tries += 1;
                let started_at = Utc::now();

                let call = provider.extract(text, &self.options);
                let result = tokio::time::timeout(self.policy.timeout(), call).await;
                let finished_at = Utc::now();

                let mut attempt = ExtractionAttempt {
                    id: Uuid::new_v4(),
                    provider: provider.kind(),
                    started_at,
                    finished_at,
                    outcome: AttemptOutcome::Timeout,
                    raw_response: None,
                    self_confidence: None,
                    accepted: false,
                };

                match result {
                    Ok(Ok(response)) => {
                        if response.fields.is_valid() {
                            info!(
                                provider = %provider.kind(),
                                tries,
                                "Extraction accepted"
                            );
                            attempt.outcome = AttemptOutcome::Success;
                            attempt.raw_response = Some(response.raw.clone());
                            attempt.self_confidence = response.confidence;
                            attempt.accepted = true;
                            attempts.push(attempt);

                            let ProviderResponse {
                                fields, confidence, ..
                            } = response;
                            return Ok(DraftExtraction {
                                fields,
                                confidence,
                                attempts,
                            });
                        }

                        // A well-formed but incomplete result will not
                        // improve on retry; fall to the next provider.
                        warn!(provider = %provider.kind(), "Result failed validity checks");
                        attempt.outcome =
                            AttemptOutcome::Invalid("missing required fields".to_string());
                        attempt.raw_response = Some(response.raw);
                        attempt.self_confidence = response.confidence;
                        attempts.push(attempt);
                        break;
                    }
                    Ok(Err(ProviderError::Transient(msg))) => {
                        debug!(provider = %provider.kind(), tries, %msg, "Transient failure");
                        attempt.outcome = AttemptOutcome::Transient(msg);
                        attempts.push(attempt);
                        if tries > self.policy.max_retries {
                            break;
                        }
                    }
                    Ok(Err(ProviderError::Permanent(msg))) => {
                        warn!(provider = %provider.kind(), %msg, "Permanent failure, falling through");
                        attempt.outcome = AttemptOutcome::Permanent(msg);
                        attempts.push(attempt);
                        break;
                    }
                    Err(_elapsed) => {
                        debug!(
                            provider = %provider.kind(),
                            tries,
                            timeout_secs = self.policy.timeout_secs,
                            "Provider call timed out"
                        );
                        attempt.outcome = AttemptOutcome::Timeout;
                        attempts.push(attempt);
                        if tries > self.policy.max_retries {
                            break;
                        }
                    }
                }
            }
        }

        warn!(attempts = attempts.len(), "All providers exhausted");
        Err(OrchestratorError::Exhausted { attempts })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    use super::*;
    use crate::provider::ProviderKind;
    use crate::types::RawExtraction;

    /// What a scripted provider does on each successive call.
    enum Step {
        Succeed,
        SucceedInvalid,
        FailTransient,
        FailPermanent,
        Hang,
    }

    struct ScriptedProvider {
        kind: ProviderKind,
        script: Mutex<Vec<Step>>,
        calls: Mutex<u32>,
    }

    impl ScriptedProvider {
        fn new(kind: ProviderKind, script: Vec<Step>) -> Self {
            Self {
                kind,
                script: Mutex::new(script),
                calls: Mutex::new(0),
            }
        }

        fn call_count(&self) -> u32 {
            *self.calls.lock().unwrap()
        }

        fn valid_response() -> ProviderResponse {
            ProviderResponse {
                fields: RawExtraction {
                    invoice_number: Some("INV-100".to_string()),
                    vendor_name: Some("Acme Supply".to_string()),
                    total_amount: Some(Decimal::new(123000, 2)),
                    ..Default::default()
                },
                confidence: Some(0.9),
                raw: "{}".to_string(),
            }
        }
    }

    #[async_trait]
    impl ExtractionProvider for &ScriptedProvider {
        fn kind(&self) -> ProviderKind {
            self.kind
        }

        async fn extract(
            &self,
            _text: &str,
            _options: &ExtractionOptions,
        ) -> Result<ProviderResponse, ProviderError> {
            *self.calls.lock().unwrap() += 1;
            let step = self.script.lock().unwrap().remove(0);
            match step {
                Step::Succeed => Ok(ScriptedProvider::valid_response()),
                Step::SucceedInvalid => Ok(ProviderResponse {
                    fields: RawExtraction::default(),
                    confidence: None,
                    raw: "{}".to_string(),
                }),
                Step::FailTransient => Err(ProviderError::Transient("rate limited".to_string())),
                Step::FailPermanent => Err(ProviderError::Permanent("bad credentials".to_string())),
                Step::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!("hang step should be cut off by the timeout")
                }
            }
        }
    }

    fn policy() -> OrchestratorPolicy {
        OrchestratorPolicy {
            timeout_secs: 1,
            max_retries: 1,
        }
    }

    #[tokio::test]
    async fn first_valid_result_wins() {
        let p1 = Box::leak(Box::new(ScriptedProvider::new(
            ProviderKind::OpenAi,
            vec![Step::Succeed],
        )));
        let orchestrator = Orchestrator::new(vec![Box::new(&*p1)], policy());

        let draft = orchestrator.extract_invoice("some invoice text").await.unwrap();

        assert_eq!(draft.accepted_provider(), Some(ProviderKind::OpenAi));
        assert_eq!(draft.attempts.len(), 1);
        assert!(draft.attempts[0].accepted);
        assert_eq!(draft.fields.invoice_number.as_deref(), Some("INV-100"));
    }

    #[tokio::test]
    async fn transient_failure_retries_once_then_falls_back() {
        let p1 = Box::leak(Box::new(ScriptedProvider::new(
            ProviderKind::OpenAi,
            vec![Step::FailTransient, Step::FailTransient],
        )));
        let p2 = Box::leak(Box::new(ScriptedProvider::new(
            ProviderKind::Ollama,
            vec![Step::Succeed],
        )));
        let orchestrator = Orchestrator::new(vec![Box::new(&*p1), Box::new(&*p2)], policy());

        let draft = orchestrator.extract_invoice("text").await.unwrap();

        // Provider 1: initial call plus exactly one retry.
        assert_eq!(p1.call_count(), 2);
        assert_eq!(draft.accepted_provider(), Some(ProviderKind::Ollama));
        assert_eq!(draft.attempts.len(), 3);
        let accepted: Vec<_> = draft.attempts.iter().filter(|a| a.accepted).collect();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].provider, ProviderKind::Ollama);
    }

    #[tokio::test]
    async fn permanent_failure_falls_through_without_retry() {
        let p1 = Box::leak(Box::new(ScriptedProvider::new(
            ProviderKind::OpenAi,
            vec![Step::FailPermanent],
        )));
        let p2 = Box::leak(Box::new(ScriptedProvider::new(
            ProviderKind::Ollama,
            vec![Step::Succeed],
        )));
        let orchestrator = Orchestrator::new(vec![Box::new(&*p1), Box::new(&*p2)], policy());

        let draft = orchestrator.extract_invoice("text").await.unwrap();

        assert_eq!(p1.call_count(), 1);
        assert_eq!(draft.accepted_provider(), Some(ProviderKind::Ollama));
    }

    #[tokio::test]
    async fn exhaustion_reports_all_attempts() {
        let p1 = Box::leak(Box::new(ScriptedProvider::new(
            ProviderKind::OpenAi,
            vec![Step::FailPermanent],
        )));
        let p2 = Box::leak(Box::new(ScriptedProvider::new(
            ProviderKind::Ollama,
            vec![Step::FailPermanent],
        )));
        let orchestrator = Orchestrator::new(vec![Box::new(&*p1), Box::new(&*p2)], policy());

        let err = orchestrator.extract_invoice("text").await.unwrap_err();

        match err {
            OrchestratorError::Exhausted { attempts } => {
                assert_eq!(attempts.len(), 2);
                assert!(attempts.iter().all(|a| !a.accepted));
                assert!(matches!(attempts[0].outcome, AttemptOutcome::Permanent(_)));
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn timeout_counts_as_transient() {
        let p1 = Box::leak(Box::new(ScriptedProvider::new(
            ProviderKind::OpenAi,
            vec![Step::Hang, Step::Succeed],
        )));
        let orchestrator = Orchestrator::new(vec![Box::new(&*p1)], policy());

        let draft = orchestrator.extract_invoice("text").await.unwrap();

        assert_eq!(p1.call_count(), 2);
        assert_eq!(draft.attempts.len(), 2);
        assert_eq!(draft.attempts[0].outcome, AttemptOutcome::Timeout);
        assert!(draft.attempts[1].accepted);
    }

    #[tokio::test]
    async fn invalid_result_falls_through() {
        let p1 = Box::leak(Box::new(ScriptedProvider::new(
            ProviderKind::OpenAi,
            vec![Step::SucceedInvalid],
        )));
        let p2 = Box::leak(Box::new(ScriptedProvider::new(
            ProviderKind::Ollama,
            vec![Step::Succeed],
        )));
        let orchestrator = Orchestrator::new(vec![Box::new(&*p1), Box::new(&*p2)], policy());

        let draft = orchestrator.extract_invoice("text").await.unwrap();

        assert_eq!(p1.call_count(), 1);
        assert!(matches!(
            draft.attempts[0].outcome,
            AttemptOutcome::Invalid(_)
        ));
        assert_eq!(draft.accepted_provider(), Some(ProviderKind::Ollama));
    }

    #[tokio::test]
    async fn no_providers_is_an_error() {
        let orchestrator = Orchestrator::new(vec![], policy());
        let err = orchestrator.extract_invoice("text").await.unwrap_err();
        assert!(matches!(err, OrchestratorError::NoProviders));
    }
}
