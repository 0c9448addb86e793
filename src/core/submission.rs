//! Submission assembly and hand-off
//!
//! The assembler flattens a complete draft into the payload the startup
//! API expects and hands it to a [`SubmissionTarget`] under a timeout.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::draft::Draft;
use crate::schema::SchemaRegistry;

/// Required sections still missing from a draft
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Complete the '{}' section before submitting", .missing.first().map(String::as_str).unwrap_or("?"))]
pub struct IncompleteDraftError {
    /// Missing required section ids, in wizard order
    pub missing: Vec<String>,
}

impl IncompleteDraftError {
    /// The first section the user needs to return to
    pub fn first(&self) -> Option<&str> {
        self.missing.first().map(String::as_str)
    }
}

/// Flattened profile fields plus the raw section documents
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SubmissionPayload {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
    pub sections: Map<String, Value>,
}

impl SubmissionPayload {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// Acknowledgement from the receiving side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Why a submission did not go through; all are retryable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitFailure {
    #[error("submission timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("submission rejected: {0}")]
    Rejected(String),

    #[error("submission worker stopped before answering")]
    Disconnected,
}

pub type SubmitResult = Result<SubmissionReceipt, SubmitFailure>;

/// The receiving side of a submission (the startup-profile API)
pub trait SubmissionTarget: Send + Sync {
    fn submit(&self, payload: &SubmissionPayload) -> SubmitResult;
}

/// Builds payloads from drafts and delivers them
#[derive(Clone)]
pub struct SubmissionAssembler {
    registry: Arc<SchemaRegistry>,
    target: Arc<dyn SubmissionTarget>,
    /// Answer channel of a delivery that outlived its caller's timeout
    pending: Arc<Mutex<Option<mpsc::Receiver<SubmitResult>>>>,
}

impl std::fmt::Debug for SubmissionAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionAssembler")
            .field("sections", &self.registry.len())
            .field("in_flight", &self.in_flight())
            .finish_non_exhaustive()
    }
}

impl SubmissionAssembler {
    pub fn new(registry: Arc<SchemaRegistry>, target: Arc<dyn SubmissionTarget>) -> Self {
        Self {
            registry,
            target,
            pending: Arc::new(Mutex::new(None)),
        }
    }

    /// Whether an earlier delivery timed out and has not answered yet
    pub fn in_flight(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Flatten a draft into the submission payload
    pub fn assemble(&self, draft: &Draft) -> Result<SubmissionPayload, IncompleteDraftError> {
        let missing: Vec<String> = self
            .registry
            .sections()
            .iter()
            .filter(|s| s.required() && !draft.is_complete(s.id()))
            .map(|s| s.id().to_string())
            .collect();
        if !missing.is_empty() {
            return Err(IncompleteDraftError { missing });
        }

        let document = draft.to_value();
        let mut fields = Map::new();
        for (name, pointer) in self.registry.payload_mapping() {
            match document.pointer(pointer) {
                Some(value) if !value.is_null() => {
                    fields.insert(name.clone(), value.clone());
                }
                _ => debug!(field = %name, pointer = %pointer, "payload field not present"),
            }
        }

        let sections = self
            .registry
            .ids()
            .filter_map(|id| draft.get(id).map(|v| (id.to_string(), v.clone())))
            .collect();

        Ok(SubmissionPayload { fields, sections })
    }

    /// Deliver a payload, giving up after `timeout` without retrying.
    ///
    /// The target runs on its own thread. A call that times out stays
    /// pending: the next `submit` waits on that call's answer instead of
    /// delivering again, and only starts a fresh delivery once the earlier
    /// one has failed.
    pub fn submit(&self, payload: &SubmissionPayload, timeout: Duration) -> SubmitResult {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(rx) = pending.take() {
            debug!("waiting on earlier submission");
            match rx.recv_timeout(timeout) {
                Ok(Ok(receipt)) => {
                    info!(id = %receipt.id, "earlier submission accepted");
                    return Ok(receipt);
                }
                Ok(Err(failure)) => {
                    debug!(%failure, "earlier submission failed, delivering again");
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    *pending = Some(rx);
                    let failure = SubmitFailure::Timeout(timeout);
                    warn!(%failure, "earlier submission still in flight");
                    return Err(failure);
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    debug!("earlier submission vanished, delivering again");
                }
            }
        }

        let (tx, rx) = mpsc::channel();
        let target = Arc::clone(&self.target);
        let payload = payload.clone();

        std::thread::spawn(move || {
            let result = target.submit(&payload);
            // The receiver is gone once the assembler is dropped
            let _ = tx.send(result);
        });

        let result = match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                *pending = Some(rx);
                Err(SubmitFailure::Timeout(timeout))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(SubmitFailure::Disconnected),
        };

        match &result {
            Ok(receipt) => info!(id = %receipt.id, "submission accepted"),
            Err(failure) => warn!(%failure, "submission failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Recording {
        seen: Mutex<Vec<SubmissionPayload>>,
        answer: SubmitResult,
        delay: Duration,
    }

    impl Recording {
        fn answering(answer: SubmitResult) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                answer,
                delay: Duration::ZERO,
            })
        }
    }

    impl SubmissionTarget for Recording {
        fn submit(&self, payload: &SubmissionPayload) -> SubmitResult {
            std::thread::sleep(self.delay);
            self.seen.lock().unwrap().push(payload.clone());
            self.answer.clone()
        }
    }

    fn registry() -> Arc<SchemaRegistry> {
        Arc::new(SchemaRegistry::embedded().unwrap())
    }

    fn complete_draft(registry: &SchemaRegistry) -> Draft {
        let mut draft = Draft::for_sections(registry.ids());
        draft.commit("pitch", json!({ "startupName": "Acme", "oneLiner": "Anvils for the road runner economy" }));
        draft.commit("team", json!({ "teamSize": 4, "techStack": ["Rust"] }));
        draft.commit("traction", json!({ "userCount": 10, "futureGoals": "Grow" }));
        draft.commit("funding", json!({ "amountRequired": "$500,000" }));
        draft.commit("founder", json!({ "email": "wile@acme.test" }));
        draft
    }

    fn receipt() -> SubmitResult {
        Ok(SubmissionReceipt {
            id: "STU-1".into(),
            message: None,
        })
    }

    #[test]
    fn test_assemble_flattens_mapped_fields() {
        let registry = registry();
        let assembler = SubmissionAssembler::new(registry.clone(), Recording::answering(receipt()));
        let payload = assembler.assemble(&complete_draft(&registry)).unwrap();

        assert_eq!(payload.str_field("companyName"), Some("Acme"));
        assert_eq!(payload.field("teamSize"), Some(&json!(4)));
        assert_eq!(payload.str_field("fundingNeeded"), Some("$500,000"));
        assert_eq!(payload.str_field("founderEmail"), Some("wile@acme.test"));
        // optional documents section was never completed
        assert!(payload.field("documents").is_none());
        assert!(!payload.sections.contains_key("documents"));
        assert_eq!(payload.sections.len(), 5);
    }

    #[test]
    fn test_assemble_reports_missing_required_sections() {
        let registry = registry();
        let assembler = SubmissionAssembler::new(registry.clone(), Recording::answering(receipt()));
        let mut draft = complete_draft(&registry);
        draft.uncommit("traction");
        draft.uncommit("founder");

        let err = assembler.assemble(&draft).unwrap_err();
        assert_eq!(err.missing, vec!["traction".to_string(), "founder".to_string()]);
        assert_eq!(err.first(), Some("traction"));
    }

    #[test]
    fn test_submit_passes_through_target_answer() {
        let registry = registry();
        let target = Recording::answering(Err(SubmitFailure::Rejected("startup already exists".into())));
        let assembler = SubmissionAssembler::new(registry.clone(), target.clone());
        let payload = assembler.assemble(&complete_draft(&registry)).unwrap();

        let result = assembler.submit(&payload, Duration::from_secs(5));
        assert_eq!(result, Err(SubmitFailure::Rejected("startup already exists".into())));
        assert_eq!(target.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_submit_times_out() {
        let registry = registry();
        let target = Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
            answer: receipt(),
            delay: Duration::from_millis(500),
        });
        let assembler = SubmissionAssembler::new(registry.clone(), target);
        let payload = assembler.assemble(&complete_draft(&registry)).unwrap();

        let result = assembler.submit(&payload, Duration::from_millis(20));
        assert!(matches!(result, Err(SubmitFailure::Timeout(_))));
    }

    fn slow(delay: Duration, answer: SubmitResult) -> Arc<Recording> {
        Arc::new(Recording {
            seen: Mutex::new(Vec::new()),
            answer,
            delay,
        })
    }

    #[test]
    fn test_retry_after_timeout_waits_for_earlier_delivery() {
        let registry = registry();
        let target = slow(Duration::from_millis(200), receipt());
        let assembler = SubmissionAssembler::new(registry.clone(), target.clone());
        let payload = assembler.assemble(&complete_draft(&registry)).unwrap();

        let first = assembler.submit(&payload, Duration::from_millis(50));
        assert!(matches!(first, Err(SubmitFailure::Timeout(_))));
        assert!(assembler.in_flight());

        std::thread::sleep(Duration::from_millis(300));
        let second = assembler.submit(&payload, Duration::from_millis(50));
        assert_eq!(second, receipt());
        assert_eq!(target.seen.lock().unwrap().len(), 1);
        assert!(!assembler.in_flight());
    }

    #[test]
    fn test_retry_while_earlier_delivery_still_running_does_not_resend() {
        let registry = registry();
        let target = slow(Duration::from_millis(300), receipt());
        let assembler = SubmissionAssembler::new(registry.clone(), target.clone());
        let payload = assembler.assemble(&complete_draft(&registry)).unwrap();

        assert!(matches!(
            assembler.submit(&payload, Duration::from_millis(20)),
            Err(SubmitFailure::Timeout(_))
        ));
        assert!(matches!(
            assembler.submit(&payload, Duration::from_millis(20)),
            Err(SubmitFailure::Timeout(_))
        ));
        assert_eq!(assembler.submit(&payload, Duration::from_secs(5)), receipt());
        assert_eq!(target.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_retry_after_rejected_late_answer_delivers_again() {
        let registry = registry();
        let target = slow(
            Duration::from_millis(100),
            Err(SubmitFailure::Rejected("server unavailable".into())),
        );
        let assembler = SubmissionAssembler::new(registry.clone(), target.clone());
        let payload = assembler.assemble(&complete_draft(&registry)).unwrap();

        assert!(matches!(
            assembler.submit(&payload, Duration::from_millis(20)),
            Err(SubmitFailure::Timeout(_))
        ));
        std::thread::sleep(Duration::from_millis(200));
        let result = assembler.submit(&payload, Duration::from_secs(5));
        assert_eq!(result, Err(SubmitFailure::Rejected("server unavailable".into())));
        assert_eq!(target.seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_payload_serializes_flat() {
        let mut payload = SubmissionPayload::default();
        payload.fields.insert("companyName".into(), json!("Acme"));
        payload.sections.insert("pitch".into(), json!({}));
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["companyName"], "Acme");
        assert!(value["sections"]["pitch"].is_object());
    }
}
