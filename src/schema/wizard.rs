//! Multi-step wizard state machine
//!
//! The controller walks an ordered list of sections. Moving forward is gated
//! on validation; every committed section is persisted before the position
//! changes. At the last section a successful advance submits the assembled
//! draft and ends in the `Submitted` phase.
//!
//! All transitions take `&self`. A second transition started while one is
//! in flight is rejected rather than queued.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::draft::{Draft, DraftStore, DraftStoreError};
use crate::core::submission::{
    IncompleteDraftError, SubmissionAssembler, SubmissionReceipt, SubmissionTarget, SubmitFailure,
};
use crate::schema::registry::{RegistryError, SchemaRegistry, Section};
use crate::schema::validator::{validate_section, ValidationResult};

/// Default wait for the submission target
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("unknown section '{0}'")]
    UnknownSection(String),

    #[error("cannot jump to '{target}' before the sections leading to it are completed")]
    NotYetReached {
        target: String,
        index: usize,
        highest_validated: Option<usize>,
    },
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error(transparent)]
    Navigation(#[from] NavigationError),

    #[error("another wizard transition is already in progress")]
    ConcurrentTransition,

    #[error("the profile has already been submitted; reset the wizard to start over")]
    AlreadySubmitted,

    #[error(transparent)]
    Incomplete(#[from] IncompleteDraftError),

    #[error(transparent)]
    Store(#[from] DraftStoreError),

    #[error(transparent)]
    Submit(#[from] SubmitFailure),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardPhase {
    Editing,
    Submitted,
}

/// Snapshot of the wizard's position and data
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WizardState {
    pub phase: WizardPhase,
    pub current_section_index: usize,
    pub draft: Draft,
    /// Whether each section's committed data passed validation
    pub section_validity: HashMap<String, bool>,
    pub highest_validated: Option<usize>,
    /// Saved but uncommitted data per section
    #[serde(skip)]
    pub working: HashMap<String, Value>,
}

impl WizardState {
    fn fresh(registry: &SchemaRegistry) -> Self {
        Self {
            phase: WizardPhase::Editing,
            current_section_index: 0,
            draft: Draft::for_sections(registry.ids()),
            section_validity: registry.ids().map(|id| (id.to_string(), false)).collect(),
            highest_validated: None,
            working: HashMap::new(),
        }
    }

    pub fn is_valid(&self, section_id: &str) -> bool {
        self.section_validity.get(section_id).copied().unwrap_or(false)
    }

    pub fn is_submitted(&self) -> bool {
        self.phase == WizardPhase::Submitted
    }

    /// Data `advance` would validate for a section
    pub fn data_for(&self, section_id: &str) -> Value {
        self.working
            .get(section_id)
            .or_else(|| self.draft.get(section_id))
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }
}

/// Outcome of [`WizardController::advance`]
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// Section committed; position moved forward
    Moved { from: usize, to: usize },
    /// Validation failed; nothing changed
    Refused(ValidationResult),
    /// Last section committed and the draft accepted
    Submitted(SubmissionReceipt),
}

/// Clears the in-flight flag when a transition ends
struct TransitionGuard<'a>(&'a AtomicBool);

impl Drop for TransitionGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct WizardController {
    registry: Arc<SchemaRegistry>,
    store: Arc<dyn DraftStore>,
    assembler: SubmissionAssembler,
    submit_timeout: Duration,
    state: Mutex<WizardState>,
    in_flight: AtomicBool,
}

impl std::fmt::Debug for WizardController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WizardController")
            .field("state", &*self.lock())
            .field("submit_timeout", &self.submit_timeout)
            .finish_non_exhaustive()
    }
}

impl WizardController {
    /// Start a fresh wizard at the first section
    pub fn new(
        registry: Arc<SchemaRegistry>,
        store: Arc<dyn DraftStore>,
        target: Arc<dyn SubmissionTarget>,
    ) -> Self {
        let state = WizardState::fresh(&registry);
        Self {
            assembler: SubmissionAssembler::new(Arc::clone(&registry), target),
            registry,
            store,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
            state: Mutex::new(state),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Continue from the draft in `store`, if any.
    ///
    /// Stored sections are re-validated. The wizard resumes at the first
    /// section without valid committed data; every section before it counts
    /// as validated.
    pub fn resume(
        registry: Arc<SchemaRegistry>,
        store: Arc<dyn DraftStore>,
        target: Arc<dyn SubmissionTarget>,
    ) -> Self {
        let controller = Self::new(registry, store, target);
        if let Some(stored) = controller.store.load() {
            let mut state = controller.lock();
            for section in controller.registry.sections() {
                let Some(data) = stored.get(section.id()) else {
                    continue;
                };
                let valid = validate_section(section, data).valid;
                state.section_validity.insert(section.id().to_string(), valid);
                if valid {
                    state.draft.commit(section.id(), data.clone());
                } else {
                    warn!(section = section.id(), "stored section no longer validates");
                    state.working.insert(section.id().to_string(), data.clone());
                }
            }

            let prefix = controller
                .registry
                .ids()
                .take_while(|id| state.is_valid(id))
                .count();
            state.highest_validated = prefix.checked_sub(1);
            state.current_section_index = prefix.min(controller.registry.len().saturating_sub(1));
            debug!(
                index = state.current_section_index,
                completed = prefix,
                "resumed wizard from stored draft"
            );
        }
        controller
    }

    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Read-only snapshot of the current state
    pub fn state(&self) -> WizardState {
        self.lock().clone()
    }

    pub fn current_index(&self) -> usize {
        self.lock().current_section_index
    }

    pub fn current_section(&self) -> Result<&Section, WizardError> {
        let index = self.current_index();
        self.section(index)
    }

    /// Data currently shown for the current section
    pub fn current_data(&self) -> Value {
        let state = self.lock();
        let index = state.current_section_index;
        match self.registry.section_at(index) {
            Some(section) => state.data_for(section.id()),
            None => Value::Object(Map::new()),
        }
    }

    /// Validate the current section's data without changing anything
    pub fn validate_current(&self) -> Result<ValidationResult, WizardError> {
        let section = self.current_section()?;
        Ok(validate_section(section, &self.current_data()))
    }

    /// Save in-progress data for the current section without committing it
    pub fn update_current(&self, data: Value) -> Result<(), WizardError> {
        let _guard = self.begin()?;
        let mut state = self.lock();
        if state.is_submitted() {
            return Err(WizardError::AlreadySubmitted);
        }
        let id = self.section(state.current_section_index)?.id().to_string();
        debug!(section = %id, "saved section data");
        state.working.insert(id, data);
        Ok(())
    }

    /// Validate the current section and move forward when it passes
    pub fn advance(&self) -> Result<Advance, WizardError> {
        let _guard = self.begin()?;

        let (index, data, mut draft) = {
            let state = self.lock();
            if state.is_submitted() {
                return Err(WizardError::AlreadySubmitted);
            }
            let index = state.current_section_index;
            let id = self.section(index)?.id();
            (index, state.data_for(id), state.draft.clone())
        };
        let section = self.section(index)?;

        let result = validate_section(section, &data);
        if !result.valid {
            warn!(
                section = section.id(),
                errors = result.errors.len(),
                "advance refused"
            );
            return Ok(Advance::Refused(result));
        }

        draft.commit(section.id(), data);
        self.store.save(&draft)?;

        let last = index + 1 == self.registry.len();
        {
            let mut state = self.lock();
            state.draft = draft.clone();
            state.working.remove(section.id());
            state.section_validity.insert(section.id().to_string(), true);
            state.highest_validated = Some(state.highest_validated.map_or(index, |h| h.max(index)));
            if !last {
                state.current_section_index = index + 1;
            }
        }
        info!(section = section.id(), index, "committed section");

        if last {
            return self.submit_draft(&draft).map(Advance::Submitted);
        }
        Ok(Advance::Moved {
            from: index,
            to: index + 1,
        })
    }

    /// Retry submission of the committed draft
    pub fn submit(&self) -> Result<SubmissionReceipt, WizardError> {
        let _guard = self.begin()?;
        let draft = {
            let state = self.lock();
            if state.is_submitted() {
                return Err(WizardError::AlreadySubmitted);
            }
            state.draft.clone()
        };
        self.submit_draft(&draft)
    }

    /// Move back one section; `false` when already at the first
    pub fn retreat(&self) -> Result<bool, WizardError> {
        let _guard = self.begin()?;
        let mut state = self.lock();
        if state.is_submitted() {
            return Err(WizardError::AlreadySubmitted);
        }
        if state.current_section_index == 0 {
            return Ok(false);
        }
        state.current_section_index -= 1;
        debug!(index = state.current_section_index, "retreated");
        Ok(true)
    }

    /// Jump to a section no later than the highest validated one
    pub fn jump_to(&self, section_id: &str) -> Result<(), WizardError> {
        let _guard = self.begin()?;
        let target = self
            .registry
            .index_of(section_id)
            .ok_or_else(|| NavigationError::UnknownSection(section_id.to_string()))?;

        let mut state = self.lock();
        if state.is_submitted() {
            return Err(WizardError::AlreadySubmitted);
        }
        match state.highest_validated {
            Some(highest) if target <= highest => {
                state.current_section_index = target;
                debug!(index = target, "jumped");
                Ok(())
            }
            highest_validated => Err(NavigationError::NotYetReached {
                target: section_id.to_string(),
                index: target,
                highest_validated,
            }
            .into()),
        }
    }

    /// Discard the draft and start over
    pub fn reset(&self) -> Result<(), WizardError> {
        let _guard = self.begin()?;
        self.store.clear()?;
        *self.lock() = WizardState::fresh(&self.registry);
        info!("wizard reset");
        Ok(())
    }

    fn submit_draft(&self, draft: &Draft) -> Result<SubmissionReceipt, WizardError> {
        let payload = match self.assembler.assemble(draft) {
            Ok(payload) => payload,
            Err(incomplete) => {
                if let Some(index) = incomplete.first().and_then(|id| self.registry.index_of(id)) {
                    self.lock().current_section_index = index;
                }
                warn!(missing = ?incomplete.missing, "draft incomplete");
                return Err(incomplete.into());
            }
        };

        let receipt = self.assembler.submit(&payload, self.submit_timeout)?;

        if let Err(e) = self.store.clear() {
            warn!(error = %e, "submitted, but the stored draft could not be cleared");
        }
        let mut state = self.lock();
        *state = WizardState::fresh(&self.registry);
        state.phase = WizardPhase::Submitted;
        Ok(receipt)
    }

    fn begin(&self) -> Result<TransitionGuard<'_>, WizardError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| WizardError::ConcurrentTransition)?;
        Ok(TransitionGuard(&self.in_flight))
    }

    fn lock(&self) -> MutexGuard<'_, WizardState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn section(&self, index: usize) -> Result<&Section, WizardError> {
        self.registry
            .section_at(index)
            .ok_or_else(|| RegistryError::UnknownSection(format!("#{}", index)).into())
    }
}
