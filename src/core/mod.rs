//! Core module - identity, storage and the pieces the wizard is built on

pub mod backend;
pub mod config;
pub mod draft;
pub mod identity;
pub mod project;
pub mod session;
pub mod submission;

pub use backend::{ApiError, Backend};
pub use config::Config;
pub use draft::{Draft, DraftStore, DraftStoreError, FileDraftStore, MemoryDraftStore};
pub use identity::{IdParseError, RecordId, RecordPrefix};
pub use project::{Project, ProjectError};
pub use session::{Session, SessionFile};
pub use submission::{
    IncompleteDraftError, SubmissionAssembler, SubmissionPayload, SubmissionReceipt,
    SubmissionTarget, SubmitFailure, SubmitResult,
};
