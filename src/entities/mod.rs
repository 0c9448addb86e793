//! Entity types stored by the backend

pub mod funding_request;
pub mod startup;
pub mod user;

pub use funding_request::{FundingRequest, FundingStatus, StatusCounts, TerminalStateError};
pub use startup::{Milestone, Startup};
pub use user::{Role, User};
