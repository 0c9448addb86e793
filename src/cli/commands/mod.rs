//! CLI command implementations

pub mod auth;
pub mod completions;
pub mod init;
pub mod investor;
pub mod request;
pub mod schema;
pub mod startup;
pub mod validate;
pub mod wizard;
