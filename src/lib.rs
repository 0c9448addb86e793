//! fundr: founder/investor funding toolkit
//!
//! A founder builds a startup profile through a schema-driven, multi-section
//! wizard and submits it; investors browse startups and move funding
//! requests through review.

pub mod cli;
pub mod core;
pub mod entities;
pub mod logging;
pub mod schema;
