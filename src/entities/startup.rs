//! Startup profile entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::identity::RecordId;

/// A dated milestone reported by the founder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A stored startup profile. Every startup has exactly one founder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Startup {
    pub id: RecordId,
    pub founder: RecordId,
    pub company_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_size: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tech_stack: Vec<String>,

    /// Amount sought, in whole USD
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funding_needed: Option<f64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub milestones: Vec<Milestone>,

    /// Document references (paths or URLs) keyed by kind
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<(String, String)>,

    /// The full section-by-section profile as submitted
    #[serde(default)]
    pub profile: Value,

    pub created: DateTime<Utc>,
}

/// Parse a money string such as `$1,250,000.00` into a number
pub fn parse_money(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}
