//! Users and their roles

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::core::identity::RecordId;

/// The side of the marketplace a user is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Founder,
    Investor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Founder => "founder",
            Role::Investor => "investor",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "founder" => Ok(Role::Founder),
            "investor" => Ok(Role::Investor),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// A registered user. Password material never leaves the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: RecordId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub created: DateTime<Utc>,
}

impl User {
    pub fn is(&self, role: Role) -> bool {
        self.role == role
    }
}
