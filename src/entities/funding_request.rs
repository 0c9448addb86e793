//! Funding request entity and its status machine
//!
//! A founder asks one investor for funding; the investor then moves the
//! request through review. `funded` and `rejected` are terminal: once a
//! request reaches either, only a same-status update is accepted.
//! Intermediate states may be skipped (e.g. `pending` straight to `funded`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::identity::RecordId;

/// Review status of a funding request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FundingStatus {
    #[default]
    Pending,
    Verified,
    InMeeting,
    InDiscussion,
    Funded,
    Rejected,
}

impl FundingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FundingStatus::Pending => "pending",
            FundingStatus::Verified => "verified",
            FundingStatus::InMeeting => "in_meeting",
            FundingStatus::InDiscussion => "in_discussion",
            FundingStatus::Funded => "funded",
            FundingStatus::Rejected => "rejected",
        }
    }

    pub fn all() -> &'static [FundingStatus] {
        &[
            FundingStatus::Pending,
            FundingStatus::Verified,
            FundingStatus::InMeeting,
            FundingStatus::InDiscussion,
            FundingStatus::Funded,
            FundingStatus::Rejected,
        ]
    }

    /// Whether no further transition is permitted from this status
    pub fn is_terminal(&self) -> bool {
        matches!(self, FundingStatus::Funded | FundingStatus::Rejected)
    }

    /// Check a status update against the terminal-state rule
    pub fn check_transition(self, to: FundingStatus) -> Result<(), TerminalStateError> {
        if self.is_terminal() && self != to {
            return Err(TerminalStateError {
                current: self,
                requested: to,
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for FundingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FundingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "pending" => Ok(FundingStatus::Pending),
            "verified" => Ok(FundingStatus::Verified),
            "in_meeting" => Ok(FundingStatus::InMeeting),
            "in_discussion" => Ok(FundingStatus::InDiscussion),
            "funded" => Ok(FundingStatus::Funded),
            "rejected" => Ok(FundingStatus::Rejected),
            _ => Err(format!(
                "Unknown status: {} (valid: pending, verified, in_meeting, in_discussion, funded, rejected)",
                s
            )),
        }
    }
}

/// A status update attempted from a terminal status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Cannot change status once {current} (requested: {requested})")]
pub struct TerminalStateError {
    pub current: FundingStatus,
    pub requested: FundingStatus,
}

/// A founder's request for funding from one investor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingRequest {
    pub id: RecordId,
    pub startup: RecordId,
    pub investor: RecordId,
    pub status: FundingStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_schedule: Option<DateTime<Utc>>,

    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

/// Per-status request counts for the investor dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub verified: u64,
    pub in_meeting: u64,
    pub in_discussion: u64,
    pub funded: u64,
    pub rejected: u64,
}

impl StatusCounts {
    pub fn get(&self, status: FundingStatus) -> u64 {
        match status {
            FundingStatus::Pending => self.pending,
            FundingStatus::Verified => self.verified,
            FundingStatus::InMeeting => self.in_meeting,
            FundingStatus::InDiscussion => self.in_discussion,
            FundingStatus::Funded => self.funded,
            FundingStatus::Rejected => self.rejected,
        }
    }

    pub fn add(&mut self, status: FundingStatus, count: u64) {
        match status {
            FundingStatus::Pending => self.pending += count,
            FundingStatus::Verified => self.verified += count,
            FundingStatus::InMeeting => self.in_meeting += count,
            FundingStatus::InDiscussion => self.in_discussion += count,
            FundingStatus::Funded => self.funded += count,
            FundingStatus::Rejected => self.rejected += count,
        }
    }

    pub fn total(&self) -> u64 {
        FundingStatus::all().iter().map(|s| self.get(*s)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_parse_display_roundtrip() {
        for status in FundingStatus::all() {
            assert_eq!(status.to_string().parse::<FundingStatus>().unwrap(), *status);
        }
        assert_eq!("in-meeting".parse::<FundingStatus>().unwrap(), FundingStatus::InMeeting);
        assert!("closed".parse::<FundingStatus>().is_err());
    }

    #[test]
    fn test_terminal_statuses() {
        let terminal: Vec<_> = FundingStatus::all().iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![&FundingStatus::Funded, &FundingStatus::Rejected]);
    }

    #[test]
    fn test_funded_cannot_move_to_verified() {
        let err = FundingStatus::Funded
            .check_transition(FundingStatus::Verified)
            .unwrap_err();
        assert_eq!(err.current, FundingStatus::Funded);
        assert_eq!(err.requested, FundingStatus::Verified);
    }

    #[test]
    fn test_terminal_same_status_is_allowed() {
        assert!(FundingStatus::Funded.check_transition(FundingStatus::Funded).is_ok());
        assert!(FundingStatus::Rejected.check_transition(FundingStatus::Rejected).is_ok());
    }

    #[test]
    fn test_non_terminal_may_skip_states() {
        assert!(FundingStatus::Pending.check_transition(FundingStatus::Funded).is_ok());
        assert!(FundingStatus::InDiscussion.check_transition(FundingStatus::Pending).is_ok());
    }

    #[test]
    fn test_status_counts() {
        let mut counts = StatusCounts::default();
        counts.add(FundingStatus::Pending, 2);
        counts.add(FundingStatus::Funded, 1);
        assert_eq!(counts.get(FundingStatus::Pending), 2);
        assert_eq!(counts.get(FundingStatus::Rejected), 0);
        assert_eq!(counts.total(), 3);
    }
}
