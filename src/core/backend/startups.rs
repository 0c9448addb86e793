//! Startup profiles

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use super::{parse_id, parse_time, stamp, ApiError, Backend};
use crate::core::identity::{RecordId, RecordPrefix};
use crate::core::session::Session;
use crate::core::submission::{
    SubmissionPayload, SubmissionReceipt, SubmissionTarget, SubmitFailure, SubmitResult,
};
use crate::entities::startup::parse_money;
use crate::entities::{Milestone, Role, Startup};

const STARTUP_COLUMNS: &str = "id, founder_id, company_name, description, team_size, tech_stack, \
     funding_needed, milestones, documents, profile, created";

impl Backend {
    /// Store a submitted profile as a new startup owned by the founder
    pub fn create_startup(
        &self,
        session: &Session,
        payload: &SubmissionPayload,
    ) -> Result<Startup, ApiError> {
        let founder = session.require(Role::Founder)?;
        let startup = startup_from_payload(founder.id.clone(), payload)?;

        self.conn().execute(
            &format!(
                "INSERT INTO startups ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                STARTUP_COLUMNS
            ),
            params![
                startup.id.to_string(),
                startup.founder.to_string(),
                startup.company_name,
                startup.description,
                startup.team_size,
                serde_json::to_string(&startup.tech_stack)?,
                startup.funding_needed,
                serde_json::to_string(&startup.milestones)?,
                serde_json::to_string(&startup.documents)?,
                serde_json::to_string(&startup.profile)?,
                stamp(&startup.created),
            ],
        )?;
        info!(startup = %startup.id, founder = %startup.founder, "created startup");
        Ok(startup)
    }

    /// All startups, newest first. Investors only.
    pub fn list_startups(&self, session: &Session) -> Result<Vec<Startup>, ApiError> {
        session.require(Role::Investor)?;
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM startups ORDER BY created DESC, id DESC",
            STARTUP_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], RawStartup::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RawStartup::into_startup).collect()
    }

    /// A single startup. Founders may only see their own.
    pub fn get_startup(&self, session: &Session, id: &RecordId) -> Result<Startup, ApiError> {
        let startup = self
            .conn()
            .query_row(
                &format!("SELECT {} FROM startups WHERE id = ?1", STARTUP_COLUMNS),
                params![id.to_string()],
                RawStartup::from_row,
            )
            .optional()?
            .ok_or_else(|| ApiError::NotFound(format!("startup {}", id)))?
            .into_startup()?;

        let user = session.user();
        if user.is(Role::Founder) && startup.founder != user.id {
            return Err(ApiError::NotFound(format!("startup {}", id)));
        }
        Ok(startup)
    }

    /// The founder's most recent startup, if any
    pub fn startup_for_founder(&self, founder: &RecordId) -> Result<Option<Startup>, ApiError> {
        let raw = self
            .conn()
            .query_row(
                &format!(
                    "SELECT {} FROM startups WHERE founder_id = ?1 ORDER BY created DESC, id DESC LIMIT 1",
                    STARTUP_COLUMNS
                ),
                params![founder.to_string()],
                RawStartup::from_row,
            )
            .optional()?;
        raw.map(RawStartup::into_startup).transpose()
    }
}

fn startup_from_payload(founder: RecordId, payload: &SubmissionPayload) -> Result<Startup, ApiError> {
    let company_name = payload
        .str_field("companyName")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Invalid("companyName is required".into()))?
        .to_string();

    let funding_needed = match payload.field("fundingNeeded") {
        Some(Value::String(s)) => Some(
            parse_money(s).ok_or_else(|| ApiError::Invalid(format!("'{}' is not an amount", s)))?,
        ),
        Some(Value::Number(n)) => n.as_f64(),
        _ => None,
    };

    let tech_stack = payload
        .field("techStack")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(String::from).collect())
        .unwrap_or_default();

    let milestones = payload
        .field("milestones")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(milestone_from_value).collect())
        .unwrap_or_default();

    let documents = payload
        .field("documents")
        .and_then(Value::as_object)
        .map(|docs| {
            docs.iter()
                .filter_map(|(kind, v)| v.as_str().map(|s| (kind.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default();

    Ok(Startup {
        id: RecordId::new(RecordPrefix::Stu),
        founder,
        company_name,
        description: payload.str_field("description").map(String::from),
        team_size: payload
            .field("teamSize")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok()),
        tech_stack,
        funding_needed,
        milestones,
        documents,
        profile: Value::Object(payload.sections.clone()),
        created: Utc::now(),
    })
}

fn milestone_from_value(value: &Value) -> Option<Milestone> {
    let obj = value.as_object()?;
    let text = |key: &str| obj.get(key).and_then(Value::as_str).map(String::from);
    Some(Milestone {
        title: text("title")?,
        date: text("date"),
        description: text("description"),
    })
}

struct RawStartup {
    id: String,
    founder: String,
    company_name: String,
    description: Option<String>,
    team_size: Option<u32>,
    tech_stack: String,
    funding_needed: Option<f64>,
    milestones: String,
    documents: String,
    profile: String,
    created: String,
}

impl RawStartup {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            founder: row.get(1)?,
            company_name: row.get(2)?,
            description: row.get(3)?,
            team_size: row.get(4)?,
            tech_stack: row.get(5)?,
            funding_needed: row.get(6)?,
            milestones: row.get(7)?,
            documents: row.get(8)?,
            profile: row.get(9)?,
            created: row.get(10)?,
        })
    }

    fn into_startup(self) -> Result<Startup, ApiError> {
        Ok(Startup {
            id: parse_id(&self.id, RecordPrefix::Stu)?,
            founder: parse_id(&self.founder, RecordPrefix::Usr)?,
            company_name: self.company_name,
            description: self.description,
            team_size: self.team_size,
            tech_stack: serde_json::from_str(&self.tech_stack)?,
            funding_needed: self.funding_needed,
            milestones: serde_json::from_str(&self.milestones)?,
            documents: serde_json::from_str(&self.documents)?,
            profile: serde_json::from_str(&self.profile)?,
            created: parse_time(&self.created)?,
        })
    }
}

/// Delivers wizard submissions to the store as the signed-in founder
#[derive(Debug, Clone)]
pub struct ProfileSubmitter {
    backend: Arc<Backend>,
    session: Session,
}

impl ProfileSubmitter {
    pub fn new(backend: Arc<Backend>, session: Session) -> Self {
        Self { backend, session }
    }
}

impl SubmissionTarget for ProfileSubmitter {
    fn submit(&self, payload: &SubmissionPayload) -> SubmitResult {
        match self.backend.create_startup(&self.session, payload) {
            Ok(startup) => Ok(SubmissionReceipt {
                id: startup.id.to_string(),
                message: Some(format!("Created startup profile for {}", startup.company_name)),
            }),
            Err(e) => Err(SubmitFailure::Rejected(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sign_in(backend: &Backend, email: &str, role: Role) -> Session {
        let auth = backend.register(email, "longenough", "Test User", role).unwrap();
        Session::begin(backend, auth.token).unwrap()
    }

    fn payload(name: &str) -> SubmissionPayload {
        let fields = json!({
            "companyName": name,
            "description": "Robots that water plants",
            "teamSize": 4,
            "techStack": ["Rust", "Postgres"],
            "fundingNeeded": "$1,500,000",
            "milestones": [
                { "title": "Beta", "date": "2024-03-01", "description": "Closed beta shipped" },
                { "date": "2024-05-01" }
            ],
            "documents": { "pitchDeck": "deck.pdf" }
        });
        SubmissionPayload {
            fields: fields.as_object().unwrap().clone(),
            sections: json!({ "pitch": { "startupName": name } }).as_object().unwrap().clone(),
        }
    }

    #[test]
    fn test_create_startup_maps_payload() {
        let backend = Backend::open_in_memory().unwrap();
        let founder = sign_in(&backend, "f@x.io", Role::Founder);

        let startup = backend.create_startup(&founder, &payload("Sprout")).unwrap();
        assert_eq!(startup.founder, founder.user().id);
        assert_eq!(startup.team_size, Some(4));
        assert_eq!(startup.funding_needed, Some(1_500_000.0));
        assert_eq!(startup.tech_stack, vec!["Rust", "Postgres"]);
        assert_eq!(startup.milestones.len(), 1);
        assert_eq!(startup.documents, vec![("pitchDeck".to_string(), "deck.pdf".to_string())]);
        assert_eq!(startup.profile["pitch"]["startupName"], "Sprout");

        let stored = backend.get_startup(&founder, &startup.id).unwrap();
        assert_eq!(stored, startup);
    }

    #[test]
    fn test_create_startup_requires_founder_and_name() {
        let backend = Backend::open_in_memory().unwrap();
        let investor = sign_in(&backend, "i@x.io", Role::Investor);
        assert!(matches!(
            backend.create_startup(&investor, &payload("Sprout")).unwrap_err(),
            ApiError::Forbidden { .. }
        ));

        let founder = sign_in(&backend, "f@x.io", Role::Founder);
        let mut nameless = payload("Sprout");
        nameless.fields.remove("companyName");
        assert!(matches!(
            backend.create_startup(&founder, &nameless).unwrap_err(),
            ApiError::Invalid(_)
        ));
    }

    #[test]
    fn test_listing_and_visibility() {
        let backend = Backend::open_in_memory().unwrap();
        let alice = sign_in(&backend, "alice@x.io", Role::Founder);
        let bob = sign_in(&backend, "bob@x.io", Role::Founder);
        let investor = sign_in(&backend, "i@x.io", Role::Investor);

        let first = backend.create_startup(&alice, &payload("First")).unwrap();
        let second = backend.create_startup(&alice, &payload("Second")).unwrap();

        let listed = backend.list_startups(&investor).unwrap();
        assert_eq!(listed.len(), 2);
        assert!(matches!(backend.list_startups(&alice), Err(ApiError::Forbidden { .. })));

        assert!(backend.get_startup(&investor, &first.id).is_ok());
        assert!(matches!(
            backend.get_startup(&bob, &first.id).unwrap_err(),
            ApiError::NotFound(_)
        ));

        let latest = backend.startup_for_founder(&alice.user().id).unwrap().unwrap();
        assert_eq!(latest.id, second.id);
        assert!(backend.startup_for_founder(&bob.user().id).unwrap().is_none());
    }

    #[test]
    fn test_profile_submitter_reports_rejection() {
        let backend = Arc::new(Backend::open_in_memory().unwrap());
        let investor = sign_in(&backend, "i@x.io", Role::Investor);
        let submitter = ProfileSubmitter::new(Arc::clone(&backend), investor);
        assert!(matches!(
            submitter.submit(&payload("Sprout")).unwrap_err(),
            SubmitFailure::Rejected(_)
        ));

        let founder = sign_in(&backend, "f@x.io", Role::Founder);
        let receipt = ProfileSubmitter::new(backend, founder).submit(&payload("Sprout")).unwrap();
        assert!(receipt.id.starts_with("STU-"));
    }
}
