//! Funding requests between founders and investors

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;
use tracing::info;

use super::{parse_id, parse_time, stamp, ApiError, Backend};
use crate::core::identity::{RecordId, RecordPrefix};
use crate::core::session::Session;
use crate::entities::{FundingRequest, FundingStatus, Role, StatusCounts};

/// A request joined with the names needed to display it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestView {
    #[serde(flatten)]
    pub request: FundingRequest,
    pub company_name: String,
    pub founder_name: String,
    pub founder_email: String,
    pub investor_name: String,
}

const VIEW_SELECT: &str = "SELECT r.id, r.startup_id, r.investor_id, r.status, r.notes, \
     r.meeting_schedule, r.created, r.updated, s.company_name, f.name, f.email, i.name \
     FROM funding_requests r \
     JOIN startups s ON s.id = r.startup_id \
     JOIN users f ON f.id = s.founder_id \
     JOIN users i ON i.id = r.investor_id";

impl Backend {
    /// Ask an investor to fund the founder's latest startup
    pub fn create_request(
        &self,
        session: &Session,
        investor: &RecordId,
    ) -> Result<FundingRequest, ApiError> {
        let founder = session.require(Role::Founder)?;
        let startup = self
            .startup_for_founder(&founder.id)?
            .ok_or_else(|| ApiError::NotFound("startup profile for this founder".into()))?;
        let target = self
            .get_user(investor)
            .ok()
            .filter(|u| u.is(Role::Investor))
            .ok_or_else(|| ApiError::NotFound(format!("investor {}", investor)))?;

        let now = Utc::now();
        let request = FundingRequest {
            id: RecordId::new(RecordPrefix::Frq),
            startup: startup.id,
            investor: target.id,
            status: FundingStatus::Pending,
            notes: None,
            meeting_schedule: None,
            created: now,
            updated: now,
        };
        self.conn().execute(
            "INSERT INTO funding_requests
             (id, startup_id, investor_id, status, notes, meeting_schedule, created, updated)
             VALUES (?1, ?2, ?3, ?4, NULL, NULL, ?5, ?5)",
            params![
                request.id.to_string(),
                request.startup.to_string(),
                request.investor.to_string(),
                request.status.as_str(),
                stamp(&now),
            ],
        )?;
        info!(request = %request.id, investor = %request.investor, "created funding request");
        Ok(request)
    }

    /// Requests visible to the caller: addressed to an investor, or sent by a founder
    pub fn list_requests(
        &self,
        session: &Session,
        status: Option<FundingStatus>,
    ) -> Result<Vec<RequestView>, ApiError> {
        let user = session.user();
        let scope = match user.role {
            Role::Investor => "r.investor_id = ?1",
            Role::Founder => "s.founder_id = ?1",
        };
        let sql = format!(
            "{} WHERE {} AND (?2 IS NULL OR r.status = ?2) ORDER BY r.created DESC, r.id DESC",
            VIEW_SELECT, scope
        );
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![user.id.to_string(), status.map(|s| s.as_str())],
                RawRequestView::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RawRequestView::into_view).collect()
    }

    /// One request addressed to the signed-in investor
    pub fn get_request(&self, session: &Session, id: &RecordId) -> Result<RequestView, ApiError> {
        let investor = session.require(Role::Investor)?;
        self.conn()
            .query_row(
                &format!("{} WHERE r.id = ?1 AND r.investor_id = ?2", VIEW_SELECT),
                params![id.to_string(), investor.id.to_string()],
                RawRequestView::from_row,
            )
            .optional()?
            .ok_or_else(|| ApiError::NotFound(format!("funding request {}", id)))?
            .into_view()
    }

    /// Move a request to `status`.
    ///
    /// Notes and meeting time keep their stored values unless new ones are
    /// given. A request that is already funded or rejected only accepts the
    /// same status again.
    pub fn update_status(
        &self,
        session: &Session,
        id: &RecordId,
        status: FundingStatus,
        notes: Option<String>,
        meeting_schedule: Option<DateTime<Utc>>,
    ) -> Result<FundingRequest, ApiError> {
        let investor = session.require(Role::Investor)?;
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let raw = tx
            .query_row(
                "SELECT id, startup_id, investor_id, status, notes, meeting_schedule, created, updated
                 FROM funding_requests WHERE id = ?1 AND investor_id = ?2",
                params![id.to_string(), investor.id.to_string()],
                |row| RawRequest::from_row_at(row, 0),
            )
            .optional()?
            .ok_or_else(|| ApiError::NotFound(format!("funding request {}", id)))?;
        let mut request = raw.into_request()?;

        request.status.check_transition(status)?;
        let previous = request.status;
        request.status = status;
        if notes.is_some() {
            request.notes = notes;
        }
        if meeting_schedule.is_some() {
            request.meeting_schedule = meeting_schedule;
        }
        request.updated = Utc::now();

        tx.execute(
            "UPDATE funding_requests
             SET status = ?2, notes = ?3, meeting_schedule = ?4, updated = ?5
             WHERE id = ?1",
            params![
                request.id.to_string(),
                request.status.as_str(),
                request.notes,
                request.meeting_schedule.as_ref().map(stamp),
                stamp(&request.updated),
            ],
        )?;
        tx.commit()?;

        info!(request = %request.id, from = %previous, to = %request.status, "updated request status");
        Ok(request)
    }

    /// Per-status counts for the investor dashboard; absent statuses are zero
    pub fn status_counts(&self, session: &Session) -> Result<StatusCounts, ApiError> {
        let investor = session.require(Role::Investor)?;
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM funding_requests WHERE investor_id = ?1 GROUP BY status",
        )?;
        let rows = stmt
            .query_map(params![investor.id.to_string()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut counts = StatusCounts::default();
        for (status, count) in rows {
            let status: FundingStatus = status.parse().map_err(ApiError::Invalid)?;
            counts.add(status, u64::try_from(count).unwrap_or(0));
        }
        Ok(counts)
    }
}

struct RawRequest {
    id: String,
    startup: String,
    investor: String,
    status: String,
    notes: Option<String>,
    meeting_schedule: Option<String>,
    created: String,
    updated: String,
}

impl RawRequest {
    fn from_row_at(row: &Row<'_>, start: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(start)?,
            startup: row.get(start + 1)?,
            investor: row.get(start + 2)?,
            status: row.get(start + 3)?,
            notes: row.get(start + 4)?,
            meeting_schedule: row.get(start + 5)?,
            created: row.get(start + 6)?,
            updated: row.get(start + 7)?,
        })
    }

    fn into_request(self) -> Result<FundingRequest, ApiError> {
        Ok(FundingRequest {
            id: parse_id(&self.id, RecordPrefix::Frq)?,
            startup: parse_id(&self.startup, RecordPrefix::Stu)?,
            investor: parse_id(&self.investor, RecordPrefix::Usr)?,
            status: self.status.parse().map_err(ApiError::Invalid)?,
            notes: self.notes,
            meeting_schedule: self.meeting_schedule.as_deref().map(parse_time).transpose()?,
            created: parse_time(&self.created)?,
            updated: parse_time(&self.updated)?,
        })
    }
}

struct RawRequestView {
    request: RawRequest,
    company_name: String,
    founder_name: String,
    founder_email: String,
    investor_name: String,
}

impl RawRequestView {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            request: RawRequest::from_row_at(row, 0)?,
            company_name: row.get(8)?,
            founder_name: row.get(9)?,
            founder_email: row.get(10)?,
            investor_name: row.get(11)?,
        })
    }

    fn into_view(self) -> Result<RequestView, ApiError> {
        Ok(RequestView {
            request: self.request.into_request()?,
            company_name: self.company_name,
            founder_name: self.founder_name,
            founder_email: self.founder_email,
            investor_name: self.investor_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::submission::SubmissionPayload;
    use serde_json::json;

    struct Market {
        backend: Backend,
        founder: Session,
        investor: Session,
    }

    fn market() -> Market {
        let backend = Backend::open_in_memory().unwrap();
        let f = backend
            .register("founder@x.io", "longenough", "Fay Founder", Role::Founder)
            .unwrap();
        let i = backend
            .register("investor@x.io", "longenough", "Ivan Investor", Role::Investor)
            .unwrap();
        let founder = Session::begin(&backend, f.token).unwrap();
        let investor = Session::begin(&backend, i.token).unwrap();
        Market {
            backend,
            founder,
            investor,
        }
    }

    fn with_startup(m: &Market) {
        let payload = SubmissionPayload {
            fields: json!({ "companyName": "Sprout" }).as_object().unwrap().clone(),
            sections: Default::default(),
        };
        m.backend.create_startup(&m.founder, &payload).unwrap();
    }

    #[test]
    fn test_request_needs_startup_and_real_investor() {
        let m = market();
        let investor_id = m.investor.user().id.clone();
        assert!(matches!(
            m.backend.create_request(&m.founder, &investor_id).unwrap_err(),
            ApiError::NotFound(_)
        ));

        with_startup(&m);
        let founder_id = m.founder.user().id.clone();
        assert!(matches!(
            m.backend.create_request(&m.founder, &founder_id).unwrap_err(),
            ApiError::NotFound(_)
        ));

        let request = m.backend.create_request(&m.founder, &investor_id).unwrap();
        assert_eq!(request.status, FundingStatus::Pending);
        assert_eq!(request.created, request.updated);
    }

    #[test]
    fn test_views_are_scoped_by_role() {
        let m = market();
        with_startup(&m);
        let request = m
            .backend
            .create_request(&m.founder, &m.investor.user().id)
            .unwrap();

        let inbox = m.backend.list_requests(&m.investor, None).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].company_name, "Sprout");
        assert_eq!(inbox[0].founder_name, "Fay Founder");
        assert_eq!(inbox[0].founder_email, "founder@x.io");

        let sent = m.backend.list_requests(&m.founder, None).unwrap();
        assert_eq!(sent[0].investor_name, "Ivan Investor");

        let funded = m
            .backend
            .list_requests(&m.investor, Some(FundingStatus::Funded))
            .unwrap();
        assert!(funded.is_empty());

        let view = m.backend.get_request(&m.investor, &request.id).unwrap();
        assert_eq!(view.request, request);

        let other = m
            .backend
            .register("other@x.io", "longenough", "Olive", Role::Investor)
            .unwrap();
        let other = Session::begin(&m.backend, other.token).unwrap();
        assert!(matches!(
            m.backend.get_request(&other, &request.id).unwrap_err(),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            m.backend
                .update_status(&other, &request.id, FundingStatus::Verified, None, None)
                .unwrap_err(),
            ApiError::NotFound(_)
        ));
    }

    #[test]
    fn test_update_keeps_notes_and_bumps_updated() {
        let m = market();
        with_startup(&m);
        let request = m
            .backend
            .create_request(&m.founder, &m.investor.user().id)
            .unwrap();
        let meeting = Utc::now() + chrono::Duration::days(3);

        let first = m
            .backend
            .update_status(
                &m.investor,
                &request.id,
                FundingStatus::InMeeting,
                Some("Intro call".into()),
                Some(meeting),
            )
            .unwrap();
        assert!(first.updated >= request.updated);

        let second = m
            .backend
            .update_status(&m.investor, &request.id, FundingStatus::InDiscussion, None, None)
            .unwrap();
        assert_eq!(second.notes.as_deref(), Some("Intro call"));
        assert_eq!(second.meeting_schedule, Some(meeting));
        assert_eq!(second.status, FundingStatus::InDiscussion);
    }

    #[test]
    fn test_terminal_status_is_final() {
        let m = market();
        with_startup(&m);
        let request = m
            .backend
            .create_request(&m.founder, &m.investor.user().id)
            .unwrap();

        m.backend
            .update_status(&m.investor, &request.id, FundingStatus::Funded, None, None)
            .unwrap();
        let err = m
            .backend
            .update_status(&m.investor, &request.id, FundingStatus::Verified, None, None)
            .unwrap_err();
        assert!(matches!(err, ApiError::Terminal(_)));

        let view = m.backend.get_request(&m.investor, &request.id).unwrap();
        assert_eq!(view.request.status, FundingStatus::Funded);

        assert!(m
            .backend
            .update_status(&m.investor, &request.id, FundingStatus::Funded, Some("Wired".into()), None)
            .is_ok());
    }

    #[test]
    fn test_status_counts_default_to_zero() {
        let m = market();
        assert_eq!(m.backend.status_counts(&m.investor).unwrap(), StatusCounts::default());

        with_startup(&m);
        let investor_id = m.investor.user().id.clone();
        let a = m.backend.create_request(&m.founder, &investor_id).unwrap();
        m.backend.create_request(&m.founder, &investor_id).unwrap();
        m.backend
            .update_status(&m.investor, &a.id, FundingStatus::Rejected, None, None)
            .unwrap();

        let counts = m.backend.status_counts(&m.investor).unwrap();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.rejected, 1);
        assert_eq!(counts.funded, 0);
        assert_eq!(counts.total(), 2);

        assert!(matches!(
            m.backend.status_counts(&m.founder).unwrap_err(),
            ApiError::Forbidden { .. }
        ));
    }
}
