//! Signed-in identity passed explicitly to whatever needs it
//!
//! A [`Session`] is created by logging in (or resuming a saved token) and
//! ended by logging out. Nothing reads identity from global state.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::core::backend::{ApiError, Backend};
use crate::entities::{Role, User};

/// An authenticated user plus the token that proves it
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    token: String,
    user: User,
}

impl Session {
    /// Authenticate a token against the backend
    pub fn begin(backend: &Backend, token: impl Into<String>) -> Result<Self, ApiError> {
        let token = token.into();
        let user = backend.authenticate(&token)?;
        debug!(user = %user.id, role = %user.role, "session started");
        Ok(Self { token, user })
    }

    /// Revoke the token; the session is consumed
    pub fn end(self, backend: &Backend) -> Result<(), ApiError> {
        backend.logout(&self.token)?;
        debug!(user = %self.user.id, "session ended");
        Ok(())
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Fail with `Forbidden` unless the user has `role`
    pub fn require(&self, role: Role) -> Result<&User, ApiError> {
        if self.user.is(role) {
            Ok(&self.user)
        } else {
            Err(ApiError::Forbidden {
                required: role,
                actual: self.user.role,
            })
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SavedSession {
    token: String,
}

/// Token persisted between CLI invocations
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, session: &Session) -> std::io::Result<()> {
        let saved = SavedSession {
            token: session.token.clone(),
        };
        let json = serde_json::to_string_pretty(&saved).map_err(std::io::Error::other)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, json)
    }

    /// The saved token, if one is present and readable
    pub fn token(&self) -> Option<String> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<SavedSession>(&raw) {
            Ok(saved) => Some(saved.token),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable session file");
                None
            }
        }
    }

    /// Resume the saved session; a stale token yields `Unauthorized`
    pub fn resume(&self, backend: &Backend) -> Result<Session, ApiError> {
        let token = self.token().ok_or(ApiError::Unauthorized)?;
        Session::begin(backend, token)
    }

    pub fn remove(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_begin_require_end() {
        let backend = Backend::open_in_memory().unwrap();
        let auth = backend
            .register("ann@fund.test", "correct horse", "Ann", Role::Investor)
            .unwrap();

        let session = Session::begin(&backend, auth.token.clone()).unwrap();
        assert_eq!(session.user().email, "ann@fund.test");
        assert!(session.require(Role::Investor).is_ok());
        assert!(matches!(
            session.require(Role::Founder).unwrap_err(),
            ApiError::Forbidden { required: Role::Founder, .. }
        ));

        session.end(&backend).unwrap();
        assert!(matches!(
            Session::begin(&backend, auth.token).unwrap_err(),
            ApiError::Unauthorized
        ));
    }

    #[test]
    fn test_session_file_roundtrip() {
        let dir = tempdir().unwrap();
        let backend = Backend::open_in_memory().unwrap();
        let auth = backend
            .register("bo@startup.test", "longpassword", "Bo", Role::Founder)
            .unwrap();
        let session = Session::begin(&backend, auth.token).unwrap();

        let file = SessionFile::new(dir.path().join("session.json"));
        assert!(matches!(file.resume(&backend).unwrap_err(), ApiError::Unauthorized));

        file.save(&session).unwrap();
        assert_eq!(file.resume(&backend).unwrap(), session);

        file.remove().unwrap();
        file.remove().unwrap();
        assert!(file.token().is_none());
    }
}
