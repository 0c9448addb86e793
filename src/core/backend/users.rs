//! Accounts and session tokens

use argon2::{Algorithm, Argon2, Params, Version};
use chrono::Utc;
use rand::Rng;
use regex::Regex;
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use super::{parse_id, parse_time, stamp, ApiError, Backend};
use crate::core::identity::{RecordId, RecordPrefix};
use crate::core::session::Session;
use crate::entities::{Role, User};

const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;
const TOKEN_LEN: usize = 32;
const MIN_PASSWORD_CHARS: usize = 8;

/// Returned by register and login
#[derive(Debug, Clone, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

const USER_COLUMNS: &str = "id, email, name, role, created";

impl Backend {
    /// Create an account and sign it in
    pub fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
        role: Role,
    ) -> Result<AuthResponse, ApiError> {
        let email = normalize_email(email)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ApiError::Invalid("name must not be empty".into()));
        }
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(ApiError::Invalid(format!(
                "password must be at least {} characters",
                MIN_PASSWORD_CHARS
            )));
        }

        let mut salt = [0u8; SALT_LEN];
        rand::rng().fill(&mut salt);
        let key = derive_key(password, &salt)?;

        let user = User {
            id: RecordId::new(RecordPrefix::Usr),
            email,
            name: name.to_string(),
            role,
            created: Utc::now(),
        };

        let conn = self.conn();
        let taken: Option<String> = conn
            .query_row("SELECT id FROM users WHERE email = ?1", params![user.email], |row| {
                row.get(0)
            })
            .optional()?;
        if taken.is_some() {
            return Err(ApiError::EmailTaken(user.email));
        }
        conn.execute(
            "INSERT INTO users (id, email, name, role, password_hash, salt, created)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                user.id.to_string(),
                user.email,
                user.name,
                user.role.as_str(),
                to_hex(&key),
                to_hex(&salt),
                stamp(&user.created),
            ],
        )?;
        let token = issue_token(&conn, &user.id)?;
        info!(user = %user.id, role = %user.role, "registered account");

        Ok(AuthResponse { token, user })
    }

    /// Exchange credentials for a fresh token
    pub fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let email = email.trim().to_lowercase();
        let conn = self.conn();
        let found = conn
            .query_row(
                &format!("SELECT {}, password_hash, salt FROM users WHERE email = ?1", USER_COLUMNS),
                params![email],
                |row| Ok((RawUser::from_row(row)?, row.get::<_, String>(5)?, row.get::<_, String>(6)?)),
            )
            .optional()?;

        let (raw, stored_hash, salt_hex) = found.ok_or(ApiError::InvalidCredentials)?;
        let salt = from_hex(&salt_hex).ok_or_else(|| ApiError::Invalid("corrupt salt".into()))?;
        let key = derive_key(password, &salt)?;
        if !constant_time_eq(to_hex(&key).as_bytes(), stored_hash.as_bytes()) {
            debug!(email = %email, "rejected login");
            return Err(ApiError::InvalidCredentials);
        }

        let user = raw.into_user()?;
        let token = issue_token(&conn, &user.id)?;
        info!(user = %user.id, "logged in");
        Ok(AuthResponse { token, user })
    }

    /// Resolve a token to its user
    pub fn authenticate(&self, token: &str) -> Result<User, ApiError> {
        let conn = self.conn();
        let raw = conn
            .query_row(
                "SELECT u.id, u.email, u.name, u.role, u.created
                 FROM sessions s JOIN users u ON u.id = s.user_id
                 WHERE s.token_hash = ?1",
                params![hash_token(token)],
                RawUser::from_row,
            )
            .optional()?;
        raw.ok_or(ApiError::Unauthorized)?.into_user()
    }

    /// Revoke a token. Revoking an unknown token is not an error.
    pub fn logout(&self, token: &str) -> Result<(), ApiError> {
        self.conn()
            .execute("DELETE FROM sessions WHERE token_hash = ?1", params![hash_token(token)])?;
        Ok(())
    }

    pub fn get_user(&self, id: &RecordId) -> Result<User, ApiError> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
            params![id.to_string()],
            RawUser::from_row,
        )
        .optional()?
        .ok_or_else(|| ApiError::NotFound(format!("user {}", id)))?
        .into_user()
    }

    /// All investors, newest first. Founders only.
    pub fn list_investors(&self, session: &Session) -> Result<Vec<User>, ApiError> {
        session.require(Role::Founder)?;
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users WHERE role = ?1 ORDER BY created DESC, id DESC",
            USER_COLUMNS
        ))?;
        let rows = stmt
            .query_map(params![Role::Investor.as_str()], RawUser::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RawUser::into_user).collect()
    }
}

/// Column values of a `users` row before parsing
struct RawUser {
    id: String,
    email: String,
    name: String,
    role: String,
    created: String,
}

impl RawUser {
    /// Read `id, email, name, role, created` from the leading columns
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            role: row.get(3)?,
            created: row.get(4)?,
        })
    }

    fn into_user(self) -> Result<User, ApiError> {
        Ok(User {
            id: parse_id(&self.id, RecordPrefix::Usr)?,
            role: self.role.parse().map_err(ApiError::Invalid)?,
            created: parse_time(&self.created)?,
            email: self.email,
            name: self.name,
        })
    }
}

fn normalize_email(email: &str) -> Result<String, ApiError> {
    let email = email.trim().to_lowercase();
    let pattern = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
        .map_err(|e| ApiError::Invalid(e.to_string()))?;
    if !pattern.is_match(&email) {
        return Err(ApiError::Invalid(format!("'{}' is not a valid email address", email)));
    }
    Ok(email)
}

fn derive_key(password: &str, salt: &[u8]) -> Result<[u8; KEY_LEN], ApiError> {
    let params = Params::new(19456, 2, 1, Some(KEY_LEN))
        .map_err(|e| ApiError::Invalid(format!("argon2 params: {}", e)))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|e| ApiError::Invalid(format!("key derivation failed: {}", e)))?;
    Ok(key)
}

fn issue_token(conn: &rusqlite::Connection, user: &RecordId) -> Result<String, ApiError> {
    let mut bytes = [0u8; TOKEN_LEN];
    rand::rng().fill(&mut bytes);
    let token = to_hex(&bytes);
    conn.execute(
        "INSERT INTO sessions (token_hash, user_id, created) VALUES (?1, ?2, ?3)",
        params![hash_token(&token), user.to_string(), stamp(&Utc::now())],
    )?;
    Ok(token)
}

fn hash_token(token: &str) -> String {
    to_hex(&Sha256::digest(token.as_bytes()))
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn from_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(s.get(i..i + 2)?, 16).ok())
        .collect()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
