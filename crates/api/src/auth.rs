use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use reqdesk_session::{AuthCollaborator, KeyValueStore, LockPersistence, LockState};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::config::UserAccount;
use crate::credentials::verify_password;
use crate::error::{ApiError, ApiResult};
use crate::server::AppState;

pub const TOKEN_TTL_HOURS: i64 = 12;

pub const SESSION_SCOPES: [&str; 4] = ["session:read", "session:activity", "session:lock", "session:unlock"];

#[derive(Debug, Default)]
struct SessionRecord {
    username: Option<String>,
    token_id: Option<String>,
    is_locked: bool,
    locked_username: Option<String>,
    failed_password_attempts: u32,
}

/// Authentication store for the single signed-in session the server hosts.
///
/// Owns the JWT secret, the configured accounts and the lock flags. The lock is mirrored to
/// [`LockPersistence`] so it survives a restart.
pub struct AuthStore {
    secret: Vec<u8>,
    accounts: Vec<UserAccount>,
    persistence: LockPersistence<Arc<dyn KeyValueStore>>,
    session: Mutex<SessionRecord>,
}

impl AuthStore {
    #[must_use]
    pub fn new(accounts: Vec<UserAccount>, store: Arc<dyn KeyValueStore>) -> Self {
        let mut secret = vec![0u8; 32];
        rand::Rng::fill(&mut rand::rng(), &mut secret[..]);

        Self {
            secret,
            accounts,
            persistence: LockPersistence::new(store),
            session: Mutex::new(SessionRecord::default()),
        }
    }

    fn session(&self) -> MutexGuard<'_, SessionRecord> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn password_hash(&self, username: &str) -> Option<String> {
        self.accounts
            .iter()
            .find(|account| account.username == username)
            .map(|account| account.password_hash.clone())
    }

    /// Signs `username` in, replacing any previous session.
    ///
    /// A screen lock survives sign-in: the user it was locked for signs in to the lock screen
    /// and still has to unlock it, while every other account is turned away.
    ///
    /// # Errors
    ///
    /// This function returns an error if:
    /// - The user is unknown or the password is wrong (Unauthorized)
    /// - The screen is locked for another user (`SessionLocked`)
    /// - Token generation fails
    pub async fn login(&self, username: &str, password: Zeroizing<String>) -> ApiResult<(String, DateTime<Utc>)> {
        let hash = self.password_hash(username).ok_or(ApiError::Unauthorized)?;
        if !verify_in_background(hash, password).await {
            warn!(username, "Sign-in rejected");
            return Err(ApiError::Unauthorized);
        }

        let token_id = Uuid::new_v4().to_string();
        let (token, expires_at) = self.generate_token(username, &token_id)?;

        let still_locked = {
            let mut session = self.session();
            if session.is_locked {
                if let Some(holder) = session.locked_username.as_deref().filter(|holder| *holder != username) {
                    warn!(username, locked_for = holder, "Sign-in refused while the screen is locked");
                    return Err(ApiError::SessionLocked);
                }
            }

            let previous = std::mem::take(&mut *session);
            *session = SessionRecord {
                username: Some(username.to_string()),
                token_id: Some(token_id),
                is_locked: previous.is_locked,
                locked_username: previous.is_locked.then(|| username.to_string()),
                failed_password_attempts: if previous.is_locked {
                    previous.failed_password_attempts
                } else {
                    0
                },
            };
            session.is_locked
        };

        if still_locked {
            if let Err(e) = self.persistence.write_lock_state(&LockState::locked_as(username)) {
                warn!("Failed to persist lock state: {e}");
            }
            info!(username, "User signed in to a locked screen");
        } else {
            info!(username, "User signed in");
        }
        Ok((token, expires_at))
    }

    fn forget_persisted_lock(&self) {
        if let Err(e) = self.persistence.clear_lock_state() {
            warn!("Failed to clear persisted lock state: {e}");
        }
    }

    /// # Errors
    ///
    /// This function returns an error if:
    /// - Token expiration timestamp conversion fails
    /// - Token issue timestamp conversion fails
    /// - Token generation process fails
    fn generate_token(&self, username: &str, token_id: &str) -> ApiResult<(String, DateTime<Utc>)> {
        let issued_at = Utc::now();
        let expiration = issued_at + Duration::hours(TOKEN_TTL_HOURS);

        let claims = TokenClaims {
            sub: username.to_string(),
            exp: usize::try_from(expiration.timestamp())
                .map_err(|_| ApiError::InternalError("Token expiration timestamp overflow".to_string()))?,
            iat: usize::try_from(issued_at.timestamp())
                .map_err(|_| ApiError::InternalError("Token issue timestamp overflow".to_string()))?,
            jti: token_id.to_string(),
            scopes: SESSION_SCOPES.iter().map(ToString::to_string).collect(),
        };

        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|e| ApiError::InternalError(format!("Token generation failed: {e}")))?;
        Ok((token, expiration))
    }

    /// Verifies a bearer token. Only the token of the current session is accepted.
    ///
    /// # Errors
    ///
    /// This function returns an error if:
    /// - The token is invalid or expired
    /// - The token signature is invalid
    /// - The token belongs to a session that has since ended
    pub fn verify_token(&self, token: &str) -> ApiResult<TokenClaims> {
        let claims = decode::<TokenClaims>(token, &DecodingKey::from_secret(&self.secret), &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| ApiError::Unauthorized)?;

        if self.session().token_id.as_deref() != Some(claims.jti.as_str()) {
            return Err(ApiError::Unauthorized);
        }
        Ok(claims)
    }
}

async fn verify_in_background(password_hash: String, password: Zeroizing<String>) -> bool {
    tokio::task::spawn_blocking(move || verify_password(&password_hash, &password))
        .await
        .unwrap_or(false)
}

#[async_trait]
impl AuthCollaborator for AuthStore {
    fn is_authenticated(&self) -> bool {
        self.session().username.is_some()
    }

    fn is_locked(&self) -> bool {
        self.session().is_locked
    }

    fn locked_username(&self) -> Option<String> {
        self.session().locked_username.clone()
    }

    fn failed_password_attempts(&self) -> u32 {
        self.session().failed_password_attempts
    }

    fn logout(&self) {
        let username = {
            let mut session = self.session();
            std::mem::take(&mut *session).username
        };
        self.forget_persisted_lock();

        match username {
            Some(username) => info!(username = %username, "User signed out"),
            None => debug!("Sign-out requested with no active session"),
        }
    }

    fn lock_screen(&self) {
        let state = {
            let mut session = self.session();
            let Some(username) = session.username.clone() else {
                debug!("Lock requested with no active session");
                return;
            };
            session.is_locked = true;
            session.locked_username = Some(username.clone());
            LockState::locked_as(username)
        };

        if let Err(e) = self.persistence.write_lock_state(&state) {
            warn!("Failed to persist lock state: {e}");
        }
        info!(username = state.locked_username.as_deref().unwrap_or_default(), "Screen locked");
    }

    async fn unlock_screen(&self, password: &str) -> bool {
        let locked_username = {
            let session = self.session();
            if !session.is_locked {
                return true;
            }
            session.locked_username.clone()
        };

        let hash = locked_username.as_deref().and_then(|username| self.password_hash(username));
        let unlocked = match hash {
            Some(hash) => verify_in_background(hash, Zeroizing::new(password.to_string())).await,
            None => false,
        };

        if unlocked {
            {
                let mut session = self.session();
                session.is_locked = false;
                session.locked_username = None;
                session.failed_password_attempts = 0;
            }
            self.forget_persisted_lock();
            info!(username = locked_username.as_deref().unwrap_or_default(), "Screen unlocked");
        } else {
            let attempts = {
                let mut session = self.session();
                session.failed_password_attempts += 1;
                session.failed_password_attempts
            };
            warn!(attempts, "Unlock attempt rejected");
        }
        unlocked
    }

    fn load_lock_state(&self) -> LockState {
        let state = self.persistence.read_lock_state();
        let mut session = self.session();
        session.is_locked = state.locked;
        session.locked_username.clone_from(&state.locked_username);
        state
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TokenClaims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
    pub jti: String,
    pub scopes: Vec<String>,
}

impl TokenClaims {
    #[must_use]
    pub fn has_scope(&self, required_scope: &str) -> bool {
        self.scopes.iter().any(|scope| scope == required_scope)
    }
}

#[derive(Debug)]
pub struct AuthenticatedUser(pub TokenClaims);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("authorization")
            .and_then(|header| header.to_str().ok())
            .and_then(|header| {
                // Bearer prefix is case-insensitive
                if header.len() >= 7 && header[..7].eq_ignore_ascii_case("bearer ") {
                    Some(&header[7..])
                } else {
                    None
                }
            })
            .ok_or(ApiError::Unauthorized)?;

        let auth = parts
            .extensions
            .get::<Arc<AuthStore>>()
            .ok_or(ApiError::InternalError("Auth store not found".to_string()))?;

        let claims = auth.verify_token(token)?;
        Ok(AuthenticatedUser(claims))
    }
}

use axum::body::Body;
use axum::{http::Request, middleware::Next, response::Response};

/// Makes the auth store available to the [`AuthenticatedUser`] extractor.
pub async fn auth_middleware(State(state): State<Arc<AppState>>, mut request: Request<Body>, next: Next) -> Response {
    request.extensions_mut().insert(Arc::clone(&state.auth));
    next.run(request).await
}
