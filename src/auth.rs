use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use futures_util::future::{err, ok, Ready};

use crate::config::Config;
use crate::credentials::TokenSet;
use crate::errors::ApiError;

pub const SESSION_COOKIE: &str = "doodle_session";

/// How long a login may sit at Google's consent screen before its session is dropped.
const PENDING_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone)]
pub struct Session {
    pub pending_state: Option<String>,
    pub tokens: Option<TokenSet>,
    started: Instant,
}

/// Server-side sessions keyed by the cookie value. In-memory only; a restart logs everyone out.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    /// Opens a session waiting for the OAuth callback and returns its id.
    pub fn start(&self, state: String) -> String {
        self.start_at(state, Instant::now())
    }

    // Logins that never came back from Google are pruned here.
    fn start_at(&self, state: String, now: Instant) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let session = Session {
            pending_state: Some(state),
            tokens: None,
            started: now,
        };
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|_, s| s.tokens.is_some() || now.saturating_duration_since(s.started) < PENDING_TTL);
        sessions.insert(id.clone(), session);
        id
    }

    /// Drops a session whose login did not complete.
    pub fn discard(&self, id: &str) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// The pending state can be consumed once.
    pub fn take_pending_state(&self, id: &str) -> Option<String> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(id)
            .and_then(|s| s.pending_state.take())
    }

    pub fn login(&self, id: &str, tokens: TokenSet) {
        if let Some(s) = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(id)
        {
            s.tokens = Some(tokens);
        }
    }

    pub fn is_logged_in(&self, id: &str) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .is_some_and(|s| s.tokens.is_some())
    }
}

/// Passes when login is not required, or when the request carries a logged-in session cookie.
#[derive(Debug, Clone, Copy)]
pub struct LoggedIn;

impl FromRequest for LoggedIn {
    type Error = ApiError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let required = req
            .app_data::<web::Data<Config>>()
            .is_some_and(|cfg| cfg.require_login);
        if !required {
            return ok(LoggedIn);
        }
        let Some(sessions) = req.app_data::<web::Data<SessionStore>>() else {
            return err(ApiError::LoginRequired);
        };
        if let Some(cookie) = req.cookie(SESSION_COOKIE) {
            if sessions.is_logged_in(cookie.value()) {
                return ok(LoggedIn);
            }
        }
        err(ApiError::LoginRequired)
    }
}
