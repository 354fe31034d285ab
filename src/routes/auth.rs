use actix_web::cookie::{Cookie, SameSite};
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::auth::{SessionStore, SESSION_COOKIE};
use crate::credentials::{CredentialProvider, GoogleCredentials, TokenSet};
use crate::errors::ApiError;

pub async fn google_login(
    creds: web::Data<GoogleCredentials>,
    sessions: web::Data<SessionStore>,
) -> Result<HttpResponse, ApiError> {
    let state = uuid::Uuid::new_v4().to_string();
    let consent_url = creds.authorize_url(&state)?;
    let session_id = sessions.start(state);

    let cookie = Cookie::build(SESSION_COOKIE, session_id)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .finish();
    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, consent_url))
        .cookie(cookie)
        .finish())
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

pub async fn oauth_callback(
    req: HttpRequest,
    creds: web::Data<GoogleCredentials>,
    sessions: web::Data<SessionStore>,
    q: web::Query<CallbackQuery>,
) -> Result<HttpResponse, ApiError> {
    let session_id = req
        .cookie(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(ApiError::InvalidState)?;
    let result = complete_login(&creds, &sessions, &session_id, &q).await;
    if result.is_err() {
        sessions.discard(&session_id);
    }
    let tokens = result?;
    creds.install(tokens.clone()).await;
    sessions.login(&session_id, tokens);
    log::info!("google login completed");

    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, "/"))
        .finish())
}

async fn complete_login(
    creds: &GoogleCredentials,
    sessions: &SessionStore,
    session_id: &str,
    q: &CallbackQuery,
) -> Result<TokenSet, ApiError> {
    let expected = sessions
        .take_pending_state(session_id)
        .ok_or(ApiError::InvalidState)?;
    if q.state.as_deref() != Some(expected.as_str()) {
        return Err(ApiError::InvalidState);
    }
    if let Some(reason) = &q.error {
        log::warn!("google consent was not granted: {reason}");
        return Err(ApiError::AuthFailed);
    }
    let code = q.code.as_deref().ok_or(ApiError::AuthFailed)?;
    Ok(creds.exchange_code(code).await?)
}
