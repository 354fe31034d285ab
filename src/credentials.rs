//! Google OAuth2 credentials.
//!
//! The process owns one [`GoogleCredentials`] and hands it to whatever needs a
//! bearer token. Tokens change only through [`CredentialProvider::refresh`] or
//! [`CredentialProvider::install`].

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::GoogleConfig;

const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// Tokens are treated as expired this long before Google says they are.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("no access token available")]
    MissingToken,
    #[error("oauth client is not configured")]
    NotConfigured,
    #[error("token endpoint rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("token request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenSet {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|at| now + Duration::seconds(EXPIRY_SKEW_SECS) >= at)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_token_set(self, previous_refresh: Option<String>) -> TokenSet {
        TokenSet {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: self.expires_in.map(|s| Utc::now() + Duration::seconds(s)),
        }
    }
}

#[async_trait]
pub trait CredentialProvider: Send + Sync {
    /// A bearer token that is valid right now, refreshing first if needed.
    async fn access_token(&self) -> Result<String, AuthError>;

    fn api_key(&self) -> Option<&str>;

    async fn refresh(&self) -> Result<(), AuthError>;

    async fn install(&self, tokens: TokenSet);
}

struct OAuthClient {
    client_id: String,
    client_secret: String,
    redirect_uri: Option<String>,
}

pub struct GoogleCredentials {
    http: reqwest::Client,
    oauth: Option<OAuthClient>,
    token_url: String,
    auth_url: String,
    api_key: Option<String>,
    tokens: RwLock<Option<TokenSet>>,
}

impl GoogleCredentials {
    pub fn from_config(cfg: &GoogleConfig, http: reqwest::Client) -> Self {
        let oauth = match (&cfg.client_id, &cfg.client_secret) {
            (Some(id), Some(secret)) => Some(OAuthClient {
                client_id: id.clone(),
                client_secret: secret.clone(),
                redirect_uri: cfg.redirect_uri.clone(),
            }),
            _ => None,
        };
        let tokens = cfg.access_token.clone().map(|access_token| TokenSet {
            access_token,
            refresh_token: cfg.refresh_token.clone(),
            expires_at: None,
        });
        // A refresh token alone is enough; the first call will mint an access token.
        let tokens = tokens.or_else(|| {
            cfg.refresh_token.clone().map(|rt| TokenSet {
                access_token: String::new(),
                refresh_token: Some(rt),
                expires_at: Some(DateTime::<Utc>::UNIX_EPOCH),
            })
        });
        Self {
            http,
            oauth,
            token_url: cfg.token_url.clone(),
            auth_url: cfg.auth_url.clone(),
            api_key: cfg.api_key.clone(),
            tokens: RwLock::new(tokens),
        }
    }

    pub fn authorize_url(&self, state: &str) -> Result<String, AuthError> {
        let oauth = self.oauth.as_ref().ok_or(AuthError::NotConfigured)?;
        let redirect = oauth.redirect_uri.as_deref().ok_or(AuthError::NotConfigured)?;
        let url = url::Url::parse_with_params(
            &self.auth_url,
            &[
                ("client_id", oauth.client_id.as_str()),
                ("redirect_uri", redirect),
                ("response_type", "code"),
                ("scope", DRIVE_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )
        .map_err(|_| AuthError::NotConfigured)?;
        Ok(url.into())
    }

    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet, AuthError> {
        let oauth = self.oauth.as_ref().ok_or(AuthError::NotConfigured)?;
        let redirect = oauth.redirect_uri.as_deref().ok_or(AuthError::NotConfigured)?;
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", oauth.client_id.as_str()),
            ("client_secret", oauth.client_secret.as_str()),
            ("redirect_uri", redirect),
        ];
        let resp = self.request_token(&form).await?;
        Ok(resp.into_token_set(None))
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let response = self.http.post(&self.token_url).form(form).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected { status, message });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl CredentialProvider for GoogleCredentials {
    async fn access_token(&self) -> Result<String, AuthError> {
        let needs_refresh = {
            let guard = self.tokens.read().await;
            match guard.as_ref() {
                None => return Err(AuthError::MissingToken),
                Some(t) if !t.is_expired(Utc::now()) => return Ok(t.access_token.clone()),
                Some(t) => t.refresh_token.is_some(),
            }
        };
        if !needs_refresh {
            return Err(AuthError::MissingToken);
        }
        self.refresh().await?;
        self.tokens
            .read()
            .await
            .as_ref()
            .map(|t| t.access_token.clone())
            .ok_or(AuthError::MissingToken)
    }

    fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    async fn refresh(&self) -> Result<(), AuthError> {
        let oauth = self.oauth.as_ref().ok_or(AuthError::NotConfigured)?;
        let refresh_token = self
            .tokens
            .read()
            .await
            .as_ref()
            .and_then(|t| t.refresh_token.clone())
            .ok_or(AuthError::MissingToken)?;
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", oauth.client_id.as_str()),
            ("client_secret", oauth.client_secret.as_str()),
        ];
        let fresh = self.request_token(&form).await?.into_token_set(Some(refresh_token.clone()));
        log::info!("refreshed google access token");
        *self.tokens.write().await = Some(fresh);
        Ok(())
    }

    async fn install(&self, tokens: TokenSet) {
        let mut guard = self.tokens.write().await;
        // Google only returns a refresh token on first consent; keep the one we had.
        let refresh_token = tokens
            .refresh_token
            .or_else(|| guard.as_ref().and_then(|t| t.refresh_token.clone()));
        *guard = Some(TokenSet {
            refresh_token,
            ..tokens
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn google_config(token_url: String) -> GoogleConfig {
        GoogleConfig {
            client_id: Some("client-1".into()),
            client_secret: Some("s3cret".into()),
            redirect_uri: Some("http://localhost:3000/oauth2callback".into()),
            token_url,
            ..GoogleConfig::default()
        }
    }

    #[actix_web::test]
    async fn static_token_is_returned_without_network() {
        let cfg = GoogleConfig {
            access_token: Some("ya29.static".into()),
            ..GoogleConfig::default()
        };
        let creds = GoogleCredentials::from_config(&cfg, reqwest::Client::new());
        assert_eq!(creds.access_token().await.unwrap(), "ya29.static");
    }

    #[actix_web::test]
    async fn no_token_is_an_auth_failure() {
        let creds = GoogleCredentials::from_config(&GoogleConfig::default(), reqwest::Client::new());
        assert!(matches!(creds.access_token().await, Err(AuthError::MissingToken)));
    }

    #[actix_web::test]
    async fn expired_token_is_refreshed_first() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=rt-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let creds = GoogleCredentials::from_config(
            &google_config(format!("{}/token", server.uri())),
            reqwest::Client::new(),
        );
        creds
            .install(TokenSet {
                access_token: "stale".into(),
                refresh_token: Some("rt-1".into()),
                expires_at: Some(Utc::now() - Duration::minutes(5)),
            })
            .await;

        assert_eq!(creds.access_token().await.unwrap(), "fresh");
        // the new token is cached and the refresh token survives
        assert_eq!(creds.access_token().await.unwrap(), "fresh");
        let held = creds.tokens.read().await.clone().unwrap();
        assert_eq!(held.refresh_token.as_deref(), Some("rt-1"));
    }

    #[actix_web::test]
    async fn rejected_code_exchange_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
            .mount(&server)
            .await;

        let creds = GoogleCredentials::from_config(
            &google_config(format!("{}/token", server.uri())),
            reqwest::Client::new(),
        );
        match creds.exchange_code("bad-code").await {
            Err(AuthError::Rejected { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "invalid_grant");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn authorize_url_carries_client_and_state() {
        let creds = GoogleCredentials::from_config(
            &google_config("http://unused/token".into()),
            reqwest::Client::new(),
        );
        let url = url::Url::parse(&creds.authorize_url("st-42").unwrap()).unwrap();
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["client_id"], "client-1");
        assert_eq!(params["state"], "st-42");
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["scope"], DRIVE_SCOPE);
    }
}
