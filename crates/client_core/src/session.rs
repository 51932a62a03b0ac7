use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Deserialize;
use storage::StoredSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewState {
    #[default]
    Anonymous,
    Authenticated,
}

/// The authentication token pair plus the cached display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub username: Option<String>,
}

/// Claims readable from an access token payload. The signature is not
/// checked here; only the backend decides whether a token is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub username: Option<String>,
}

impl Session {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            access_token: Some(access_token.into()),
            refresh_token: Some(refresh_token.into()),
            username: Some(username.into()),
        }
    }

    pub fn has_access_token(&self) -> bool {
        self.bearer().is_some()
    }

    pub fn bearer(&self) -> Option<&str> {
        self.access_token.as_deref().filter(|token| !token.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.username.is_none()
    }

    pub fn claims(&self) -> Option<TokenClaims> {
        decode_claims(self.bearer()?)
    }

    /// Stored username, or the `username` claim for sessions persisted
    /// without one.
    pub fn display_name(&self) -> Option<String> {
        self.username
            .clone()
            .or_else(|| self.claims().and_then(|claims| claims.username))
    }
}

fn decode_claims(token: &str) -> Option<TokenClaims> {
    let payload = token.split('.').nth(1)?;
    let decoded = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('=').as_bytes())
        .ok()?;
    serde_json::from_slice(&decoded).ok()
}

impl From<StoredSession> for Session {
    fn from(value: StoredSession) -> Self {
        Self {
            access_token: value.access_token,
            refresh_token: value.refresh_token,
            username: value.username,
        }
    }
}

impl From<&Session> for StoredSession {
    fn from(value: &Session) -> Self {
        Self {
            access_token: value.access_token.clone(),
            refresh_token: value.refresh_token.clone(),
            username: value.username.clone(),
        }
    }
}
