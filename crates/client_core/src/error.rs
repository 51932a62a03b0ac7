//! Error taxonomy for the session controller and the API client.

use thiserror::Error;

pub const NETWORK_FALLBACK: &str = "Server unreachable; check the URL and your connection";
pub const LOGIN_FALLBACK: &str = "Invalid credentials";
pub const REGISTER_FALLBACK: &str = "Registration failed";
pub const POSTS_FALLBACK: &str = "Failed to load posts";

/// Outcome of a single backend request that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The round trip completed but the backend denied authorization.
    #[error("{}", message.as_deref().unwrap_or("unauthorized"))]
    Unauthorized { message: Option<String> },
    #[error("{}", status_text(*status, message.as_deref()))]
    Status {
        status: u16,
        message: Option<String>,
    },
    /// No response was received.
    #[error("server unreachable: {0}")]
    Network(String),
    #[error("unexpected response from server: {0}")]
    Decode(String),
}

fn status_text(status: u16, message: Option<&str>) -> String {
    match message {
        Some(message) => message.to_string(),
        None => format!("request failed with status {status}"),
    }
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_))
    }

    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Unauthorized { message } | Self::Status { message, .. } => message.as_deref(),
            Self::Network(_) | Self::Decode(_) => None,
        }
    }

    /// Text shown to the user: the server's own message when it sent one,
    /// the network fallback for transport failures, `fallback` otherwise.
    pub fn user_message(&self, fallback: &str) -> String {
        if self.is_network() {
            return NETWORK_FALLBACK.to_string();
        }
        self.server_message().unwrap_or(fallback).to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("{0}")]
    Rejected(String),
    #[error("{0}")]
    Network(String),
    #[error("failed to persist session: {0}")]
    Storage(String),
    #[error("another sign-in request is already in progress")]
    Busy,
}

impl AuthError {
    pub(crate) fn from_api(err: &ApiError) -> Self {
        if err.is_network() {
            Self::Network(NETWORK_FALLBACK.to_string())
        } else {
            Self::Rejected(err.user_message(LOGIN_FALLBACK))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0}")]
    Rejected(String),
    #[error("{0}")]
    Network(String),
    #[error("registration succeeded but automatic login failed: {0}")]
    AutoLogin(#[source] AuthError),
    #[error("another sign-in request is already in progress")]
    Busy,
}

impl ValidationError {
    pub(crate) fn from_api(err: &ApiError) -> Self {
        if err.is_network() {
            Self::Network(NETWORK_FALLBACK.to_string())
        } else {
            Self::Rejected(err.user_message(REGISTER_FALLBACK))
        }
    }
}

/// Failure of a post, comment, or like action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("login required")]
    LoginRequired,
    #[error("{0}")]
    EmptyText(&'static str),
    #[error("{0}")]
    Rejected(String),
    #[error("{0}")]
    Network(String),
}

impl ActionError {
    pub(crate) fn from_api(err: &ApiError, fallback: &str) -> Self {
        if err.is_network() {
            Self::Network(NETWORK_FALLBACK.to_string())
        } else {
            Self::Rejected(err.user_message(fallback))
        }
    }
}
