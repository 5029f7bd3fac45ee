use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The four displayable failure classes handed to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    AuthenticationFailure,
    ConnectionFailure,
    SignOutFailure,
    AccountDeletionFailure,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("registration rejected: {0}")]
    InvalidRegistration(String),
    #[error("chat connection failed: {0}")]
    Connection(String),
    #[error("chat connection timed out after {}ms", .0.as_millis())]
    ConnectTimeout(Duration),
    #[error("sign-out failed: {0}")]
    SignOut(String),
    #[error("account deletion failed: {0}")]
    AccountDeletion(String),
    #[error("chat is not connected")]
    NotConnected,
    #[error("chat backend request failed: {0}")]
    Backend(String),
}

impl SessionError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Authentication(_) | Self::InvalidRegistration(_) => {
                FailureKind::AuthenticationFailure
            }
            Self::Connection(_) | Self::ConnectTimeout(_) | Self::NotConnected | Self::Backend(_) => {
                FailureKind::ConnectionFailure
            }
            Self::SignOut(_) => FailureKind::SignOutFailure,
            Self::AccountDeletion(_) => FailureKind::AccountDeletionFailure,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::Authentication(detail) => format!("Authentication failed: {detail}"),
            Self::InvalidRegistration(detail) => detail.clone(),
            Self::Connection(detail) => {
                format!("Could not connect to chat: {detail}. Type `retry` to try again.")
            }
            Self::ConnectTimeout(_) => {
                "Chat is taking too long to connect. Type `retry` to try again.".to_string()
            }
            Self::SignOut(detail) => format!("Signed out locally, but the provider reported: {detail}"),
            Self::AccountDeletion(detail) => format!("Failed to delete account: {detail}"),
            Self::NotConnected => "Chat is not connected yet.".to_string(),
            Self::Backend(detail) => format!("Chat request failed: {detail}"),
        }
    }

    /// Flattens a collaborator error chain into a single line.
    pub(crate) fn describe(err: &anyhow::Error) -> String {
        format!("{err:#}")
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
