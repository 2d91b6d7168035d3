use shared::error::ApiError;
use thiserror::Error;

use crate::{
    sections::{FieldError, SectionKey},
    transfer::TransferViolation,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    InvalidTransfer(#[from] TransferViolation),
    #[error("registration is incomplete; missing sections: {}", join_keys(.missing))]
    IncompleteRegistration { missing: Vec<SectionKey> },
    #[error("section {section} has invalid fields: {}", join_fields(.errors))]
    InvalidSection {
        section: SectionKey,
        errors: Vec<FieldError>,
    },
    #[error("not signed in")]
    NotAuthenticated,
    #[error("invalid session token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),
    #[error("{message}")]
    Rejected { message: String },
    #[error("server returned {status}: {}", .error.message)]
    Http { status: u16, error: ApiError },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed server response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// Failures caught before any request was made.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ClientError::InvalidTransfer(_)
                | ClientError::IncompleteRegistration { .. }
                | ClientError::InvalidSection { .. }
                | ClientError::NotAuthenticated
        )
    }

    /// The single message shown to the user for a failed action.
    pub fn user_message(&self, action: UserAction) -> String {
        match self {
            ClientError::Rejected { message } if !message.trim().is_empty() => message.clone(),
            ClientError::Http { error, .. } if action.surfaces_backend_text() => {
                format!("{}: {}", action.failure_text(), error.message)
            }
            ClientError::Rejected { .. }
            | ClientError::Http { .. }
            | ClientError::Transport(_)
            | ClientError::Decode(_) => {
                format!("{}. Please try again.", action.failure_text())
            }
            ClientError::InvalidToken(_) => {
                format!("{}: the session token is not valid", action.failure_text())
            }
            local => local.to_string(),
        }
    }
}

/// A user-triggered operation, used to phrase failure messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Login,
    LoadClient,
    RegisterClient,
    UpdateClient,
    SendTransfer,
    ListPendingTransfers,
    AcceptTransfer,
}

impl UserAction {
    fn failure_text(self) -> &'static str {
        match self {
            UserAction::Login => "Could not sign in",
            UserAction::LoadClient => "Could not load the client for editing",
            UserAction::RegisterClient => "Could not register the client",
            UserAction::UpdateClient => "Could not update the client",
            UserAction::SendTransfer => "Could not send the transfer",
            UserAction::ListPendingTransfers => "Could not load pending transfers",
            UserAction::AcceptTransfer => "Could not accept the transfer",
        }
    }

    /// Registration screens show the backend's own explanation; the till
    /// screens show a generic retry prompt.
    fn surfaces_backend_text(self) -> bool {
        matches!(
            self,
            UserAction::Login | UserAction::RegisterClient | UserAction::UpdateClient
        )
    }
}

fn join_keys(keys: &[SectionKey]) -> String {
    keys.iter()
        .map(|key| key.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
