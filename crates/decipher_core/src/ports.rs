//! crates/decipher_core/src/ports.rs
//!
//! Defines the service contracts (traits) the core logic depends on.
//! The HTTP adapters and storage backends in the `client` service implement
//! these, which keeps the session store and the wizard free of any transport.

use async_trait::async_trait;

use crate::domain::{
    AuthGrant, EditAction, ParagraphEdit, RegisterRequest, Registration, Scenario, ScenarioList,
    Story, StoryDraft, StoryList, StoryUpdate, User,
};

//=========================================================================================
// Error and Result Types
//=========================================================================================

/// Infrastructure errors raised by ports that are not backend calls (storage).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// The failure half of every domain-service call.
///
/// Callers never see a transport panic or a raw HTTP error: connectivity
/// problems, backend rejections, unreadable bodies and local validation all
/// arrive as one of these variants, each carrying a human-readable message.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ServiceError {
    /// The request never produced a response.
    #[error("{0}")]
    Network(String),

    /// The backend answered with `success: false` or a non-2xx status.
    #[error("{message}")]
    Rejected {
        message: String,
        requires_verification: bool,
        email: Option<String>,
    },

    /// The response body was empty, HTML, or not the JSON we expected.
    #[error("{0}")]
    Malformed(String),

    /// Input was refused locally; no request was sent.
    #[error("{0}")]
    Validation(String),

    /// Another mutating story action is still running.
    #[error("Please wait for the current {0} action to finish")]
    ActionInFlight(EditAction),

    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn rejected(message: impl Into<String>) -> Self {
        ServiceError::Rejected {
            message: message.into(),
            requires_verification: false,
            email: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    /// True when the backend refused a login because the email is unverified.
    pub fn requires_verification(&self) -> bool {
        matches!(
            self,
            ServiceError::Rejected {
                requires_verification: true,
                ..
            }
        )
    }

    /// The address the OTP flow should be started for, if the backend sent one.
    pub fn verification_email(&self) -> Option<&str> {
        match self {
            ServiceError::Rejected { email, .. } => email.as_deref(),
            _ => None,
        }
    }
}

impl From<PortError> for ServiceError {
    fn from(err: PortError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

/// A convenience type alias for `Result<T, ServiceError>`.
pub type ServiceResult<T> = Result<T, ServiceError>;

//=========================================================================================
// Session Persistence
//=========================================================================================

/// The two independent slots a session is persisted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// The user record, serialized as JSON.
    User,
    /// The raw bearer token.
    Token,
}

impl Slot {
    pub fn key(self) -> &'static str {
        match self {
            Slot::User => "user",
            Slot::Token => "token",
        }
    }
}

/// Durable string storage for the session slots.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    async fn read(&self, slot: Slot) -> PortResult<Option<String>>;

    async fn write(&self, slot: Slot, value: &str) -> PortResult<()>;

    async fn remove(&self, slot: Slot) -> PortResult<()>;
}

//=========================================================================================
// Domain Service Ports
//=========================================================================================

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Creates a pending account and triggers email/OTP verification.
    async fn register(&self, request: &RegisterRequest) -> ServiceResult<Registration>;

    async fn login(&self, email: &str, password: &str, remember_me: bool)
        -> ServiceResult<AuthGrant>;

    /// Invalidates `token` server-side.
    async fn logout(&self, token: &str) -> ServiceResult<()>;

    async fn verify_otp(&self, email: &str, otp: &str) -> ServiceResult<AuthGrant>;

    async fn resend_verification(&self, email: &str) -> ServiceResult<String>;

    async fn forgot_password(&self, email: &str) -> ServiceResult<String>;

    async fn reset_password(
        &self,
        token: &str,
        password: &str,
        confirm_password: &str,
    ) -> ServiceResult<AuthGrant>;

    /// Fetches the account `token` belongs to.
    async fn profile(&self, token: &str) -> ServiceResult<User>;

    /// Consumes an email-verification link token.
    async fn verify_email(&self, token: &str) -> ServiceResult<String>;
}

#[async_trait]
pub trait StoryService: Send + Sync {
    async fn create_story(&self, draft: &StoryDraft) -> ServiceResult<Story>;

    async fn list_stories(&self) -> ServiceResult<StoryList>;

    async fn get_story(&self, story_id: &str) -> ServiceResult<Story>;

    async fn update_story(&self, story_id: &str, update: &StoryUpdate) -> ServiceResult<Story>;

    async fn delete_story(&self, story_id: &str) -> ServiceResult<String>;

    /// Regenerates the last chunk with `model`.
    async fn regenerate(&self, story_id: &str, model: &str) -> ServiceResult<Story>;

    /// Appends a freshly generated chunk.
    async fn continue_story(&self, story_id: &str, model: &str) -> ServiceResult<Story>;

    /// Rewrites the last paragraph following a short instruction.
    async fn edit_last_paragraph(
        &self,
        story_id: &str,
        instruction: &str,
        model: &str,
    ) -> ServiceResult<ParagraphEdit>;

    /// Replaces the content of the chunk whose stable index is `chunk_index`.
    async fn edit_chunk(
        &self,
        story_id: &str,
        chunk_index: u32,
        content: &str,
    ) -> ServiceResult<Story>;
}

#[async_trait]
pub trait ScenarioService: Send + Sync {
    async fn create_scenario(&self, scenario: &Scenario) -> ServiceResult<Scenario>;

    async fn list_scenarios(&self) -> ServiceResult<ScenarioList>;

    async fn get_scenario(&self, scenario_id: &str) -> ServiceResult<Scenario>;

    async fn update_scenario(&self, scenario_id: &str, scenario: &Scenario)
        -> ServiceResult<Scenario>;

    async fn delete_scenario(&self, scenario_id: &str) -> ServiceResult<String>;

    /// Lists the stories that were spawned from a scenario.
    async fn scenario_stories(&self, scenario_id: &str) -> ServiceResult<Vec<Story>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_failures_surface_as_internal_errors() {
        let err: ServiceError = PortError::Storage("disk full".into()).into();
        assert_eq!(err, ServiceError::Internal("Storage error: disk full".into()));

        let err: ServiceError = PortError::Unexpected("bad json".into()).into();
        assert!(matches!(err, ServiceError::Internal(ref m) if m.ends_with("bad json")));
    }
}
