use serde::Serialize;
use thiserror::Error;

pub type ServiceSyncResult<T> = Result<T, ServiceSyncError>;

/// Prefix of the identity lookup message produced when the gateway has no
/// subscription for a service. Such services predate the gateway and are
/// skipped instead of failing the document.
pub const SUBSCRIPTION_NOT_FOUND: &str = "Subscription not found";

/// Failures of collaborators (gateway, database, sinks, configuration).
#[derive(Debug, Error)]
pub enum ServiceSyncError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("OAuth error: {0}")]
    OAuthError(String),

    #[error("APIM API error: {} - {message}", display_status(.status))]
    ApimApiError { status: Option<u16>, message: String },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Publish failed: {0}")]
    PublishError(#[from] std::io::Error),

    #[error("Scheduler error: {0}")]
    SchedulerError(String),

    #[error(transparent)]
    Domain(#[from] DomainError)
}

fn display_status(status: &Option<u16>) -> String {
    status.map_or_else(|| "no-code-returned".to_string(), |s| s.to_string())
}

impl ServiceSyncError {
    /// HTTP status reported by the gateway, when there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ApimApiError { status, .. } => *status,
            Self::HttpError(e) => e.status().map(|s| s.as_u16()),
            Self::AuthenticationError(_) => Some(401),
            _ => None
        }
    }

    /// Message without the variant prefix, used when re-classifying gateway
    /// failures into the domain taxonomy.
    pub fn detail(&self) -> String {
        match self {
            Self::ApimApiError { message, .. } => message.clone(),
            other => other.to_string()
        }
    }
}

/// Errors surfaced by the change pipeline and the aggregator.
///
/// The message is part of the contract: classification of benign failures
/// is done by prefix matching on it.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind")]
pub enum DomainError {
    #[error("identity-lookup-error|{message}")]
    #[serde(rename = "identity-lookup-error")]
    IdentityLookup { message: String },

    #[error("account-lookup-error|{message}")]
    #[serde(rename = "account-lookup-error")]
    AccountLookup { message: String },

    #[error("storage-error|{message}")]
    #[serde(rename = "storage-error")]
    Storage { message: String }
}

impl DomainError {
    pub fn identity_lookup(message: impl Into<String>) -> Self {
        Self::IdentityLookup {
            message: message.into()
        }
    }

    pub fn account_lookup(message: impl Into<String>) -> Self {
        Self::AccountLookup {
            message: message.into()
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into()
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::IdentityLookup { .. } => "identity-lookup-error",
            Self::AccountLookup { .. } => "account-lookup-error",
            Self::Storage { .. } => "storage-error"
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::IdentityLookup { message }
            | Self::AccountLookup { message }
            | Self::Storage { message } => message
        }
    }

    /// A subscription with no gateway record is a known historical
    /// inconsistency; the document is skipped rather than failed.
    pub fn is_subscription_not_found(&self) -> bool {
        matches!(self, Self::IdentityLookup { message } if message.starts_with(SUBSCRIPTION_NOT_FOUND))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_display_carries_kind() {
        let err = DomainError::storage("relation does not exist");
        assert_eq!(err.to_string(), "storage-error|relation does not exist");
        assert_eq!(err.kind(), "storage-error");
        assert_eq!(err.message(), "relation does not exist");
    }

    #[test]
    fn test_subscription_not_found_is_only_identity_lookup() {
        let benign = DomainError::identity_lookup("Subscription not found|404|gone");
        assert!(benign.is_subscription_not_found());

        let account = DomainError::account_lookup("Subscription not found|404|gone");
        assert!(!account.is_subscription_not_found());

        let generic = DomainError::identity_lookup("APIM Generic error|500|boom");
        assert!(!generic.is_subscription_not_found());
    }

    #[test]
    fn test_domain_error_serializes_with_kind() {
        let json = serde_json::to_value(DomainError::account_lookup("gone")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "kind": "account-lookup-error", "message": "gone" })
        );
    }

    #[test]
    fn test_apim_error_display_without_status() {
        let err = ServiceSyncError::ApimApiError {
            status: None,
            message: "connection reset".to_string()
        };
        assert_eq!(err.to_string(), "APIM API error: no-code-returned - connection reset");
        assert_eq!(err.status(), None);
        assert_eq!(err.detail(), "connection reset");
    }
}
