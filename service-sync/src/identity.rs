use crate::account::IdentityAccount;
use crate::apim::ApimClient;
use crate::error::{DomainError, SUBSCRIPTION_NOT_FOUND, ServiceSyncError};
use crate::owner_path::{OwnerReference, parse_owner_id_full_path};
use crate::tracking;
use std::sync::Arc;
use tracing::{debug, warn};

pub const INVALID_OWNER_ID: &str = "Invalid Owner Id.";
pub const INVALID_OWNER_PATH: &str = "Invalid Owner Id Full Path.";
pub const ACCOUNT_UNREACHABLE: &str =
    "The provided owner identifier is malformed or invalid, or authentication failed.";
pub const INVALID_ACCOUNT_RESPONSE: &str = "Invalid Apim User Response Decode.";

/// Turns a failed subscription lookup into the message carried by an
/// identity lookup error. The leading label drives skip classification.
pub fn subscription_error_message(err: &ServiceSyncError) -> String {
    match err.status() {
        Some(400) => format!("Invalid Subscription Id|400|{}", err.detail()),
        Some(404) => format!("{}|404|{}", SUBSCRIPTION_NOT_FOUND, err.detail()),
        Some(code) => format!("APIM Generic error|{}|{}", code, err.detail()),
        None => format!("APIM Generic error|no-code-returned|{}", err.detail())
    }
}

/// Resolves who owns a service subscription through API Management.
pub struct IdentityResolver {
    client: Arc<dyn ApimClient>
}

impl IdentityResolver {
    pub fn new(client: Arc<dyn ApimClient>) -> Self {
        Self { client }
    }

    pub async fn resolve_owner_reference(
        &self,
        subscription_id: &str
    ) -> Result<OwnerReference, DomainError> {
        let subscription = self
            .client
            .get_subscription(subscription_id)
            .await
            .map_err(|e| {
                let message = subscription_error_message(&e);
                warn!(subscription_id = %subscription_id, reason = %message, "Subscription lookup failed");
                DomainError::identity_lookup(message)
            })?;

        let full_path = subscription
            .owner_id
            .filter(|p| !p.is_empty())
            .ok_or_else(|| DomainError::identity_lookup(INVALID_OWNER_ID))?;

        let owner_id = parse_owner_id_full_path(&full_path).ok_or_else(|| {
            debug!(subscription_id = %subscription_id, owner_path = %full_path, "Unparsable owner path");
            DomainError::identity_lookup(INVALID_OWNER_PATH)
        })?;

        Ok(OwnerReference {
            subscription_id: subscription_id.to_string(),
            owner_id
        })
    }

    pub async fn resolve_account(
        &self,
        owner: &OwnerReference
    ) -> Result<IdentityAccount, DomainError> {
        let user = self.client.get_user(&owner.owner_id).await.map_err(|e| {
            let reason = format!("{} {}", ACCOUNT_UNREACHABLE, e);
            tracking::track_fail_apim_user(&reason, &owner.owner_id, &owner.subscription_id);
            DomainError::account_lookup(reason)
        })?;

        IdentityAccount::try_from(user).map_err(|e| {
            let reason = format!("{} {}", INVALID_ACCOUNT_RESPONSE, e);
            tracking::track_fail_apim_user(&reason, &owner.owner_id, &owner.subscription_id);
            DomainError::account_lookup(reason)
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::account::{AccountKind, UserContract};
    use crate::apim::SubscriptionContract;
    use crate::error::ServiceSyncResult;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    pub const OWNER_PATH: &str = "/subscriptions/subid/resourceGroups/resourceGroupName/providers/Microsoft.ApiManagement/service/apimServiceName/users/00000000000000000000000000";

    /// In-memory gateway; unknown subscriptions answer 404.
    #[derive(Default)]
    pub struct FakeApim {
        pub subscriptions: HashMap<String, SubscriptionContract>,
        pub users: HashMap<String, UserContract>,
        pub subscription_status: Option<u16>,
        pub user_calls: Mutex<Vec<String>>
    }

    impl FakeApim {
        pub fn with_delegate(subscription_id: &str) -> Self {
            Self::with_user(subscription_id, delegate_user())
        }

        pub fn with_user(subscription_id: &str, user: UserContract) -> Self {
            let mut fake = Self::default();
            fake.subscriptions.insert(
                subscription_id.to_string(),
                SubscriptionContract {
                    subscription_id: subscription_id.to_string(),
                    owner_id: Some(OWNER_PATH.to_string()),
                    ..Default::default()
                }
            );
            fake.users.insert("00000000000000000000000000".to_string(), user);
            fake
        }
    }

    pub fn delegate_user() -> UserContract {
        UserContract {
            id: Some(OWNER_PATH.to_string()),
            first_name: Some("NomeDelegato".to_string()),
            last_name: Some("CognomeDelegato".to_string()),
            email: Some("email@test.com".to_string()),
            note: None
        }
    }

    #[async_trait]
    impl ApimClient for FakeApim {
        async fn get_subscription(
            &self,
            subscription_id: &str
        ) -> ServiceSyncResult<SubscriptionContract> {
            if let Some(status) = self.subscription_status {
                return Err(ServiceSyncError::ApimApiError {
                    status: Some(status),
                    message: "forced".to_string()
                });
            }
            self.subscriptions
                .get(subscription_id)
                .cloned()
                .ok_or_else(|| ServiceSyncError::ApimApiError {
                    status: Some(404),
                    message: "Subscription not found.".to_string()
                })
        }

        async fn get_user(&self, user_id: &str) -> ServiceSyncResult<UserContract> {
            self.user_calls.lock().unwrap().push(user_id.to_string());
            self.users
                .get(user_id)
                .cloned()
                .ok_or_else(|| ServiceSyncError::ApimApiError {
                    status: Some(404),
                    message: "User not found.".to_string()
                })
        }
    }

    #[tokio::test]
    async fn test_resolves_owner_reference() {
        let resolver = IdentityResolver::new(Arc::new(FakeApim::with_delegate("sub-1")));
        let owner = resolver.resolve_owner_reference("sub-1").await.unwrap();

        assert_eq!(owner.subscription_id, "sub-1");
        assert_eq!(owner.owner_id, "00000000000000000000000000");
    }

    #[tokio::test]
    async fn test_missing_subscription_is_not_found() {
        let resolver = IdentityResolver::new(Arc::new(FakeApim::default()));
        let err = resolver.resolve_owner_reference("nope").await.unwrap_err();

        assert_eq!(err.kind(), "identity-lookup-error");
        assert!(err.is_subscription_not_found());
        assert_eq!(err.message(), "Subscription not found|404|Subscription not found.");
    }

    #[tokio::test]
    async fn test_bad_request_is_not_benign() {
        let fake = FakeApim {
            subscription_status: Some(400),
            ..FakeApim::default()
        };
        let resolver = IdentityResolver::new(Arc::new(fake));
        let err = resolver.resolve_owner_reference("sub-1").await.unwrap_err();

        assert!(err.message().starts_with("Invalid Subscription Id|400|"));
        assert!(!err.is_subscription_not_found());
    }

    #[tokio::test]
    async fn test_invalid_owner_path_fails() {
        let mut fake = FakeApim::default();
        fake.subscriptions.insert(
            "sub-1".to_string(),
            SubscriptionContract {
                subscription_id: "sub-1".to_string(),
                owner_id: Some(r"This\IsAnInvalid\Path".to_string()),
                ..Default::default()
            }
        );
        let resolver = IdentityResolver::new(Arc::new(fake));
        let err = resolver.resolve_owner_reference("sub-1").await.unwrap_err();

        assert_eq!(err, DomainError::identity_lookup(INVALID_OWNER_PATH));
    }

    #[tokio::test]
    async fn test_empty_owner_path_fails() {
        let mut fake = FakeApim::default();
        fake.subscriptions.insert(
            "sub-1".to_string(),
            SubscriptionContract {
                subscription_id: "sub-1".to_string(),
                owner_id: Some(String::new()),
                ..Default::default()
            }
        );
        let resolver = IdentityResolver::new(Arc::new(fake));
        let err = resolver.resolve_owner_reference("sub-1").await.unwrap_err();

        assert_eq!(err, DomainError::identity_lookup(INVALID_OWNER_ID));
    }

    #[tokio::test]
    async fn test_resolves_delegate_account() {
        let resolver = IdentityResolver::new(Arc::new(FakeApim::with_delegate("sub-1")));
        let owner = resolver.resolve_owner_reference("sub-1").await.unwrap();
        let account = resolver.resolve_account(&owner).await.unwrap();

        assert_eq!(account.kind, AccountKind::Delegate);
        assert_eq!(account.email, "email@test.com");
    }

    #[tokio::test]
    async fn test_undecodable_account_fails() {
        let user = UserContract {
            email: None,
            ..delegate_user()
        };
        let resolver = IdentityResolver::new(Arc::new(FakeApim::with_user("sub-1", user)));
        let owner = resolver.resolve_owner_reference("sub-1").await.unwrap();
        let err = resolver.resolve_account(&owner).await.unwrap_err();

        assert_eq!(err.kind(), "account-lookup-error");
        assert!(err.message().starts_with(INVALID_ACCOUNT_RESPONSE));
    }

    #[tokio::test]
    async fn test_unreachable_account_fails() {
        let mut fake = FakeApim::with_delegate("sub-1");
        fake.users.clear();
        let resolver = IdentityResolver::new(Arc::new(fake));
        let owner = resolver.resolve_owner_reference("sub-1").await.unwrap();
        let err = resolver.resolve_account(&owner).await.unwrap_err();

        assert_eq!(err.kind(), "account-lookup-error");
        assert!(err.message().starts_with(ACCOUNT_UNREACHABLE));
    }

    #[test]
    fn test_transport_error_without_status() {
        let err = ServiceSyncError::ConfigError("boom".to_string());
        assert_eq!(
            subscription_error_message(&err),
            "APIM Generic error|no-code-returned|Configuration error: boom"
        );
    }
}
