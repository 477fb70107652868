use crate::account::UserContract;
use crate::config::ApimConfig;
use crate::error::{ServiceSyncError, ServiceSyncResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Read access to the API Management instance that owns service
/// subscriptions.
#[async_trait]
pub trait ApimClient: Send + Sync {
    async fn get_subscription(
        &self,
        subscription_id: &str
    ) -> ServiceSyncResult<SubscriptionContract>;
    async fn get_user(&self, user_id: &str) -> ServiceSyncResult<UserContract>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionContract {
    pub subscription_id: String,
    /// Full resource path of the owning user.
    pub owner_id: Option<String>,
    pub display_name: Option<String>,
    pub state: Option<String>
}

pub struct AzureApimClient {
    http_client: Client,
    config: ApimConfig,
    access_token: Arc<RwLock<Option<CachedToken>>>
}

struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    expires_in: u64
}

#[derive(Debug, Deserialize)]
struct ArmResource<P> {
    id: Option<String>,
    name: Option<String>,
    properties: P
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SubscriptionProperties {
    owner_id: Option<String>,
    display_name: Option<String>,
    state: Option<String>
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UserProperties {
    first_name: Option<String>,
    last_name: Option<String>,
    email: Option<String>,
    note: Option<String>
}

impl AzureApimClient {
    pub fn new(config: ApimConfig) -> ServiceSyncResult<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(ServiceSyncError::HttpError)?;

        Ok(Self {
            http_client,
            config,
            access_token: Arc::new(RwLock::new(None))
        })
    }

    async fn get_access_token(&self) -> ServiceSyncResult<String> {
        {
            let cached = self.access_token.read().await;
            if let Some(ref token) = *cached {
                if token.expires_at > Utc::now() + chrono::Duration::minutes(5) {
                    return Ok(token.token.clone());
                }
            }
        }

        let token_url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.config.login_endpoint.trim_end_matches('/'),
            self.config.tenant_id
        );
        let scope = format!(
            "{}/.default",
            self.config.management_endpoint.trim_end_matches('/')
        );

        let body = format!(
            "client_id={}&client_secret={}&scope={}&grant_type=client_credentials",
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.client_secret),
            urlencoding::encode(&scope)
        );

        let response = self
            .http_client
            .post(&token_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(ServiceSyncError::HttpError)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_body = response.text().await.unwrap_or_default();
            return Err(ServiceSyncError::OAuthError(format!(
                "Token request failed: {} - {}",
                status, error_body
            )));
        }

        let token_response: OAuthTokenResponse = response.json().await.map_err(|e| {
            ServiceSyncError::OAuthError(format!("Failed to parse token response: {}", e))
        })?;

        let expires_at = Utc::now() + chrono::Duration::seconds(token_response.expires_in as i64);

        {
            let mut cached = self.access_token.write().await;
            *cached = Some(CachedToken {
                token: token_response.access_token.clone(),
                expires_at
            });
        }

        Ok(token_response.access_token)
    }

    fn service_url(&self, resource: &str, name: &str) -> String {
        format!(
            "{}/subscriptions/{}/resourceGroups/{}/providers/Microsoft.ApiManagement/service/{}/{}/{}?api-version={}",
            self.config.management_endpoint.trim_end_matches('/'),
            self.config.subscription_id,
            self.config.resource_group,
            self.config.service_name,
            resource,
            urlencoding::encode(name),
            self.config.api_version
        )
    }

    async fn get<T: for<'de> Deserialize<'de>>(&self, url: &str) -> ServiceSyncResult<T> {
        let token = self.get_access_token().await?;
        debug!(url = %url, "Making API Management request");

        let response = self
            .http_client
            .get(url)
            .header("Authorization", format!("Bearer {}", token))
            .header("Accept", "application/json")
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body = response.json::<T>().await?;
                Ok(body)
            }
            StatusCode::UNAUTHORIZED => {
                let mut cached = self.access_token.write().await;
                *cached = None;
                Err(ServiceSyncError::AuthenticationError(
                    "API Management authentication failed".to_string()
                ))
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(ServiceSyncError::ApimApiError {
                    status: Some(status.as_u16()),
                    message: body
                })
            }
        }
    }
}

#[async_trait]
impl ApimClient for AzureApimClient {
    async fn get_subscription(
        &self,
        subscription_id: &str
    ) -> ServiceSyncResult<SubscriptionContract> {
        let url = self.service_url("subscriptions", subscription_id);
        let resource: ArmResource<SubscriptionProperties> = self.get(&url).await?;

        Ok(SubscriptionContract {
            subscription_id: resource
                .name
                .unwrap_or_else(|| subscription_id.to_string()),
            owner_id: resource.properties.owner_id,
            display_name: resource.properties.display_name,
            state: resource.properties.state
        })
    }

    async fn get_user(&self, user_id: &str) -> ServiceSyncResult<UserContract> {
        let url = self.service_url("users", user_id);
        let resource: ArmResource<UserProperties> = self.get(&url).await?;

        Ok(UserContract {
            id: resource.id.or(resource.name),
            first_name: resource.properties.first_name,
            last_name: resource.properties.last_name,
            email: resource.properties.email,
            note: resource.properties.note
        })
    }
}

pub fn create_apim_client(config: ApimConfig) -> ServiceSyncResult<Arc<dyn ApimClient>> {
    Ok(Arc::new(AzureApimClient::new(config)?))
}
