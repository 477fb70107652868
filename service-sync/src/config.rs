use crate::error::{ServiceSyncError, ServiceSyncResult};
use crate::row::columns;
use crate::sql::{TableRef, UpsertTarget};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use validator::Validate;

/// Everything the sync and webview jobs need, passed explicitly into
/// constructors.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ServiceSyncConfig {
    #[validate(nested)]
    pub apim: ApimConfig,

    #[validate(nested)]
    pub database: DatabaseConfig,

    #[validate(nested)]
    pub table: ReportingTableConfig,

    #[serde(default)]
    #[validate(nested)]
    pub webview: WebviewConfig,

    /// Documents processed at once by the batch driver. 1 is sequential.
    #[serde(default = "default_concurrency")]
    #[validate(range(min = 1, max = 64))]
    pub concurrency: usize
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ApimConfig {
    #[validate(length(min = 1))]
    pub tenant_id: String,
    #[validate(length(min = 1))]
    pub client_id: String,
    #[validate(length(min = 1))]
    pub client_secret: String,
    /// Azure subscription hosting the API Management instance.
    #[validate(length(min = 1))]
    pub subscription_id: String,
    #[validate(length(min = 1))]
    pub resource_group: String,
    #[validate(length(min = 1))]
    pub service_name: String,
    #[serde(default = "default_management_endpoint")]
    #[validate(url)]
    pub management_endpoint: String,
    #[serde(default = "default_login_endpoint")]
    #[validate(url)]
    pub login_endpoint: String,
    #[serde(default = "default_api_version")]
    pub api_version: String
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct DatabaseConfig {
    #[validate(length(min = 1))]
    pub url: String,
    #[serde(default = "default_max_connections")]
    #[validate(range(min = 1, max = 100))]
    pub max_connections: u32,
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ReportingTableConfig {
    #[validate(length(min = 1, max = 63))]
    pub schema: String,
    #[validate(length(min = 1, max = 63))]
    pub table: String,
    #[serde(default = "default_primary_key")]
    #[validate(length(min = 1))]
    pub primary_key: String,
    #[serde(default = "default_version_column")]
    #[validate(length(min = 1))]
    pub version_column: String,
    /// Columns overwritten when a newer version arrives.
    #[serde(default = "default_merge_columns")]
    pub merge_columns: Vec<String>
}

impl ReportingTableConfig {
    pub fn table_ref(&self) -> TableRef {
        TableRef::new(&self.schema, &self.table)
    }

    pub fn upsert_target(&self) -> UpsertTarget {
        UpsertTarget {
            table: self.table_ref(),
            primary_key: self.primary_key.clone(),
            version_column: self.version_column.clone(),
            merge_columns: Some(self.merge_columns.clone())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct WebviewConfig {
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1))]
    pub page_size: usize,
    /// Service ids always published with a passing quality.
    #[serde(default)]
    pub quality_exclusion_list: Vec<String>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_refresh_interval_seconds")]
    #[validate(range(min = 1))]
    pub refresh_interval_seconds: u64
}

impl Default for WebviewConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            quality_exclusion_list: Vec::new(),
            output_dir: default_output_dir(),
            refresh_interval_seconds: default_refresh_interval_seconds()
        }
    }
}

impl WebviewConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_seconds)
    }
}

fn default_concurrency() -> usize {
    1
}

fn default_management_endpoint() -> String {
    "https://management.azure.com".to_string()
}

fn default_login_endpoint() -> String {
    "https://login.microsoftonline.com".to_string()
}

fn default_api_version() -> String {
    "2021-08-01".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_idle_timeout_ms() -> u64 {
    30_000
}

fn default_primary_key() -> String {
    columns::ID.to_string()
}

fn default_version_column() -> String {
    columns::VERSION.to_string()
}

/// Every reporting column except the primary key. The version column is
/// part of it so that the stored version advances with the data.
pub fn default_merge_columns() -> Vec<String> {
    [
        columns::IS_VISIBLE,
        columns::NAME,
        columns::ORGANIZATION_FISCAL_CODE,
        columns::VERSION,
        columns::SUBSCRIPTION_ACCOUNT_ID,
        columns::SUBSCRIPTION_ACCOUNT_NAME,
        columns::SUBSCRIPTION_ACCOUNT_SURNAME,
        columns::SUBSCRIPTION_ACCOUNT_EMAIL,
        columns::REQUIRE_SECURE_CHANNELS,
        columns::AUTHORIZED_CIDRS,
        columns::DEPARTMENT_NAME,
        columns::MAX_ALLOWED_PAYMENT_AMOUNT,
        columns::ORGANIZATION_NAME,
        columns::SCOPE,
        columns::DESCRIPTION,
        columns::QUALITY,
        columns::METADATA
    ]
    .iter()
    .map(|c| c.to_string())
    .collect()
}

fn default_page_size() -> usize {
    1000
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("webview")
}

fn default_refresh_interval_seconds() -> u64 {
    3600
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

impl ServiceSyncConfig {
    /// Reads the configuration from process environment variables.
    pub fn from_env() -> ServiceSyncResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup and validates it.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ServiceSyncResult<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ServiceSyncError::ConfigError(format!("{} not set", key)))
        };
        let parsed = |key: &str| -> ServiceSyncResult<Option<u64>> {
            lookup(key)
                .map(|v| {
                    v.trim().parse::<u64>().map_err(|e| {
                        ServiceSyncError::ConfigError(format!("{} is not a number: {}", key, e))
                    })
                })
                .transpose()
        };

        let config = Self {
            apim: ApimConfig {
                tenant_id: required("APIM_TENANT_ID")?,
                client_id: required("APIM_CLIENT_ID")?,
                client_secret: required("APIM_CLIENT_SECRET")?,
                subscription_id: required("APIM_SUBSCRIPTION_ID")?,
                resource_group: required("APIM_RESOURCE_GROUP")?,
                service_name: required("APIM_SERVICE_NAME")?,
                management_endpoint: lookup("APIM_MANAGEMENT_ENDPOINT")
                    .unwrap_or_else(default_management_endpoint),
                login_endpoint: lookup("APIM_LOGIN_ENDPOINT")
                    .unwrap_or_else(default_login_endpoint),
                api_version: lookup("APIM_API_VERSION").unwrap_or_else(default_api_version)
            },
            database: DatabaseConfig {
                url: required("DB_URL")?,
                max_connections: parsed("DB_MAX_CONNECTIONS")?
                    .map(|v| v as u32)
                    .unwrap_or_else(default_max_connections),
                idle_timeout_ms: parsed("DB_IDLE_TIMEOUT_MS")?
                    .unwrap_or_else(default_idle_timeout_ms)
            },
            table: ReportingTableConfig {
                schema: required("DB_SCHEMA")?,
                table: required("DB_TABLE")?,
                primary_key: lookup("DB_PRIMARY_KEY").unwrap_or_else(default_primary_key),
                version_column: lookup("DB_VERSION_COLUMN")
                    .unwrap_or_else(default_version_column),
                merge_columns: lookup("DB_MERGE_COLUMNS")
                    .map(|v| split_list(&v))
                    .unwrap_or_else(default_merge_columns)
            },
            webview: WebviewConfig {
                page_size: parsed("PAGE_SIZE")?
                    .map(|v| v as usize)
                    .unwrap_or_else(default_page_size),
                quality_exclusion_list: lookup("SERVICE_QUALITY_EXCLUSION_LIST")
                    .map(|v| split_list(&v))
                    .unwrap_or_default(),
                output_dir: lookup("WEBVIEW_OUTPUT_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(default_output_dir),
                refresh_interval_seconds: parsed("WEBVIEW_REFRESH_INTERVAL_SECONDS")?
                    .unwrap_or_else(default_refresh_interval_seconds)
            },
            concurrency: parsed("SYNC_CONCURRENCY")?
                .map(|v| v as usize)
                .unwrap_or_else(default_concurrency)
        };

        config
            .validate()
            .map_err(|e| ServiceSyncError::ConfigError(e.to_string()))?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use std::env;

    const REQUIRED: &[(&str, &str)] = &[
        ("APIM_TENANT_ID", "tenant"),
        ("APIM_CLIENT_ID", "client"),
        ("APIM_CLIENT_SECRET", "secret"),
        ("APIM_SUBSCRIPTION_ID", "azure-sub"),
        ("APIM_RESOURCE_GROUP", "rg"),
        ("APIM_SERVICE_NAME", "apim"),
        ("DB_URL", "postgres://localhost/servicedata"),
        ("DB_SCHEMA", "ServiceData"),
        ("DB_TABLE", "Services")
    ];

    fn vars(extra: &[(&str, &str)]) -> HashMap<String, String> {
        REQUIRED
            .iter()
            .chain(extra.iter())
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn load(vars: HashMap<String, String>) -> ServiceSyncResult<ServiceSyncConfig> {
        ServiceSyncConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(vars(&[])).unwrap();

        assert_eq!(config.apim.management_endpoint, "https://management.azure.com");
        assert_eq!(config.apim.login_endpoint, "https://login.microsoftonline.com");
        assert_eq!(config.database.idle_timeout_ms, 30_000);
        assert_eq!(config.table.primary_key, "id");
        assert_eq!(config.table.version_column, "version");
        assert!(config.table.merge_columns.contains(&"version".to_string()));
        assert!(!config.table.merge_columns.contains(&"id".to_string()));
        assert_eq!(config.webview.page_size, 1000);
        assert!(config.webview.quality_exclusion_list.is_empty());
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn test_overrides() {
        let config = load(vars(&[
            ("PAGE_SIZE", "50"),
            ("SERVICE_QUALITY_EXCLUSION_LIST", "svc-a, svc-b,,"),
            ("DB_MERGE_COLUMNS", "name,version"),
            ("SYNC_CONCURRENCY", "4"),
            ("WEBVIEW_OUTPUT_DIR", "/tmp/views")
        ]))
        .unwrap();

        assert_eq!(config.webview.page_size, 50);
        assert_eq!(
            config.webview.quality_exclusion_list,
            vec!["svc-a".to_string(), "svc-b".to_string()]
        );
        assert_eq!(config.table.merge_columns, vec!["name", "version"]);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.webview.output_dir, PathBuf::from("/tmp/views"));
    }

    #[test]
    fn test_missing_required_variable() {
        let mut vars = vars(&[]);
        vars.remove("DB_URL");

        let err = load(vars).unwrap_err();
        assert!(err.to_string().contains("DB_URL not set"));
    }

    #[test]
    fn test_zero_page_size_is_rejected() {
        let err = load(vars(&[("PAGE_SIZE", "0")])).unwrap_err();
        assert!(matches!(err, ServiceSyncError::ConfigError(_)));
    }

    #[test]
    fn test_unparsable_number_is_rejected() {
        let err = load(vars(&[("PAGE_SIZE", "many")])).unwrap_err();
        assert!(err.to_string().contains("PAGE_SIZE"));
    }

    #[test]
    fn test_upsert_target_uses_configured_columns() {
        let config = load(vars(&[("DB_VERSION_COLUMN", "serviceVersion")])).unwrap();
        let target = config.table.upsert_target();

        assert_eq!(target.table.qualified(), r#""ServiceData"."Services""#);
        assert_eq!(target.version_column, "serviceVersion");
        assert_eq!(target.merge_columns, Some(default_merge_columns()));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        unsafe {
            for (key, value) in REQUIRED {
                env::set_var(key, value);
            }
            env::set_var("PAGE_SIZE", "25");
        }

        let config = ServiceSyncConfig::from_env().unwrap();
        assert_eq!(config.webview.page_size, 25);
        assert_eq!(config.table.table, "Services");

        unsafe {
            for (key, _) in REQUIRED {
                env::remove_var(key);
            }
            env::remove_var("PAGE_SIZE");
        }
    }
}
