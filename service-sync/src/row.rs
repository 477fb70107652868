use crate::account::IdentityAccount;
use crate::owner_path::OwnerReference;
use crate::sql::{Row, SqlValue};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Column names of the reporting table.
pub mod columns {
    pub const ID: &str = "id";
    pub const IS_VISIBLE: &str = "isVisible";
    pub const NAME: &str = "name";
    pub const ORGANIZATION_FISCAL_CODE: &str = "organizationFiscalCode";
    pub const VERSION: &str = "version";
    pub const SUBSCRIPTION_ACCOUNT_ID: &str = "subscriptionAccountId";
    pub const SUBSCRIPTION_ACCOUNT_NAME: &str = "subscriptionAccountName";
    pub const SUBSCRIPTION_ACCOUNT_SURNAME: &str = "subscriptionAccountSurname";
    pub const SUBSCRIPTION_ACCOUNT_EMAIL: &str = "subscriptionAccountEmail";
    pub const REQUIRE_SECURE_CHANNELS: &str = "requireSecureChannels";
    pub const AUTHORIZED_CIDRS: &str = "authorizedCIDRS";
    pub const DEPARTMENT_NAME: &str = "departmentName";
    pub const MAX_ALLOWED_PAYMENT_AMOUNT: &str = "maxAllowedPaymentAmount";
    pub const ORGANIZATION_NAME: &str = "organizationName";
    pub const SCOPE: &str = "scope";
    pub const DESCRIPTION: &str = "description";
    pub const QUALITY: &str = "quality";
    pub const METADATA: &str = "metadata";
}

/// A service document as delivered by the change feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDocument {
    pub service_id: String,
    pub organization_fiscal_code: String,
    #[serde(default)]
    pub is_visible: bool,
    #[serde(default)]
    pub require_secure_channels: bool,
    pub service_name: Option<String>,
    pub version: i64,
    #[serde(default, rename = "authorizedCIDRs")]
    pub authorized_cidrs: Vec<String>,
    pub department_name: Option<String>,
    pub organization_name: Option<String>,
    pub max_allowed_payment_amount: Option<i64>,
    pub service_metadata: Option<ServiceMetadata>
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMetadata {
    pub description: Option<String>,
    pub scope: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>
}

/// Flattened record persisted in the reporting table.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportingRow {
    pub id: String,
    pub is_visible: bool,
    pub name: String,
    pub organization_fiscal_code: String,
    pub version: i64,
    pub subscription_account_id: String,
    pub subscription_account_name: String,
    pub subscription_account_surname: String,
    pub subscription_account_email: String,
    pub require_secure_channels: bool,
    pub authorized_cidrs: Vec<String>,
    pub department_name: Option<String>,
    pub max_allowed_payment_amount: Option<i64>,
    pub organization_name: Option<String>,
    pub scope: Option<String>,
    pub description: Option<String>,
    pub quality: f64,
    pub metadata: Option<serde_json::Value>
}

/// Merges a changed document with the identity of its subscription owner.
///
/// `quality` is the externally computed completeness score; `0` when the
/// caller has none.
pub fn to_row(
    document: &SourceDocument,
    account: &IdentityAccount,
    owner: &OwnerReference,
    quality: Option<f64>
) -> ReportingRow {
    let metadata = document.service_metadata.as_ref();

    ReportingRow {
        id: document.service_id.clone(),
        is_visible: document.is_visible,
        name: document.service_name.clone().unwrap_or_default(),
        organization_fiscal_code: document.organization_fiscal_code.clone(),
        version: document.version,
        subscription_account_id: owner.owner_id.clone(),
        subscription_account_name: account.first_name.clone(),
        subscription_account_surname: account.last_name.clone(),
        subscription_account_email: account.email.clone(),
        require_secure_channels: document.require_secure_channels,
        authorized_cidrs: document.authorized_cidrs.clone(),
        department_name: document.department_name.clone(),
        max_allowed_payment_amount: document.max_allowed_payment_amount,
        organization_name: document.organization_name.clone(),
        scope: metadata.and_then(|m| m.scope.clone()),
        description: metadata.and_then(|m| m.description.clone()),
        quality: quality.unwrap_or(0.0),
        metadata: metadata.and_then(|m| serde_json::to_value(m).ok())
    }
}

fn nullable(value: Option<SqlValue>) -> SqlValue {
    value.unwrap_or(SqlValue::Null)
}

impl ReportingRow {
    /// Column/value pairs for every reporting column. Absent optionals are
    /// written as NULL so a newer version clears what an older one stored.
    pub fn to_columns(&self) -> Row {
        let mut row = Row::new();
        let mut put = |column: &str, value: SqlValue| {
            row.insert(column.to_string(), value);
        };

        put(columns::ID, SqlValue::from(self.id.as_str()));
        put(columns::IS_VISIBLE, SqlValue::Bool(self.is_visible));
        put(columns::NAME, SqlValue::from(self.name.as_str()));
        put(
            columns::ORGANIZATION_FISCAL_CODE,
            SqlValue::from(self.organization_fiscal_code.as_str())
        );
        put(columns::VERSION, SqlValue::Int(self.version));
        put(
            columns::SUBSCRIPTION_ACCOUNT_ID,
            SqlValue::from(self.subscription_account_id.as_str())
        );
        put(
            columns::SUBSCRIPTION_ACCOUNT_NAME,
            SqlValue::from(self.subscription_account_name.as_str())
        );
        put(
            columns::SUBSCRIPTION_ACCOUNT_SURNAME,
            SqlValue::from(self.subscription_account_surname.as_str())
        );
        put(
            columns::SUBSCRIPTION_ACCOUNT_EMAIL,
            SqlValue::from(self.subscription_account_email.as_str())
        );
        put(
            columns::REQUIRE_SECURE_CHANNELS,
            SqlValue::Bool(self.require_secure_channels)
        );
        put(
            columns::AUTHORIZED_CIDRS,
            SqlValue::Json(json!({ "ip": self.authorized_cidrs }))
        );
        put(columns::QUALITY, SqlValue::Float(self.quality));

        put(
            columns::DEPARTMENT_NAME,
            nullable(self.department_name.as_deref().map(SqlValue::from))
        );
        put(
            columns::MAX_ALLOWED_PAYMENT_AMOUNT,
            nullable(self.max_allowed_payment_amount.map(SqlValue::Int))
        );
        put(
            columns::ORGANIZATION_NAME,
            nullable(self.organization_name.as_deref().map(SqlValue::from))
        );
        put(columns::SCOPE, nullable(self.scope.as_deref().map(SqlValue::from)));
        put(
            columns::DESCRIPTION,
            nullable(self.description.as_deref().map(SqlValue::from))
        );
        put(columns::METADATA, nullable(self.metadata.clone().map(SqlValue::Json)));

        row
    }
}
