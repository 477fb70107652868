use crate::error::DomainError;
use crate::fiscal_code::OrganizationFiscalCode;
use crate::sql::{TableRef, services_by_delegate_query};
use crate::store::RecordSource;
use crate::tracking;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceScope {
    #[default]
    National,
    Local
}

/// Unknown or missing scopes read as national.
fn lenient_scope<'de, D>(deserializer: D) -> Result<ServiceScope, D::Error>
where
    D: Deserializer<'de>
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default())
}

fn trimmed<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>
{
    let value = String::deserialize(deserializer)?;
    let value = value.trim();
    if value.is_empty() {
        return Err(serde::de::Error::custom("empty string"));
    }
    Ok(value.to_string())
}

fn non_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>
{
    let value = String::deserialize(deserializer)?;
    if value.is_empty() {
        return Err(serde::de::Error::custom("empty string"));
    }
    Ok(value)
}

/// A visible service as read back from the reporting table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    #[serde(deserialize_with = "trimmed")]
    pub id: String,
    #[serde(deserialize_with = "non_empty")]
    pub name: String,
    #[serde(deserialize_with = "trimmed")]
    pub organization_fiscal_code: String,
    #[serde(deserialize_with = "non_empty")]
    pub organization_name: String,
    /// Kept as the stored number so published values are not reformatted.
    pub quality: serde_json::Number,
    #[serde(default, deserialize_with = "lenient_scope")]
    pub scope: ServiceScope,
    #[serde(default)]
    pub description: Option<String>
}

impl ServiceRecord {
    pub fn decode(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrganizationGroup {
    pub fiscal_code: String,
    pub services: Vec<ServiceRecord>
}

/// Services grouped by organization fiscal code. Groups keep the order in
/// which their organization was first seen; services keep encounter order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrganizationGroups {
    groups: Vec<OrganizationGroup>,
    index: HashMap<String, usize>
}

impl OrganizationGroups {
    pub fn push(&mut self, record: ServiceRecord) {
        match self.index.get(&record.organization_fiscal_code) {
            Some(&i) => self.groups[i].services.push(record),
            None => {
                self.index
                    .insert(record.organization_fiscal_code.clone(), self.groups.len());
                self.groups.push(OrganizationGroup {
                    fiscal_code: record.organization_fiscal_code.clone(),
                    services: vec![record]
                });
            }
        }
    }

    pub fn get(&self, fiscal_code: &str) -> Option<&OrganizationGroup> {
        self.index.get(fiscal_code).map(|&i| &self.groups[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &OrganizationGroup> {
        self.groups.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut OrganizationGroup> {
        self.groups.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn service_count(&self) -> usize {
        self.groups.iter().map(|g| g.services.len()).sum()
    }
}

impl FromIterator<ServiceRecord> for OrganizationGroups {
    fn from_iter<I: IntoIterator<Item = ServiceRecord>>(iter: I) -> Self {
        let mut groups = Self::default();
        for record in iter {
            groups.push(record);
        }
        groups
    }
}

/// Feeds every row of `query` to `on_row`, reading `page_size` rows per
/// cursor read. Reading stops after the first page shorter than
/// `page_size`, so a last page that is exactly full costs one extra, empty,
/// read. Returns the number of reads.
async fn read_pages<F>(
    source: &dyn RecordSource,
    query: &str,
    page_size: usize,
    mut on_row: F
) -> Result<usize, DomainError>
where
    F: FnMut(serde_json::Value) + Send
{
    let page_size = page_size.max(1);
    let mut cursor = source
        .open_cursor(query)
        .await
        .map_err(|e| DomainError::storage(e.to_string()))?;
    let mut pages = 0usize;

    loop {
        let read = cursor.read(page_size).await;
        let page = match read {
            Ok(page) => page,
            Err(e) => {
                drop(cursor);
                return Err(DomainError::storage(e.to_string()));
            }
        };
        pages += 1;
        let fetched = page.len();
        page.into_iter().for_each(&mut on_row);

        debug!(page = pages, rows = fetched, "Page read");
        if fetched < page_size {
            break;
        }
    }

    cursor
        .close()
        .await
        .map_err(|e| DomainError::storage(e.to_string()))?;
    Ok(pages)
}

/// Streams `query` through a server-side cursor and groups the decodable
/// rows by organization.
///
/// Rows that do not decode are reported and dropped. A failed read aborts
/// the whole run and nothing accumulated so far is returned.
pub async fn aggregate(
    source: &dyn RecordSource,
    query: &str,
    page_size: usize
) -> Result<OrganizationGroups, DomainError> {
    let mut groups = OrganizationGroups::default();
    let mut dropped = 0usize;

    let pages = read_pages(source, query, page_size, |value| {
        match ServiceRecord::decode(value) {
            Ok(record) => groups.push(record),
            Err(e) => {
                dropped += 1;
                tracking::track_fail_decode(&format!("Invalid ServiceRecord: {}", e));
            }
        }
    })
    .await?;

    info!(
        pages,
        organizations = groups.len(),
        services = groups.service_count(),
        dropped,
        "Services aggregated"
    );

    Ok(groups)
}

/// A service listed for the delegate owning its subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegateService {
    pub id: String,
    pub name: String,
    pub is_visible: bool
}

/// Services of one organization whose subscriptions belong to
/// `delegate_email`, visible or not.
pub async fn delegate_services(
    source: &dyn RecordSource,
    table: &TableRef,
    delegate_email: &str,
    organization_fiscal_code: &OrganizationFiscalCode,
    page_size: usize
) -> Result<Vec<DelegateService>, DomainError> {
    let query = services_by_delegate_query(table, delegate_email, organization_fiscal_code.as_str());
    let mut services = Vec::new();

    read_pages(source, &query, page_size, |value| {
        match serde_json::from_value::<DelegateService>(value) {
            Ok(service) => services.push(service),
            Err(e) => tracking::track_fail_decode(&format!("Invalid DelegateService: {}", e))
        }
    })
    .await?;

    debug!(
        organization = organization_fiscal_code.as_str(),
        services = services.len(),
        "Delegate services listed"
    );
    Ok(services)
}
