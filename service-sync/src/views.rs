//! Public projections of the aggregated services.
//!
//! Both views are JSON arrays with short field names to keep the published
//! artifacts small.

use crate::aggregate::{OrganizationGroups, ServiceRecord, ServiceScope};
use crate::error::ServiceSyncResult;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompactOrganization {
    #[serde(rename = "fc")]
    pub fiscal_code: String,
    #[serde(rename = "o")]
    pub organization_name: String,
    #[serde(rename = "s")]
    pub services: Vec<CompactService>
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompactService {
    #[serde(rename = "i")]
    pub id: String,
    #[serde(rename = "n")]
    pub name: String,
    #[serde(rename = "q")]
    pub quality: serde_json::Number
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtendedOrganization {
    #[serde(rename = "fc")]
    pub fiscal_code: String,
    #[serde(rename = "o")]
    pub organization_name: String,
    #[serde(rename = "s")]
    pub services: Vec<ExtendedService>
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtendedService {
    #[serde(rename = "i")]
    pub id: String,
    #[serde(rename = "n")]
    pub name: String,
    #[serde(rename = "q")]
    pub quality: serde_json::Number,
    #[serde(rename = "sc")]
    pub scope: ServiceScope,
    #[serde(rename = "d", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>
}

/// Forces a passing quality on every listed service id.
pub fn apply_quality_exclusions(groups: &mut OrganizationGroups, exclusion_list: &[String]) {
    if exclusion_list.is_empty() {
        return;
    }
    let excluded: HashSet<&str> = exclusion_list.iter().map(String::as_str).collect();
    for group in groups.iter_mut() {
        for service in group.services.iter_mut() {
            if excluded.contains(service.id.as_str()) {
                service.quality = serde_json::Number::from(1);
            }
        }
    }
}

/// The organization name of a group is the one of its first service.
fn organization_name(services: &[ServiceRecord]) -> String {
    services
        .first()
        .map(|s| s.organization_name.clone())
        .unwrap_or_default()
}

pub fn compact_view(groups: &OrganizationGroups) -> Vec<CompactOrganization> {
    groups
        .iter()
        .map(|group| CompactOrganization {
            fiscal_code: group.fiscal_code.clone(),
            organization_name: organization_name(&group.services),
            services: group
                .services
                .iter()
                .map(|s| CompactService {
                    id: s.id.trim().to_string(),
                    name: s.name.clone(),
                    quality: s.quality.clone()
                })
                .collect()
        })
        .collect()
}

pub fn extended_view(groups: &OrganizationGroups) -> Vec<ExtendedOrganization> {
    groups
        .iter()
        .map(|group| ExtendedOrganization {
            fiscal_code: group.fiscal_code.clone(),
            organization_name: organization_name(&group.services),
            services: group
                .services
                .iter()
                .map(|s| ExtendedService {
                    id: s.id.trim().to_string(),
                    name: s.name.clone(),
                    quality: s.quality.clone(),
                    scope: s.scope,
                    description: s.description.clone()
                })
                .collect()
        })
        .collect()
}

/// Serialized compact and extended views, ready to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedViews {
    pub compact: String,
    pub extended: String
}

pub fn render_views(groups: &OrganizationGroups) -> ServiceSyncResult<RenderedViews> {
    Ok(RenderedViews {
        compact: serde_json::to_string(&compact_view(groups))?,
        extended: serde_json::to_string(&extended_view(groups))?
    })
}
