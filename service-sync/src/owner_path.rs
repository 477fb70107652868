//! Owner identifiers as returned by API Management.
//!
//! A subscription's `ownerId` is a full ARM resource path such as
//! `/subscriptions/{sub}/resourceGroups/{rg}/providers/Microsoft.ApiManagement/service/{svc}/users/{id}`;
//! only the trailing user id is meaningful to us.

use serde::{Deserialize, Serialize};

const OWNER_PATH_SEGMENTS: usize = 11;

/// A subscription paired with the bare id of the account that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerReference {
    pub subscription_id: String,
    pub owner_id: String
}

/// Extracts the user id from an owner resource path.
///
/// Any structural deviation yields `None`; there is no partial result.
pub fn parse_owner_id_full_path(full_path: &str) -> Option<String> {
    let segments: Vec<&str> = full_path.split('/').collect();
    if segments.len() != OWNER_PATH_SEGMENTS {
        return None;
    }

    segments
        .last()
        .filter(|last| !last.is_empty())
        .map(|last| (*last).to_string())
}
