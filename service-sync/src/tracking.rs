//! Named diagnostic events.
//!
//! Every event is logged through `tracing` under a stable name and counted
//! with `metrics`, so dashboards can alert on them without parsing logs.

use metrics::counter;
use tracing::{info, warn};

pub const GENERIC_ERROR: &str = "developerportal.servicedata.generic-error";
pub const GENERIC_EVENT: &str = "developerportal.servicedata.generic-event";
pub const FAIL_APIM_USER: &str = "developerportal.servicedata.fail-apim-user";
pub const FAIL_DECODE: &str = "developerportal.servicedata.fail-decode";

pub fn track_generic_error(reason: &str) {
    warn!(event = GENERIC_ERROR, reason = %reason, "Generic error");
    counter!("servicedata_events_total", "event" => GENERIC_ERROR).increment(1);
}

pub fn track_event(event: &str) {
    info!(event = GENERIC_EVENT, detail = %event, "Service data event");
    counter!("servicedata_events_total", "event" => GENERIC_EVENT).increment(1);
}

pub fn track_fail_apim_user(reason: &str, owner_id: &str, subscription_id: &str) {
    warn!(
        event = FAIL_APIM_USER,
        reason = %reason,
        owner_id = %owner_id,
        subscription_id = %subscription_id,
        "Failed to retrieve APIM user for subscription"
    );
    counter!("servicedata_events_total", "event" => FAIL_APIM_USER).increment(1);
}

pub fn track_fail_decode(reason: &str) {
    warn!(event = FAIL_DECODE, reason = %reason, "Failed to decode record");
    counter!("servicedata_events_total", "event" => FAIL_DECODE).increment(1);
}
