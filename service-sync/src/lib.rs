pub mod account;
pub mod aggregate;
pub mod apim;
pub mod config;
pub mod error;
pub mod fiscal_code;
pub mod identity;
pub mod owner_path;
pub mod pipeline;
pub mod row;
pub mod scheduler;
pub mod sql;
pub mod store;
pub mod tracking;
pub mod views;
pub mod webview;

pub use aggregate::{
    DelegateService, OrganizationGroups, ServiceRecord, aggregate, delegate_services
};
pub use apim::{ApimClient, AzureApimClient, create_apim_client};
pub use config::ServiceSyncConfig;
pub use error::{DomainError, ServiceSyncError, ServiceSyncResult};
pub use fiscal_code::OrganizationFiscalCode;
pub use identity::IdentityResolver;
pub use pipeline::{BatchReport, ChangeSyncPipeline, DocumentBatch, SyncOutcome};
pub use row::SourceDocument;
pub use scheduler::{RefreshHistory, WebviewScheduler};
pub use store::{PgReportingStore, RecordSource, ReportingStore};
pub use webview::{FileViewSink, ViewSink, WebviewRefresher};
