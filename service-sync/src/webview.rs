use crate::aggregate::aggregate;
use crate::config::WebviewConfig;
use crate::error::ServiceSyncResult;
use crate::sql::{TableRef, visible_services_query};
use crate::store::RecordSource;
use crate::tracking;
use crate::views::{RenderedViews, apply_quality_exclusions, render_views};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

pub const COMPACT_VIEW_FILE: &str = "visible-services-compact.json";
pub const EXTENDED_VIEW_FILE: &str = "visible-services-extended.json";

/// Destination of the published views.
#[async_trait]
pub trait ViewSink: Send + Sync {
    async fn publish(&self, views: &RenderedViews) -> ServiceSyncResult<()>;
}

/// Writes both views into a directory. Each file is written next to its
/// target and renamed over it, so readers see either the old or the new
/// content.
pub struct FileViewSink {
    dir: PathBuf
}

impl FileViewSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn write_atomic(&self, name: &str, content: &str) -> ServiceSyncResult<()> {
        let target = self.dir.join(name);
        let staging = self.dir.join(format!(".{}.tmp", name));
        tokio::fs::write(&staging, content).await?;
        tokio::fs::rename(&staging, &target).await?;
        Ok(())
    }
}

#[async_trait]
impl ViewSink for FileViewSink {
    async fn publish(&self, views: &RenderedViews) -> ServiceSyncResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        self.write_atomic(COMPACT_VIEW_FILE, &views.compact).await?;
        self.write_atomic(EXTENDED_VIEW_FILE, &views.extended).await?;
        info!(dir = %self.dir.display(), "Views published");
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WebviewReport {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub organizations: usize,
    pub services: usize
}

/// Rebuilds the public views from the reporting table.
pub struct WebviewRefresher {
    source: Arc<dyn RecordSource>,
    sink: Arc<dyn ViewSink>,
    query: String,
    page_size: usize,
    quality_exclusion_list: Vec<String>
}

impl WebviewRefresher {
    pub fn new(
        source: Arc<dyn RecordSource>,
        sink: Arc<dyn ViewSink>,
        table: &TableRef,
        config: &WebviewConfig
    ) -> Self {
        Self {
            source,
            sink,
            query: visible_services_query(table),
            page_size: config.page_size,
            quality_exclusion_list: config.quality_exclusion_list.clone()
        }
    }

    /// Aggregates, formats and publishes. Nothing is published unless the
    /// whole aggregation succeeded.
    pub async fn refresh(&self) -> ServiceSyncResult<WebviewReport> {
        let started_at = Utc::now();

        let mut groups = aggregate(self.source.as_ref(), &self.query, self.page_size)
            .await
            .inspect_err(|e| {
                error!(error = %e, "Service aggregation failed");
                tracking::track_generic_error(&e.to_string());
            })?;

        apply_quality_exclusions(&mut groups, &self.quality_exclusion_list);
        let views = render_views(&groups)?;
        self.sink.publish(&views).await?;

        let report = WebviewReport {
            started_at,
            completed_at: Utc::now(),
            organizations: groups.len(),
            services: groups.service_count()
        };
        tracking::track_event(&format!(
            "webview refreshed: {} organizations, {} services",
            report.organizations, report.services
        ));

        Ok(report)
    }
}
