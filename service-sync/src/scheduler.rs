use crate::config::WebviewConfig;
use crate::error::{ServiceSyncError, ServiceSyncResult};
use crate::webview::{WebviewRefresher, WebviewReport};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct RefreshFailure {
    pub at: DateTime<Utc>,
    pub error: String
}

/// What the scheduled refreshes have done so far.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshHistory {
    pub last_success: Option<WebviewReport>,
    pub last_failure: Option<RefreshFailure>,
    pub consecutive_failures: u32,
    /// Ticks dropped because the previous refresh was still publishing.
    pub skipped_ticks: u64
}

/// Exact spacing between scheduled refreshes; never rounded to a cron field.
pub fn tick_period(config: &WebviewConfig) -> Duration {
    config.refresh_interval().max(Duration::from_secs(1))
}

struct RefreshRunner {
    refresher: WebviewRefresher,
    publishing: Mutex<()>,
    history: RwLock<RefreshHistory>
}

impl RefreshRunner {
    /// Scheduled entry point. Returns `None` when a refresh is already in
    /// flight, so two publishes never interleave.
    async fn tick(&self) -> Option<ServiceSyncResult<WebviewReport>> {
        let Ok(_publishing) = self.publishing.try_lock() else {
            self.history.write().await.skipped_ticks += 1;
            warn!("Webview refresh still running, tick skipped");
            return None;
        };
        Some(self.refresh_locked().await)
    }

    async fn run_now(&self) -> ServiceSyncResult<WebviewReport> {
        let _publishing = self.publishing.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> ServiceSyncResult<WebviewReport> {
        let result = self.refresher.refresh().await;
        let mut history = self.history.write().await;
        match &result {
            Ok(report) => {
                history.last_success = Some(report.clone());
                history.consecutive_failures = 0;
            }
            Err(e) => {
                history.last_failure = Some(RefreshFailure {
                    at: Utc::now(),
                    error: e.to_string()
                });
                history.consecutive_failures += 1;
            }
        }
        result
    }
}

/// Republishes the webview at a fixed interval.
pub struct WebviewScheduler {
    scheduler: JobScheduler,
    runner: Arc<RefreshRunner>,
    period: Duration
}

impl WebviewScheduler {
    pub async fn new(refresher: WebviewRefresher, config: &WebviewConfig) -> ServiceSyncResult<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| ServiceSyncError::SchedulerError(e.to_string()))?;
        let runner = Arc::new(RefreshRunner {
            refresher,
            publishing: Mutex::new(()),
            history: RwLock::new(RefreshHistory::default())
        });
        let period = tick_period(config);

        let job_runner = runner.clone();
        let job = Job::new_repeated_async(period, move |_uuid, _lock| {
            let runner = job_runner.clone();
            Box::pin(async move {
                match runner.tick().await {
                    Some(Ok(report)) => info!(
                        organizations = report.organizations,
                        services = report.services,
                        "Scheduled webview refresh completed"
                    ),
                    Some(Err(e)) => error!(error = %e, "Scheduled webview refresh failed"),
                    None => {}
                }
            })
        })
        .map_err(|e| ServiceSyncError::SchedulerError(e.to_string()))?;

        scheduler
            .add(job)
            .await
            .map_err(|e| ServiceSyncError::SchedulerError(e.to_string()))?;

        Ok(Self {
            scheduler,
            runner,
            period
        })
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub async fn start(&self) -> ServiceSyncResult<()> {
        self.scheduler
            .start()
            .await
            .map_err(|e| ServiceSyncError::SchedulerError(e.to_string()))?;
        info!(period_seconds = self.period.as_secs(), "Webview scheduler started");
        Ok(())
    }

    pub async fn stop(&mut self) -> ServiceSyncResult<()> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| ServiceSyncError::SchedulerError(e.to_string()))
    }

    /// Refreshes immediately, waiting for any scheduled refresh to finish.
    pub async fn run_now(&self) -> ServiceSyncResult<WebviewReport> {
        self.runner.run_now().await
    }

    pub async fn history(&self) -> RefreshHistory {
        self.runner.history.read().await.clone()
    }
}
