// src/reporting/mod.rs - Fire-and-forget telemetry for check outcomes

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use std::time::Duration;

use crate::types::ReportType;

/// One check outcome, shipped to the statistics collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub query: String,
    pub query_type: String,
    pub is_blacklisted: bool,
    pub matched_keywords: Vec<String>,
    pub violation_type: Option<String>,
    pub checked_at: DateTime<Utc>,
}

/// A community report about a wrong verdict. The receiving collaborator
/// owns the increment-or-insert semantics.
#[derive(Debug, Clone, Serialize)]
pub struct FalsePositiveReport {
    pub resource_name: String,
    pub report_type: ReportType,
    pub server_name: Option<String>,
    pub connection_code: Option<String>,
    pub reported_at: DateTime<Utc>,
}

/// Outbound telemetry boundary. Implementations are best-effort; callers
/// discard errors and never retry.
#[async_trait]
pub trait CheckReporter: Send + Sync {
    async fn report_check(&self, report: CheckReport) -> anyhow::Result<()>;

    async fn report_false_positive(&self, report: FalsePositiveReport) -> anyhow::Result<()>;
}

/// POSTs reports as JSON to the stats backend.
pub struct HttpReporter {
    client: reqwest::Client,
    check_endpoint: String,
    report_endpoint: String,
}

impl HttpReporter {
    /// `base_url` is the stats collaborator root; the two report paths
    /// hang off it. The timeout bounds every outbound call so a slow
    /// backend can never stall a check.
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base = base_url.trim_end_matches('/');
        Ok(Self {
            client,
            check_endpoint: format!("{}/check-logs", base),
            report_endpoint: format!("{}/false-positive-reports", base),
        })
    }
}

#[async_trait]
impl CheckReporter for HttpReporter {
    async fn report_check(&self, report: CheckReport) -> anyhow::Result<()> {
        self.client
            .post(&self.check_endpoint)
            .json(&report)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn report_false_positive(&self, report: FalsePositiveReport) -> anyhow::Result<()> {
        self.client
            .post(&self.report_endpoint)
            .json(&report)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Logs outcomes instead of shipping them; the default when no stats
/// endpoint is configured.
pub struct LogReporter;

impl LogReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CheckReporter for LogReporter {
    async fn report_check(&self, report: CheckReport) -> anyhow::Result<()> {
        info!(
            "check logged: query='{}' type={} blacklisted={} keywords={:?} violation={:?}",
            report.query,
            report.query_type,
            report.is_blacklisted,
            report.matched_keywords,
            report.violation_type
        );
        Ok(())
    }

    async fn report_false_positive(&self, report: FalsePositiveReport) -> anyhow::Result<()> {
        info!(
            "community report: resource='{}' type={} server={:?}",
            report.resource_name,
            report.report_type.as_str(),
            report.server_name
        );
        Ok(())
    }
}

/// Discards everything. For tests and fully offline runs.
pub struct NullReporter;

impl NullReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NullReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CheckReporter for NullReporter {
    async fn report_check(&self, _report: CheckReport) -> anyhow::Result<()> {
        Ok(())
    }

    async fn report_false_positive(&self, _report: FalsePositiveReport) -> anyhow::Result<()> {
        Ok(())
    }
}
