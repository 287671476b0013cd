//! Evaluation audit log.
//!
//! `AuditedJudge` wraps any judge and appends one JSON line per evaluation
//! to a file, whether the evaluation produced a verdict or failed.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use peerhelp_core::traits::{Judge, JudgeRequest, Verdict};

/// One line of the audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub evaluation_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub judge: String,
    pub latency_ms: u64,
    pub request: JudgeRequest,
    #[serde(default)]
    pub verdict: Option<Verdict>,
    #[serde(default)]
    pub error: Option<String>,
}

pub struct AuditedJudge {
    inner: Arc<dyn Judge>,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl AuditedJudge {
    pub fn new(inner: Arc<dyn Judge>, path: impl Into<PathBuf>) -> Self {
        Self {
            inner,
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn append(&self, record: &AuditRecord) -> anyhow::Result<()> {
        let mut line = serde_json::to_string(record).context("failed to serialize audit record")?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("failed to create audit log directory: {}", parent.display())
            })?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("failed to open audit log: {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .with_context(|| format!("failed to write audit log: {}", self.path.display()))?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl Judge for AuditedJudge {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn evaluate(&self, request: &JudgeRequest) -> anyhow::Result<Verdict> {
        let start = Instant::now();
        let result = self.inner.evaluate(request).await;

        let record = AuditRecord {
            evaluation_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            judge: self.inner.name().to_string(),
            latency_ms: start.elapsed().as_millis() as u64,
            request: request.clone(),
            verdict: result.as_ref().ok().cloned(),
            error: result.as_ref().err().map(|e| format!("{e:#}")),
        };
        // A lost audit line must not turn a verdict into a failure.
        if let Err(e) = self.append(&record).await {
            tracing::warn!(path = %self.path.display(), "audit log write failed: {e:#}");
        }

        result
    }
}

/// Read every record from an audit log.
pub fn read_audit_log(path: &Path) -> anyhow::Result<Vec<AuditRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read audit log: {}", path.display()))?;
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .enumerate()
        .map(|(i, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("bad audit record at line {}", i + 1))
        })
        .collect()
}
