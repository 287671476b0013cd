//! Point-in-time analytics report with JSON persistence.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use peerhelp_core::analytics::{Dashboard, LeaderboardEntry};

/// Dashboard and leaderboard as of `created_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForumReport {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub dashboard: Dashboard,
    pub leaderboard: Vec<LeaderboardEntry>,
}

impl ForumReport {
    pub fn new(dashboard: Dashboard, leaderboard: Vec<LeaderboardEntry>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            dashboard,
            leaderboard,
        }
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: ForumReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }
}
