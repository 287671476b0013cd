//! Subcommand implementations.
//!
//! Every command claims the state file, opens the forum from it, runs one
//! operation and, if it changed anything, writes the state back. The claim
//! is held until the command finishes, so overlapping invocations run one
//! after another instead of overwriting each other.

pub mod analytics;
pub mod directory;
pub mod init;
pub mod questions;
pub mod responses;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use peerhelp_core::model::{Category, CategoryId, User, UserId};
use peerhelp_core::{Forum, MemoryStore, StateFile};
use peerhelp_judge::{create_judge, load_config_from};

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Forum state file (overrides `state_path` from the config)
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,
}

/// A forum opened from disk for one command.
pub struct Session {
    pub forum: Forum,
    store: Arc<MemoryStore>,
    state: StateFile,
}

impl Session {
    pub async fn open(opts: &GlobalOpts) -> Result<Self> {
        let config = load_config_from(opts.config.as_deref())?;
        let state_path = opts
            .state
            .clone()
            .unwrap_or_else(|| config.state_path.clone());
        let judge = create_judge(&config)?;
        let state = claim(state_path).await?;
        let store = Arc::new(state.load()?);
        tracing::debug!(judge = judge.name(), state = %state.path().display(), "session opened");
        let forum = Forum::new(store.clone(), judge, config.forum_config());
        Ok(Self {
            forum,
            store,
            state,
        })
    }

    pub fn state_path(&self) -> &std::path::Path {
        self.state.path()
    }

    pub fn save(&self) -> Result<()> {
        self.state.save(&self.store)
    }

    async fn ensure_initialized(&self) -> Result<()> {
        if self.forum.users().await.is_empty() {
            anyhow::bail!(
                "no forum state at {}; run `peerhelp init` first",
                self.state_path().display()
            );
        }
        Ok(())
    }

    /// Resolve a user by numeric id or by name.
    pub async fn user(&self, who: &str) -> Result<User> {
        self.ensure_initialized().await?;
        let user = match who.trim().parse::<u64>() {
            Ok(id) => self.forum.user(UserId(id)).await?,
            Err(_) => self.forum.user_by_name(who).await?,
        };
        Ok(user)
    }

    /// Resolve a category by numeric id or by name (case-insensitive).
    pub async fn category(&self, which: &str) -> Result<Category> {
        self.ensure_initialized().await?;
        let categories = self.forum.categories().await;
        let found = match which.trim().parse::<u64>() {
            Ok(id) => categories.into_iter().find(|c| c.id == CategoryId(id)),
            Err(_) => categories
                .into_iter()
                .find(|c| c.name.eq_ignore_ascii_case(which.trim())),
        };
        found.with_context(|| format!("no category named '{which}'"))
    }
}

/// Claim the state file, waiting for any other running command to release it.
async fn claim(path: PathBuf) -> Result<StateFile> {
    if let Some(state) = StateFile::try_lock(&path)? {
        return Ok(state);
    }
    tracing::info!(state = %path.display(), "waiting for another peerhelp command to finish");
    tokio::task::spawn_blocking(move || StateFile::lock(&path))
        .await
        .context("state lock task panicked")?
}

/// Shorten `s` to at most `max` characters for table cells.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{cut}…")
    }
}
