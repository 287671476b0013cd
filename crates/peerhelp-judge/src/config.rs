//! Configuration and judge factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use peerhelp_core::traits::Judge;
use peerhelp_core::ForumConfig;

use crate::anthropic::AnthropicJudge;
use crate::audit::AuditedJudge;
use crate::gemini::GeminiJudge;
use crate::heuristic::HeuristicJudge;

/// Which judge evaluates responses.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JudgeConfig {
    Gemini {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
    Anthropic {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
    #[default]
    Heuristic,
}

impl std::fmt::Debug for JudgeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JudgeConfig::Gemini {
                api_key: _,
                base_url,
                model,
            } => f
                .debug_struct("Gemini")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("model", model)
                .finish(),
            JudgeConfig::Anthropic {
                api_key: _,
                base_url,
                model,
            } => f
                .debug_struct("Anthropic")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("model", model)
                .finish(),
            JudgeConfig::Heuristic => f.write_str("Heuristic"),
        }
    }
}

impl JudgeConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            JudgeConfig::Gemini { .. } => "gemini",
            JudgeConfig::Anthropic { .. } => "anthropic",
            JudgeConfig::Heuristic => "heuristic",
        }
    }
}

/// Top-level peerhelp configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerhelpConfig {
    #[serde(default)]
    pub judge: JudgeConfig,
    /// Upper bound on one judge call, in seconds.
    #[serde(default = "default_judge_timeout")]
    pub judge_timeout_secs: u64,
    /// Where the CLI keeps forum state.
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    /// Number of misconception clusters on the dashboard.
    #[serde(default = "default_misconception_limit")]
    pub misconception_limit: usize,
    /// Append every evaluation to this JSONL file when set.
    #[serde(default)]
    pub audit_log: Option<PathBuf>,
}

fn default_judge_timeout() -> u64 {
    30
}
fn default_state_path() -> PathBuf {
    PathBuf::from("./peerhelp-state.json")
}
fn default_misconception_limit() -> usize {
    10
}

impl Default for PeerhelpConfig {
    fn default() -> Self {
        Self {
            judge: JudgeConfig::default(),
            judge_timeout_secs: default_judge_timeout(),
            state_path: default_state_path(),
            misconception_limit: default_misconception_limit(),
            audit_log: None,
        }
    }
}

impl PeerhelpConfig {
    /// Engine knobs derived from this configuration.
    pub fn forum_config(&self) -> ForumConfig {
        ForumConfig {
            judge_timeout: Duration::from_secs(self.judge_timeout_secs),
            misconception_limit: self.misconception_limit,
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_judge_config(config: &JudgeConfig) -> JudgeConfig {
    let opt = |v: &Option<String>| v.as_deref().map(resolve_env_vars);
    match config {
        JudgeConfig::Gemini {
            api_key,
            base_url,
            model,
        } => JudgeConfig::Gemini {
            api_key: resolve_env_vars(api_key),
            base_url: opt(base_url),
            model: opt(model),
        },
        JudgeConfig::Anthropic {
            api_key,
            base_url,
            model,
        } => JudgeConfig::Anthropic {
            api_key: resolve_env_vars(api_key),
            base_url: opt(base_url),
            model: opt(model),
        },
        JudgeConfig::Heuristic => JudgeConfig::Heuristic,
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `peerhelp.toml` in the current directory
/// 2. `~/.config/peerhelp/config.toml`
///
/// Environment variable overrides: `PEERHELP_GEMINI_KEY` (or
/// `GEMINI_API_KEY`) and `PEERHELP_ANTHROPIC_KEY`. A key override replaces
/// the key of a configured judge of that kind; without a config file it
/// also selects that judge over the heuristic default.
pub fn load_config() -> Result<PeerhelpConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<PeerhelpConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("peerhelp.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let (mut config, from_file) = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            let config = toml::from_str::<PeerhelpConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?;
            tracing::debug!(path = %path.display(), judge = config.judge.kind(), "loaded config");
            (config, true)
        }
        None => (PeerhelpConfig::default(), false),
    };

    apply_env_overrides(&mut config.judge, from_file, |name| {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    });
    config.judge = resolve_judge_config(&config.judge);

    Ok(config)
}

fn apply_env_overrides(
    judge: &mut JudgeConfig,
    config_file_found: bool,
    env: impl Fn(&str) -> Option<String>,
) {
    let gemini_key = env("PEERHELP_GEMINI_KEY").or_else(|| env("GEMINI_API_KEY"));
    let anthropic_key = env("PEERHELP_ANTHROPIC_KEY");

    match judge {
        JudgeConfig::Gemini { api_key, .. } => {
            if let Some(key) = gemini_key {
                *api_key = key;
            }
        }
        JudgeConfig::Anthropic { api_key, .. } => {
            if let Some(key) = anthropic_key {
                *api_key = key;
            }
        }
        JudgeConfig::Heuristic if !config_file_found => {
            if let Some(key) = gemini_key {
                *judge = JudgeConfig::Gemini {
                    api_key: key,
                    base_url: None,
                    model: None,
                };
            } else if let Some(key) = anthropic_key {
                *judge = JudgeConfig::Anthropic {
                    api_key: key,
                    base_url: None,
                    model: None,
                };
            }
        }
        JudgeConfig::Heuristic => {}
    }
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("peerhelp"))
}

/// Create the configured judge, wrapped in the audit log when one is set.
pub fn create_judge(config: &PeerhelpConfig) -> Result<Arc<dyn Judge>> {
    let judge: Arc<dyn Judge> = match &config.judge {
        JudgeConfig::Gemini {
            api_key,
            base_url,
            model,
        } => {
            if api_key.is_empty() {
                anyhow::bail!("gemini judge configured without an API key");
            }
            Arc::new(GeminiJudge::new(api_key, base_url.clone(), model.clone())?)
        }
        JudgeConfig::Anthropic {
            api_key,
            base_url,
            model,
        } => {
            if api_key.is_empty() {
                anyhow::bail!("anthropic judge configured without an API key");
            }
            Arc::new(AnthropicJudge::new(api_key, base_url.clone(), model.clone())?)
        }
        JudgeConfig::Heuristic => Arc::new(HeuristicJudge::new()),
    };

    Ok(match &config.audit_log {
        Some(path) => Arc::new(AuditedJudge::new(judge, path.clone())),
        None => judge,
    })
}
