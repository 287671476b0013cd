//! peerhelp-judge: Response judges.
//!
//! Implements the `Judge` trait for Gemini, Anthropic and an offline
//! heuristic, plus a scripted mock for tests and an audit-logging wrapper.

pub mod anthropic;
pub mod audit;
pub mod config;
pub mod gemini;
pub mod heuristic;
mod http;
pub mod mock;

pub use config::{create_judge, load_config, load_config_from, JudgeConfig, PeerhelpConfig};
pub use heuristic::HeuristicJudge;
pub use mock::MockJudge;
pub use peerhelp_core::error::JudgeError;
