//! The `peerhelp init` command.

use std::path::Path;

use anyhow::Result;

use super::{GlobalOpts, Session};

pub async fn execute(global: &GlobalOpts) -> Result<()> {
    // Create peerhelp.toml unless an explicit config is in use
    if global.config.is_none() {
        if Path::new("peerhelp.toml").exists() {
            println!("peerhelp.toml already exists, skipping.");
        } else {
            std::fs::write("peerhelp.toml", SAMPLE_CONFIG)?;
            println!("Created peerhelp.toml");
        }
    }

    let session = Session::open(global).await?;
    if session.forum.seed_defaults().await? {
        session.save()?;
        println!(
            "Seeded {} users and {} categories into {}",
            session.forum.users().await.len(),
            session.forum.categories().await.len(),
            session.state_path().display()
        );
    } else {
        println!(
            "Forum state at {} already exists, skipping.",
            session.state_path().display()
        );
    }

    println!("\nNext steps:");
    println!("  1. Pick a judge in peerhelp.toml (heuristic works offline)");
    println!("  2. Run: peerhelp ask --as Pooja --category Loops --title ... --description ...");
    println!("  3. Run: peerhelp questions");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# peerhelp configuration

judge_timeout_secs = 30
state_path = "./peerhelp-state.json"
misconception_limit = 10
# audit_log = "./peerhelp-evaluations.jsonl"

# Offline rule-based judge. Swap for one of the LLM judges below.
[judge]
type = "heuristic"

# [judge]
# type = "gemini"
# api_key = "${GEMINI_API_KEY}"
# model = "gemini-2.5-flash"

# [judge]
# type = "anthropic"
# api_key = "${ANTHROPIC_API_KEY}"
"#;
