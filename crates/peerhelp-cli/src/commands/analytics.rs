//! Read-side commands: `leaderboard`, `dashboard`, `reconcile`.

use std::path::PathBuf;

use anyhow::Result;
use comfy_table::{Cell, Table};

use peerhelp_core::analytics::LeaderboardEntry;
use peerhelp_report::{write_html_report, ForumReport};

use super::{truncate, GlobalOpts, Session};

pub async fn leaderboard(global: &GlobalOpts, limit: Option<usize>) -> Result<()> {
    let session = Session::open(global).await?;
    let mut entries = session.forum.leaderboard().await;
    if let Some(limit) = limit {
        entries.truncate(limit);
    }
    if entries.is_empty() {
        println!("No student has responded yet.");
        return Ok(());
    }
    println!("{}", leaderboard_table(&entries));
    Ok(())
}

fn leaderboard_table(entries: &[LeaderboardEntry]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Rank", "Student", "Karma", "Helpful", "Unhelpful"]);
    for (rank, e) in entries.iter().enumerate() {
        table.add_row(vec![
            Cell::new(rank + 1),
            Cell::new(&e.name),
            Cell::new(e.karma),
            Cell::new(e.helpful_responses),
            Cell::new(e.unhelpful_responses),
        ]);
    }
    table
}

pub async fn dashboard(global: &GlobalOpts, format: String, output: Option<PathBuf>) -> Result<()> {
    let session = Session::open(global).await?;
    let report = ForumReport::new(
        session.forum.dashboard().await,
        session.forum.leaderboard().await,
    );

    match format.as_str() {
        "text" => print_dashboard(&report),
        "json" => match output {
            Some(path) => {
                report.save_json(&path)?;
                println!("JSON report: {}", path.display());
            }
            None => println!("{}", serde_json::to_string_pretty(&report)?),
        },
        "html" => {
            let path = output.unwrap_or_else(|| PathBuf::from("peerhelp-dashboard.html"));
            write_html_report(&report, &path)?;
            println!("HTML report: {}", path.display());
        }
        other => anyhow::bail!("unknown format: {other} (expected text, json or html)"),
    }
    Ok(())
}

fn print_dashboard(report: &ForumReport) {
    let d = &report.dashboard;
    let q = &d.response_quality;
    println!("Response quality");
    println!(
        "  {} responses: {} helpful, {} unhelpful ({:.1}% helpful)",
        q.total_responses, q.helpful_count, q.unhelpful_count, q.helpful_percentage
    );
    match d.avg_resolution_time_hours {
        Some(h) => println!("  Average resolution time: {h:.1}h"),
        None => println!("  Average resolution time: no closed questions yet"),
    }

    let mut categories = Table::new();
    categories.set_header(vec!["Category", "Questions", "Avg responses", "Avg resolution"]);
    for c in &d.category_stats {
        categories.add_row(vec![
            Cell::new(&c.category_name),
            Cell::new(c.question_count),
            Cell::new(format!("{:.1}", c.avg_responses_per_question)),
            Cell::new(
                c.avg_resolution_time_hours
                    .map_or_else(|| "-".to_string(), |h| format!("{h:.1}h")),
            ),
        ]);
    }
    println!("\nCategories\n{categories}");

    if d.common_misconceptions.is_empty() {
        println!("\nCommon misconceptions: none recorded");
    } else {
        let mut misconceptions = Table::new();
        misconceptions.set_header(vec!["Category", "Reason", "Count"]);
        for m in &d.common_misconceptions {
            misconceptions.add_row(vec![
                Cell::new(&m.category_name),
                Cell::new(truncate(&m.misconception, 60)),
                Cell::new(m.occurrence_count),
            ]);
        }
        println!("\nCommon misconceptions\n{misconceptions}");
    }

    if !report.leaderboard.is_empty() {
        println!("\nLeaderboard\n{}", leaderboard_table(&report.leaderboard));
    }
}

pub async fn reconcile(global: &GlobalOpts, user: Option<String>) -> Result<()> {
    let session = Session::open(global).await?;
    let checked = match user {
        Some(who) => {
            let user = session.user(&who).await?;
            vec![session.forum.reconcile_karma(user.id).await?]
        }
        None => session.forum.reconcile_all().await,
    };

    let drifted: Vec<_> = checked.iter().filter(|r| !r.is_consistent()).collect();
    if drifted.is_empty() {
        match checked.first() {
            Some(r) if checked.len() == 1 => {
                println!("{}: karma {} is consistent with history.", r.name, r.stored)
            }
            _ => println!("All karma totals are consistent with history."),
        }
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["User", "Stored", "Recomputed"]);
    for r in &drifted {
        table.add_row(vec![
            Cell::new(&r.name),
            Cell::new(r.stored),
            Cell::new(r.recomputed),
        ]);
    }
    println!("{table}");
    anyhow::bail!("karma drift detected for {} user(s)", drifted.len())
}
