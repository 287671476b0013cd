//! Response commands: `respond`, `my-responses`, `all-responses`.

use anyhow::Result;
use comfy_table::{Cell, Table};

use peerhelp_core::model::{QuestionId, ResponseView};
use peerhelp_core::Submission;

use super::{truncate, GlobalOpts, Session};

pub async fn respond(
    global: &GlobalOpts,
    id: u64,
    actor: String,
    concept: String,
    hint: String,
    next_step: Option<String>,
) -> Result<()> {
    let session = Session::open(global).await?;
    let responder = session.user(&actor).await?;
    let response = session
        .forum
        .submit_response(Submission {
            question_id: QuestionId(id),
            responder_id: responder.id,
            concept,
            hint,
            next_step,
        })
        .await?;
    session.save()?;

    println!(
        "Response #{} rated {} ({:+} karma): {}",
        response.id,
        response.ai_rating(),
        response.karma_awarded(),
        response.outcome().ai_reason()
    );
    if !response.is_visible() {
        println!("This response is hidden from other students; instructors can still review it.");
    }
    Ok(())
}

pub async fn mine(global: &GlobalOpts, actor: String) -> Result<()> {
    let session = Session::open(global).await?;
    let user = session.user(&actor).await?;
    let responses = session.forum.user_responses(user.id, user.id).await?;
    if responses.is_empty() {
        println!("No visible responses yet.");
        return Ok(());
    }
    print_table(&responses, false);
    Ok(())
}

pub async fn all(global: &GlobalOpts, actor: String) -> Result<()> {
    let session = Session::open(global).await?;
    let viewer = session.user(&actor).await?;
    let responses = session.forum.all_responses(viewer.id).await?;
    if responses.is_empty() {
        println!("No responses yet.");
        return Ok(());
    }
    print_table(&responses, true);
    Ok(())
}

fn print_table(responses: &[ResponseView], review: bool) {
    let mut table = Table::new();
    let mut header = vec!["ID", "Question", "Concept", "Rating", "Karma"];
    if review {
        header.extend(["Responder", "Visible", "Reason"]);
    }
    header.push("Submitted");
    table.set_header(header);

    for view in responses {
        let r = &view.response;
        let mut row = vec![
            Cell::new(r.id),
            Cell::new(r.question_id),
            Cell::new(truncate(&r.guidance.concept, 32)),
            Cell::new(r.ai_rating()),
            Cell::new(format!("{:+}", r.karma_awarded())),
        ];
        if review {
            row.push(Cell::new(&view.responder_name));
            row.push(Cell::new(if r.is_visible() { "yes" } else { "no" }));
            row.push(Cell::new(truncate(r.outcome().ai_reason(), 48)));
        }
        row.push(Cell::new(r.created_at.format("%Y-%m-%d %H:%M")));
        table.add_row(row);
    }
    println!("{table}");
}
