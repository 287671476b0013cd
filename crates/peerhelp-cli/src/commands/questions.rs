//! Question commands: `ask`, `questions`, `show`, `escalate`, `answer`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use peerhelp_core::model::{NewQuestion, QuestionFilter, QuestionId, QuestionStatus};

use super::{truncate, GlobalOpts, Session};

pub async fn ask(
    global: &GlobalOpts,
    actor: String,
    category: String,
    title: String,
    description: String,
    code: Option<String>,
    code_file: Option<PathBuf>,
) -> Result<()> {
    let session = Session::open(global).await?;
    let student = session.user(&actor).await?;
    let category = session.category(&category).await?;
    let code_snippet = match code_file {
        Some(path) => Some(
            std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read code file: {}", path.display()))?,
        ),
        None => code,
    };

    let question = session
        .forum
        .post_question(
            student.id,
            NewQuestion {
                category_id: category.id,
                title,
                description,
                code_snippet,
            },
        )
        .await?;
    session.save()?;

    println!(
        "Posted question #{} in {}: {}",
        question.id, category.name, question.title
    );
    Ok(())
}

pub async fn list(
    global: &GlobalOpts,
    status: Option<String>,
    category: Option<String>,
    by: Option<String>,
    exclude: Option<String>,
) -> Result<()> {
    let session = Session::open(global).await?;
    let mut filter = QuestionFilter::default();
    if let Some(status) = status {
        filter.status = Some(
            status
                .parse::<QuestionStatus>()
                .map_err(anyhow::Error::msg)?,
        );
    }
    if let Some(category) = category {
        filter.category_id = Some(session.category(&category).await?.id);
    }
    if let Some(by) = by {
        filter.student_id = Some(session.user(&by).await?.id);
    }
    if let Some(exclude) = exclude {
        filter.exclude_student_id = Some(session.user(&exclude).await?.id);
    }

    let questions = session.forum.list_questions(&filter).await;
    if questions.is_empty() {
        println!("No questions found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "ID",
        "Title",
        "Category",
        "Asked by",
        "Status",
        "Responses",
        "Posted",
    ]);
    for q in &questions {
        table.add_row(vec![
            Cell::new(q.question.id),
            Cell::new(truncate(&q.question.title, 48)),
            Cell::new(&q.category_name),
            Cell::new(&q.student_name),
            Cell::new(q.question.status),
            Cell::new(q.response_count),
            Cell::new(q.question.created_at.format("%Y-%m-%d %H:%M")),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub async fn show(
    global: &GlobalOpts,
    id: u64,
    actor: Option<String>,
    hidden: bool,
) -> Result<()> {
    let session = Session::open(global).await?;
    let summary = session.forum.question(QuestionId(id)).await?;
    let question = &summary.question;
    let viewer = match actor {
        Some(actor) => session.user(&actor).await?.id,
        // The owner is always a student, so this yields the public view.
        None => question.student_id,
    };

    println!("#{} {}", question.id, question.title);
    println!(
        "{} | asked by {} | {} | {}",
        summary.category_name,
        summary.student_name,
        question.status,
        question.created_at.format("%Y-%m-%d %H:%M UTC")
    );
    println!("\n{}", question.description);
    if let Some(code) = &question.code_snippet {
        println!("\n```\n{}\n```", code.trim_end());
    }

    let responses = session
        .forum
        .question_responses(question.id, viewer, hidden)
        .await?;
    println!("\nResponses ({}):", responses.len());
    for r in &responses {
        let g = &r.response.guidance;
        let flag = if r.response.is_visible() {
            String::new()
        } else {
            format!(" [hidden: {}]", r.response.outcome().ai_reason())
        };
        println!(
            "\n  #{} by {} ({}){}",
            r.response.id,
            r.responder_name,
            r.response.ai_rating(),
            flag
        );
        println!("    Concept: {}", g.concept);
        println!("    Hint: {}", g.hint);
        if let Some(next) = &g.next_step {
            println!("    Try next: {next}");
        }
    }

    if let Some(answer) = session.forum.instructor_answer(question.id).await? {
        println!(
            "\nInstructor answer from {} ({}):\n  {}",
            answer.instructor_name,
            answer.answer.created_at.format("%Y-%m-%d %H:%M UTC"),
            answer.answer.content
        );
    }
    Ok(())
}

pub async fn escalate(global: &GlobalOpts, id: u64, actor: String) -> Result<()> {
    let session = Session::open(global).await?;
    let owner = session.user(&actor).await?;
    let question = session.forum.escalate(QuestionId(id), owner.id).await?;
    session.save()?;
    println!(
        "Question #{} escalated; it now awaits an instructor answer.",
        question.id
    );
    Ok(())
}

pub async fn answer(global: &GlobalOpts, id: u64, actor: String, content: String) -> Result<()> {
    let session = Session::open(global).await?;
    let instructor = session.user(&actor).await?;
    let answer = session
        .forum
        .answer(QuestionId(id), instructor.id, &content)
        .await?;
    session.save()?;
    println!(
        "Question #{} answered by {} and closed.",
        answer.question_id, instructor.name
    );
    Ok(())
}
