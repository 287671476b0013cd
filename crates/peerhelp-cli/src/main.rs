//! peerhelp CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::GlobalOpts;

#[derive(Parser)]
#[command(
    name = "peerhelp",
    version,
    about = "AI-moderated peer tutoring forum"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a starter config and seed the default roster and categories
    Init,

    /// List forum users with their role and karma
    Users,

    /// List question categories
    Categories,

    /// Post a question as a student
    Ask {
        /// Posting student (name or id)
        #[arg(long = "as")]
        actor: String,

        /// Category name or id
        #[arg(long)]
        category: String,

        #[arg(long)]
        title: String,

        #[arg(long)]
        description: String,

        /// Code snippet inline
        #[arg(long, conflicts_with = "code_file")]
        code: Option<String>,

        /// Read the code snippet from a file
        #[arg(long)]
        code_file: Option<PathBuf>,
    },

    /// List questions, newest first
    Questions {
        /// Filter by status: open, escalated, closed
        #[arg(long)]
        status: Option<String>,

        /// Filter by category name or id
        #[arg(long)]
        category: Option<String>,

        /// Only questions asked by this user
        #[arg(long)]
        by: Option<String>,

        /// Hide questions asked by this user
        #[arg(long)]
        exclude: Option<String>,
    },

    /// Show a question with its responses and instructor answer
    Show {
        /// Question id
        id: u64,

        /// Viewer (name or id); required with --hidden
        #[arg(long = "as")]
        actor: Option<String>,

        /// Include responses hidden by the judge (instructors only)
        #[arg(long, requires = "actor")]
        hidden: bool,
    },

    /// Submit a peer response to an open question
    Respond {
        /// Question id
        id: u64,

        /// Responding student (name or id)
        #[arg(long = "as")]
        actor: String,

        /// Concept involved
        #[arg(long)]
        concept: String,

        /// Hint or guidance
        #[arg(long)]
        hint: String,

        /// What to try next
        #[arg(long)]
        next_step: Option<String>,
    },

    /// Escalate your own open question to instructors
    Escalate {
        /// Question id
        id: u64,

        /// Question owner (name or id)
        #[arg(long = "as")]
        actor: String,
    },

    /// Answer a question as an instructor and close it
    Answer {
        /// Question id
        id: u64,

        /// Answering instructor (name or id)
        #[arg(long = "as")]
        actor: String,

        #[arg(long)]
        content: String,
    },

    /// List your own visible responses
    MyResponses {
        #[arg(long = "as")]
        actor: String,
    },

    /// Review every response, hidden ones included (instructors only)
    AllResponses {
        #[arg(long = "as")]
        actor: String,
    },

    /// Show the karma leaderboard
    Leaderboard {
        /// Show at most this many students
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show the instructor dashboard
    Dashboard {
        /// Output format: text, json, html
        #[arg(long, default_value = "text")]
        format: String,

        /// Output file (json/html). HTML defaults to ./peerhelp-dashboard.html
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Check stored karma against the response history
    Reconcile {
        /// Check a single user (name or id)
        #[arg(long)]
        user: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("peerhelp=info")),
        )
        .init();

    let cli = Cli::parse();
    let global = cli.global;

    let result = match cli.command {
        Commands::Init => commands::init::execute(&global).await,
        Commands::Users => commands::directory::users(&global).await,
        Commands::Categories => commands::directory::categories(&global).await,
        Commands::Ask {
            actor,
            category,
            title,
            description,
            code,
            code_file,
        } => {
            commands::questions::ask(
                &global,
                actor,
                category,
                title,
                description,
                code,
                code_file,
            )
            .await
        }
        Commands::Questions {
            status,
            category,
            by,
            exclude,
        } => commands::questions::list(&global, status, category, by, exclude).await,
        Commands::Show { id, actor, hidden } => {
            commands::questions::show(&global, id, actor, hidden).await
        }
        Commands::Respond {
            id,
            actor,
            concept,
            hint,
            next_step,
        } => commands::responses::respond(&global, id, actor, concept, hint, next_step).await,
        Commands::Escalate { id, actor } => commands::questions::escalate(&global, id, actor).await,
        Commands::Answer { id, actor, content } => {
            commands::questions::answer(&global, id, actor, content).await
        }
        Commands::MyResponses { actor } => commands::responses::mine(&global, actor).await,
        Commands::AllResponses { actor } => commands::responses::all(&global, actor).await,
        Commands::Leaderboard { limit } => commands::analytics::leaderboard(&global, limit).await,
        Commands::Dashboard { format, output } => {
            commands::analytics::dashboard(&global, format, output).await
        }
        Commands::Reconcile { user } => commands::analytics::reconcile(&global, user).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
