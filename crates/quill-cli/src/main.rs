//! Quill CLI - read, publish and search blog posts from the terminal
//!
//! Runs the same operations as the HTTP API against a local (optionally
//! replicated) database.

mod cli;
mod commands;
mod error;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::comment::run_comment;
use crate::commands::comments::run_comments;
use crate::commands::common::resolve_db_path;
use crate::commands::completions::run_completions;
use crate::commands::list::run_list;
use crate::commands::post::run_post;
use crate::commands::search::run_search;
use crate::commands::show::run_show;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let directive = "quill=warn"
        .parse()
        .map_err(|error| CliError::Config(format!("invalid log directive: {error}")))?;
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let db_path = resolve_db_path(cli.db_path)?;
    match cli.command {
        Commands::List { limit, json } => run_list(limit, json, &db_path).await?,
        Commands::Show { id, json } => run_show(&id, json, &db_path).await?,
        Commands::Search {
            query,
            limit,
            truncation,
            json,
        } => run_search(&query, limit, truncation.into(), json, &db_path).await?,
        Commands::Comments { post_id, json } => run_comments(&post_id, json, &db_path).await?,
        Commands::Post {
            title,
            image,
            content,
        } => run_post(&title, image.as_deref(), &content, &cli.author, &db_path).await?,
        Commands::Comment { post_id, body } => {
            run_comment(&post_id, &body, &cli.author, &db_path).await?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}
