use std::path::Path;

use quill_core::NewComment;

use crate::cli::AuthorArgs;
use crate::commands::common::{author_caller, open_blog, parse_post_id, resolve_text_input};
use crate::error::CliError;

pub async fn run_comment(
    post_id: &str,
    body_parts: &[String],
    author: &AuthorArgs,
    db_path: &Path,
) -> Result<(), CliError> {
    let caller = author_caller(author)?;
    let post_id = parse_post_id(post_id)?;
    let body = resolve_text_input(body_parts, "comment body")?;

    let blog = open_blog(db_path).await?;
    let id = blog
        .create_comment(&caller, NewComment::new(post_id, body))
        .await?;

    println!("{id}");
    Ok(())
}
