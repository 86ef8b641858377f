use std::path::Path;

use quill_core::{NewPost, StorageId};

use crate::cli::AuthorArgs;
use crate::commands::common::{author_caller, open_blog, resolve_text_input};
use crate::error::CliError;

pub async fn run_post(
    title: &str,
    image: Option<&str>,
    content_parts: &[String],
    author: &AuthorArgs,
    db_path: &Path,
) -> Result<(), CliError> {
    let caller = author_caller(author)?;
    let image_storage_id = image.map(str::parse::<StorageId>).transpose()?;
    let content = resolve_text_input(content_parts, "post content")?;

    let blog = open_blog(db_path).await?;
    let id = blog
        .create_post(&caller, NewPost::new(title, content, image_storage_id))
        .await?;

    println!("{id}");
    Ok(())
}
