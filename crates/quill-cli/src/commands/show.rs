use std::path::Path;

use crate::commands::common::{open_blog, parse_post_id};
use crate::error::CliError;

pub async fn run_show(id: &str, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let post_id = parse_post_id(id)?;
    let blog = open_blog(db_path).await?;
    let view = blog.get_post(&post_id).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!("{}", view.post.title);
    println!("by {} · {}", view.post.author_id, view.post.id);
    if let Some(url) = &view.image_url {
        println!("image: {url}");
    }
    println!();
    println!("{}", view.post.content);
    Ok(())
}
