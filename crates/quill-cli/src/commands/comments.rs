use std::path::Path;

use crate::commands::common::{format_comment_lines, open_blog, parse_post_id};
use crate::error::CliError;

pub async fn run_comments(post_id: &str, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let post_id = parse_post_id(post_id)?;
    let blog = open_blog(db_path).await?;
    // Surface a missing post instead of an empty list
    blog.get_post(&post_id).await?;
    let comments = blog.list_comments(&post_id).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&comments)?);
    } else {
        for line in format_comment_lines(&comments) {
            println!("{line}");
        }
    }

    Ok(())
}
