use std::path::Path;

use crate::commands::common::{format_post_lines, open_blog, post_to_list_item, PostListItem};
use crate::error::CliError;

pub async fn run_list(limit: usize, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let blog = open_blog(db_path).await?;
    let mut posts = blog.list_posts().await?;
    posts.truncate(limit);

    if as_json {
        let json_items = posts
            .iter()
            .map(post_to_list_item)
            .collect::<Vec<PostListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_post_lines(&posts) {
            println!("{line}");
        }
    }

    Ok(())
}
