use std::path::Path;

use quill_core::search::{normalize_search_query, SearchAggregator, Truncation};

use crate::commands::common::{format_hit_lines, open_blog};
use crate::error::CliError;

pub async fn run_search(
    query: &str,
    limit: usize,
    truncation: Truncation,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let normalized_query = normalize_search_query(query)?;
    let blog = open_blog(db_path)
        .await?
        .with_search(SearchAggregator::new(truncation));
    let hits = blog.search_posts(&normalized_query, limit).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
    } else {
        for line in format_hit_lines(&hits) {
            println!("{line}");
        }
    }

    Ok(())
}
