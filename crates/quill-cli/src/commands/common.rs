use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Utc;
use quill_core::db::SyncConfig;
use quill_core::services::BlogService;
use quill_core::storage::StaticImageStore;
use quill_core::{AuthUser, Caller, Comment, PostId, PostView, SearchHit};
use serde::Serialize;

use crate::cli::AuthorArgs;
use crate::error::CliError;

pub type Blog = BlogService<StaticImageStore>;

#[derive(Debug, Serialize)]
pub struct PostListItem {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub author_id: String,
    pub image_url: Option<String>,
    pub created_at: i64,
    pub relative_time: String,
}

pub fn format_post_lines(posts: &[PostView]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    posts
        .iter()
        .map(|view| {
            let short_id = short_id(&view.post.id.to_string());
            let title = preview(&view.post.title, 40);
            let relative_time = format_relative_time(view.post.created_at, now_ms);
            format!("{short_id:<13}  {title:<40}  {relative_time}")
        })
        .collect()
}

pub fn post_to_list_item(view: &PostView) -> PostListItem {
    let now_ms = Utc::now().timestamp_millis();
    PostListItem {
        id: view.post.id.to_string(),
        title: view.post.title.clone(),
        preview: preview(&view.post.content, 80),
        author_id: view.post.author_id.clone(),
        image_url: view.image_url.clone(),
        created_at: view.post.created_at,
        relative_time: format_relative_time(view.post.created_at, now_ms),
    }
}

pub fn format_hit_lines(hits: &[SearchHit]) -> Vec<String> {
    hits.iter()
        .map(|hit| {
            let id = hit.id.to_string();
            format!(
                "{id}  {:<40}  {}",
                preview(&hit.title, 40),
                preview(&hit.content, 60)
            )
        })
        .collect()
}

pub fn format_comment_lines(comments: &[Comment]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    comments
        .iter()
        .map(|comment| {
            let relative_time = format_relative_time(comment.created_at, now_ms);
            format!(
                "{:<20}  {relative_time:<10}  {}",
                preview(&comment.author_name, 20),
                preview(&comment.body, 60)
            )
        })
        .collect()
}

fn short_id(id: &str) -> String {
    id.chars().take(13).collect()
}

/// First line of `text`, whitespace collapsed, cut to `max_chars` with an ellipsis
pub fn preview(text: &str, max_chars: usize) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn parse_post_id(raw: &str) -> Result<PostId, CliError> {
    raw.parse()
        .map_err(|_| CliError::InvalidPostId(raw.trim().to_string()))
}

/// The caller the CLI acts as for writes
pub fn author_caller(author: &AuthorArgs) -> Result<Caller, CliError> {
    let user_id = author
        .author_id
        .as_deref()
        .and_then(normalize_content)
        .ok_or(CliError::AuthorRequired)?;
    let display_name = author
        .author_name
        .as_deref()
        .and_then(normalize_content)
        .unwrap_or_else(|| user_id.clone());
    Ok(Caller::from(AuthUser::new(user_id, display_name)))
}

/// Text from arguments, then piped stdin, then `$EDITOR`
pub fn resolve_text_input(parts: &[String], what: &'static str) -> Result<String, CliError> {
    if let Some(content) = normalize_content(&parts.join(" ")) {
        return Ok(content);
    }

    if let Some(content) = read_piped_stdin()? {
        return Ok(content);
    }

    if let Some(content) = capture_editor_input()? {
        return Ok(content);
    }

    Err(CliError::EmptyContent(what))
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input() -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_draft_path();
    std::fs::write(&temp_file, "")?;

    let launch_result = launch_editor(&editor, &temp_file);
    let content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    match Command::new(editor).arg(file_path).status() {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => Err(CliError::EditorFailed(format!(
            "`{editor}` exited with status {status}"
        ))),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            // EDITOR may carry arguments, e.g. `code --wait`
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };

            let status = Command::new(program).args(parts).arg(file_path).status()?;
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) => Err(CliError::Io(err)),
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

pub fn create_temp_draft_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("quill-draft-{}-{now}.md", std::process::id()))
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os("QUILL_DB_PATH").map(PathBuf::from)) {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("quill").join("quill.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}

/// Open the blog database, replicating a remote one when configured
pub async fn open_blog(path: &Path) -> Result<Blog, CliError> {
    let images = image_store_from_env()?;
    let sync_config = sync_config_from_env()?;
    Ok(BlogService::open_path(path, sync_config, images).await?)
}

fn image_store_from_env() -> Result<StaticImageStore, CliError> {
    match env::var("MEDIA_PUBLIC_BASE_URL") {
        Ok(base_url) if !base_url.trim().is_empty() => Ok(StaticImageStore::new(base_url)?),
        _ => Ok(StaticImageStore::disabled()),
    }
}

fn sync_config_from_env() -> Result<Option<SyncConfig>, CliError> {
    let url = env::var("QUILL_DATABASE_URL").ok().as_deref().and_then(normalize_content);
    let token = env::var("QUILL_DATABASE_AUTH_TOKEN")
        .ok()
        .as_deref()
        .and_then(normalize_content);
    match (url, token) {
        // One-shot commands pull once at open; no background sync thread
        (Some(url), Some(token)) => Ok(Some(SyncConfig::new(url, token).without_auto_sync())),
        (None, None) => Ok(None),
        _ => Err(CliError::Config(
            "set both QUILL_DATABASE_URL and QUILL_DATABASE_AUTH_TOKEN, or neither".to_string(),
        )),
    }
}
