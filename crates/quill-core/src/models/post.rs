//! Post model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{AuthUser, StorageId};
use crate::error::Error;

/// Minimum title length in characters, after trimming
pub const TITLE_MIN_CHARS: usize = 3;
/// Maximum title length in characters, after trimming
pub const TITLE_MAX_CHARS: usize = 100;
/// Minimum content length in characters, after trimming
pub const CONTENT_MIN_CHARS: usize = 10;
/// Maximum content length in characters, after trimming
pub const CONTENT_MAX_CHARS: usize = 20_000;

/// A unique identifier for a post, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostId(Uuid);

impl PostId {
    /// Create a new unique post ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for PostId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PostId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}

/// A blog post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Unique identifier
    pub id: PostId,
    /// Post title (searchable)
    pub title: String,
    /// Post body (searchable)
    pub content: String,
    /// Identity-provider subject of the author
    pub author_id: String,
    /// Storage reference of the cover image, if any
    pub image_storage_id: Option<StorageId>,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl Post {
    /// Build a post authored by `author` from validated input
    #[must_use]
    pub fn new(author: &AuthUser, input: NewPost) -> Self {
        Self {
            id: PostId::new(),
            title: input.title,
            content: input.content,
            author_id: author.user_id.clone(),
            image_storage_id: input.image_storage_id,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// A post with its image reference resolved to a retrievable URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub image_url: Option<String>,
}

/// Input for creating a post
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub image_storage_id: Option<StorageId>,
}

impl NewPost {
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        image_storage_id: Option<StorageId>,
    ) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            image_storage_id,
        }
    }

    /// Trim fields and check their length bounds
    pub fn validated(self) -> crate::Result<Self> {
        let title = bounded_text("title", &self.title, TITLE_MIN_CHARS, TITLE_MAX_CHARS)?;
        let content = bounded_text(
            "content",
            &self.content,
            CONTENT_MIN_CHARS,
            CONTENT_MAX_CHARS,
        )?;
        Ok(Self {
            title,
            content,
            image_storage_id: self.image_storage_id,
        })
    }
}

/// Projection of a post used for search results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: PostId,
    pub title: String,
    pub content: String,
}

impl From<Post> for SearchHit {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            title: post.title,
            content: post.content,
        }
    }
}

pub(crate) fn bounded_text(
    field: &str,
    raw: &str,
    min: usize,
    max: usize,
) -> crate::Result<String> {
    let trimmed = raw.trim();
    let len = trimmed.chars().count();
    if len < min {
        return Err(Error::InvalidInput(format!(
            "{field} must be at least {min} characters"
        )));
    }
    if len > max {
        return Err(Error::InvalidInput(format!(
            "{field} must be at most {max} characters"
        )));
    }
    Ok(trimmed.to_string())
}
