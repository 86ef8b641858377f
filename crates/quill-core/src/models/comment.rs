//! Comment model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::post::bounded_text;
use super::{AuthUser, PostId};

/// Maximum comment length in characters, after trimming
pub const COMMENT_BODY_MAX_CHARS: usize = 2_000;

/// A unique identifier for a comment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CommentId(Uuid);

impl CommentId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for CommentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CommentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}

/// A comment left on a post
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub body: String,
    pub author_id: String,
    /// Display name captured when the comment was written
    pub author_name: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
}

impl Comment {
    #[must_use]
    pub fn new(author: &AuthUser, input: NewComment) -> Self {
        Self {
            id: CommentId::new(),
            post_id: input.post_id,
            body: input.body,
            author_id: author.user_id.clone(),
            author_name: author.display_name.clone(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Input for creating a comment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub post_id: PostId,
    pub body: String,
}

impl NewComment {
    pub fn new(post_id: PostId, body: impl Into<String>) -> Self {
        Self {
            post_id,
            body: body.into(),
        }
    }

    /// Trim the body and reject empty or oversized comments
    pub fn validated(self) -> crate::Result<Self> {
        let body = bounded_text("comment body", &self.body, 1, COMMENT_BODY_MAX_CHARS)?;
        Ok(Self {
            post_id: self.post_id,
            body,
        })
    }
}
