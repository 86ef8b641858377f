//! Data models for Quill

mod comment;
mod post;
mod storage_id;
mod user;

pub use comment::{Comment, CommentId, NewComment, COMMENT_BODY_MAX_CHARS};
pub use post::{
    NewPost, Post, PostId, PostView, SearchHit, CONTENT_MAX_CHARS, CONTENT_MIN_CHARS,
    TITLE_MAX_CHARS, TITLE_MIN_CHARS,
};
pub use storage_id::{StorageId, STORAGE_ID_MAX_BYTES};
pub use user::{AuthUser, Caller};
