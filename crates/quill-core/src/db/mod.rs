//! Database layer for Quill

mod comment_repository;
mod connection;
mod migrations;
mod post_repository;

pub use comment_repository::{CommentRepository, LibSqlCommentRepository};
pub use connection::{Database, SyncConfig};
pub use post_repository::{fts_match_expression, LibSqlPostRepository, PostRepository};
