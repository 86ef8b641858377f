pub mod comment;
pub mod comments;
pub mod common;
pub mod completions;
pub mod list;
pub mod post;
pub mod search;
pub mod show;
