//! quill-core - Core library for Quill
//!
//! This crate contains the models, database layer, search aggregation and the
//! blog service shared by the HTTP API and the CLI.

pub mod db;
pub mod error;
pub mod models;
pub mod search;
pub mod services;
pub mod storage;
pub mod util;

pub use error::{Error, Result};
pub use models::{
    AuthUser, Caller, Comment, CommentId, NewComment, NewPost, Post, PostId, PostView, SearchHit,
    StorageId,
};
