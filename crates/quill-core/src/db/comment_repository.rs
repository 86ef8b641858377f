//! Comment repository

use crate::error::{Error, Result};
use crate::models::{Comment, PostId};
use libsql::{params, Connection, Row};

/// Trait for comment storage operations
#[allow(async_fn_in_trait)]
pub trait CommentRepository {
    /// Insert a fully built comment
    async fn create(&self, comment: &Comment) -> Result<()>;

    /// Comments on a post, newest first
    async fn list_for_post(&self, post_id: &PostId) -> Result<Vec<Comment>>;
}

/// libSQL implementation of `CommentRepository`
pub struct LibSqlCommentRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlCommentRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_comment(row: &Row) -> Result<Comment> {
        let id: String = row.get(0)?;
        let post_id: String = row.get(1)?;
        Ok(Comment {
            id: id
                .parse()
                .map_err(|_| Error::Database(format!("Invalid comment id in database: {id}")))?,
            post_id: post_id
                .parse()
                .map_err(|_| Error::Database(format!("Invalid post id in database: {post_id}")))?,
            body: row.get(2)?,
            author_id: row.get(3)?,
            author_name: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

impl CommentRepository for LibSqlCommentRepository<'_> {
    async fn create(&self, comment: &Comment) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO comments (id, post_id, body, author_id, author_name, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    comment.id.as_str(),
                    comment.post_id.as_str(),
                    comment.body.as_str(),
                    comment.author_id.as_str(),
                    comment.author_name.as_str(),
                    comment.created_at
                ],
            )
            .await?;
        Ok(())
    }

    async fn list_for_post(&self, post_id: &PostId) -> Result<Vec<Comment>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, post_id, body, author_id, author_name, created_at
                 FROM comments
                 WHERE post_id = ?1
                 ORDER BY created_at DESC, seq DESC",
                params![post_id.as_str()],
            )
            .await?;

        let mut comments = Vec::new();
        while let Some(row) = rows.next().await? {
            comments.push(Self::parse_comment(&row)?);
        }
        Ok(comments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, LibSqlPostRepository, PostRepository};
    use crate::models::{AuthUser, NewComment, NewPost, Post};
    use pretty_assertions::assert_eq;

    async fn setup_with_post() -> (Database, Post) {
        let db = Database::open_in_memory().await.unwrap();
        let post = Post::new(
            &AuthUser::new("author", "Author"),
            NewPost::new("A post", "with a body", None),
        );
        LibSqlPostRepository::new(db.connection())
            .create(&post)
            .await
            .unwrap();
        (db, post)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_for_post_newest_first() {
        let (db, post) = setup_with_post().await;
        let repo = LibSqlCommentRepository::new(db.connection());
        let reader = AuthUser::new("reader", "Reader");

        let older = Comment::new(&reader, NewComment::new(post.id, "first!"));
        let newer = Comment::new(&reader, NewComment::new(post.id, "second"));
        repo.create(&older).await.unwrap();
        repo.create(&newer).await.unwrap();

        let comments = repo.list_for_post(&post.id).await.unwrap();
        assert_eq!(comments, vec![newer, older]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_is_scoped_to_post() {
        let (db, post) = setup_with_post().await;
        let repo = LibSqlCommentRepository::new(db.connection());

        let comment = Comment::new(
            &AuthUser::new("reader", "Reader"),
            NewComment::new(post.id, "hello"),
        );
        repo.create(&comment).await.unwrap();

        assert!(repo.list_for_post(&PostId::new()).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_rejects_unknown_post() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlCommentRepository::new(db.connection());

        let orphan = Comment::new(
            &AuthUser::new("reader", "Reader"),
            NewComment::new(PostId::new(), "nobody home"),
        );
        assert!(repo.create(&orphan).await.is_err());
    }
}
