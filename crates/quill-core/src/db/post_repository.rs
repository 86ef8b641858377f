//! Post repository and full-text search

use crate::error::{Error, Result};
use crate::models::{Post, PostId, SearchHit};
use crate::search::{PostSearchIndex, SearchField};
use libsql::{params, Connection, Row, Value};

const POST_COLUMNS: &str =
    "p.id, p.title, p.content, p.author_id, p.image_storage_id, p.created_at";

/// Trait for post storage operations
#[allow(async_fn_in_trait)]
pub trait PostRepository {
    /// Insert a fully built post
    async fn create(&self, post: &Post) -> Result<()>;

    /// Get a post by ID
    async fn get(&self, id: &PostId) -> Result<Option<Post>>;

    /// List all posts, newest first
    async fn list(&self) -> Result<Vec<Post>>;
}

/// libSQL implementation of `PostRepository`
pub struct LibSqlPostRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlPostRepository<'a> {
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_post(row: &Row) -> Result<Post> {
        let id: String = row.get(0)?;
        let image_storage_id = match row.get_value(4)? {
            Value::Text(key) => Some(key.parse()?),
            _ => None,
        };
        Ok(Post {
            id: id
                .parse()
                .map_err(|_| Error::Database(format!("Invalid post id in database: {id}")))?,
            title: row.get(1)?,
            content: row.get(2)?,
            author_id: row.get(3)?,
            image_storage_id,
            created_at: row.get(5)?,
        })
    }

    async fn query_posts(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<Post>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut posts = Vec::new();
        while let Some(row) = rows.next().await? {
            posts.push(Self::parse_post(&row)?);
        }
        Ok(posts)
    }
}

impl PostRepository for LibSqlPostRepository<'_> {
    async fn create(&self, post: &Post) -> Result<()> {
        let image = post
            .image_storage_id
            .as_ref()
            .map_or(Value::Null, |key| Value::Text(key.to_string()));

        self.conn
            .execute(
                "INSERT INTO posts (id, title, content, author_id, image_storage_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    post.id.as_str(),
                    post.title.as_str(),
                    post.content.as_str(),
                    post.author_id.as_str(),
                    image,
                    post.created_at
                ],
            )
            .await?;
        Ok(())
    }

    async fn get(&self, id: &PostId) -> Result<Option<Post>> {
        let sql = format!("SELECT {POST_COLUMNS} FROM posts p WHERE p.id = ?1");
        let mut posts = self.query_posts(&sql, params![id.as_str()]).await?;
        Ok(posts.pop())
    }

    async fn list(&self) -> Result<Vec<Post>> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM posts p ORDER BY p.created_at DESC, p.seq DESC"
        );
        self.query_posts(&sql, ()).await
    }
}

impl PostSearchIndex for LibSqlPostRepository<'_> {
    async fn search_field(
        &self,
        field: SearchField,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let Some(expression) = fts_match_expression(query) else {
            return Ok(Vec::new());
        };
        let table = match field {
            SearchField::Title => "posts_title_fts",
            SearchField::Content => "posts_content_fts",
        };

        let sql = format!(
            "SELECT {POST_COLUMNS}
             FROM {table}
             JOIN posts p ON p.seq = {table}.rowid
             WHERE {table} MATCH ?1
             ORDER BY {table}.rank, p.created_at DESC
             LIMIT ?2"
        );
        let posts = self
            .query_posts(&sql, params![expression, sql_limit(limit)])
            .await?;
        Ok(posts.into_iter().map(SearchHit::from).collect())
    }
}

/// SQLite reads a negative LIMIT as unbounded, so saturate instead of wrapping
fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Turn free text into a safe FTS5 expression
///
/// Each alphanumeric token is quoted, tokens are OR-ed, and the last token
/// is prefix-matched so partially typed words still hit. Returns `None` when
/// the text has no searchable tokens.
pub fn fts_match_expression(query: &str) -> Option<String> {
    let tokens: Vec<&str> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .collect();
    let (last, rest) = tokens.split_last()?;

    let mut terms: Vec<String> = rest.iter().map(|token| format!("\"{token}\"")).collect();
    terms.push(format!("\"{last}\"*"));
    Some(terms.join(" OR "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{AuthUser, NewPost, StorageId};
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn author() -> AuthUser {
        AuthUser::new("user-1", "Ada")
    }

    #[test]
    fn test_sql_limit_saturates() {
        assert_eq!(sql_limit(5), 5);
        assert_eq!(sql_limit(usize::MAX), i64::MAX);
    }

    async fn insert(repo: &LibSqlPostRepository<'_>, title: &str, content: &str) -> Post {
        let post = Post::new(&author(), NewPost::new(title, content, None));
        repo.create(&post).await.unwrap();
        post
    }

    #[test]
    fn test_fts_expression_quotes_tokens() {
        assert_eq!(
            fts_match_expression("hello wor").as_deref(),
            Some("\"hello\" OR \"wor\"*")
        );
        assert_eq!(
            fts_match_expression("  \"drop\" (table)*  ").as_deref(),
            Some("\"drop\" OR \"table\"*")
        );
        assert_eq!(fts_match_expression(" !?* "), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_and_get() {
        let db = setup().await;
        let repo = LibSqlPostRepository::new(db.connection());

        let image: StorageId = "posts/cover.png".parse().unwrap();
        let post = Post::new(
            &author(),
            NewPost::new("Hello World", "First post body", Some(image.clone())),
        );
        repo.create(&post).await.unwrap();

        let fetched = repo.get(&post.id).await.unwrap().unwrap();
        assert_eq!(fetched, post);
        assert_eq!(fetched.image_storage_id, Some(image));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_get_missing_returns_none() {
        let db = setup().await;
        let repo = LibSqlPostRepository::new(db.connection());
        assert!(repo.get(&PostId::new()).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_newest_first() {
        let db = setup().await;
        let repo = LibSqlPostRepository::new(db.connection());

        let first = insert(&repo, "First", "first body text").await;
        let second = insert(&repo, "Second", "second body text").await;
        let third = insert(&repo, "Third", "third body text").await;

        let posts = repo.list().await.unwrap();
        let ids: Vec<PostId> = posts.iter().map(|post| post.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_search_title_and_content_are_independent() {
        let db = setup().await;
        let repo = LibSqlPostRepository::new(db.connection());

        let titled = insert(&repo, "Rust ownership", "borrowing explained").await;
        let bodied = insert(&repo, "Memory notes", "all about rust lifetimes").await;

        let by_title = repo
            .search_field(SearchField::Title, "rust", 10)
            .await
            .unwrap();
        assert_eq!(by_title.len(), 1);
        assert_eq!(by_title[0].id, titled.id);

        let by_content = repo
            .search_field(SearchField::Content, "rust", 10)
            .await
            .unwrap();
        assert_eq!(by_content.len(), 1);
        assert_eq!(by_content[0].id, bodied.id);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_search_prefix_and_limit() {
        let db = setup().await;
        let repo = LibSqlPostRepository::new(db.connection());

        for i in 0..4 {
            insert(&repo, &format!("Hello number {i}"), "body text here").await;
        }

        let hits = repo
            .search_field(SearchField::Title, "hel", 3)
            .await
            .unwrap();
        assert_eq!(hits.len(), 3);

        let unbounded = repo
            .search_field(SearchField::Title, "hel", usize::MAX)
            .await
            .unwrap();
        assert_eq!(unbounded.len(), 4);

        let none = repo
            .search_field(SearchField::Title, "goodbye", 3)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_search_tolerates_fts_syntax() {
        let db = setup().await;
        let repo = LibSqlPostRepository::new(db.connection());
        insert(&repo, "Quotes \"inside\"", "body text here").await;

        let hits = repo
            .search_field(SearchField::Title, "\"inside AND (", 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }
}
