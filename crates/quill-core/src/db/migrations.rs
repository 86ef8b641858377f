//! Database migrations

use crate::error::Result;
use libsql::Connection;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        apply(conn, 1, &V1_STATEMENTS).await?;
    }
    if version < 2 {
        apply(conn, 2, &V2_STATEMENTS).await?;
    }

    Ok(())
}

async fn get_version(conn: &Connection) -> Result<i32> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists = match rows.next().await? {
        Some(row) => row.get::<i32>(0)? != 0,
        None => false,
    };
    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;
    let version = match rows.next().await? {
        Some(row) => row.get::<i32>(0)?,
        None => 0,
    };

    Ok(version)
}

/// Posts and comments.
///
/// `seq` is the stable rowid the search indexes key on; `id` is the public id.
const V1_STATEMENTS: [&str; 8] = [
    "CREATE TABLE IF NOT EXISTS schema_version (
        version INTEGER PRIMARY KEY
    )",
    "CREATE TABLE IF NOT EXISTS posts (
        seq INTEGER PRIMARY KEY,
        id TEXT NOT NULL UNIQUE,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        author_id TEXT NOT NULL,
        image_storage_id TEXT,
        created_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at DESC)",
    "CREATE TABLE IF NOT EXISTS comments (
        seq INTEGER PRIMARY KEY,
        id TEXT NOT NULL UNIQUE,
        post_id TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
        body TEXT NOT NULL,
        author_id TEXT NOT NULL,
        author_name TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, created_at DESC)",
    "CREATE INDEX IF NOT EXISTS idx_comments_author ON comments(author_id)",
    "CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id)",
    "INSERT INTO schema_version (version) VALUES (1)",
];

/// Independent full-text indexes for titles and bodies.
const V2_STATEMENTS: [&str; 9] = [
    "CREATE VIRTUAL TABLE IF NOT EXISTS posts_title_fts USING fts5(
        title,
        content=posts,
        content_rowid=seq
    )",
    "CREATE VIRTUAL TABLE IF NOT EXISTS posts_content_fts USING fts5(
        content,
        content=posts,
        content_rowid=seq
    )",
    "CREATE TRIGGER IF NOT EXISTS posts_title_ai AFTER INSERT ON posts BEGIN
        INSERT INTO posts_title_fts(rowid, title) VALUES (NEW.seq, NEW.title);
    END",
    "CREATE TRIGGER IF NOT EXISTS posts_title_ad AFTER DELETE ON posts BEGIN
        INSERT INTO posts_title_fts(posts_title_fts, rowid, title) VALUES('delete', OLD.seq, OLD.title);
    END",
    "CREATE TRIGGER IF NOT EXISTS posts_content_ai AFTER INSERT ON posts BEGIN
        INSERT INTO posts_content_fts(rowid, content) VALUES (NEW.seq, NEW.content);
    END",
    "CREATE TRIGGER IF NOT EXISTS posts_content_ad AFTER DELETE ON posts BEGIN
        INSERT INTO posts_content_fts(posts_content_fts, rowid, content) VALUES('delete', OLD.seq, OLD.content);
    END",
    // Index rows written before the triggers existed.
    "INSERT INTO posts_title_fts(posts_title_fts) VALUES('rebuild')",
    "INSERT INTO posts_content_fts(posts_content_fts) VALUES('rebuild')",
    "INSERT INTO schema_version (version) VALUES (2)",
];

async fn apply(conn: &Connection, version: i32, statements: &[&str]) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {version}");
    Ok(())
}
