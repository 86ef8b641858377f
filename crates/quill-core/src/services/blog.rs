//! Blog service: every post, comment, upload and search operation.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::db::{
    CommentRepository, Database, LibSqlCommentRepository, LibSqlPostRepository, PostRepository,
    SyncConfig,
};
use crate::models::{
    Caller, Comment, CommentId, NewComment, NewPost, Post, PostId, PostView, SearchHit, StorageId,
};
use crate::search::SearchAggregator;
use crate::storage::{ImageStore, UploadTarget};
use crate::util::user_fingerprint;
use crate::{Error, Result};

/// Key prefix for uploaded post images
const IMAGE_KEY_PREFIX: &str = "posts";

/// Thread-safe handle over the database, the image store and search.
pub struct BlogService<S> {
    db: Arc<Mutex<Database>>,
    images: Arc<S>,
    search: SearchAggregator,
}

impl<S> Clone for BlogService<S> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            images: Arc::clone(&self.images),
            search: self.search,
        }
    }
}

impl<S: ImageStore> BlogService<S> {
    /// Wrap an already opened database
    pub fn new(db: Database, images: S) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            images: Arc::new(images),
            search: SearchAggregator::default(),
        }
    }

    /// Open the database at `db_path`, replicating a remote one when `sync_config` is set
    pub async fn open_path(
        db_path: impl Into<PathBuf>,
        sync_config: Option<SyncConfig>,
        images: S,
    ) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = if let Some(config) = sync_config {
            tracing::info!(
                "Replicating remote database {}",
                config.url.as_deref().unwrap_or("unknown")
            );
            Database::open_with_sync(&db_path, config).await?
        } else {
            tracing::info!("Using local database at {}", db_path.display());
            Database::open(&db_path).await?
        };
        Ok(Self::new(db, images))
    }

    /// Open an in-memory database (primarily for tests)
    pub async fn open_in_memory(images: S) -> Result<Self> {
        Ok(Self::new(Database::open_in_memory().await?, images))
    }

    /// Replace the search aggregator (e.g. to change truncation)
    #[must_use]
    pub fn with_search(mut self, search: SearchAggregator) -> Self {
        self.search = search;
        self
    }

    /// All posts, newest first, with image URLs resolved
    pub async fn list_posts(&self) -> Result<Vec<PostView>> {
        let posts = {
            let db = self.db.lock().await;
            LibSqlPostRepository::new(db.connection()).list().await?
        };

        let mut views = Vec::with_capacity(posts.len());
        for post in posts {
            views.push(self.view(post).await);
        }
        Ok(views)
    }

    /// A single post, or `NotFound`
    pub async fn get_post(&self, id: &PostId) -> Result<PostView> {
        let post = {
            let db = self.db.lock().await;
            LibSqlPostRepository::new(db.connection()).get(id).await?
        };
        let post = post.ok_or_else(|| Error::NotFound(format!("post {id}")))?;
        Ok(self.view(post).await)
    }

    /// Create a post authored by the caller
    pub async fn create_post(&self, caller: &Caller, input: NewPost) -> Result<PostId> {
        let author = caller.require_user()?;
        let post = Post::new(author, input.validated()?);

        {
            let db = self.db.lock().await;
            LibSqlPostRepository::new(db.connection())
                .create(&post)
                .await?;
            // Replicas forward writes to the primary; pull so reads see them
            db.sync().await?;
        }

        tracing::info!(
            post = %post.id,
            author = user_fingerprint(&author.user_id),
            has_image = post.image_storage_id.is_some(),
            "Created post"
        );
        Ok(post.id)
    }

    /// Issue a direct-upload target for a new post image
    pub async fn generate_upload_url(
        &self,
        caller: &Caller,
        content_type: Option<&str>,
    ) -> Result<UploadTarget> {
        let user = caller.require_user()?;
        let key = StorageId::generate(IMAGE_KEY_PREFIX);
        let target = self.images.upload_target(&key, content_type).await?;
        tracing::info!(
            user = user_fingerprint(&user.user_id),
            "Issued image upload target"
        );
        Ok(target)
    }

    /// Search titles, then contents, merging into one deduplicated list
    pub async fn search_posts(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let db = self.db.lock().await;
        let index = LibSqlPostRepository::new(db.connection());
        self.search.search(&index, query, limit).await
    }

    /// Comments on a post, newest first
    pub async fn list_comments(&self, post_id: &PostId) -> Result<Vec<Comment>> {
        let db = self.db.lock().await;
        LibSqlCommentRepository::new(db.connection())
            .list_for_post(post_id)
            .await
    }

    /// Comment on an existing post as the caller
    pub async fn create_comment(&self, caller: &Caller, input: NewComment) -> Result<CommentId> {
        let author = caller.require_user()?;
        let comment = Comment::new(author, input.validated()?);

        let db = self.db.lock().await;
        let post = LibSqlPostRepository::new(db.connection())
            .get(&comment.post_id)
            .await?;
        if post.is_none() {
            return Err(Error::NotFound(format!("post {}", comment.post_id)));
        }
        LibSqlCommentRepository::new(db.connection())
            .create(&comment)
            .await?;
        db.sync().await?;

        tracing::info!(
            post = %comment.post_id,
            author = user_fingerprint(&author.user_id),
            "Created comment"
        );
        Ok(comment.id)
    }

    /// An image the store cannot resolve renders as `None`
    async fn view(&self, post: Post) -> PostView {
        let image_url = match &post.image_storage_id {
            Some(key) => match self.images.resolve_url(key).await {
                Ok(url) => url,
                Err(error) => {
                    tracing::warn!(post = %post.id, %error, "Failed to resolve image URL");
                    None
                }
            },
            None => None,
        };
        PostView { post, image_url }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    use super::*;
    use crate::models::AuthUser;
    use crate::search::Truncation;
    use crate::storage::StaticImageStore;

    async fn service() -> BlogService<StaticImageStore> {
        let images = StaticImageStore::new("https://cdn.example.com").unwrap();
        BlogService::open_in_memory(images).await.unwrap()
    }

    fn ada() -> Caller {
        Caller::from(AuthUser::new("user-ada", "Ada"))
    }

    async fn publish(service: &BlogService<StaticImageStore>, title: &str, body: &str) -> PostId {
        service
            .create_post(&ada(), NewPost::new(title, body, None))
            .await
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn created_post_is_found_by_search() {
        let service = service().await;
        let id = publish(&service, "Hello World", "A first post about things").await;

        let hits = service.search_posts("Hello", 5).await.unwrap();
        assert!(hits.iter().any(|hit| hit.id == id));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn search_merges_title_and_content_without_duplicates() {
        let service = service().await;
        let both = publish(&service, "Rust tips", "Rust makes ownership explicit").await;
        let body_only = publish(&service, "Weekend notes", "Rewrote the parser in rust").await;
        publish(&service, "Gardening", "Tomatoes need sun").await;

        let hits = service.search_posts("rust", 5).await.unwrap();
        let ids: Vec<PostId> = hits.iter().map(|hit| hit.id).collect();
        assert_eq!(ids, vec![both, body_only]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn search_without_matches_is_empty() {
        let service = service().await;
        publish(&service, "Hello World", "A first post about things").await;
        assert!(service.search_posts("zebra", 5).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn search_respects_configured_truncation() {
        let service = service()
            .await
            .with_search(SearchAggregator::new(Truncation::Lenient));
        for i in 0..3 {
            publish(&service, &format!("Shared title {i}"), "unrelated body text").await;
        }
        for i in 0..3 {
            publish(&service, &format!("Other {i}"), "body mentions shared here").await;
        }

        let lenient = service.search_posts("shared", 2).await.unwrap();
        assert_eq!(lenient.len(), 3);

        let exact = service
            .clone()
            .with_search(SearchAggregator::new(Truncation::Exact))
            .search_posts("shared", 2)
            .await
            .unwrap();
        assert_eq!(exact.len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn list_and_get_resolve_image_urls() {
        let service = service().await;
        let image: StorageId = "posts/cover.png".parse().unwrap();
        let id = service
            .create_post(
                &ada(),
                NewPost::new("With image", "Has a cover image", Some(image)),
            )
            .await
            .unwrap();
        publish(&service, "No image", "Plain text post").await;

        let posts = service.list_posts().await.unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[1].post.id, id);
        assert_eq!(
            posts[1].image_url.as_deref(),
            Some("https://cdn.example.com/posts/cover.png")
        );
        assert_eq!(posts[0].image_url, None);

        let fetched = service.get_post(&id).await.unwrap();
        assert_eq!(fetched, posts[1]);
    }

    struct UnreachableStore;

    impl ImageStore for UnreachableStore {
        async fn upload_target(
            &self,
            _key: &StorageId,
            _content_type: Option<&str>,
        ) -> Result<UploadTarget> {
            Err(Error::Storage("bucket unreachable".into()))
        }

        async fn resolve_url(&self, _key: &StorageId) -> Result<Option<String>> {
            Err(Error::Storage("presign failed".into()))
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unresolvable_images_do_not_fail_reads() {
        let service = BlogService::open_in_memory(UnreachableStore).await.unwrap();
        let image: StorageId = "posts/cover.png".parse().unwrap();
        let id = service
            .create_post(
                &ada(),
                NewPost::new("With image", "Has a cover image", Some(image.clone())),
            )
            .await
            .unwrap();
        service
            .create_post(&ada(), NewPost::new("No image", "Plain text post", None))
            .await
            .unwrap();

        let posts = service.list_posts().await.unwrap();
        assert_eq!(posts.len(), 2);
        assert!(posts.iter().all(|view| view.image_url.is_none()));

        let fetched = service.get_post(&id).await.unwrap();
        assert_eq!(fetched.post.image_storage_id, Some(image));
        assert_eq!(fetched.image_url, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn get_missing_post_is_not_found() {
        let service = service().await;
        let err = service.get_post(&PostId::new()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn mutations_require_a_user() {
        let service = service().await;
        let err = service
            .create_post(
                &Caller::Anonymous,
                NewPost::new("Title", "Body long enough", None),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthenticated(_)));

        let id = publish(&service, "Title", "Body long enough").await;
        let err = service
            .create_comment(&Caller::Anonymous, NewComment::new(id, "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthenticated(_)));

        let err = service
            .generate_upload_url(&Caller::Anonymous, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthenticated(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_post_input_is_rejected() {
        let service = service().await;
        let err = service
            .create_post(&ada(), NewPost::new("Hi", "Body long enough", None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(service.list_posts().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn new_comment_is_listed_first() {
        let service = service().await;
        let post = publish(&service, "Discussed", "A post with comments").await;
        let reader = Caller::from(AuthUser::new("user-bob", "Bob"));

        service
            .create_comment(&reader, NewComment::new(post, "older comment"))
            .await
            .unwrap();
        let newest = service
            .create_comment(&ada(), NewComment::new(post, "newest comment"))
            .await
            .unwrap();

        let comments = service.list_comments(&post).await.unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].id, newest);
        assert_eq!(comments[0].author_name, "Ada");
        assert_eq!(comments[1].author_name, "Bob");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn comment_on_missing_post_is_not_found() {
        let service = service().await;
        let err = service
            .create_comment(&ada(), NewComment::new(PostId::new(), "hello?"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn upload_errors_surface_from_store() {
        let service = service().await;
        let err = service
            .generate_upload_url(&ada(), Some("image/png"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn open_path_creates_parent_directories() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("quill.db");
        let service = BlogService::open_path(&path, None, StaticImageStore::disabled())
            .await
            .unwrap();
        publish(&service, "On disk", "Stored in a file").await;
        assert!(path.exists());
        assert_eq!(service.list_posts().await.unwrap().len(), 1);
    }
}
