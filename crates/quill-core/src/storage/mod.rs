//! Image storage seam
//!
//! Posts keep only an opaque [`StorageId`]. An [`ImageStore`] turns a fresh
//! key into a direct-upload target and turns stored keys back into URLs a
//! browser can fetch.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::StorageId;
use crate::util::{is_http_url, trim_trailing_slash};

/// Where and how a client should upload a file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadTarget {
    /// Key to pass back when creating the post
    pub storage_id: StorageId,
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

/// Object storage used for post images
#[allow(async_fn_in_trait)]
pub trait ImageStore {
    /// Issue an upload target for `key`
    async fn upload_target(
        &self,
        key: &StorageId,
        content_type: Option<&str>,
    ) -> Result<UploadTarget>;

    /// Resolve `key` to a retrievable URL, if the store can
    async fn resolve_url(&self, key: &StorageId) -> Result<Option<String>>;
}

/// Read-only store that serves images from a public base URL
#[derive(Debug, Clone, Default)]
pub struct StaticImageStore {
    base_url: Option<String>,
}

impl StaticImageStore {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let base_url = base_url.as_ref().trim();
        if !is_http_url(base_url) {
            return Err(Error::InvalidInput(
                "image base URL must start with http:// or https://".to_string(),
            ));
        }
        Ok(Self {
            base_url: Some(trim_trailing_slash(base_url).to_string()),
        })
    }

    /// A store that resolves nothing and refuses uploads
    pub const fn disabled() -> Self {
        Self { base_url: None }
    }

    /// Public URL of `key` under this store's base
    pub fn url_for(&self, key: &StorageId) -> Option<String> {
        self.base_url
            .as_deref()
            .map(|base| public_object_url(base, key))
    }
}

impl ImageStore for StaticImageStore {
    async fn upload_target(
        &self,
        _key: &StorageId,
        _content_type: Option<&str>,
    ) -> Result<UploadTarget> {
        Err(Error::Storage(
            "image uploads are not configured for this store".to_string(),
        ))
    }

    async fn resolve_url(&self, key: &StorageId) -> Result<Option<String>> {
        Ok(self.url_for(key))
    }
}

/// Join a base URL and an object key, percent-encoding each key segment
pub fn public_object_url(base_url: &str, key: &StorageId) -> String {
    let path = key
        .as_str()
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("{}/{path}", trim_trailing_slash(base_url))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> StorageId {
        raw.parse().unwrap()
    }

    #[test]
    fn public_url_encodes_segments() {
        assert_eq!(
            public_object_url("https://cdn.example.com/", &key("posts/my cover.png")),
            "https://cdn.example.com/posts/my%20cover.png"
        );
    }

    #[test]
    fn static_store_requires_http_base() {
        assert!(StaticImageStore::new("cdn.example.com").is_err());
        assert!(StaticImageStore::new("https://cdn.example.com").is_ok());
    }

    #[tokio::test]
    async fn static_store_resolves_but_refuses_uploads() {
        let store = StaticImageStore::new("https://cdn.example.com/images/").unwrap();
        let resolved = store.resolve_url(&key("posts/a.png")).await.unwrap();
        assert_eq!(
            resolved.as_deref(),
            Some("https://cdn.example.com/images/posts/a.png")
        );

        let err = store
            .upload_target(&key("posts/a.png"), Some("image/png"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[tokio::test]
    async fn disabled_store_resolves_nothing() {
        let store = StaticImageStore::disabled();
        assert_eq!(store.resolve_url(&key("posts/a.png")).await.unwrap(), None);
    }
}
