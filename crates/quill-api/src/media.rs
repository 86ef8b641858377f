use std::time::Duration;

use aws_credential_types::Credentials;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use aws_types::region::Region;
use quill_core::storage::{public_object_url, ImageStore, UploadTarget};
use quill_core::{Error, StorageId};

use crate::config::{AppConfig, R2RuntimeConfig};

/// Presigned request a browser can perform directly against R2
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedOperation {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
}

#[derive(Clone)]
pub struct R2PresignService {
    bucket: String,
    ttl: Duration,
    client: Client,
}

impl R2PresignService {
    pub fn new(config: R2RuntimeConfig, ttl: Duration) -> Self {
        let credentials = Credentials::new(
            config.access_key_id,
            config.secret_access_key,
            None,
            None,
            "quill-api-r2",
        );

        let endpoint = format!("https://{}.r2.cloudflarestorage.com", config.account_id);
        let shared_config = aws_sdk_s3::Config::builder()
            .region(Region::new("auto"))
            .endpoint_url(endpoint)
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            bucket: config.bucket,
            ttl,
            client: Client::from_conf(shared_config),
        }
    }

    pub async fn presign_upload(
        &self,
        key: &StorageId,
        content_type: Option<&str>,
    ) -> Result<PresignedOperation, Error> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key.as_str());
        if let Some(content_type) = content_type.and_then(normalize_content_type) {
            request = request.content_type(content_type);
        }
        let operation = request
            .presigned(presign_config(self.ttl)?)
            .await
            .map_err(|error| {
                Error::Storage(format!("Failed to presign upload URL: {}", sanitize(&error)))
            })?;
        Ok(map_presigned(
            operation.method().to_string(),
            operation.uri().to_string(),
            operation.headers(),
        ))
    }

    pub async fn presign_download(&self, key: &StorageId) -> Result<PresignedOperation, Error> {
        let operation = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .presigned(presign_config(self.ttl)?)
            .await
            .map_err(|error| {
                Error::Storage(format!(
                    "Failed to presign download URL: {}",
                    sanitize(&error)
                ))
            })?;
        Ok(map_presigned(
            operation.method().to_string(),
            operation.uri().to_string(),
            operation.headers(),
        ))
    }
}

/// Image store backed by R2, with an optional public CDN in front of it.
///
/// Reads prefer the public base URL; without one they fall back to a
/// short-lived presigned GET.
#[derive(Clone, Default)]
pub struct MediaStore {
    presign: Option<R2PresignService>,
    public_base_url: Option<String>,
}

impl MediaStore {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            presign: config
                .r2
                .clone()
                .map(|r2| R2PresignService::new(r2, config.media_url_ttl)),
            public_base_url: config.media_public_base_url.clone(),
        }
    }

    pub const fn uploads_enabled(&self) -> bool {
        self.presign.is_some()
    }
}

impl ImageStore for MediaStore {
    async fn upload_target(
        &self,
        key: &StorageId,
        content_type: Option<&str>,
    ) -> Result<UploadTarget, Error> {
        let presign = self
            .presign
            .as_ref()
            .ok_or_else(|| Error::Storage("R2 image storage is not configured".to_string()))?;
        let operation = presign.presign_upload(key, content_type).await?;
        Ok(UploadTarget {
            storage_id: key.clone(),
            method: operation.method,
            url: operation.url,
            headers: operation.headers,
        })
    }

    async fn resolve_url(&self, key: &StorageId) -> Result<Option<String>, Error> {
        if let Some(base) = &self.public_base_url {
            return Ok(Some(public_object_url(base, key)));
        }
        match &self.presign {
            Some(presign) => Ok(Some(presign.presign_download(key).await?.url)),
            None => Ok(None),
        }
    }
}

fn normalize_content_type(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn map_presigned<'a>(
    method: String,
    url: String,
    headers: impl Iterator<Item = (&'a str, &'a str)>,
) -> PresignedOperation {
    let headers = headers
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    PresignedOperation {
        method,
        url,
        headers,
    }
}

fn presign_config(ttl: Duration) -> Result<PresigningConfig, Error> {
    PresigningConfig::expires_in(ttl)
        .map_err(|error| Error::Storage(format!("Invalid presign TTL: {}", sanitize(&error))))
}

fn sanitize(error: &impl std::fmt::Display) -> String {
    error.to_string().replace('\n', " ").trim().to_string()
}
