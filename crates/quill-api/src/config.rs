use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use quill_core::db::SyncConfig;
use quill_core::search::Truncation;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub db_path: PathBuf,
    pub database_sync: Option<SyncConfig>,
    pub auth: AuthConfig,
    pub media_url_ttl: Duration,
    pub media_public_base_url: Option<String>,
    pub r2: Option<R2RuntimeConfig>,
    pub search_default_limit: usize,
    pub search_max_limit: usize,
    pub search_truncation: Truncation,
    pub rate_limit_window: Duration,
    pub post_write_rate_limit_per_window: u32,
    pub comment_write_rate_limit_per_window: u32,
}

/// Where bearer token signing keys come from
#[derive(Clone, PartialEq, Eq)]
pub enum AuthKeySource {
    /// RS256 keys published at a JWKS endpoint
    Jwks { url: String, cache_ttl: Duration },
    /// HS256 shared secret
    SharedSecret(String),
}

#[derive(Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub keys: AuthKeySource,
    pub issuer: Option<String>,
    pub audience: String,
    pub clock_skew: Duration,
}

#[derive(Clone, PartialEq, Eq)]
pub struct R2RuntimeConfig {
    pub account_id: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for R2RuntimeConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("R2RuntimeConfig")
            .field("account_id", &self.account_id)
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .finish()
    }
}

impl fmt::Debug for AuthKeySource {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Jwks { url, cache_ttl } => formatter
                .debug_struct("Jwks")
                .field("url", url)
                .field("cache_ttl", cache_ttl)
                .finish(),
            Self::SharedSecret(_) => formatter
                .debug_tuple("SharedSecret")
                .field(&"[REDACTED]")
                .finish(),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthConfig")
            .field("keys", &self.keys)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("clock_skew", &self.clock_skew)
            .finish()
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("db_path", &self.db_path)
            .field("database_sync", &self.database_sync)
            .field("auth", &self.auth)
            .field("media_url_ttl", &self.media_url_ttl)
            .field("media_public_base_url", &self.media_public_base_url)
            .field("r2", &self.r2)
            .field("search_default_limit", &self.search_default_limit)
            .field("search_max_limit", &self.search_max_limit)
            .field("search_truncation", &self.search_truncation)
            .field("rate_limit_window", &self.rate_limit_window)
            .field(
                "post_write_rate_limit_per_window",
                &self.post_write_rate_limit_per_window,
            )
            .field(
                "comment_write_rate_limit_per_window",
                &self.comment_write_rate_limit_per_window,
            )
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "QUILL_API_BIND_ADDR", "127.0.0.1:8080");
        let db_path = PathBuf::from(value_or_default(&lookup, "QUILL_DB_PATH", "quill.db"));
        let database_sync = parse_database_sync(&lookup)?;
        let auth = parse_auth_config(&lookup)?;

        let media_url_ttl = Duration::from_secs(bounded_u64(
            &lookup,
            "MEDIA_SIGNED_URL_TTL_SECS",
            600,
            60..=3_600,
        )?);
        let media_public_base_url = optional_trimmed(&lookup, "MEDIA_PUBLIC_BASE_URL")
            .map(|value| validated_http_url("MEDIA_PUBLIC_BASE_URL", &value))
            .transpose()?;
        let r2 = parse_r2_config(&lookup)?;

        let search_max_limit =
            usize::try_from(bounded_u64(&lookup, "SEARCH_MAX_LIMIT", 50, 1..=500)?)
                .map_err(|_| ConfigError::Invalid("SEARCH_MAX_LIMIT is too large".to_string()))?;
        let search_default_limit =
            usize::try_from(bounded_u64(&lookup, "SEARCH_DEFAULT_LIMIT", 5, 1..=500)?).map_err(
                |_| ConfigError::Invalid("SEARCH_DEFAULT_LIMIT is too large".to_string()),
            )?;
        if search_default_limit > search_max_limit {
            return Err(ConfigError::Invalid(
                "SEARCH_DEFAULT_LIMIT must not exceed SEARCH_MAX_LIMIT".to_string(),
            ));
        }
        let search_truncation = value_or_default(&lookup, "SEARCH_TRUNCATION", "exact")
            .parse::<Truncation>()
            .map_err(|error| ConfigError::Invalid(format!("SEARCH_TRUNCATION: {error}")))?;

        let rate_limit_window = Duration::from_secs(bounded_u64(
            &lookup,
            "RATE_LIMIT_WINDOW_SECS",
            60,
            10..=3_600,
        )?);
        let post_write_rate_limit_per_window =
            bounded_u32(&lookup, "POST_WRITE_RATE_LIMIT_PER_WINDOW", 20, 1..=1_000)?;
        let comment_write_rate_limit_per_window =
            bounded_u32(&lookup, "COMMENT_WRITE_RATE_LIMIT_PER_WINDOW", 60, 1..=5_000)?;

        Ok(Self {
            bind_addr,
            db_path,
            database_sync,
            auth,
            media_url_ttl,
            media_public_base_url,
            r2,
            search_default_limit,
            search_max_limit,
            search_truncation,
            rate_limit_window,
            post_write_rate_limit_per_window,
            comment_write_rate_limit_per_window,
        })
    }
}

fn parse_database_sync(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<SyncConfig>, ConfigError> {
    let url = optional_trimmed(&lookup, "QUILL_DATABASE_URL");
    let token = optional_trimmed(&lookup, "QUILL_DATABASE_AUTH_TOKEN");
    match (url, token) {
        (None, None) => Ok(None),
        (Some(url), Some(token)) => Ok(Some(SyncConfig::new(url, token))),
        (Some(_), None) => Err(ConfigError::MissingVar("QUILL_DATABASE_AUTH_TOKEN")),
        (None, Some(_)) => Err(ConfigError::MissingVar("QUILL_DATABASE_URL")),
    }
}

fn parse_auth_config(lookup: impl Fn(&str) -> Option<String>) -> Result<AuthConfig, ConfigError> {
    let jwks_url = optional_trimmed(&lookup, "AUTH_JWKS_URL");
    let secret = optional_trimmed(&lookup, "AUTH_JWT_SECRET");

    let keys = match (jwks_url, secret) {
        (Some(_), Some(_)) => {
            return Err(ConfigError::Invalid(
                "set only one of AUTH_JWKS_URL and AUTH_JWT_SECRET".to_string(),
            ))
        }
        (None, None) => return Err(ConfigError::MissingVar("AUTH_JWKS_URL")),
        (Some(url), None) => {
            let url = validated_http_url("AUTH_JWKS_URL", &url)?;
            let cache_ttl_secs = value_or_default(&lookup, "AUTH_JWKS_CACHE_TTL_SECS", "300")
                .parse::<u64>()
                .map_err(|_| {
                    ConfigError::Invalid(
                        "AUTH_JWKS_CACHE_TTL_SECS must be an integer >= 30".to_string(),
                    )
                })?;
            if cache_ttl_secs < 30 {
                return Err(ConfigError::Invalid(
                    "AUTH_JWKS_CACHE_TTL_SECS must be >= 30".to_string(),
                ));
            }
            AuthKeySource::Jwks {
                url,
                cache_ttl: Duration::from_secs(cache_ttl_secs),
            }
        }
        (None, Some(secret)) => {
            if secret.len() < 32 {
                return Err(ConfigError::Invalid(
                    "AUTH_JWT_SECRET must be at least 32 bytes".to_string(),
                ));
            }
            AuthKeySource::SharedSecret(secret)
        }
    };

    let issuer = optional_trimmed(&lookup, "AUTH_JWT_ISSUER");
    let audience = value_or_default(&lookup, "AUTH_JWT_AUDIENCE", "authenticated");
    let clock_skew = Duration::from_secs(bounded_u64(
        &lookup,
        "AUTH_CLOCK_SKEW_SECS",
        60,
        0..=300,
    )?);

    Ok(AuthConfig {
        keys,
        issuer,
        audience,
        clock_skew,
    })
}

fn parse_r2_config(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<R2RuntimeConfig>, ConfigError> {
    let account_id = optional_trimmed(&lookup, "R2_ACCOUNT_ID");
    let bucket = optional_trimmed(&lookup, "R2_BUCKET");
    let access_key_id = optional_trimmed(&lookup, "R2_ACCESS_KEY_ID");
    let secret_access_key = optional_trimmed(&lookup, "R2_SECRET_ACCESS_KEY");

    let any_set = account_id.is_some()
        || bucket.is_some()
        || access_key_id.is_some()
        || secret_access_key.is_some();
    if !any_set {
        return Ok(None);
    }

    let account_id = account_id.ok_or(ConfigError::MissingVar("R2_ACCOUNT_ID"))?;
    let bucket = bucket.ok_or(ConfigError::MissingVar("R2_BUCKET"))?;
    let access_key_id = access_key_id.ok_or(ConfigError::MissingVar("R2_ACCESS_KEY_ID"))?;
    let secret_access_key =
        secret_access_key.ok_or(ConfigError::MissingVar("R2_SECRET_ACCESS_KEY"))?;

    Ok(Some(R2RuntimeConfig {
        account_id,
        bucket,
        access_key_id,
        secret_access_key,
    }))
}

fn bounded_u64(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
    range: std::ops::RangeInclusive<u64>,
) -> Result<u64, ConfigError> {
    let out_of_range = || {
        ConfigError::Invalid(format!(
            "{name} must be an integer in [{}, {}]",
            range.start(),
            range.end()
        ))
    };
    let value = match optional_trimmed(lookup, name) {
        Some(raw) => raw.parse::<u64>().map_err(|_| out_of_range())?,
        None => default,
    };
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(out_of_range())
    }
}

fn bounded_u32(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: u32,
    range: std::ops::RangeInclusive<u32>,
) -> Result<u32, ConfigError> {
    let value = bounded_u64(
        lookup,
        name,
        u64::from(default),
        u64::from(*range.start())..=u64::from(*range.end()),
    )?;
    u32::try_from(value).map_err(|_| ConfigError::Invalid(format!("{name} is too large")))
}

fn validated_http_url(name: &str, value: &str) -> Result<String, ConfigError> {
    let parsed = Url::parse(value)
        .map_err(|error| ConfigError::Invalid(format!("{name} is not a valid URL: {error}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid(format!(
            "{name} must start with http:// or https://"
        )));
    }
    Ok(value.trim_end_matches('/').to_string())
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
