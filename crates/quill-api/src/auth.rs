use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use quill_core::util::user_fingerprint;
use quill_core::AuthUser;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::config::{AuthConfig, AuthKeySource};
use crate::error::AppError;
use crate::routes::AppState;

/// Caller identity attached to protected requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: String,
    pub display_name: String,
    pub session_id: Option<String>,
}

impl From<AuthenticatedUser> for AuthUser {
    fn from(user: AuthenticatedUser) -> Self {
        Self::new(user.user_id, user.display_name)
    }
}

#[derive(Clone)]
pub struct JwtVerifier {
    client: reqwest::Client,
    config: Arc<AuthConfig>,
    cache: Arc<RwLock<JwksCache>>,
}

impl JwtVerifier {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config: Arc::new(config),
            cache: Arc::new(RwLock::new(JwksCache::default())),
        }
    }

    pub async fn verify_access_token(&self, token: &str) -> Result<AuthenticatedUser, AppError> {
        let header = decode_header(token).map_err(|error| {
            AppError::unauthorized(format!("Token header decode failed: {}", sanitize(&error)))
        })?;

        let (key, algorithm) = match &self.config.keys {
            AuthKeySource::SharedSecret(secret) => {
                (DecodingKey::from_secret(secret.as_bytes()), Algorithm::HS256)
            }
            AuthKeySource::Jwks { url, cache_ttl } => {
                let kid = header
                    .kid
                    .ok_or_else(|| AppError::unauthorized("Token header missing `kid`"))?;
                (self.find_key(url, *cache_ttl, &kid).await?, Algorithm::RS256)
            }
        };

        let mut validation = Validation::new(algorithm);
        validation.validate_aud = false;
        validation.leeway = self.config.clock_skew.as_secs();
        if let Some(issuer) = &self.config.issuer {
            validation.set_issuer(&[issuer.as_str()]);
        }

        let decoded = decode::<AccessClaims>(token, &key, &validation).map_err(|error| {
            AppError::unauthorized(format!("Token validation failed: {}", sanitize(&error)))
        })?;
        let claims = decoded.claims;

        if !audience_matches(claims.aud.as_ref(), &self.config.audience) {
            return Err(AppError::unauthorized("Token audience is not allowed"));
        }
        if claims.sub.trim().is_empty() {
            return Err(AppError::unauthorized("Token subject is missing"));
        }
        validate_temporal_claims(&claims, self.config.clock_skew)?;

        let display_name = display_name_for(&claims);
        Ok(AuthenticatedUser {
            user_id: claims.sub,
            display_name,
            session_id: claims.session_id.or(claims.jti),
        })
    }

    async fn find_key(
        &self,
        jwks_url: &str,
        ttl: Duration,
        kid: &str,
    ) -> Result<DecodingKey, AppError> {
        {
            let cache = self.cache.read().await;
            if !cache.is_stale(ttl) {
                if let Some(key) = cache.keys.get(kid) {
                    return Ok(key.clone());
                }
            }
        }

        let mut cache = self.cache.write().await;
        if !cache.is_stale(ttl) {
            if let Some(key) = cache.keys.get(kid) {
                return Ok(key.clone());
            }
        }

        let keys = fetch_jwks(&self.client, jwks_url).await?;
        cache.keys = keys;
        cache.fetched_at = Some(Instant::now());

        cache
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| AppError::unauthorized("Signing key not found in JWKS"))
    }
}

/// Reject requests without a valid bearer token and attach the caller.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(request.headers())?;
    let user = state.verifier.verify_access_token(token).await?;
    tracing::debug!(
        user = user_fingerprint(&user.user_id),
        session = user.session_id.as_deref().unwrap_or("none"),
        "Authenticated request"
    );
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get("authorization")
        .ok_or_else(|| AppError::unauthorized("Missing Authorization header"))?
        .to_str()
        .map_err(|_| AppError::unauthorized("Authorization header is not valid UTF-8"))?;

    let (scheme, token) = header
        .split_once(' ')
        .ok_or_else(|| AppError::unauthorized("Authorization header must be `Bearer <token>`"))?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AppError::unauthorized(
            "Authorization scheme must be `Bearer`",
        ));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(AppError::unauthorized("Bearer token is empty"));
    }

    Ok(token)
}

#[derive(Default)]
struct JwksCache {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Option<Instant>,
}

impl JwksCache {
    fn is_stale(&self, ttl: Duration) -> bool {
        self.fetched_at.map_or(true, |at| at.elapsed() > ttl)
    }
}

#[derive(Debug, Deserialize)]
struct JwksDocument {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: Option<String>,
    kty: Option<String>,
    #[serde(rename = "use")]
    usage: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccessClaims {
    sub: String,
    aud: Option<Value>,
    exp: Option<i64>,
    iat: Option<i64>,
    nbf: Option<i64>,
    jti: Option<String>,
    session_id: Option<String>,
    name: Option<String>,
    email: Option<String>,
    user_metadata: Option<Value>,
}

/// Pick the friendliest name a token offers, falling back to the subject.
fn display_name_for(claims: &AccessClaims) -> String {
    let metadata_field = |field: &str| {
        claims
            .user_metadata
            .as_ref()
            .and_then(|metadata| metadata.get(field))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    metadata_field("name")
        .or_else(|| metadata_field("full_name"))
        .or_else(|| claims.name.clone())
        .or_else(|| {
            claims
                .email
                .as_deref()
                .and_then(|email| email.split('@').next())
                .map(str::to_string)
        })
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| claims.sub.clone())
}

fn validate_temporal_claims(claims: &AccessClaims, clock_skew: Duration) -> Result<(), AppError> {
    let now = chrono::Utc::now().timestamp();
    let skew = i64::try_from(clock_skew.as_secs()).unwrap_or(0);

    let exp = claims
        .exp
        .ok_or_else(|| AppError::unauthorized("Token missing `exp` claim"))?;
    if exp <= now.saturating_sub(skew) {
        return Err(AppError::unauthorized("Token is expired"));
    }

    let iat = claims
        .iat
        .ok_or_else(|| AppError::unauthorized("Token missing `iat` claim"))?;
    if iat > now.saturating_add(skew) {
        return Err(AppError::unauthorized("Token `iat` is in the future"));
    }

    if let Some(nbf) = claims.nbf {
        if nbf > now.saturating_add(skew) {
            return Err(AppError::unauthorized("Token is not yet valid"));
        }
    }

    Ok(())
}

async fn fetch_jwks(
    client: &reqwest::Client,
    jwks_url: &str,
) -> Result<HashMap<String, DecodingKey>, AppError> {
    let response = client
        .get(jwks_url)
        .header("Accept", "application/json")
        .send()
        .await
        .map_err(|error| {
            AppError::external(format!("JWKS request failed: {}", sanitize(&error)))
        })?;

    if !response.status().is_success() {
        return Err(AppError::external(format!(
            "JWKS request failed with HTTP {}",
            response.status().as_u16()
        )));
    }

    let payload = response.json::<JwksDocument>().await.map_err(|error| {
        AppError::external(format!("JWKS JSON parse failed: {}", sanitize(&error)))
    })?;

    let mut out = HashMap::new();
    for key in payload.keys {
        let (Some(kid), Some(n), Some(e)) = (key.kid, key.n, key.e) else {
            continue;
        };
        if key.kty.as_deref() != Some("RSA") {
            continue;
        }
        if key.usage.as_deref().is_some_and(|usage| usage != "sig") {
            continue;
        }
        let decoding = DecodingKey::from_rsa_components(&n, &e).map_err(|error| {
            AppError::external(format!("Invalid JWKS RSA key: {}", sanitize(&error)))
        })?;
        out.insert(kid, decoding);
    }

    if out.is_empty() {
        return Err(AppError::external(
            "JWKS did not include any usable RSA signing keys",
        ));
    }

    Ok(out)
}

fn audience_matches(aud: Option<&Value>, expected: &str) -> bool {
    let Some(aud) = aud else {
        return false;
    };

    match aud {
        Value::String(value) => value == expected,
        Value::Array(values) => values
            .iter()
            .filter_map(Value::as_str)
            .any(|value| value == expected),
        _ => false,
    }
}

fn sanitize(error: &impl std::fmt::Display) -> String {
    error.to_string().replace('\n', " ").trim().to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    use super::*;
    use crate::config::tests::TEST_SECRET;

    fn claims_for(sub: &str) -> AccessClaims {
        AccessClaims {
            sub: sub.to_string(),
            aud: Some(Value::String("authenticated".to_string())),
            exp: None,
            iat: None,
            nbf: None,
            jti: None,
            session_id: None,
            name: None,
            email: None,
            user_metadata: None,
        }
    }

    /// HS256 token signed with the test secret
    pub(crate) fn signed_token(sub: &str, name: &str) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = json!({
            "sub": sub,
            "aud": "authenticated",
            "exp": now + 600,
            "iat": now,
            "user_metadata": { "name": name },
        });
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn shared_secret_verifier() -> JwtVerifier {
        JwtVerifier::new(AuthConfig {
            keys: AuthKeySource::SharedSecret(TEST_SECRET.to_string()),
            issuer: None,
            audience: "authenticated".to_string(),
            clock_skew: Duration::from_secs(60),
        })
    }

    #[test]
    fn bearer_token_extractor_accepts_standard_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );

        assert_eq!(extract_bearer_token(&headers).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn bearer_token_extractor_rejects_wrong_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic abc"));
        assert!(extract_bearer_token(&headers).is_err());
    }

    #[test]
    fn audience_matches_string_or_array() {
        assert!(audience_matches(
            Some(&Value::String("authenticated".to_string())),
            "authenticated"
        ));
        assert!(audience_matches(
            Some(&json!(["anon", "authenticated"])),
            "authenticated"
        ));
        assert!(!audience_matches(
            Some(&Value::String("anon".to_string())),
            "authenticated"
        ));
        assert!(!audience_matches(None, "authenticated"));
    }

    #[test]
    fn temporal_claims_require_exp_and_iat() {
        let err = validate_temporal_claims(&claims_for("user"), Duration::from_secs(60))
            .unwrap_err();
        assert!(err.to_string().contains("missing `exp`"));
    }

    #[test]
    fn temporal_claims_reject_future_iat() {
        let now = chrono::Utc::now().timestamp();
        let mut claims = claims_for("user");
        claims.exp = Some(now + 300);
        claims.iat = Some(now + 120);
        let err = validate_temporal_claims(&claims, Duration::from_secs(30)).unwrap_err();
        assert!(err.to_string().contains("future"));
    }

    #[test]
    fn display_name_prefers_metadata_then_email() {
        let mut claims = claims_for("user-1");
        assert_eq!(display_name_for(&claims), "user-1");

        claims.email = Some("ada@example.com".to_string());
        assert_eq!(display_name_for(&claims), "ada");

        claims.name = Some("Ada L.".to_string());
        assert_eq!(display_name_for(&claims), "Ada L.");

        claims.user_metadata = Some(json!({ "full_name": "Ada Lovelace" }));
        assert_eq!(display_name_for(&claims), "Ada Lovelace");

        claims.user_metadata = Some(json!({ "name": "ada", "full_name": "Ada Lovelace" }));
        assert_eq!(display_name_for(&claims), "ada");
    }

    #[tokio::test]
    async fn shared_secret_tokens_verify() {
        let verifier = shared_secret_verifier();
        let user = verifier
            .verify_access_token(&signed_token("user-1", "Ada"))
            .await
            .unwrap();
        assert_eq!(user.user_id, "user-1");
        assert_eq!(user.display_name, "Ada");
    }

    #[tokio::test]
    async fn tokens_signed_with_another_secret_are_rejected() {
        let now = chrono::Utc::now().timestamp();
        let token = encode(
            &Header::default(),
            &json!({ "sub": "user-1", "aud": "authenticated", "exp": now + 600, "iat": now }),
            &EncodingKey::from_secret(b"some-other-secret-of-sufficient-length"),
        )
        .unwrap();

        let err = shared_secret_verifier()
            .verify_access_token(&token)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn wrong_audience_is_rejected() {
        let now = chrono::Utc::now().timestamp();
        let token = encode(
            &Header::default(),
            &json!({ "sub": "user-1", "aud": "anon", "exp": now + 600, "iat": now }),
            &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
        )
        .unwrap();

        let err = shared_secret_verifier()
            .verify_access_token(&token)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("audience"));
    }
}
