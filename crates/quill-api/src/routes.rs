use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use chrono::Utc;
use quill_core::search::normalize_search_query;
use quill_core::services::BlogService;
use quill_core::storage::UploadTarget;
use quill_core::util::user_fingerprint;
use quill_core::{AuthUser, Caller, Comment, NewComment, NewPost, PostId, PostView, SearchHit};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{require_auth, AuthenticatedUser, JwtVerifier};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::media::MediaStore;
use crate::rate_limit::{EndpointRateLimiter, ProtectedEndpoint, RateLimitMetricsSnapshot};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    blog: BlogService<MediaStore>,
    pub(crate) verifier: Arc<JwtVerifier>,
    rate_limiter: Arc<EndpointRateLimiter>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, blog: BlogService<MediaStore>) -> Self {
        Self {
            verifier: Arc::new(JwtVerifier::new(config.auth.clone())),
            rate_limiter: Arc::new(EndpointRateLimiter::from_config(config.as_ref())),
            blog,
            config,
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/posts", get(list_posts))
        .route("/posts/search", get(search_posts))
        .route("/posts/{id}", get(get_post))
        .route("/posts/{id}/comments", get(list_comments));

    let protected_routes = Router::new()
        .route("/posts", post(create_post))
        .route("/uploads", post(generate_upload_url))
        .route("/posts/{id}/comments", post(create_comment))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/v1", public_routes.merge(protected_routes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods(Any),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    rate_limit: RateLimitMetricsSnapshot,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        rate_limit: state.rate_limiter.metrics_snapshot(),
    })
}

#[derive(Debug, Serialize)]
struct CreatedResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    query: String,
    limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct UploadRequest {
    content_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentRequest {
    body: String,
}

fn parse_post_id(raw: &str) -> Result<PostId, AppError> {
    raw.parse()
        .map_err(|_| AppError::bad_request(format!("`{raw}` is not a valid post id")))
}

fn caller_for(user: AuthenticatedUser) -> Caller {
    Caller::from(AuthUser::from(user))
}

async fn list_posts(State(state): State<AppState>) -> Result<Json<Vec<PostView>>, AppError> {
    Ok(Json(state.blog.list_posts().await?))
}

async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PostView>, AppError> {
    let id = parse_post_id(&id)?;
    Ok(Json(state.blog.get_post(&id).await?))
}

async fn search_posts(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<Vec<SearchHit>>, AppError> {
    let query = normalize_search_query(&params.query)?;
    let limit = params
        .limit
        .unwrap_or(state.config.search_default_limit)
        .min(state.config.search_max_limit);

    let hits = state.blog.search_posts(&query, limit).await?;
    tracing::debug!(
        endpoint = "search_posts",
        query_len = query.len(),
        limit,
        hits = hits.len(),
        "Searched posts"
    );
    Ok(Json(hits))
}

async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Comment>>, AppError> {
    let id = parse_post_id(&id)?;
    Ok(Json(state.blog.list_comments(&id).await?))
}

async fn create_post(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<NewPost>,
) -> Result<(StatusCode, Json<CreatedResponse>), AppError> {
    state
        .rate_limiter
        .check(ProtectedEndpoint::PostWrite, &user.user_id)
        .await?;

    let user_hash = user_fingerprint(&user.user_id);
    let id = state.blog.create_post(&caller_for(user), request).await?;
    tracing::info!(endpoint = "create_post", user = user_hash, post = %id, "Post created");
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse { id: id.as_str() }),
    ))
}

async fn generate_upload_url(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    body: Bytes,
) -> Result<Json<UploadTarget>, AppError> {
    state
        .rate_limiter
        .check(ProtectedEndpoint::PostWrite, &user.user_id)
        .await?;

    // An empty body means "no content type"
    let request: UploadRequest = if body.is_empty() {
        UploadRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|error| AppError::bad_request(format!("Invalid upload request: {error}")))?
    };
    let user_hash = user_fingerprint(&user.user_id);
    let target = state
        .blog
        .generate_upload_url(&caller_for(user), request.content_type.as_deref())
        .await?;
    tracing::info!(
        endpoint = "generate_upload_url",
        user = user_hash,
        "Issued presigned upload URL"
    );
    Ok(Json(target))
}

async fn create_comment(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    Json(request): Json<CommentRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), AppError> {
    let post_id = parse_post_id(&id)?;
    state
        .rate_limiter
        .check(ProtectedEndpoint::CommentWrite, &user.user_id)
        .await?;

    let user_hash = user_fingerprint(&user.user_id);
    let id = state
        .blog
        .create_comment(&caller_for(user), NewComment::new(post_id, request.body))
        .await?;
    tracing::info!(
        endpoint = "create_comment",
        user = user_hash,
        post = %post_id,
        "Comment created"
    );
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse { id: id.as_str() }),
    ))
}
