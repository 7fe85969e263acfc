use crate::attachments::AttachmentStore;
use crate::config::Config;
use crate::qiniu::QiniuUploader;
use crate::upload::{LocalUploadAction, QiniuUploadAction, UploadActions, UploadError};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Extension, Multipart, Request, State},
    extract::multipart::MultipartRejection,
    http::{HeaderName, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{any, get, post},
};
use chrono::Local;
use opentelemetry::{global, propagation::Extractor};
use redactor_utils::version_info::{RuntimeEnv, format_version_for_runtime_env};
use serde_json::Value;
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::OpenTelemetrySpanExt;

pub mod attachments;
pub mod config;
pub mod database;
pub mod qiniu;
pub mod telemetry;
pub mod upload;

struct HeaderExtractor<'a>(&'a axum::http::HeaderMap);

impl<'a> Extractor for HeaderExtractor<'a> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState<S, Q> {
    pub store: S,
    pub local: Arc<LocalUploadAction>,
    pub qiniu: Option<Arc<QiniuUploadAction<Q>>>,
}

impl<S, Q> AppState<S, Q> {
    pub fn new(store: S, actions: UploadActions<Q>) -> Self {
        Self {
            store,
            local: Arc::new(actions.local),
            qiniu: actions.qiniu.map(Arc::new),
        }
    }
}

/// Builds the application router.
///
/// Upload actions live under `/redactor/upload/{local,qiniu}`; the Qiniu
/// route exists only when its action was configured. Stored local files are
/// served back under the upload URL when that URL is a path on this host.
pub fn routes<S, Q>(store: S, actions: UploadActions<Q>, config: Config) -> Router
where
    S: AttachmentStore,
    Q: QiniuUploader,
{
    let qiniu_enabled = actions.qiniu.is_some();
    let upload_dir = actions.local.options().path.clone();
    let state = AppState::new(store, actions);

    let mut upload_routes = Router::new().route(
        "/upload/local",
        post(local_upload::<S, Q>).fallback(only_post),
    );
    if qiniu_enabled {
        upload_routes = upload_routes.route(
            "/upload/qiniu",
            post(qiniu_upload::<S, Q>).fallback(only_post),
        );
    }
    let upload_routes = upload_routes.layer(DefaultBodyLimit::max(config.upload_body_limit()));

    let mut router = Router::new()
        .route("/is-health", get(health_check::<S, Q>))
        .nest("/redactor", upload_routes);

    if let Some(prefix) = served_prefix(config.upload_url()) {
        router = router.nest_service(prefix, ServeDir::new(upload_dir));
    }

    router
        .fallback(any(catch_all))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
                // Check if the request has a trace context header
                let parent_context = global::get_text_map_propagator(|propagator| {
                    propagator.extract(&HeaderExtractor(request.headers()))
                });

                let span = tracing::info_span!(
                    "http_request",
                    http_request.method = ?request.method(),
                    http_request.uri = ?request.uri(),
                    http_request.version = ?request.version(),
                    http_request.user_agent = ?request.headers().get(axum::http::header::USER_AGENT),
                );

                span.set_parent(parent_context);

                span
            }),
        )
        .layer(Extension(config))
        .with_state(state)
}

/// Path prefix to serve stored files from, if `upload_url` is a local path.
fn served_prefix(upload_url: &str) -> Option<&str> {
    let prefix = upload_url.trim_end_matches('/');
    (prefix.starts_with('/') && prefix.len() > 1).then_some(prefix)
}

async fn local_upload<S, Q>(
    State(state): State<AppState<S, Q>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, UploadError>
where
    S: AttachmentStore,
    Q: QiniuUploader,
{
    let multipart = multipart.map_err(|e| UploadError::MalformedForm(e.body_text()))?;
    state
        .local
        .upload(&state.store, multipart, Local::now())
        .await
        .map(Json)
}

async fn qiniu_upload<S, Q>(
    State(state): State<AppState<S, Q>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>, UploadError>
where
    S: AttachmentStore,
    Q: QiniuUploader,
{
    let Some(action) = state.qiniu.as_ref() else {
        return Err(UploadError::Internal("qiniu uploads are not configured".to_owned()));
    };
    let multipart = multipart.map_err(|e| UploadError::MalformedForm(e.body_text()))?;
    action
        .upload(&state.store, multipart, Local::now())
        .await
        .map(Json)
}

async fn only_post() -> impl IntoResponse {
    (StatusCode::BAD_REQUEST, "Only POST is allowed")
}

async fn health_check<S, Q>(
    State(state): State<AppState<S, Q>>,
    Extension(config): Extension<Config>,
) -> impl IntoResponse
where
    S: AttachmentStore,
    Q: QiniuUploader,
{
    let mut response = if state.store.is_connected().await {
        (StatusCode::OK, "OK").into_response()
    } else {
        (StatusCode::BAD_GATEWAY, "502").into_response()
    };

    let env_value = config.environment().to_string();
    response.headers_mut().insert(
        HeaderName::from_static("x-service-env"),
        HeaderValue::from_str(&env_value).expect("environment header is valid ASCII"),
    );

    let runtime_env: RuntimeEnv = config.environment().into();
    let version_value = format_version_for_runtime_env(runtime_env);
    response.headers_mut().insert(
        HeaderName::from_static("x-service-version"),
        HeaderValue::from_str(&version_value).expect("version header is valid ASCII"),
    );

    response
}

async fn catch_all() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "nothing to see here")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_local_paths_are_served() {
        assert_eq!(served_prefix("/uploads"), Some("/uploads"));
        assert_eq!(served_prefix("/statics/"), Some("/statics"));
        assert_eq!(served_prefix("/"), None);
        assert_eq!(served_prefix("http://cdn.example.com/uploads"), None);
    }
}
