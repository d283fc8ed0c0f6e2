pub mod auth;
mod config;
mod dispatch;
pub mod push;
pub mod realtime;
mod routes;

use std::time::Duration;

use axum::http::{HeaderName, HeaderValue};
use axum::middleware;
use axum::response::Response as AxumResponse;
use axum::{
    Router,
    http::{Method, StatusCode, header},
    routing::{delete, get, patch, post, put},
};
use bribebank_shared::api::{ErrorBody, ErrorCode};
use diesel::SqliteConnection;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{Span, info_span};
use uuid::Uuid;

pub use config::{AppConfig, ConfigError, DEFAULT_LISTEN_PORT, PushConfig, RealtimeConfig};

use crate::lifecycle::{LifecycleError, Outcome};
use crate::server::auth::AuthCtx;
use crate::storage::{StorageError, Store};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Store,
    pub hub: realtime::EventHub,
    pub push: Option<push::PushService>,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: AppConfig, store: Store) -> Self {
        let hub = realtime::EventHub::new(config.realtime.channel_capacity);
        let push = push::PushService::from_config(&config);
        Self {
            config,
            store,
            hub,
            push,
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancelled on shutdown; ends open realtime streams.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn keepalive(&self) -> Duration {
        Duration::from_secs(self.config.realtime.keepalive_secs.max(1))
    }

    /// Runs a lifecycle operation in one immediate transaction and, once it
    /// has committed, dispatches its effects.
    pub(crate) async fn run<T, F>(&self, op: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<Outcome<T>, LifecycleError> + Send + 'static,
        T: Send + 'static,
    {
        let outcome = self.store.transact(op).await?;
        dispatch::dispatch(self, outcome.effects);
        Ok(outcome.value)
    }

    pub(crate) async fn query<T, F>(&self, op: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, LifecycleError> + Send + 'static,
        T: Send + 'static,
    {
        Ok(self.store.read(op).await?)
    }
}

#[derive(Clone, Debug)]
struct ReqId(pub String);

pub fn router(state: AppState) -> Router {
    let private = Router::new()
        .route("/api/v1/events", get(routes::api_events))
        .route("/api/v1/auth/me", get(routes::accounts::api_auth_me))
        .route(
            "/api/v1/push/subscriptions",
            post(routes::push::api_push_subscribe),
        )
        .route(
            "/api/v1/push/subscriptions/unsubscribe",
            post(routes::push::api_push_unsubscribe),
        )
        // family administration
        .route(
            "/api/v1/families/{family_id}/users",
            get(routes::accounts::api_list_members).post(routes::accounts::api_create_member),
        )
        .route(
            "/api/v1/families/{family_id}/join-code",
            post(routes::accounts::api_regenerate_join_code),
        )
        .route(
            "/api/v1/users/{user_id}",
            patch(routes::accounts::api_update_member).delete(routes::accounts::api_delete_member),
        )
        .route(
            "/api/v1/users/{user_id}/password",
            patch(routes::accounts::api_change_password),
        )
        // catalogues
        .route(
            "/api/v1/families/{family_id}/reward-templates",
            get(routes::catalog::api_list_reward_templates)
                .post(routes::catalog::api_create_reward_template),
        )
        .route(
            "/api/v1/reward-templates/{id}",
            put(routes::catalog::api_update_reward_template)
                .delete(routes::catalog::api_delete_reward_template),
        )
        .route(
            "/api/v1/families/{family_id}/bounty-templates",
            get(routes::catalog::api_list_bounty_templates)
                .post(routes::catalog::api_create_bounty_template),
        )
        .route(
            "/api/v1/bounty-templates/{id}",
            put(routes::catalog::api_update_bounty_template)
                .delete(routes::catalog::api_delete_bounty_template),
        )
        .route(
            "/api/v1/families/{family_id}/store-items",
            get(routes::catalog::api_list_store_items)
                .post(routes::catalog::api_create_store_item),
        )
        .route(
            "/api/v1/store-items/{id}",
            put(routes::catalog::api_update_store_item)
                .delete(routes::catalog::api_delete_store_item),
        )
        // task lifecycle
        .route(
            "/api/v1/families/{family_id}/bounty-assignments",
            get(routes::tasks::api_list_assignments).post(routes::tasks::api_assign_bounty),
        )
        .route(
            "/api/v1/bounty-assignments/{id}",
            delete(routes::tasks::api_delete_assignment),
        )
        .route(
            "/api/v1/bounty-assignments/{id}/accept",
            post(routes::tasks::api_accept),
        )
        .route(
            "/api/v1/bounty-assignments/{id}/complete",
            post(routes::tasks::api_complete),
        )
        .route(
            "/api/v1/bounty-assignments/{id}/verify",
            post(routes::tasks::api_verify),
        )
        // reward lifecycle
        .route(
            "/api/v1/families/{family_id}/assigned-prizes",
            get(routes::prizes::api_list_prizes).post(routes::prizes::api_assign_prize),
        )
        .route(
            "/api/v1/assigned-prizes/{id}",
            delete(routes::prizes::api_delete_prize),
        )
        .route(
            "/api/v1/assigned-prizes/{id}/claim",
            post(routes::prizes::api_claim),
        )
        .route(
            "/api/v1/assigned-prizes/{id}/approve",
            post(routes::prizes::api_approve),
        )
        .route(
            "/api/v1/assigned-prizes/{id}/reject",
            post(routes::prizes::api_reject),
        )
        // tickets, store and wheel
        .route(
            "/api/v1/store-items/{id}/purchase",
            post(routes::economy::api_purchase),
        )
        .route(
            "/api/v1/users/{user_id}/tickets",
            get(routes::economy::api_ticket_balance).post(routes::economy::api_give_tickets),
        )
        .route(
            "/api/v1/families/{family_id}/wheel-segments",
            get(routes::economy::api_wheel_segments).put(routes::economy::api_update_wheel),
        )
        .route(
            "/api/v1/families/{family_id}/wheel-segments/spin",
            post(routes::economy::api_spin),
        )
        .route(
            "/api/v1/families/{family_id}/wheel-segments/reset",
            post(routes::economy::api_reset_wheel),
        )
        .route(
            "/api/v1/families/{family_id}/wheel-config",
            get(routes::economy::api_wheel_config),
        )
        // read models
        .route(
            "/api/v1/families/{family_id}/history",
            get(routes::inbox::api_history),
        )
        .route(
            "/api/v1/users/{user_id}/notifications",
            get(routes::inbox::api_notifications),
        )
        .route(
            "/api/v1/users/{user_id}/notifications/read-all",
            post(routes::inbox::api_read_all),
        )
        .route(
            "/api/v1/notifications/{id}/read",
            post(routes::inbox::api_mark_read),
        )
        .with_state(state.clone())
        .layer(middleware::from_fn(set_auth_span_fields))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ));

    // Trace with request context (method, path, request_id)
    let trace = TraceLayer::new_for_http().make_span_with(|req: &axum::http::Request<_>| {
        let request_id = req
            .extensions()
            .get::<ReqId>()
            .map(|r| r.0.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        info_span!(
            "request",
            method = %req.method(),
            path = %req.uri().path(),
            request_id = %request_id,
            user_id = tracing::field::Empty,
            family_id = tracing::field::Empty,
            role = tracing::field::Empty
        )
    });

    let app = Router::new()
        .route("/healthz", get(health))
        .route(
            "/api/v1/auth/register",
            post(routes::accounts::api_auth_register),
        )
        .route("/api/v1/auth/login", post(routes::accounts::api_auth_login))
        .route(
            "/api/v1/auth/join-family",
            post(routes::accounts::api_auth_join_family),
        )
        .route(
            "/api/v1/push/public-key",
            get(routes::push::api_push_public_key),
        )
        .merge(private)
        .with_state(state.clone())
        .layer(trace)
        .layer(middleware::from_fn(add_security_headers))
        .layer(middleware::from_fn(add_request_id));

    // Optionally add CORS for dev if configured
    if let Some(origin) = &state.config.dev_cors_origin {
        let hv = header::HeaderValue::from_str(origin)
            .unwrap_or(header::HeaderValue::from_static("http://localhost:5173"));
        let cors = CorsLayer::new()
            .allow_origin(hv)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
        app.layer(cors)
    } else {
        app
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn add_request_id(
    mut req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    let hdr = HeaderName::from_static("x-request-id");
    let rid = req
        .headers()
        .get(&hdr)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    req.extensions_mut().insert(ReqId(rid.clone()));
    let mut resp = next.run(req).await;
    if let Ok(hv) = HeaderValue::from_str(&rid) {
        resp.headers_mut().insert(hdr, hv);
    }
    Ok(resp)
}

async fn add_security_headers(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    let path = req.uri().path().to_string();
    let mut resp = next.run(req).await;

    let headers = resp.headers_mut();
    headers.insert(
        HeaderName::from_static("x-content-type-options"),
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        HeaderName::from_static("x-frame-options"),
        HeaderValue::from_static("SAMEORIGIN"),
    );
    headers.insert(
        HeaderName::from_static("referrer-policy"),
        HeaderValue::from_static("no-referrer"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-resource-policy"),
        HeaderValue::from_static("same-origin"),
    );

    // API answers are per-user; never cache them
    if path == "/healthz" || path.starts_with("/api/") {
        headers.insert(
            HeaderName::from_static("cache-control"),
            HeaderValue::from_static("no-store, no-cache, must-revalidate, private"),
        );
        headers.insert(
            HeaderName::from_static("pragma"),
            HeaderValue::from_static("no-cache"),
        );
    }

    Ok(resp)
}

async fn set_auth_span_fields(
    req: axum::http::Request<axum::body::Body>,
    next: axum::middleware::Next,
) -> Result<AxumResponse, AppError> {
    if let Some(auth) = req.extensions().get::<AuthCtx>() {
        let span = Span::current();
        span.record("user_id", tracing::field::display(&auth.user_id));
        span.record("family_id", tracing::field::display(&auth.family_id));
        span.record("role", tracing::field::display(&auth.role));
    }
    Ok(next.run(req).await)
}

/// HTTP face of every failure. The body is always `{"error": CODE}`.
#[derive(Debug)]
pub enum AppError {
    BadRequest(ErrorCode),
    Unauthorized(ErrorCode),
    Forbidden(ErrorCode),
    NotFound(ErrorCode),
    Conflict(ErrorCode),
    /// Detail is logged, never returned.
    Internal { code: ErrorCode, detail: String },
}

impl AppError {
    fn unauthorized() -> Self {
        Self::Unauthorized(ErrorCode::Unauthenticated)
    }
    fn internal<E: std::fmt::Display>(e: E) -> Self {
        Self::Internal {
            code: ErrorCode::InternalServerError,
            detail: e.to_string(),
        }
    }
}

impl From<LifecycleError> for AppError {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::Validation(c) | LifecycleError::InvalidState(c) => {
                AppError::BadRequest(c)
            }
            LifecycleError::Unauthenticated(c) => AppError::Unauthorized(c),
            LifecycleError::Forbidden(c) => AppError::Forbidden(c),
            LifecycleError::NotFound(c) => AppError::NotFound(c),
            LifecycleError::Conflict(c) => AppError::Conflict(c),
            other @ (LifecycleError::Storage(_) | LifecycleError::Password(_)) => {
                AppError::internal(other)
            }
        }
    }
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        AppError::internal(e)
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self {
            AppError::BadRequest(c) => (StatusCode::BAD_REQUEST, *c),
            AppError::Unauthorized(c) => (StatusCode::UNAUTHORIZED, *c),
            AppError::Forbidden(c) => (StatusCode::FORBIDDEN, *c),
            AppError::NotFound(c) => (StatusCode::NOT_FOUND, *c),
            AppError::Conflict(c) => (StatusCode::CONFLICT, *c),
            AppError::Internal { code, .. } => (StatusCode::INTERNAL_SERVER_ERROR, *code),
        };
        match &self {
            AppError::Internal { detail, .. } => {
                tracing::error!(status = %status, code = %code, detail = %detail, "request failed");
            }
            _ => tracing::warn!(status = %status, code = %code, "request rejected"),
        }
        (status, axum::Json(ErrorBody { error: code })).into_response()
    }
}
