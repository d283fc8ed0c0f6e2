use axum::{
    Json,
    extract::{Extension, State},
    http::StatusCode,
};
use bribebank_shared::api::{
    ErrorCode, PushPublicKeyResp, PushSubscribeReq, PushSubscribeResp, PushUnsubscribeReq,
};
use tracing::info;

use crate::server::auth::AuthCtx;
use crate::server::{AppError, AppState};

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub async fn api_push_public_key(
    State(state): State<AppState>,
) -> Result<Json<PushPublicKeyResp>, AppError> {
    let key = state
        .config
        .vapid_public_key()
        .ok_or_else(|| AppError::Internal {
            code: ErrorCode::PushNotConfigured,
            detail: "push requested but VAPID keys are not configured".to_string(),
        })?;
    Ok(Json(PushPublicKeyResp {
        public_key: key.to_string(),
    }))
}

pub async fn api_push_subscribe(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Json(body): Json<PushSubscribeReq>,
) -> Result<(StatusCode, Json<PushSubscribeResp>), AppError> {
    let keys = body
        .keys
        .ok_or(AppError::BadRequest(ErrorCode::InvalidSubscription))?;
    let (Some(endpoint), Some(p256dh), Some(auth_key)) = (
        non_empty(body.endpoint),
        non_empty(keys.p256dh),
        non_empty(keys.auth),
    ) else {
        return Err(AppError::BadRequest(ErrorCode::InvalidSubscription));
    };

    let (row, created) = state
        .store
        .upsert_push_subscription(&auth.family_id, &auth.user_id, &endpoint, &p256dh, &auth_key)
        .await?;
    info!(user_id = %auth.user_id, subscription_id = row.id, created, "push: subscription saved");
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(PushSubscribeResp { id: row.id })))
}

pub async fn api_push_unsubscribe(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Json(body): Json<PushUnsubscribeReq>,
) -> Result<StatusCode, AppError> {
    let endpoint =
        non_empty(body.endpoint).ok_or(AppError::BadRequest(ErrorCode::MissingEndpoint))?;
    let removed = state
        .store
        .delete_push_subscription(&auth.user_id, &endpoint)
        .await?;
    info!(user_id = %auth.user_id, removed, "push: unsubscribe");
    Ok(StatusCode::NO_CONTENT)
}
