use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
};
use bribebank_shared::api::{HistoryEventDto, NotificationDto};
use serde::Deserialize;

use crate::lifecycle::{Outcome, inbox};
use crate::server::auth::AuthCtx;
use crate::server::{AppError, AppState};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    user_id: Option<String>,
}

pub async fn api_history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(family_id): Path<String>,
    Query(q): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryEventDto>>, AppError> {
    let events = state
        .query(move |conn| {
            inbox::history(conn, &auth.user_id, &family_id, q.user_id.as_deref())
        })
        .await?;
    Ok(Json(events))
}

pub async fn api_notifications(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<NotificationDto>>, AppError> {
    let items = state
        .query(move |conn| inbox::unread(conn, &auth.user_id, &user_id))
        .await?;
    Ok(Json(items))
}

pub async fn api_mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
) -> Result<Json<NotificationDto>, AppError> {
    let item = state
        .run(move |conn| inbox::mark_read(conn, &auth.user_id, &id).map(Outcome::new))
        .await?;
    Ok(Json(item))
}

pub async fn api_read_all(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .run(move |conn| inbox::mark_all_read(conn, &auth.user_id, &user_id).map(Outcome::new))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
