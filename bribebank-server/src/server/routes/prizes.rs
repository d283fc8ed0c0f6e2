use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
};
use bribebank_shared::api::{AssignPrizeReq, AssignedPrizeDto};

use crate::lifecycle::prizes;
use crate::server::auth::AuthCtx;
use crate::server::{AppError, AppState};

pub async fn api_list_prizes(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(family_id): Path<String>,
) -> Result<Json<Vec<AssignedPrizeDto>>, AppError> {
    let items = state
        .query(move |conn| prizes::list(conn, &auth.user_id, &family_id))
        .await?;
    Ok(Json(items))
}

pub async fn api_assign_prize(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(family_id): Path<String>,
    Json(body): Json<AssignPrizeReq>,
) -> Result<(StatusCode, Json<AssignedPrizeDto>), AppError> {
    let prize = state
        .run(move |conn| prizes::assign(conn, &auth.user_id, &family_id, body))
        .await?;
    Ok((StatusCode::CREATED, Json(prize)))
}

pub async fn api_claim(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
) -> Result<Json<AssignedPrizeDto>, AppError> {
    let prize = state
        .run(move |conn| prizes::claim(conn, &auth.user_id, &id))
        .await?;
    Ok(Json(prize))
}

pub async fn api_approve(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
) -> Result<Json<AssignedPrizeDto>, AppError> {
    let prize = state
        .run(move |conn| prizes::approve(conn, &auth.user_id, &id))
        .await?;
    Ok(Json(prize))
}

pub async fn api_reject(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
) -> Result<Json<AssignedPrizeDto>, AppError> {
    let prize = state
        .run(move |conn| prizes::reject(conn, &auth.user_id, &id))
        .await?;
    Ok(Json(prize))
}

pub async fn api_delete_prize(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .run(move |conn| prizes::delete(conn, &auth.user_id, &id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
