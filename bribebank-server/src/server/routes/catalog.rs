use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
};
use bribebank_shared::api::{
    BountyTemplateDto, BountyTemplateReq, RewardTemplateDto, RewardTemplateReq, StoreItemDto,
    StoreItemReq,
};

use crate::lifecycle::catalog;
use crate::server::auth::AuthCtx;
use crate::server::{AppError, AppState};

pub async fn api_list_reward_templates(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(family_id): Path<String>,
) -> Result<Json<Vec<RewardTemplateDto>>, AppError> {
    let items = state
        .query(move |conn| catalog::list_reward_templates(conn, &auth.user_id, &family_id))
        .await?;
    Ok(Json(items))
}

pub async fn api_create_reward_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(family_id): Path<String>,
    Json(body): Json<RewardTemplateReq>,
) -> Result<(StatusCode, Json<RewardTemplateDto>), AppError> {
    let item = state
        .run(move |conn| catalog::create_reward_template(conn, &auth.user_id, &family_id, body))
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn api_update_reward_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
    Json(body): Json<RewardTemplateReq>,
) -> Result<Json<RewardTemplateDto>, AppError> {
    let item = state
        .run(move |conn| catalog::update_reward_template(conn, &auth.user_id, &id, body))
        .await?;
    Ok(Json(item))
}

pub async fn api_delete_reward_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .run(move |conn| catalog::delete_reward_template(conn, &auth.user_id, &id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn api_list_bounty_templates(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(family_id): Path<String>,
) -> Result<Json<Vec<BountyTemplateDto>>, AppError> {
    let items = state
        .query(move |conn| catalog::list_bounty_templates(conn, &auth.user_id, &family_id))
        .await?;
    Ok(Json(items))
}

pub async fn api_create_bounty_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(family_id): Path<String>,
    Json(body): Json<BountyTemplateReq>,
) -> Result<(StatusCode, Json<BountyTemplateDto>), AppError> {
    let item = state
        .run(move |conn| catalog::create_bounty_template(conn, &auth.user_id, &family_id, body))
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn api_update_bounty_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
    Json(body): Json<BountyTemplateReq>,
) -> Result<Json<BountyTemplateDto>, AppError> {
    let item = state
        .run(move |conn| catalog::update_bounty_template(conn, &auth.user_id, &id, body))
        .await?;
    Ok(Json(item))
}

pub async fn api_delete_bounty_template(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .run(move |conn| catalog::delete_bounty_template(conn, &auth.user_id, &id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn api_list_store_items(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(family_id): Path<String>,
) -> Result<Json<Vec<StoreItemDto>>, AppError> {
    let items = state
        .query(move |conn| catalog::list_store_items(conn, &auth.user_id, &family_id))
        .await?;
    Ok(Json(items))
}

pub async fn api_create_store_item(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(family_id): Path<String>,
    Json(body): Json<StoreItemReq>,
) -> Result<(StatusCode, Json<StoreItemDto>), AppError> {
    let item = state
        .run(move |conn| catalog::create_store_item(conn, &auth.user_id, &family_id, body))
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn api_update_store_item(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
    Json(body): Json<StoreItemReq>,
) -> Result<Json<StoreItemDto>, AppError> {
    let item = state
        .run(move |conn| catalog::update_store_item(conn, &auth.user_id, &id, body))
        .await?;
    Ok(Json(item))
}

pub async fn api_delete_store_item(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .run(move |conn| catalog::delete_store_item(conn, &auth.user_id, &id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
