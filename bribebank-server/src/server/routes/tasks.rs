use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
};
use bribebank_shared::api::{AssignBountyReq, BountyAssignmentDto, VerifyBountyResp};

use crate::lifecycle::tasks;
use crate::server::auth::AuthCtx;
use crate::server::{AppError, AppState};

pub async fn api_list_assignments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(family_id): Path<String>,
) -> Result<Json<Vec<BountyAssignmentDto>>, AppError> {
    let items = state
        .query(move |conn| tasks::list(conn, &auth.user_id, &family_id))
        .await?;
    Ok(Json(items))
}

pub async fn api_assign_bounty(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(family_id): Path<String>,
    Json(body): Json<AssignBountyReq>,
) -> Result<(StatusCode, Json<BountyAssignmentDto>), AppError> {
    let assignment = state
        .run(move |conn| tasks::assign(conn, &auth.user_id, &family_id, body))
        .await?;
    Ok((StatusCode::CREATED, Json(assignment)))
}

pub async fn api_accept(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
) -> Result<Json<BountyAssignmentDto>, AppError> {
    let assignment = state
        .run(move |conn| tasks::accept(conn, &auth.user_id, &id))
        .await?;
    Ok(Json(assignment))
}

pub async fn api_complete(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
) -> Result<Json<BountyAssignmentDto>, AppError> {
    let assignment = state
        .run(move |conn| tasks::complete(conn, &auth.user_id, &id))
        .await?;
    Ok(Json(assignment))
}

pub async fn api_verify(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
) -> Result<Json<VerifyBountyResp>, AppError> {
    let resp = state
        .run(move |conn| tasks::verify(conn, &auth.user_id, &id))
        .await?;
    Ok(Json(resp))
}

pub async fn api_delete_assignment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .run(move |conn| tasks::delete(conn, &auth.user_id, &id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
