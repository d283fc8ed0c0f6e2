use axum::{
    Json,
    extract::{Extension, Path, State},
};
use bribebank_shared::api::{
    GiveTicketsReq, PurchaseReq, PurchaseResp, SpinCostDto, SpinReq, SpinResp,
    TicketBalanceResp, UpdateWheelReq, WheelConfigDto, WheelSegmentDto,
};

use crate::lifecycle::{store, wheel};
use crate::server::auth::AuthCtx;
use crate::server::{AppError, AppState};

pub async fn api_purchase(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(item_id): Path<String>,
    Json(body): Json<PurchaseReq>,
) -> Result<Json<PurchaseResp>, AppError> {
    let resp = state
        .run(move |conn| store::purchase(conn, &auth.user_id, &item_id, body))
        .await?;
    Ok(Json(resp))
}

pub async fn api_ticket_balance(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(user_id): Path<String>,
) -> Result<Json<TicketBalanceResp>, AppError> {
    let resp = state
        .query(move |conn| store::balance(conn, &auth.user_id, &user_id))
        .await?;
    Ok(Json(resp))
}

pub async fn api_give_tickets(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(user_id): Path<String>,
    Json(body): Json<GiveTicketsReq>,
) -> Result<Json<TicketBalanceResp>, AppError> {
    let resp = state
        .run(move |conn| store::give_tickets(conn, &auth.user_id, &user_id, body))
        .await?;
    Ok(Json(resp))
}

pub async fn api_wheel_segments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(family_id): Path<String>,
) -> Result<Json<Vec<WheelSegmentDto>>, AppError> {
    let segments = state
        .query(move |conn| wheel::segments(conn, &auth.user_id, &family_id))
        .await?;
    Ok(Json(segments))
}

pub async fn api_wheel_config(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(family_id): Path<String>,
) -> Result<Json<SpinCostDto>, AppError> {
    let cfg = state
        .query(move |conn| wheel::config(conn, &auth.user_id, &family_id))
        .await?;
    Ok(Json(cfg))
}

pub async fn api_update_wheel(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(family_id): Path<String>,
    Json(body): Json<UpdateWheelReq>,
) -> Result<Json<WheelConfigDto>, AppError> {
    let cfg = state
        .run(move |conn| wheel::update(conn, &auth.user_id, &family_id, body))
        .await?;
    Ok(Json(cfg))
}

pub async fn api_reset_wheel(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(family_id): Path<String>,
) -> Result<Json<WheelConfigDto>, AppError> {
    let cfg = state
        .run(move |conn| wheel::reset(conn, &auth.user_id, &family_id))
        .await?;
    Ok(Json(cfg))
}

pub async fn api_spin(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(family_id): Path<String>,
    Json(body): Json<SpinReq>,
) -> Result<Json<SpinResp>, AppError> {
    let draw = rand::random::<f64>();
    let resp = state
        .run(move |conn| wheel::spin(conn, &auth.user_id, &family_id, body, draw))
        .await?;
    Ok(Json(resp))
}
