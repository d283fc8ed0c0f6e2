use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
};
use bribebank_shared::api::{
    AuthReq, AuthResp, CreateUserReq, ErrorCode, JoinCodeResp, JoinFamilyReq, JoinFamilyResp,
    MeResp, RegisterReq, RegisterResp, UpdatePasswordReq, UpdateUserReq, UserDto,
};
use tracing::{info, warn};

use crate::lifecycle::{Outcome, accounts};
use crate::server::auth::{AuthCtx, issue_token};
use crate::server::{AppError, AppState};

pub async fn api_auth_register(
    State(state): State<AppState>,
    Json(body): Json<RegisterReq>,
) -> Result<(StatusCode, Json<RegisterResp>), AppError> {
    let reg = state
        .run(move |conn| accounts::register(conn, body).map(Outcome::new))
        .await?;
    let token = issue_token(&state, &reg.user).await?;
    let user = reg.user.to_dto()?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResp {
            token,
            join_code: reg.join_code,
            user,
        }),
    ))
}

pub async fn api_auth_login(
    State(state): State<AppState>,
    Json(body): Json<AuthReq>,
) -> Result<Json<AuthResp>, AppError> {
    let (Some(username), Some(password)) = (body.username, body.password) else {
        return Err(AppError::BadRequest(ErrorCode::MissingFields));
    };
    let login_name = username.clone();
    let user = state
        .query(move |conn| accounts::authenticate(conn, &username, &password))
        .await
        .inspect_err(|_| warn!(username = %login_name, "login: rejected"))?;
    let token = issue_token(&state, &user).await?;
    info!(user_id = %user.id, "login: ok");
    Ok(Json(AuthResp {
        token,
        user: user.to_dto()?,
    }))
}

pub async fn api_auth_join_family(
    State(state): State<AppState>,
    Json(body): Json<JoinFamilyReq>,
) -> Result<(StatusCode, Json<JoinFamilyResp>), AppError> {
    let joined = state
        .run(move |conn| accounts::join_family(conn, body))
        .await?;
    let token = issue_token(&state, &joined.user).await?;
    Ok((
        StatusCode::CREATED,
        Json(JoinFamilyResp {
            token,
            family_name: joined.family_name,
            user: joined.user.to_dto()?,
        }),
    ))
}

pub async fn api_auth_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Result<Json<MeResp>, AppError> {
    let me = state
        .query(move |conn| accounts::me(conn, &auth.user_id))
        .await?;
    Ok(Json(me))
}

pub async fn api_list_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(family_id): Path<String>,
) -> Result<Json<Vec<UserDto>>, AppError> {
    let users = state
        .query(move |conn| accounts::list_members(conn, &auth.user_id, &family_id))
        .await?;
    Ok(Json(users))
}

pub async fn api_create_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(family_id): Path<String>,
    Json(body): Json<CreateUserReq>,
) -> Result<(StatusCode, Json<UserDto>), AppError> {
    let user = state
        .run(move |conn| accounts::create_member(conn, &auth.user_id, &family_id, body))
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn api_delete_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .run(move |conn| accounts::delete_member(conn, &auth.user_id, &user_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn api_update_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(user_id): Path<String>,
    Json(body): Json<UpdateUserReq>,
) -> Result<Json<UserDto>, AppError> {
    let user = state
        .run(move |conn| accounts::update_member(conn, &auth.user_id, &user_id, body))
        .await?;
    Ok(Json(user))
}

pub async fn api_change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(user_id): Path<String>,
    Json(body): Json<UpdatePasswordReq>,
) -> Result<StatusCode, AppError> {
    state
        .run(move |conn| accounts::change_password(conn, &auth.user_id, &user_id, body))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn api_regenerate_join_code(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
    Path(family_id): Path<String>,
) -> Result<Json<JoinCodeResp>, AppError> {
    let resp = state
        .run(move |conn| {
            accounts::regenerate_join_code(conn, &auth.user_id, &family_id).map(Outcome::new)
        })
        .await?;
    Ok(Json(resp))
}
