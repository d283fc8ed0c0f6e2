use axum::extract::Query;
use axum::http::{Request, header};
use axum::middleware::Next;
use axum::response::Response;
use bribebank_shared::api::API_V1_PREFIX;
use bribebank_shared::auth::Role;
use bribebank_shared::jwt::{self, JwtClaims};
use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::{error, warn};

use super::{AppError, AppState};
use crate::storage::models::User;

/// Identity attached to every authenticated request. Handlers use only
/// `user_id`; lifecycle operations reload the rest from the store.
#[derive(Clone, Debug)]
pub struct AuthCtx {
    pub user_id: String,
    pub family_id: String,
    pub role: Role,
    pub jti: String,
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// EventSource cannot set headers, so the realtime stream also takes the
/// token from the query string.
fn query_token<B>(req: &Request<B>) -> Option<String> {
    if req.uri().path() != format!("{API_V1_PREFIX}/events") {
        return None;
    }
    let Query(params) = Query::<TokenQuery>::try_from_uri(req.uri()).ok()?;
    params.token.filter(|t| !t.is_empty())
}

fn bearer_token<B>(req: &Request<B>) -> Option<String> {
    let header_str = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    header_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

pub async fn require_bearer(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let Some(token) = bearer_token(&req).or_else(|| query_token(&req)) else {
        return Err(AppError::unauthorized());
    };

    let claims = match jwt::decode_and_verify(&token, state.config.jwt_secret.as_bytes()) {
        Ok(c) => c,
        Err(e) => {
            warn!(error=%e, "auth: jwt decode failed");
            return Err(AppError::unauthorized());
        }
    };

    let cutoff = Utc::now() - Duration::days(state.config.session_idle_days);
    match state
        .store
        .touch_session_with_cutoff(&claims.jti, cutoff.naive_utc())
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            warn!(
                jti = %claims.jti,
                user_id = %claims.sub,
                idle_days = state.config.session_idle_days,
                "auth: session missing or expired"
            );
            return Err(AppError::unauthorized());
        }
        Err(e) => {
            error!(jti = %claims.jti, error=%e, "auth: touch_session_with_cutoff failed");
            return Err(AppError::internal(e));
        }
    }

    let auth = AuthCtx {
        user_id: claims.sub,
        family_id: claims.family_id,
        role: claims.role,
        jti: claims.jti,
    };
    req.extensions_mut().insert(auth);
    Ok(next.run(req).await)
}

/// Opens a session for `user` and signs a token bound to it.
pub async fn issue_token(state: &AppState, user: &User) -> Result<String, AppError> {
    let role = user.role().map_err(AppError::internal)?;
    let jti = uuid::Uuid::new_v4().to_string();
    let exp = (Utc::now() + Duration::days(state.config.token_ttl_days)).timestamp();
    let claims = JwtClaims {
        sub: user.id.clone(),
        jti: jti.clone(),
        exp,
        role,
        family_id: user.family_id.clone(),
    };

    state
        .store
        .create_session(&jti, &user.id)
        .await
        .map_err(|e| {
            error!(user_id = %user.id, error=%e, "login/register: create_session failed");
            AppError::internal(e)
        })?;
    jwt::encode(&claims, state.config.jwt_secret.as_bytes()).map_err(|e| {
        error!(user_id = %user.id, error=%e, "login/register: jwt encode failed");
        AppError::internal(e)
    })
}
