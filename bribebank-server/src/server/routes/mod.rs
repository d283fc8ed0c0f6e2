//! HTTP handlers. Each one extracts its inputs, runs exactly one lifecycle
//! operation and maps the result.

pub mod accounts;
pub mod catalog;
pub mod economy;
pub mod inbox;
pub mod prizes;
pub mod push;
pub mod tasks;

use std::convert::Infallible;

use axum::extract::{Extension, State};
use axum::response::sse::{Event, Sse};
use futures::Stream;
use tracing::info;

use super::AppState;
use super::auth::AuthCtx;
use super::realtime;

pub async fn api_events(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthCtx>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let receiver = state.hub.subscribe();
    info!(user_id = %auth.user_id, family_id = %auth.family_id, "realtime: stream opened");
    realtime::family_stream(
        receiver,
        auth.family_id,
        state.keepalive(),
        state.shutdown_token(),
    )
}
