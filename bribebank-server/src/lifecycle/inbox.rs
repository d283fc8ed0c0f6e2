//! Family history feed and per-user notifications.

use bribebank_shared::api::{ErrorCode, HistoryEventDto, NotificationDto};
use diesel::prelude::*;

use super::LifecycleError;
use super::guard::load_actor;
use crate::storage::models::{HistoryEvent, Notification};
use crate::storage::schema::{history_events, notifications};

pub const HISTORY_LIMIT: i64 = 100;

/// Newest first, optionally narrowed to one member.
pub fn history(
    conn: &mut SqliteConnection,
    caller_id: &str,
    family_id: &str,
    user_id: Option<&str>,
) -> Result<Vec<HistoryEventDto>, LifecycleError> {
    load_actor(conn, caller_id)?.require_member(family_id)?;
    let mut query = history_events::table
        .filter(history_events::family_id.eq(family_id))
        .select(HistoryEvent::as_select())
        .into_boxed();
    if let Some(uid) = user_id {
        query = query.filter(history_events::user_id.eq(uid));
    }
    let rows = query
        .order(history_events::id.desc())
        .limit(HISTORY_LIMIT)
        .load(conn)?;
    Ok(rows.iter().map(HistoryEventDto::from).collect())
}

fn require_self(caller_id: &str, user_id: &str) -> Result<(), LifecycleError> {
    if caller_id == user_id {
        Ok(())
    } else {
        Err(LifecycleError::Forbidden(ErrorCode::Forbidden))
    }
}

/// Unread notifications of the caller, newest first.
pub fn unread(
    conn: &mut SqliteConnection,
    caller_id: &str,
    user_id: &str,
) -> Result<Vec<NotificationDto>, LifecycleError> {
    let actor = load_actor(conn, caller_id)?;
    require_self(&actor.id, user_id)?;
    let rows = notifications::table
        .filter(notifications::user_id.eq(&actor.id))
        .filter(notifications::is_read.eq(false))
        .order(notifications::created_at.desc())
        .select(Notification::as_select())
        .load(conn)?;
    Ok(rows.iter().map(NotificationDto::from).collect())
}

pub fn mark_read(
    conn: &mut SqliteConnection,
    caller_id: &str,
    notification_id: &str,
) -> Result<NotificationDto, LifecycleError> {
    let actor = load_actor(conn, caller_id)?;
    let row = notifications::table
        .filter(notifications::id.eq(notification_id))
        .select(Notification::as_select())
        .first(conn)
        .optional()?
        .ok_or(LifecycleError::NotFound(ErrorCode::NotFound))?;
    require_self(&actor.id, &row.user_id)?;

    diesel::update(notifications::table.filter(notifications::id.eq(&row.id)))
        .set(notifications::is_read.eq(true))
        .execute(conn)?;
    Ok(NotificationDto {
        is_read: true,
        ..NotificationDto::from(&row)
    })
}

/// Returns how many notifications flipped to read.
pub fn mark_all_read(
    conn: &mut SqliteConnection,
    caller_id: &str,
    user_id: &str,
) -> Result<usize, LifecycleError> {
    let actor = load_actor(conn, caller_id)?;
    require_self(&actor.id, user_id)?;
    Ok(diesel::update(
        notifications::table
            .filter(notifications::user_id.eq(&actor.id))
            .filter(notifications::is_read.eq(false)),
    )
    .set(notifications::is_read.eq(true))
    .execute(conn)?)
}
