//! Caller identity and family/role checks.

use bribebank_shared::api::ErrorCode;
use bribebank_shared::auth::Role;
use diesel::prelude::*;

use super::LifecycleError;
use crate::storage::models::{Family, User};
use crate::storage::schema::{families, users};

/// The authenticated caller as stored right now.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: String,
    pub family_id: String,
    pub display_name: String,
    pub role: Role,
}

impl Actor {
    pub fn is_parent(&self) -> bool {
        self.role == Role::Parent
    }

    pub fn require_member(&self, family_id: &str) -> Result<(), LifecycleError> {
        if self.family_id == family_id {
            Ok(())
        } else {
            Err(LifecycleError::Forbidden(ErrorCode::Forbidden))
        }
    }

    pub fn require_parent(&self, family_id: &str) -> Result<(), LifecycleError> {
        self.require_member(family_id)?;
        if self.is_parent() {
            Ok(())
        } else {
            Err(LifecycleError::Forbidden(ErrorCode::ParentOnly))
        }
    }
}

/// Reloads the caller; a token whose user was deleted is unauthenticated.
pub fn load_actor(conn: &mut SqliteConnection, user_id: &str) -> Result<Actor, LifecycleError> {
    let user = find_user(conn, user_id)?
        .ok_or(LifecycleError::Unauthenticated(ErrorCode::Unauthenticated))?;
    Ok(Actor {
        role: user.role()?,
        id: user.id,
        family_id: user.family_id,
        display_name: user.display_name,
    })
}

pub fn find_user(conn: &mut SqliteConnection, id: &str) -> Result<Option<User>, LifecycleError> {
    Ok(users::table
        .filter(users::id.eq(id))
        .select(User::as_select())
        .first(conn)
        .optional()?)
}

/// A user of `family_id`, or `USER_NOT_FOUND` for anyone else.
pub fn family_user(
    conn: &mut SqliteConnection,
    family_id: &str,
    id: &str,
) -> Result<User, LifecycleError> {
    find_user(conn, id)?
        .filter(|u| u.family_id == family_id)
        .ok_or(LifecycleError::NotFound(ErrorCode::UserNotFound))
}

pub fn load_family(conn: &mut SqliteConnection, id: &str) -> Result<Family, LifecycleError> {
    families::table
        .filter(families::id.eq(id))
        .select(Family::as_select())
        .first(conn)
        .optional()?
        .ok_or(LifecycleError::NotFound(ErrorCode::FamilyNotFound))
}

pub fn parent_ids(
    conn: &mut SqliteConnection,
    family_id: &str,
) -> Result<Vec<String>, LifecycleError> {
    Ok(users::table
        .filter(users::family_id.eq(family_id))
        .filter(users::role.eq(Role::Parent.as_str()))
        .order(users::created_at.asc())
        .select(users::id)
        .load(conn)?)
}
