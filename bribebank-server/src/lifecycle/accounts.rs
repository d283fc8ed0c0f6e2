//! Families, members, profiles and join codes.

use bribebank_shared::api::{
    CreateUserReq, ErrorCode, JoinCodeResp, JoinFamilyReq, MeResp, RegisterReq, ServerEvent,
    UpdatePasswordReq, UpdateUserReq, UserDto, WalletReason,
};
use bribebank_shared::auth::Role;
use chrono::{Duration, NaiveDateTime};
use diesel::prelude::*;
use rand::Rng;
use tracing::{info, warn};

use super::guard::{family_user, find_user, load_actor, load_family};
use super::wheel::{default_segments, replace_segments};
use super::{Actor, LifecycleError, Outcome, new_id, now, now_ms, required};
use crate::storage::StorageError;
use crate::storage::models::{Family, NewFamily, NewUser, User, fmt_ts};
use crate::storage::schema::{
    assigned_prizes, bounty_assignments, families, history_events, notifications,
    push_subscriptions, sessions, users,
};

const JOIN_CODE_LEN: usize = 6;
const JOIN_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const JOIN_CODE_TTL_HOURS: i64 = 24;
const JOIN_CODE_ATTEMPTS: usize = 8;
const DEFAULT_SPIN_COST: i32 = 1;

const AVATAR_PALETTE: &[&str] = &[
    "bg-indigo-500",
    "bg-emerald-500",
    "bg-amber-500",
    "bg-rose-500",
    "bg-sky-500",
    "bg-purple-500",
];

/// Accepted on profile edits in addition to the generated palette.
const AVATAR_EXTRAS: &[&str] = &[
    "bg-pink-400",
    "bg-teal-400",
    "bg-blue-500",
    "bg-orange-400",
    "bg-green-500",
    "bg-red-400",
];

/// A freshly registered parent together with the family's join code.
#[derive(Debug)]
pub struct Registration {
    pub user: User,
    pub join_code: String,
}

/// A child account created from a join code.
#[derive(Debug)]
pub struct Joined {
    pub user: User,
    pub family_name: String,
}

fn random_join_code() -> String {
    let mut rng = rand::rng();
    (0..JOIN_CODE_LEN)
        .map(|_| JOIN_CODE_ALPHABET[rng.random_range(0..JOIN_CODE_ALPHABET.len())] as char)
        .collect()
}

fn random_avatar() -> &'static str {
    AVATAR_PALETTE[rand::rng().random_range(0..AVATAR_PALETTE.len())]
}

fn is_avatar_choice(color: &str) -> bool {
    AVATAR_PALETTE.contains(&color) || AVATAR_EXTRAS.contains(&color)
}

/// A join code not currently held by another family.
fn unused_join_code(conn: &mut SqliteConnection) -> Result<String, LifecycleError> {
    for _ in 0..JOIN_CODE_ATTEMPTS {
        let code = random_join_code();
        let taken: i64 = families::table
            .filter(families::join_code.eq(&code))
            .count()
            .get_result(conn)?;
        if taken == 0 {
            return Ok(code);
        }
    }
    warn!(attempts = JOIN_CODE_ATTEMPTS, "join code space exhausted");
    Err(StorageError::InvalidValue("no unused join code available".into()).into())
}

fn join_code_expiry() -> NaiveDateTime {
    now() + Duration::hours(JOIN_CODE_TTL_HOURS)
}

fn username_taken(conn: &mut SqliteConnection, username: &str) -> Result<bool, LifecycleError> {
    let n: i64 = users::table
        .filter(users::username.eq(username))
        .count()
        .get_result(conn)?;
    Ok(n > 0)
}

fn insert_user(
    conn: &mut SqliteConnection,
    family_id: &str,
    username: &str,
    password: &str,
    display_name: &str,
    role: Role,
) -> Result<User, LifecycleError> {
    if username_taken(conn, username)? {
        return Err(LifecycleError::Conflict(ErrorCode::UsernameTaken));
    }
    let id = new_id();
    let hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;
    diesel::insert_into(users::table)
        .values(&NewUser {
            id: &id,
            family_id,
            username,
            password_hash: &hash,
            display_name,
            role: role.as_str(),
            avatar_color: random_avatar(),
            ticket_balance: 0,
            created_at: now(),
        })
        .execute(conn)?;
    find_user(conn, &id)?.ok_or(LifecycleError::NotFound(ErrorCode::UserNotFound))
}

/// Creates a family, its first parent and the default prize wheel.
pub fn register(
    conn: &mut SqliteConnection,
    req: RegisterReq,
) -> Result<Registration, LifecycleError> {
    let username = required(req.username)?.trim().to_lowercase();
    let password = required(req.password)?;
    let display_name = required(req.display_name)?;
    let family_name = required(req.family_name)?;

    if username_taken(conn, &username)? {
        return Err(LifecycleError::Conflict(ErrorCode::UsernameTaken));
    }

    let family_id = new_id();
    let join_code = unused_join_code(conn)?;
    diesel::insert_into(families::table)
        .values(&NewFamily {
            id: &family_id,
            name: family_name.trim(),
            join_code: Some(&join_code),
            join_code_expires_at: Some(join_code_expiry()),
            spin_cost: DEFAULT_SPIN_COST,
            created_at: now(),
        })
        .execute(conn)?;

    let user = insert_user(
        conn,
        &family_id,
        &username,
        &password,
        display_name.trim(),
        Role::Parent,
    )?;
    replace_segments(conn, &family_id, &default_segments())?;
    info!(family_id = %family_id, user_id = %user.id, "family registered");

    Ok(Registration { user, join_code })
}

/// Resolves credentials to a user. Unknown names and wrong passwords are
/// indistinguishable to the caller.
pub fn authenticate(
    conn: &mut SqliteConnection,
    username: &str,
    password: &str,
) -> Result<User, LifecycleError> {
    let username = username.trim().to_lowercase();
    let user = users::table
        .filter(users::username.eq(&username))
        .select(User::as_select())
        .first(conn)
        .optional()?
        .ok_or(LifecycleError::Unauthenticated(ErrorCode::InvalidCredentials))?;
    if !bcrypt::verify(password, &user.password_hash)? {
        return Err(LifecycleError::Unauthenticated(ErrorCode::InvalidCredentials));
    }
    Ok(user)
}

/// Creates a child account in the family holding `join_code`, provided the
/// code has not expired.
pub fn join_family(
    conn: &mut SqliteConnection,
    req: JoinFamilyReq,
) -> Result<Outcome<Joined>, LifecycleError> {
    let join_code = required(req.join_code)?.trim().to_uppercase();
    let username = required(req.username)?.trim().to_lowercase();
    let password = required(req.password)?;
    let display_name = required(req.display_name)?;

    let family = families::table
        .filter(families::join_code.eq(&join_code))
        .filter(families::join_code_expires_at.gt(now()))
        .select(Family::as_select())
        .first(conn)
        .optional()?
        .ok_or(LifecycleError::Validation(ErrorCode::InvalidJoinCode))?;

    let user = insert_user(
        conn,
        &family.id,
        &username,
        &password,
        display_name.trim(),
        Role::Child,
    )?;
    info!(family_id = %family.id, user_id = %user.id, "child joined with code");

    Ok(Outcome::new(Joined {
        user,
        family_name: family.name,
    })
    .broadcast(ServerEvent::WalletUpdate {
        family_id: family.id,
        reason: WalletReason::UserJoined,
        timestamp: now_ms(),
    }))
}

/// The caller's profile and family. Only parents see the join code.
pub fn me(conn: &mut SqliteConnection, caller_id: &str) -> Result<MeResp, LifecycleError> {
    let user = find_user(conn, caller_id)?
        .ok_or(LifecycleError::Unauthenticated(ErrorCode::Unauthenticated))?;
    let mut family = load_family(conn, &user.family_id)?.to_dto();
    if user.role()? != Role::Parent {
        family.join_code = None;
        family.join_code_expires_at = None;
    }
    Ok(MeResp {
        user: user.to_dto()?,
        family,
    })
}

/// Loads `user_id` for an edit by the caller: members may edit themselves,
/// parents anyone in their family.
fn editable_user(
    conn: &mut SqliteConnection,
    caller_id: &str,
    user_id: &str,
) -> Result<(Actor, User), LifecycleError> {
    let actor = load_actor(conn, caller_id)?;
    let target = find_user(conn, user_id)?
        .ok_or(LifecycleError::NotFound(ErrorCode::UserNotFound))?;
    actor.require_member(&target.family_id)?;
    if actor.id != target.id && !actor.is_parent() {
        return Err(LifecycleError::Forbidden(ErrorCode::ParentOnly));
    }
    Ok((actor, target))
}

/// Edits username, display name, role or avatar colour. Role changes are
/// reserved to parents and never apply to the caller's own account.
pub fn update_member(
    conn: &mut SqliteConnection,
    caller_id: &str,
    user_id: &str,
    req: UpdateUserReq,
) -> Result<Outcome<UserDto>, LifecycleError> {
    let (actor, target) = editable_user(conn, caller_id, user_id)?;

    let username = match req.username {
        Some(raw) => {
            let name = required(Some(raw))?.trim().to_lowercase();
            if name != target.username && username_taken(conn, &name)? {
                return Err(LifecycleError::Conflict(ErrorCode::UsernameTaken));
            }
            name
        }
        None => target.username.clone(),
    };
    let display_name = match req.display_name {
        Some(raw) => required(Some(raw))?.trim().to_string(),
        None => target.display_name.clone(),
    };

    let current_role = target.role()?;
    let role = match req.role {
        Some(role) if role != current_role => {
            if !actor.is_parent() {
                return Err(LifecycleError::Forbidden(ErrorCode::ParentOnly));
            }
            if actor.id == target.id {
                return Err(LifecycleError::Validation(ErrorCode::CannotChangeOwnRole));
            }
            role
        }
        _ => current_role,
    };

    let avatar_color = match req.avatar_color {
        Some(color) if is_avatar_choice(&color) => color,
        Some(_) => return Err(LifecycleError::Validation(ErrorCode::InvalidAvatarColor)),
        None => target.avatar_color.clone(),
    };

    diesel::update(users::table.filter(users::id.eq(&target.id)))
        .set((
            users::username.eq(&username),
            users::display_name.eq(&display_name),
            users::role.eq(role.as_str()),
            users::avatar_color.eq(&avatar_color),
        ))
        .execute(conn)?;
    info!(
        user_id = %target.id,
        edited_by = %actor.id,
        role = %role.as_str(),
        "profile updated"
    );

    let updated = find_user(conn, &target.id)?
        .ok_or(LifecycleError::NotFound(ErrorCode::UserNotFound))?;
    Ok(Outcome::new(updated.to_dto()?).broadcast(ServerEvent::WalletUpdate {
        family_id: target.family_id,
        reason: WalletReason::UserUpdated,
        timestamp: now_ms(),
    }))
}

/// Sets a new password for the caller or, for parents, a family member.
pub fn change_password(
    conn: &mut SqliteConnection,
    caller_id: &str,
    user_id: &str,
    req: UpdatePasswordReq,
) -> Result<Outcome<()>, LifecycleError> {
    let new_password = required(req.new_password)?;
    let (actor, target) = editable_user(conn, caller_id, user_id)?;

    let hash = bcrypt::hash(&new_password, bcrypt::DEFAULT_COST)?;
    diesel::update(users::table.filter(users::id.eq(&target.id)))
        .set(users::password_hash.eq(&hash))
        .execute(conn)?;
    info!(user_id = %target.id, changed_by = %actor.id, "password changed");
    Ok(Outcome::new(()))
}

pub fn list_members(
    conn: &mut SqliteConnection,
    caller_id: &str,
    family_id: &str,
) -> Result<Vec<UserDto>, LifecycleError> {
    load_actor(conn, caller_id)?.require_member(family_id)?;
    let rows = users::table
        .filter(users::family_id.eq(family_id))
        .order(users::created_at.asc())
        .select(User::as_select())
        .load(conn)?;
    rows.iter()
        .map(|u| u.to_dto().map_err(LifecycleError::from))
        .collect()
}

pub fn create_member(
    conn: &mut SqliteConnection,
    caller_id: &str,
    family_id: &str,
    req: CreateUserReq,
) -> Result<Outcome<UserDto>, LifecycleError> {
    let username = required(req.username)?.trim().to_lowercase();
    let password = required(req.password)?;
    let display_name = required(req.display_name)?;
    let role = req.role.unwrap_or(Role::Child);

    load_actor(conn, caller_id)?.require_parent(family_id)?;
    load_family(conn, family_id)?;

    let user = insert_user(
        conn,
        family_id,
        &username,
        &password,
        display_name.trim(),
        role,
    )?;
    info!(family_id, user_id = %user.id, role = %role.as_str(), "member added");
    Ok(Outcome::new(user.to_dto()?))
}

/// Removes a member and everything that belongs to them.
pub fn delete_member(
    conn: &mut SqliteConnection,
    caller_id: &str,
    user_id: &str,
) -> Result<Outcome<()>, LifecycleError> {
    let actor = load_actor(conn, caller_id)?;
    if actor.id == user_id {
        return Err(LifecycleError::Validation(ErrorCode::CannotDeleteSelf));
    }
    actor.require_parent(&actor.family_id)?;
    let target = family_user(conn, &actor.family_id, user_id)?;

    diesel::delete(notifications::table.filter(notifications::user_id.eq(&target.id)))
        .execute(conn)?;
    diesel::delete(history_events::table.filter(history_events::user_id.eq(&target.id)))
        .execute(conn)?;
    diesel::delete(bounty_assignments::table.filter(bounty_assignments::user_id.eq(&target.id)))
        .execute(conn)?;
    diesel::delete(assigned_prizes::table.filter(assigned_prizes::user_id.eq(&target.id)))
        .execute(conn)?;
    diesel::delete(push_subscriptions::table.filter(push_subscriptions::user_id.eq(&target.id)))
        .execute(conn)?;
    diesel::delete(sessions::table.filter(sessions::user_id.eq(&target.id))).execute(conn)?;
    diesel::delete(users::table.filter(users::id.eq(&target.id))).execute(conn)?;
    info!(user_id = %target.id, removed_by = %actor.id, "member removed");

    Ok(Outcome::new(()).broadcast(ServerEvent::WalletUpdate {
        family_id: target.family_id,
        reason: WalletReason::UserRemoved,
        timestamp: now_ms(),
    }))
}

pub fn regenerate_join_code(
    conn: &mut SqliteConnection,
    caller_id: &str,
    family_id: &str,
) -> Result<JoinCodeResp, LifecycleError> {
    load_actor(conn, caller_id)?.require_parent(family_id)?;
    let family = load_family(conn, family_id)?;

    let code = unused_join_code(conn)?;
    let expires_at = join_code_expiry();
    diesel::update(families::table.filter(families::id.eq(&family.id)))
        .set((
            families::join_code.eq(&code),
            families::join_code_expires_at.eq(expires_at),
        ))
        .execute(conn)?;
    info!(family_id, "join code regenerated");

    Ok(JoinCodeResp {
        join_code: code,
        expires_at: fmt_ts(expires_at),
    })
}
