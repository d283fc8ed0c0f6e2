//! Transactional lifecycle operations.
//!
//! Every public operation takes a connection that is already inside an
//! immediate transaction (see [`crate::storage::Store::transact`]), reloads
//! the caller as an [`Actor`], checks preconditions, writes all derived rows
//! and returns an [`Outcome`]. Realtime broadcasts and push deliveries are
//! only described as [`Effect`]s; the caller dispatches them after commit.

pub mod accounts;
pub mod catalog;
pub mod guard;
pub mod inbox;
pub mod prizes;
pub mod records;
pub mod store;
pub mod tasks;
pub mod wheel;

use bribebank_shared::api::{ErrorCode, PushPayload, ServerEvent};
use chrono::{NaiveDateTime, Utc};

use crate::storage::StorageError;

pub use guard::Actor;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Missing or malformed input; nothing was read or written.
    #[error("validation failed: {0}")]
    Validation(ErrorCode),

    /// No usable caller identity: bad credentials, or a token whose user
    /// no longer exists.
    #[error("unauthenticated: {0}")]
    Unauthenticated(ErrorCode),

    /// Wrong family, wrong role or wrong actor for the action.
    #[error("forbidden: {0}")]
    Forbidden(ErrorCode),

    #[error("not found: {0}")]
    NotFound(ErrorCode),

    /// The operation is not legal in the entity's current status.
    #[error("invalid state: {0}")]
    InvalidState(ErrorCode),

    #[error("conflict: {0}")]
    Conflict(ErrorCode),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("password hashing failed: {0}")]
    Password(#[from] bcrypt::BcryptError),
}

impl From<diesel::result::Error> for LifecycleError {
    fn from(e: diesel::result::Error) -> Self {
        LifecycleError::Storage(StorageError::Database(e))
    }
}

impl LifecycleError {
    pub fn code(&self) -> ErrorCode {
        match self {
            LifecycleError::Validation(c)
            | LifecycleError::Unauthenticated(c)
            | LifecycleError::Forbidden(c)
            | LifecycleError::NotFound(c)
            | LifecycleError::InvalidState(c)
            | LifecycleError::Conflict(c) => *c,
            LifecycleError::Storage(_) | LifecycleError::Password(_) => {
                ErrorCode::InternalServerError
            }
        }
    }
}

/// Work to perform once the transaction that produced it has committed.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Broadcast(ServerEvent),
    Push {
        user_ids: Vec<String>,
        payload: PushPayload,
    },
}

#[derive(Debug)]
pub struct Outcome<T> {
    pub value: T,
    pub effects: Vec<Effect>,
}

impl<T> Outcome<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            effects: Vec::new(),
        }
    }

    pub fn broadcast(mut self, event: ServerEvent) -> Self {
        self.effects.push(Effect::Broadcast(event));
        self
    }

    /// Queues a push to `user_ids`; an empty recipient list is dropped.
    pub fn push(mut self, user_ids: Vec<String>, payload: PushPayload) -> Self {
        if !user_ids.is_empty() {
            self.effects.push(Effect::Push { user_ids, payload });
        }
        self
    }

    pub fn broadcasts(&self) -> impl Iterator<Item = &ServerEvent> {
        self.effects.iter().filter_map(|e| match e {
            Effect::Broadcast(ev) => Some(ev),
            Effect::Push { .. } => None,
        })
    }
}

pub(crate) fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Treats absent and blank strings alike.
pub(crate) fn required(value: Option<String>) -> Result<String, LifecycleError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(LifecycleError::Validation(ErrorCode::MissingFields)),
    }
}

/// Blank optional text is stored as NULL.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
