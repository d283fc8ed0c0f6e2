//! Append-only history rows and in-app notifications. Always called inside
//! the transaction of the change they describe.

use diesel::prelude::*;

use super::{LifecycleError, new_id, now};
use crate::storage::models::{NewHistoryEvent, NewNotification};
use crate::storage::schema::{history_events, notifications};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryAction {
    AssignedTask,
    AcceptedTask,
    CompletedTask,
    VerifiedTask,
    EarnedTickets,
    AssignedReward,
    RewardClaimed,
    RewardApproved,
    RewardRejected,
    ReceivedTickets,
    WheelSpinWon,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::AssignedTask => "ASSIGNED_TASK",
            HistoryAction::AcceptedTask => "ACCEPTED_TASK",
            HistoryAction::CompletedTask => "COMPLETED_TASK",
            HistoryAction::VerifiedTask => "VERIFIED_TASK",
            HistoryAction::EarnedTickets => "EARNED_TICKETS",
            HistoryAction::AssignedReward => "ASSIGNED_REWARD",
            HistoryAction::RewardClaimed => "REWARD_CLAIMED",
            HistoryAction::RewardApproved => "REWARD_APPROVED",
            HistoryAction::RewardRejected => "REWARD_REJECTED",
            HistoryAction::ReceivedTickets => "RECEIVED_TICKETS",
            HistoryAction::WheelSpinWon => "WHEEL_SPIN_WON",
        }
    }
}

pub struct HistoryEntry<'a> {
    pub family_id: &'a str,
    /// Subject of the event.
    pub user_id: &'a str,
    pub user_name: &'a str,
    pub title: &'a str,
    pub emoji: &'a str,
    pub action: HistoryAction,
    /// Whoever performed the action.
    pub assigner_name: &'a str,
}

pub fn log_history(
    conn: &mut SqliteConnection,
    entry: HistoryEntry<'_>,
) -> Result<(), LifecycleError> {
    let row = NewHistoryEvent {
        family_id: entry.family_id,
        user_id: entry.user_id,
        user_name: entry.user_name,
        title: entry.title,
        emoji: entry.emoji,
        action: entry.action.as_str(),
        assigner_name: entry.assigner_name,
        created_at: now(),
    };
    diesel::insert_into(history_events::table)
        .values(&row)
        .execute(conn)?;
    Ok(())
}

pub fn notify(
    conn: &mut SqliteConnection,
    user_id: &str,
    message: &str,
) -> Result<(), LifecycleError> {
    let id = new_id();
    let row = NewNotification {
        id: &id,
        user_id,
        message,
        is_read: false,
        created_at: now(),
    };
    diesel::insert_into(notifications::table)
        .values(&row)
        .execute(conn)?;
    Ok(())
}

pub fn notify_all(
    conn: &mut SqliteConnection,
    user_ids: &[String],
    message: &str,
) -> Result<(), LifecycleError> {
    for uid in user_ids {
        notify(conn, uid, message)?;
    }
    Ok(())
}
