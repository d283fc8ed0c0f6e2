//! Assigned prize state machine:
//! `AVAILABLE -> PENDING_APPROVAL -> REDEEMED`, with rejection reverting to
//! `AVAILABLE`.

use bribebank_shared::api::{
    AssignPrizeReq, AssignedPrizeDto, ChildActionKind, ErrorCode, PushPayload, ServerEvent,
    WalletReason,
};
use bribebank_shared::domain::{PrizeOrigin, PrizeStatus};
use chrono::NaiveDateTime;
use diesel::prelude::*;
use tracing::info;

use super::guard::{Actor, family_user, load_actor, parent_ids};
use super::records::{HistoryAction, HistoryEntry, log_history, notify, notify_all};
use super::{LifecycleError, Outcome, new_id, now, now_ms, required};
use crate::storage::models::{AssignedPrize, NewAssignedPrize, RewardTemplate};
use crate::storage::schema::{assigned_prizes, reward_templates};

pub(crate) fn find_prize(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<AssignedPrize, LifecycleError> {
    assigned_prizes::table
        .filter(assigned_prizes::id.eq(id))
        .select(AssignedPrize::as_select())
        .first(conn)
        .optional()?
        .ok_or(LifecycleError::NotFound(ErrorCode::NotFound))
}

fn wallet_update(family_id: &str, reason: WalletReason) -> ServerEvent {
    ServerEvent::WalletUpdate {
        family_id: family_id.to_string(),
        reason,
        timestamp: now_ms(),
    }
}

/// Grants a snapshot of a reward template to a family member.
pub fn assign(
    conn: &mut SqliteConnection,
    caller_id: &str,
    family_id: &str,
    req: AssignPrizeReq,
) -> Result<Outcome<AssignedPrizeDto>, LifecycleError> {
    let template_id = required(req.template_id)?;
    let user_id = required(req.user_id)?;

    let parent = load_actor(conn, caller_id)?;
    parent.require_parent(family_id)?;

    let template = reward_templates::table
        .filter(reward_templates::id.eq(&template_id))
        .filter(reward_templates::family_id.eq(family_id))
        .select(RewardTemplate::as_select())
        .first(conn)
        .optional()?
        .ok_or(LifecycleError::NotFound(ErrorCode::TemplateNotFound))?;
    let child = family_user(conn, family_id, &user_id)?;

    let id = new_id();
    diesel::insert_into(assigned_prizes::table)
        .values(&NewAssignedPrize {
            id: &id,
            family_id,
            template_id: Some(&template.id),
            user_id: &child.id,
            assigned_by: &parent.display_name,
            origin: PrizeOrigin::Template.as_str(),
            status: PrizeStatus::Available.as_str(),
            title: &template.title,
            emoji: &template.emoji,
            description: template.description.as_deref(),
            prize_type: template.prize_type()?.as_str(),
            theme_color: template.theme_color.as_deref(),
            assigned_at: now(),
            claimed_at: None,
        })
        .execute(conn)?;

    log_history(
        conn,
        HistoryEntry {
            family_id,
            user_id: &child.id,
            user_name: &child.display_name,
            title: &template.title,
            emoji: &template.emoji,
            action: HistoryAction::AssignedReward,
            assigner_name: &parent.display_name,
        },
    )?;
    let message = format!(
        "{} gave you a new reward: {}",
        parent.display_name, template.title
    );
    notify(conn, &child.id, &message)?;

    info!(prize_id = %id, template_id = %template.id, user_id = %child.id, "prize assigned");

    let dto = find_prize(conn, &id)?.to_dto()?;
    let payload = PushPayload::new(
        "REWARD_ASSIGNED",
        "reward-assigned",
        family_id,
        format!("New reward {}", template.emoji),
        message,
    )
    .with_field("prizeId", id.as_str());
    Ok(Outcome::new(dto)
        .push(vec![child.id.clone()], payload)
        .broadcast(wallet_update(family_id, WalletReason::RewardAssigned)))
}

/// The assignee asks a parent to hand over an available prize.
pub fn claim(
    conn: &mut SqliteConnection,
    caller_id: &str,
    prize_id: &str,
) -> Result<Outcome<AssignedPrizeDto>, LifecycleError> {
    let child = load_actor(conn, caller_id)?;
    let prize = find_prize(conn, prize_id)?;
    child.require_member(&prize.family_id)?;
    if child.id != prize.user_id {
        return Err(LifecycleError::Forbidden(ErrorCode::OnlyAssigneeCanClaim));
    }
    if prize.status()? != PrizeStatus::Available {
        return Err(LifecycleError::InvalidState(ErrorCode::InvalidStatus));
    }
    let family_id = prize.family_id.as_str();

    diesel::update(assigned_prizes::table.filter(assigned_prizes::id.eq(&prize.id)))
        .set((
            assigned_prizes::status.eq(PrizeStatus::PendingApproval.as_str()),
            assigned_prizes::claimed_at.eq(Some(now())),
        ))
        .execute(conn)?;

    log_history(
        conn,
        HistoryEntry {
            family_id,
            user_id: &child.id,
            user_name: &child.display_name,
            title: &prize.title,
            emoji: &prize.emoji,
            action: HistoryAction::RewardClaimed,
            assigner_name: &child.display_name,
        },
    )?;
    let parents = parent_ids(conn, family_id)?;
    let message = format!(
        "{} wants to claim their reward: {}",
        child.display_name, prize.title
    );
    notify_all(conn, &parents, &message)?;

    let dto = find_prize(conn, &prize.id)?.to_dto()?;
    let payload = PushPayload::new(
        "REWARD_CLAIMED",
        "reward-claimed",
        family_id,
        format!("Reward claimed {}", prize.emoji),
        message,
    )
    .with_field("prizeId", prize.id.as_str());
    Ok(Outcome::new(dto)
        .push(parents, payload)
        .broadcast(ServerEvent::ChildAction {
            family_id: family_id.to_string(),
            subtype: ChildActionKind::RewardClaimed,
            id: prize.id.clone(),
            user_id: child.id.clone(),
            timestamp: now_ms(),
        }))
}

/// Parent decision on a pending prize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Approve,
    Reject,
}

fn decide(
    conn: &mut SqliteConnection,
    caller_id: &str,
    prize_id: &str,
    decision: Decision,
) -> Result<Outcome<AssignedPrizeDto>, LifecycleError> {
    let parent: Actor = load_actor(conn, caller_id)?;
    let prize = find_prize(conn, prize_id)?;
    parent.require_parent(&prize.family_id)?;
    if prize.status()? != PrizeStatus::PendingApproval {
        return Err(LifecycleError::InvalidState(ErrorCode::InvalidStatus));
    }
    let family_id = prize.family_id.as_str();
    let child = family_user(conn, family_id, &prize.user_id)?;
    let target = assigned_prizes::table.filter(assigned_prizes::id.eq(&prize.id));

    let (action, verb, reason) = match decision {
        Decision::Approve => {
            diesel::update(target)
                .set((
                    assigned_prizes::status.eq(PrizeStatus::Redeemed.as_str()),
                    assigned_prizes::redeemed_at.eq(Some(now())),
                ))
                .execute(conn)?;
            (
                HistoryAction::RewardApproved,
                "approved",
                WalletReason::RewardApproved,
            )
        }
        Decision::Reject => {
            diesel::update(target)
                .set((
                    assigned_prizes::status.eq(PrizeStatus::Available.as_str()),
                    assigned_prizes::claimed_at.eq(None::<NaiveDateTime>),
                ))
                .execute(conn)?;
            (
                HistoryAction::RewardRejected,
                "rejected",
                WalletReason::RewardRejected,
            )
        }
    };

    log_history(
        conn,
        HistoryEntry {
            family_id,
            user_id: &child.id,
            user_name: &child.display_name,
            title: &prize.title,
            emoji: &prize.emoji,
            action,
            assigner_name: &parent.display_name,
        },
    )?;
    let message = format!(
        "{} {} your reward: {}",
        parent.display_name, verb, prize.title
    );
    notify(conn, &child.id, &message)?;

    info!(prize_id = %prize.id, decision = ?decision, "prize decided");

    let dto = find_prize(conn, &prize.id)?.to_dto()?;
    let kind = match decision {
        Decision::Approve => "REWARD_APPROVED",
        Decision::Reject => "REWARD_REJECTED",
    };
    let payload = PushPayload::new(
        kind,
        "reward-decision",
        family_id,
        format!("Reward {} {}", verb, prize.emoji),
        message,
    )
    .with_field("prizeId", prize.id.as_str());
    Ok(Outcome::new(dto)
        .push(vec![child.id.clone()], payload)
        .broadcast(wallet_update(family_id, reason)))
}

pub fn approve(
    conn: &mut SqliteConnection,
    caller_id: &str,
    prize_id: &str,
) -> Result<Outcome<AssignedPrizeDto>, LifecycleError> {
    decide(conn, caller_id, prize_id, Decision::Approve)
}

/// Sends a pending prize back to the child's available pool.
pub fn reject(
    conn: &mut SqliteConnection,
    caller_id: &str,
    prize_id: &str,
) -> Result<Outcome<AssignedPrizeDto>, LifecycleError> {
    decide(conn, caller_id, prize_id, Decision::Reject)
}

/// Revokes a prize in any status.
pub fn delete(
    conn: &mut SqliteConnection,
    caller_id: &str,
    prize_id: &str,
) -> Result<Outcome<()>, LifecycleError> {
    let parent = load_actor(conn, caller_id)?;
    let prize = find_prize(conn, prize_id)?;
    parent.require_parent(&prize.family_id)?;

    diesel::delete(assigned_prizes::table.filter(assigned_prizes::id.eq(&prize.id)))
        .execute(conn)?;
    info!(prize_id = %prize.id, "prize deleted");

    Ok(Outcome::new(()).broadcast(wallet_update(&prize.family_id, WalletReason::RewardDeleted)))
}

pub fn list(
    conn: &mut SqliteConnection,
    caller_id: &str,
    family_id: &str,
) -> Result<Vec<AssignedPrizeDto>, LifecycleError> {
    load_actor(conn, caller_id)?.require_member(family_id)?;
    let rows = assigned_prizes::table
        .filter(assigned_prizes::family_id.eq(family_id))
        .order(assigned_prizes::assigned_at.desc())
        .select(AssignedPrize::as_select())
        .load(conn)?;
    rows.iter().map(|p| Ok(p.to_dto()?)).collect()
}
