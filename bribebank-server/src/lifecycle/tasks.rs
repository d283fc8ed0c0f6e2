//! Bounty assignment state machine:
//! `OFFERED -> IN_PROGRESS -> COMPLETED -> VERIFIED`, plus deletion.

use bribebank_shared::api::{
    AssignBountyReq, BountyAssignmentDto, ChildActionKind, ErrorCode, PushPayload, ServerEvent,
    VerifyBountyResp, WalletReason,
};
use bribebank_shared::domain::{
    BountyStatus, PrizeOrigin, PrizeStatus, PrizeType, RewardType, parse_ticket_amount,
};
use diesel::prelude::*;
use tracing::info;

use super::guard::{family_user, load_actor, parent_ids};
use super::records::{HistoryAction, HistoryEntry, log_history, notify, notify_all};
use super::{LifecycleError, Outcome, new_id, now, now_ms, required};
use crate::storage::models::{
    AssignedPrize, BountyAssignment, BountyTemplate, NewAssignedPrize, NewBountyAssignment,
    RewardTemplate, User,
};
use crate::storage::schema::{
    assigned_prizes, bounty_assignments, bounty_templates, reward_templates, users,
};

const TASK_REWARD_EMOJI: &str = "💵";
const TASK_REWARD_COLOR: &str = "#22c55e";
pub const TICKET_EMOJI: &str = "🎟️";

fn find_assignment(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<BountyAssignment, LifecycleError> {
    bounty_assignments::table
        .filter(bounty_assignments::id.eq(id))
        .select(BountyAssignment::as_select())
        .first(conn)
        .optional()?
        .ok_or(LifecycleError::NotFound(ErrorCode::NotFound))
}

fn find_bounty(conn: &mut SqliteConnection, id: &str) -> Result<BountyTemplate, LifecycleError> {
    bounty_templates::table
        .filter(bounty_templates::id.eq(id))
        .select(BountyTemplate::as_select())
        .first(conn)
        .optional()?
        .ok_or(LifecycleError::NotFound(ErrorCode::BountyNotFound))
}

fn load_joined(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<BountyAssignmentDto, LifecycleError> {
    let (a, b, u) = bounty_assignments::table
        .inner_join(bounty_templates::table)
        .inner_join(users::table)
        .filter(bounty_assignments::id.eq(id))
        .select((
            BountyAssignment::as_select(),
            BountyTemplate::as_select(),
            User::as_select(),
        ))
        .first::<(BountyAssignment, BountyTemplate, User)>(conn)?;
    Ok(a.with_joins(&b, &u)?)
}

fn set_status(
    conn: &mut SqliteConnection,
    id: &str,
    status: BountyStatus,
) -> Result<(), LifecycleError> {
    diesel::update(bounty_assignments::table.filter(bounty_assignments::id.eq(id)))
        .set(bounty_assignments::status.eq(status.as_str()))
        .execute(conn)?;
    Ok(())
}

/// Fails with `INVALID_STATUS` unless `assignment` may move to `to`.
fn check_transition(
    assignment: &BountyAssignment,
    to: BountyStatus,
) -> Result<(), LifecycleError> {
    if assignment.status()?.next() == Some(to) {
        Ok(())
    } else {
        Err(LifecycleError::InvalidState(ErrorCode::InvalidStatus))
    }
}

fn wallet_update(family_id: &str, reason: WalletReason) -> ServerEvent {
    ServerEvent::WalletUpdate {
        family_id: family_id.to_string(),
        reason,
        timestamp: now_ms(),
    }
}

/// Offers a bounty template to one family member.
pub fn assign(
    conn: &mut SqliteConnection,
    caller_id: &str,
    family_id: &str,
    req: AssignBountyReq,
) -> Result<Outcome<BountyAssignmentDto>, LifecycleError> {
    let bounty_id = required(req.bounty_id)?;
    let user_id = required(req.user_id)?;

    let parent = load_actor(conn, caller_id)?;
    parent.require_parent(family_id)?;

    let bounty = find_bounty(conn, &bounty_id)?;
    if bounty.family_id != family_id {
        return Err(LifecycleError::NotFound(ErrorCode::BountyNotFound));
    }
    let child = family_user(conn, family_id, &user_id)?;
    if child.id == parent.id {
        return Err(LifecycleError::Forbidden(ErrorCode::CannotAssignSelf));
    }

    let id = new_id();
    diesel::insert_into(bounty_assignments::table)
        .values(&NewBountyAssignment {
            id: &id,
            family_id,
            bounty_template_id: &bounty.id,
            user_id: &child.id,
            assigned_by: &parent.display_name,
            status: BountyStatus::Offered.as_str(),
            assigned_at: now(),
        })
        .execute(conn)?;

    log_history(
        conn,
        HistoryEntry {
            family_id,
            user_id: &child.id,
            user_name: &child.display_name,
            title: &bounty.title,
            emoji: &bounty.emoji,
            action: HistoryAction::AssignedTask,
            assigner_name: &parent.display_name,
        },
    )?;
    let message = format!(
        "{} assigned you a new task: {}",
        parent.display_name, bounty.title
    );
    notify(conn, &child.id, &message)?;

    info!(assignment_id = %id, bounty_id = %bounty.id, user_id = %child.id, "bounty assigned");

    let dto = load_joined(conn, &id)?;
    let payload = PushPayload::new(
        "TASK_ASSIGNED",
        "task-assigned",
        family_id,
        format!("New task {}", bounty.emoji),
        message,
    )
    .with_field("assignmentId", id.as_str());
    Ok(Outcome::new(dto)
        .push(vec![child.id.clone()], payload)
        .broadcast(wallet_update(family_id, WalletReason::TaskAssigned)))
}

/// Accepts an offer. For first-come-first-served bounties every other open
/// offer of the same template is withdrawn in the same transaction.
pub fn accept(
    conn: &mut SqliteConnection,
    caller_id: &str,
    assignment_id: &str,
) -> Result<Outcome<BountyAssignmentDto>, LifecycleError> {
    let child = load_actor(conn, caller_id)?;
    let assignment = find_assignment(conn, assignment_id)?;
    child.require_member(&assignment.family_id)?;
    if child.id != assignment.user_id {
        return Err(LifecycleError::Forbidden(ErrorCode::OnlyAssigneeCanAccept));
    }
    check_transition(&assignment, BountyStatus::InProgress)?;
    let bounty = find_bounty(conn, &assignment.bounty_template_id)?;
    let family_id = assignment.family_id.as_str();

    let mut loser_ids: Vec<String> = Vec::new();
    if bounty.is_fcfs {
        let losers = bounty_assignments::table
            .filter(bounty_assignments::bounty_template_id.eq(&bounty.id))
            .filter(bounty_assignments::family_id.eq(family_id))
            .filter(bounty_assignments::status.eq(BountyStatus::Offered.as_str()))
            .filter(bounty_assignments::id.ne(&assignment.id))
            .select((bounty_assignments::id, bounty_assignments::user_id))
            .load::<(String, String)>(conn)?;
        let ids: Vec<&String> = losers.iter().map(|(id, _)| id).collect();
        diesel::delete(bounty_assignments::table.filter(bounty_assignments::id.eq_any(ids)))
            .execute(conn)?;
        for (_, uid) in losers {
            if uid != child.id && !loser_ids.contains(&uid) {
                loser_ids.push(uid);
            }
        }
    }

    set_status(conn, &assignment.id, BountyStatus::InProgress)?;

    log_history(
        conn,
        HistoryEntry {
            family_id,
            user_id: &child.id,
            user_name: &child.display_name,
            title: &bounty.title,
            emoji: &bounty.emoji,
            action: HistoryAction::AcceptedTask,
            assigner_name: &child.display_name,
        },
    )?;
    let parents = parent_ids(conn, family_id)?;
    let accepted_msg = format!("{} accepted task: {}", child.display_name, bounty.title);
    notify_all(conn, &parents, &accepted_msg)?;
    let lost_msg = format!("Task \"{}\" was claimed by someone else.", bounty.title);
    notify_all(conn, &loser_ids, &lost_msg)?;

    info!(
        assignment_id = %assignment.id,
        fcfs = bounty.is_fcfs,
        withdrawn = loser_ids.len(),
        "bounty accepted"
    );

    let dto = load_joined(conn, &assignment.id)?;
    let to_parents = PushPayload::new(
        "TASK_ACCEPTED",
        "task-accepted",
        family_id,
        format!("Task accepted {}", bounty.emoji),
        accepted_msg,
    )
    .with_field("assignmentId", assignment.id.as_str());
    let to_losers = PushPayload::new(
        "TASK_CLAIMED",
        "task-claimed",
        family_id,
        "Task taken",
        lost_msg,
    )
    .with_field("bountyId", bounty.id.as_str());
    Ok(Outcome::new(dto)
        .push(parents, to_parents)
        .push(loser_ids, to_losers)
        .broadcast(wallet_update(family_id, WalletReason::TaskAccepted)))
}

/// Marks an in-progress task as done; parents must then verify it.
pub fn complete(
    conn: &mut SqliteConnection,
    caller_id: &str,
    assignment_id: &str,
) -> Result<Outcome<BountyAssignmentDto>, LifecycleError> {
    let child = load_actor(conn, caller_id)?;
    let assignment = find_assignment(conn, assignment_id)?;
    child.require_member(&assignment.family_id)?;
    if child.id != assignment.user_id {
        return Err(LifecycleError::Forbidden(ErrorCode::OnlyAssigneeCanComplete));
    }
    check_transition(&assignment, BountyStatus::Completed)?;
    let bounty = find_bounty(conn, &assignment.bounty_template_id)?;
    let family_id = assignment.family_id.as_str();

    diesel::update(bounty_assignments::table.filter(bounty_assignments::id.eq(&assignment.id)))
        .set((
            bounty_assignments::status.eq(BountyStatus::Completed.as_str()),
            bounty_assignments::completed_at.eq(Some(now())),
        ))
        .execute(conn)?;

    log_history(
        conn,
        HistoryEntry {
            family_id,
            user_id: &child.id,
            user_name: &child.display_name,
            title: &bounty.title,
            emoji: &bounty.emoji,
            action: HistoryAction::CompletedTask,
            assigner_name: &child.display_name,
        },
    )?;
    let parents = parent_ids(conn, family_id)?;
    let message = format!(
        "{} marked task \"{}\" as complete. Waiting for verification.",
        child.display_name, bounty.title
    );
    notify_all(conn, &parents, &message)?;

    let dto = load_joined(conn, &assignment.id)?;
    let payload = PushPayload::new(
        "TASK_COMPLETED",
        "task-completed",
        family_id,
        format!("Task ready to verify {}", bounty.emoji),
        message,
    )
    .with_field("assignmentId", assignment.id.as_str());
    Ok(Outcome::new(dto)
        .push(parents, payload)
        .broadcast(ServerEvent::ChildAction {
            family_id: family_id.to_string(),
            subtype: ChildActionKind::TaskCompleted,
            id: assignment.id.clone(),
            user_id: child.id.clone(),
            timestamp: now_ms(),
        }))
}

/// Fields copied onto a task-reward prize.
struct RewardSnapshot {
    template_id: Option<String>,
    title: String,
    emoji: String,
    description: Option<String>,
    prize_type: PrizeType,
    theme_color: Option<String>,
}

/// Copies the linked reward template when it still exists, otherwise builds
/// an inline reward from the bounty itself.
fn reward_snapshot(
    conn: &mut SqliteConnection,
    bounty: &BountyTemplate,
) -> Result<RewardSnapshot, LifecycleError> {
    let template = match &bounty.reward_template_id {
        Some(tid) => reward_templates::table
            .filter(reward_templates::id.eq(tid))
            .select(RewardTemplate::as_select())
            .first(conn)
            .optional()?,
        None => None,
    };
    match template {
        Some(t) => Ok(RewardSnapshot {
            prize_type: t.prize_type()?,
            template_id: Some(t.id),
            title: t.title,
            emoji: t.emoji,
            description: t.description,
            theme_color: t.theme_color,
        }),
        None => Ok(RewardSnapshot {
            template_id: None,
            title: bounty.reward_value.clone(),
            emoji: TASK_REWARD_EMOJI.to_string(),
            description: Some(format!("Reward for completing: {}", bounty.title)),
            prize_type: PrizeType::Privilege,
            theme_color: Some(TASK_REWARD_COLOR.to_string()),
        }),
    }
}

/// Verifies a completed task and pays out its reward: tickets are credited
/// straight to the balance, anything else becomes an AVAILABLE prize.
pub fn verify(
    conn: &mut SqliteConnection,
    caller_id: &str,
    assignment_id: &str,
) -> Result<Outcome<VerifyBountyResp>, LifecycleError> {
    let parent = load_actor(conn, caller_id)?;
    let assignment = find_assignment(conn, assignment_id)?;
    parent.require_parent(&assignment.family_id)?;
    if parent.id == assignment.user_id {
        return Err(LifecycleError::Forbidden(ErrorCode::CannotVerifyOwnTask));
    }
    check_transition(&assignment, BountyStatus::Verified)?;
    let bounty = find_bounty(conn, &assignment.bounty_template_id)?;
    let family_id = assignment.family_id.as_str();
    let child = family_user(conn, family_id, &assignment.user_id)?;

    let ticket_amount = match bounty.reward_type()? {
        RewardType::Tickets => Some(
            parse_ticket_amount(&bounty.reward_value)
                .ok_or(LifecycleError::Validation(ErrorCode::InvalidTicketAmount))?,
        ),
        RewardType::Value => None,
    };
    // The credit must fit the stored balance before anything is written.
    if let Some(amount) = ticket_amount {
        child
            .ticket_balance
            .checked_add(amount)
            .ok_or(LifecycleError::Validation(ErrorCode::InvalidTicketAmount))?;
    }

    diesel::update(bounty_assignments::table.filter(bounty_assignments::id.eq(&assignment.id)))
        .set((
            bounty_assignments::status.eq(BountyStatus::Verified.as_str()),
            bounty_assignments::completed_at
                .eq(Some(assignment.completed_at.unwrap_or_else(now))),
        ))
        .execute(conn)?;

    log_history(
        conn,
        HistoryEntry {
            family_id,
            user_id: &child.id,
            user_name: &child.display_name,
            title: &bounty.title,
            emoji: &bounty.emoji,
            action: HistoryAction::VerifiedTask,
            assigner_name: &parent.display_name,
        },
    )?;

    let (prize, message) = match ticket_amount {
        Some(amount) => {
            diesel::update(users::table.filter(users::id.eq(&child.id)))
                .set(users::ticket_balance.eq(users::ticket_balance + amount))
                .execute(conn)?;
            log_history(
                conn,
                HistoryEntry {
                    family_id,
                    user_id: &child.id,
                    user_name: &child.display_name,
                    title: &format!("{} Tickets", amount),
                    emoji: TICKET_EMOJI,
                    action: HistoryAction::EarnedTickets,
                    assigner_name: &parent.display_name,
                },
            )?;
            let message = format!(
                "Task \"{}\" verified! You earned {} tickets.",
                bounty.title, amount
            );
            (None, message)
        }
        None => {
            let snap = reward_snapshot(conn, &bounty)?;
            let prize_id = new_id();
            diesel::insert_into(assigned_prizes::table)
                .values(&NewAssignedPrize {
                    id: &prize_id,
                    family_id,
                    template_id: snap.template_id.as_deref(),
                    user_id: &child.id,
                    assigned_by: &parent.display_name,
                    origin: PrizeOrigin::TaskReward.as_str(),
                    status: PrizeStatus::Available.as_str(),
                    title: &snap.title,
                    emoji: &snap.emoji,
                    description: snap.description.as_deref(),
                    prize_type: snap.prize_type.as_str(),
                    theme_color: snap.theme_color.as_deref(),
                    assigned_at: now(),
                    claimed_at: None,
                })
                .execute(conn)?;
            let row = assigned_prizes::table
                .filter(assigned_prizes::id.eq(&prize_id))
                .select(AssignedPrize::as_select())
                .first(conn)?;
            let message = format!("Task \"{}\" verified! Reward added.", bounty.title);
            (Some(row.to_dto()?), message)
        }
    };
    notify(conn, &child.id, &message)?;

    info!(
        assignment_id = %assignment.id,
        user_id = %child.id,
        tickets = ?ticket_amount,
        "bounty verified"
    );

    let resp = VerifyBountyResp {
        assignment: load_joined(conn, &assignment.id)?,
        prize,
        tickets_awarded: ticket_amount,
    };
    let mut payload = PushPayload::new(
        "TASK_VERIFIED",
        "task-verified",
        family_id,
        format!("Task verified {}", bounty.emoji),
        message,
    )
    .with_field("assignmentId", assignment.id.as_str());
    if let Some(amount) = ticket_amount {
        payload = payload.with_field("ticketsAwarded", amount);
    }
    Ok(Outcome::new(resp)
        .push(vec![child.id.clone()], payload)
        .broadcast(wallet_update(family_id, WalletReason::TaskVerified)))
}

/// Parents may delete any assignment. Children may only withdraw their own
/// offer before accepting it.
pub fn delete(
    conn: &mut SqliteConnection,
    caller_id: &str,
    assignment_id: &str,
) -> Result<Outcome<()>, LifecycleError> {
    let actor = load_actor(conn, caller_id)?;
    let assignment = find_assignment(conn, assignment_id)?;
    actor.require_member(&assignment.family_id)?;
    let allowed = actor.is_parent()
        || (actor.id == assignment.user_id && assignment.status()? == BountyStatus::Offered);
    if !allowed {
        return Err(LifecycleError::Forbidden(ErrorCode::Forbidden));
    }

    diesel::delete(bounty_assignments::table.filter(bounty_assignments::id.eq(&assignment.id)))
        .execute(conn)?;
    info!(assignment_id = %assignment.id, by = %actor.id, "bounty assignment deleted");

    Ok(Outcome::new(()).broadcast(wallet_update(
        &assignment.family_id,
        WalletReason::TaskRejected,
    )))
}

/// Newest first, with template and assignee attached.
pub fn list(
    conn: &mut SqliteConnection,
    caller_id: &str,
    family_id: &str,
) -> Result<Vec<BountyAssignmentDto>, LifecycleError> {
    load_actor(conn, caller_id)?.require_member(family_id)?;
    let rows = bounty_assignments::table
        .inner_join(bounty_templates::table)
        .inner_join(users::table)
        .filter(bounty_assignments::family_id.eq(family_id))
        .order(bounty_assignments::assigned_at.desc())
        .select((
            BountyAssignment::as_select(),
            BountyTemplate::as_select(),
            User::as_select(),
        ))
        .load::<(BountyAssignment, BountyTemplate, User)>(conn)?;
    rows.iter()
        .map(|(a, b, u)| a.with_joins(b, u).map_err(LifecycleError::from))
        .collect()
}
