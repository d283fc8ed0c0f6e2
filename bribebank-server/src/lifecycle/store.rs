//! Ticket ledger: store purchases and direct grants.

use bribebank_shared::api::{
    ErrorCode, GiveTicketsReq, PurchaseReq, PurchaseResp, PushPayload, ServerEvent,
    TicketBalanceResp,
};
use bribebank_shared::domain::{PrizeOrigin, PrizeStatus, PrizeType};
use diesel::prelude::*;
use tracing::info;

use super::guard::{find_user, load_actor, parent_ids};
use super::records::{HistoryAction, HistoryEntry, log_history, notify, notify_all};
use super::tasks::TICKET_EMOJI;
use super::{LifecycleError, Outcome, new_id, now, now_ms, required};
use crate::storage::models::{NewAssignedPrize, StoreItem};
use crate::storage::schema::{assigned_prizes, store_items, users};

const STORE_EMOJI: &str = "🛍️";
const STORE_ASSIGNER: &str = "store_system";
const STORE_THEME: &str = "bg-teal-100 text-teal-800 border-teal-200";
const APPROVALS_URL: &str = "/?view=admin&adminTab=approvals";

/// Subtracts `amount` only if the balance covers it. The guard lives in the
/// UPDATE itself so the check and the write cannot be split.
pub(crate) fn spend_tickets(
    conn: &mut SqliteConnection,
    user_id: &str,
    amount: i32,
) -> Result<i32, LifecycleError> {
    let updated = diesel::update(
        users::table
            .filter(users::id.eq(user_id))
            .filter(users::ticket_balance.ge(amount)),
    )
    .set(users::ticket_balance.eq(users::ticket_balance - amount))
    .execute(conn)?;
    if updated == 0 {
        return Err(LifecycleError::InvalidState(ErrorCode::InsufficientTickets));
    }
    current_balance(conn, user_id)
}

fn current_balance(conn: &mut SqliteConnection, user_id: &str) -> Result<i32, LifecycleError> {
    Ok(users::table
        .filter(users::id.eq(user_id))
        .select(users::ticket_balance)
        .first(conn)?)
}

/// Spends tickets on a store item. The resulting prize starts in
/// PENDING_APPROVAL because a parent has to fulfil it.
pub fn purchase(
    conn: &mut SqliteConnection,
    caller_id: &str,
    item_id: &str,
    req: PurchaseReq,
) -> Result<Outcome<PurchaseResp>, LifecycleError> {
    let user_id = required(req.user_id)?;

    let actor = load_actor(conn, caller_id)?;
    let item = store_items::table
        .filter(store_items::id.eq(item_id))
        .select(StoreItem::as_select())
        .first(conn)
        .optional()?
        .ok_or(LifecycleError::NotFound(ErrorCode::ItemNotFound))?;
    let buyer = find_user(conn, &user_id)?
        .ok_or(LifecycleError::NotFound(ErrorCode::UserNotFound))?;
    if buyer.family_id != item.family_id {
        return Err(LifecycleError::Forbidden(ErrorCode::Forbidden));
    }
    actor.require_member(&buyer.family_id)?;
    let family_id = buyer.family_id.as_str();

    if buyer.ticket_balance < item.cost {
        return Err(LifecycleError::InvalidState(ErrorCode::InsufficientTickets));
    }
    let new_balance = spend_tickets(conn, &buyer.id, item.cost)?;

    let prize_id = new_id();
    let stamp = now();
    let title = format!("STORE: {}", item.title);
    let description = format!(
        "Bought from store. Link: {}",
        item.product_url.as_deref().unwrap_or("N/A")
    );
    diesel::insert_into(assigned_prizes::table)
        .values(&NewAssignedPrize {
            id: &prize_id,
            family_id,
            template_id: None,
            user_id: &buyer.id,
            assigned_by: STORE_ASSIGNER,
            origin: PrizeOrigin::Store.as_str(),
            status: PrizeStatus::PendingApproval.as_str(),
            title: &title,
            emoji: STORE_EMOJI,
            description: Some(&description),
            prize_type: PrizeType::Privilege.as_str(),
            theme_color: Some(STORE_THEME),
            assigned_at: stamp,
            claimed_at: Some(stamp),
        })
        .execute(conn)?;

    let parents = parent_ids(conn, family_id)?;
    notify_all(
        conn,
        &parents,
        &format!(
            "{} bought \"{}\" from the store! Please fulfill.",
            buyer.display_name, item.title
        ),
    )?;

    info!(
        item_id = %item.id,
        user_id = %buyer.id,
        cost = item.cost,
        new_balance,
        "store purchase"
    );

    let payload = PushPayload::new(
        "STORE_PURCHASE",
        "store-purchase",
        family_id,
        format!("Store Purchase Request {}", STORE_EMOJI),
        format!(
            "{} bought \"{}\" - Please fulfill!",
            buyer.display_name, item.title
        ),
    )
    .with_url(APPROVALS_URL)
    .with_field("assignmentId", prize_id.as_str());
    let event = ServerEvent::StorePurchase {
        family_id: family_id.to_string(),
        user_id: buyer.id.clone(),
        item_id: item.id.clone(),
        assignment_id: prize_id.clone(),
        new_balance,
        timestamp: now_ms(),
    };
    Ok(Outcome::new(PurchaseResp {
        success: true,
        ticket_balance: new_balance,
        assignment_id: prize_id,
    })
    .push(parents, payload)
    .broadcast(event))
}

/// Credits tickets to a family member.
pub fn give_tickets(
    conn: &mut SqliteConnection,
    caller_id: &str,
    user_id: &str,
    req: GiveTicketsReq,
) -> Result<Outcome<TicketBalanceResp>, LifecycleError> {
    let amount = req
        .amount
        .filter(|a| *a > 0)
        .and_then(|a| i32::try_from(a).ok())
        .ok_or(LifecycleError::Validation(ErrorCode::InvalidAmount))?;

    let parent = load_actor(conn, caller_id)?;
    let child = find_user(conn, user_id)?
        .ok_or(LifecycleError::NotFound(ErrorCode::UserNotFound))?;
    parent.require_parent(&child.family_id)?;
    let new_balance = child
        .ticket_balance
        .checked_add(amount)
        .ok_or(LifecycleError::Validation(ErrorCode::InvalidAmount))?;
    let family_id = child.family_id.as_str();

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
            action: HistoryAction::ReceivedTickets,
            assigner_name: &parent.display_name,
        },
    )?;
    let message = format!("{} gave you {} tickets!", parent.display_name, amount);
    notify(conn, &child.id, &message)?;

    info!(user_id = %child.id, amount, new_balance, "tickets given");

    let payload = PushPayload::new(
        "TICKETS_GIVEN",
        "tickets-received",
        family_id,
        format!("You received tickets! {}", TICKET_EMOJI),
        message,
    )
    .with_field("amount", amount)
    .with_field("newBalance", new_balance);
    let event = ServerEvent::TicketsGiven {
        family_id: family_id.to_string(),
        user_id: child.id.clone(),
        amount,
        new_balance,
        timestamp: now_ms(),
    };
    Ok(Outcome::new(TicketBalanceResp {
        user_id: child.id.clone(),
        ticket_balance: new_balance,
    })
    .push(vec![child.id.clone()], payload)
    .broadcast(event))
}

pub fn balance(
    conn: &mut SqliteConnection,
    caller_id: &str,
    user_id: &str,
) -> Result<TicketBalanceResp, LifecycleError> {
    let actor = load_actor(conn, caller_id)?;
    let user = find_user(conn, user_id)?
        .ok_or(LifecycleError::NotFound(ErrorCode::UserNotFound))?;
    actor.require_member(&user.family_id)?;
    Ok(TicketBalanceResp {
        user_id: user.id,
        ticket_balance: user.ticket_balance,
    })
}
