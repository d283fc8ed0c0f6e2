//! Parent-managed catalogues: reward templates, bounty templates and store
//! items. Every change is broadcast so open boards refetch.

use bribebank_shared::api::{
    BountyTemplateDto, BountyTemplateReq, ErrorCode, RewardTemplateDto, RewardTemplateReq,
    ServerEvent, StoreItemDto, StoreItemReq, TemplateAction, TemplateTarget,
};
use bribebank_shared::domain::{RewardType, parse_ticket_amount};
use diesel::prelude::*;
use tracing::info;

use super::guard::load_actor;
use super::{LifecycleError, Outcome, new_id, non_blank, now, now_ms, required};
use crate::storage::models::{
    BountyTemplate, NewBountyTemplate, NewRewardTemplate, NewStoreItem, RewardTemplate, StoreItem,
};
use crate::storage::schema::{bounty_assignments, bounty_templates, reward_templates, store_items};

fn template_event(family_id: &str, target: TemplateTarget, action: TemplateAction) -> ServerEvent {
    ServerEvent::TemplateUpdate {
        family_id: family_id.to_string(),
        target,
        action,
        timestamp: now_ms(),
    }
}

// Reward templates

fn find_reward_template(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<RewardTemplate, LifecycleError> {
    reward_templates::table
        .filter(reward_templates::id.eq(id))
        .select(RewardTemplate::as_select())
        .first(conn)
        .optional()?
        .ok_or(LifecycleError::NotFound(ErrorCode::NotFound))
}

pub fn list_reward_templates(
    conn: &mut SqliteConnection,
    caller_id: &str,
    family_id: &str,
) -> Result<Vec<RewardTemplateDto>, LifecycleError> {
    load_actor(conn, caller_id)?.require_member(family_id)?;
    let rows = reward_templates::table
        .filter(reward_templates::family_id.eq(family_id))
        .order(reward_templates::created_at.asc())
        .select(RewardTemplate::as_select())
        .load(conn)?;
    rows.iter()
        .map(|t| t.to_dto().map_err(LifecycleError::from))
        .collect()
}

pub fn create_reward_template(
    conn: &mut SqliteConnection,
    caller_id: &str,
    family_id: &str,
    req: RewardTemplateReq,
) -> Result<Outcome<RewardTemplateDto>, LifecycleError> {
    let title = required(req.title)?;
    let emoji = required(req.emoji)?;
    let prize_type = req
        .prize_type
        .ok_or(LifecycleError::Validation(ErrorCode::MissingFields))?;

    load_actor(conn, caller_id)?.require_parent(family_id)?;

    let id = new_id();
    let description = non_blank(req.description);
    let theme_color = non_blank(req.theme_color);
    diesel::insert_into(reward_templates::table)
        .values(&NewRewardTemplate {
            id: &id,
            family_id,
            title: &title,
            emoji: &emoji,
            description: description.as_deref(),
            prize_type: prize_type.as_str(),
            theme_color: theme_color.as_deref(),
            created_at: now(),
        })
        .execute(conn)?;
    info!(template_id = %id, "reward template created");

    let dto = find_reward_template(conn, &id)?.to_dto()?;
    Ok(Outcome::new(dto).broadcast(template_event(
        family_id,
        TemplateTarget::RewardTemplate,
        TemplateAction::Created,
    )))
}

/// Absent fields keep their stored value. Already-granted prizes are
/// snapshots and never change.
pub fn update_reward_template(
    conn: &mut SqliteConnection,
    caller_id: &str,
    template_id: &str,
    req: RewardTemplateReq,
) -> Result<Outcome<RewardTemplateDto>, LifecycleError> {
    let actor = load_actor(conn, caller_id)?;
    let existing = find_reward_template(conn, template_id)?;
    actor.require_parent(&existing.family_id)?;

    let prize_type = match req.prize_type {
        Some(t) => t,
        None => existing.prize_type()?,
    };
    diesel::update(reward_templates::table.filter(reward_templates::id.eq(&existing.id)))
        .set((
            reward_templates::title.eq(non_blank(req.title).unwrap_or(existing.title.clone())),
            reward_templates::emoji.eq(non_blank(req.emoji).unwrap_or(existing.emoji.clone())),
            reward_templates::description.eq(req.description.or(existing.description.clone())),
            reward_templates::prize_type.eq(prize_type.as_str()),
            reward_templates::theme_color.eq(req.theme_color.or(existing.theme_color.clone())),
        ))
        .execute(conn)?;

    let dto = find_reward_template(conn, &existing.id)?.to_dto()?;
    Ok(Outcome::new(dto).broadcast(template_event(
        &existing.family_id,
        TemplateTarget::RewardTemplate,
        TemplateAction::Updated,
    )))
}

/// Bounties that linked the template fall back to an inline reward.
pub fn delete_reward_template(
    conn: &mut SqliteConnection,
    caller_id: &str,
    template_id: &str,
) -> Result<Outcome<()>, LifecycleError> {
    let actor = load_actor(conn, caller_id)?;
    let existing = find_reward_template(conn, template_id)?;
    actor.require_parent(&existing.family_id)?;

    diesel::delete(reward_templates::table.filter(reward_templates::id.eq(&existing.id)))
        .execute(conn)?;
    info!(template_id = %existing.id, "reward template deleted");

    Ok(Outcome::new(()).broadcast(template_event(
        &existing.family_id,
        TemplateTarget::RewardTemplate,
        TemplateAction::Deleted,
    )))
}

// Bounty templates

fn find_bounty_template(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<BountyTemplate, LifecycleError> {
    bounty_templates::table
        .filter(bounty_templates::id.eq(id))
        .select(BountyTemplate::as_select())
        .first(conn)
        .optional()?
        .ok_or(LifecycleError::NotFound(ErrorCode::NotFound))
}

fn check_reward_value(reward_type: RewardType, value: &str) -> Result<(), LifecycleError> {
    if reward_type == RewardType::Tickets && parse_ticket_amount(value).is_none() {
        return Err(LifecycleError::Validation(ErrorCode::InvalidTicketAmount));
    }
    Ok(())
}

fn check_reward_link(
    conn: &mut SqliteConnection,
    family_id: &str,
    reward_template_id: Option<&str>,
) -> Result<(), LifecycleError> {
    let Some(tid) = reward_template_id else {
        return Ok(());
    };
    let found: i64 = reward_templates::table
        .filter(reward_templates::id.eq(tid))
        .filter(reward_templates::family_id.eq(family_id))
        .count()
        .get_result(conn)?;
    if found == 0 {
        return Err(LifecycleError::NotFound(ErrorCode::TemplateNotFound));
    }
    Ok(())
}

pub fn list_bounty_templates(
    conn: &mut SqliteConnection,
    caller_id: &str,
    family_id: &str,
) -> Result<Vec<BountyTemplateDto>, LifecycleError> {
    load_actor(conn, caller_id)?.require_member(family_id)?;
    let rows = bounty_templates::table
        .filter(bounty_templates::family_id.eq(family_id))
        .order(bounty_templates::created_at.asc())
        .select(BountyTemplate::as_select())
        .load(conn)?;
    rows.iter()
        .map(|t| t.to_dto().map_err(LifecycleError::from))
        .collect()
}

pub fn create_bounty_template(
    conn: &mut SqliteConnection,
    caller_id: &str,
    family_id: &str,
    req: BountyTemplateReq,
) -> Result<Outcome<BountyTemplateDto>, LifecycleError> {
    let title = required(req.title)?;
    let emoji = required(req.emoji)?;
    let reward_value = required(req.reward_value)?;
    let reward_type = req.reward_type.unwrap_or(RewardType::Value);
    check_reward_value(reward_type, &reward_value)?;

    load_actor(conn, caller_id)?.require_parent(family_id)?;
    let reward_template_id = non_blank(req.reward_template_id);
    check_reward_link(conn, family_id, reward_template_id.as_deref())?;

    let id = new_id();
    let theme_color = non_blank(req.theme_color);
    diesel::insert_into(bounty_templates::table)
        .values(&NewBountyTemplate {
            id: &id,
            family_id,
            title: &title,
            emoji: &emoji,
            reward_type: reward_type.as_str(),
            reward_value: reward_value.trim(),
            is_fcfs: req.is_fcfs.unwrap_or(false),
            reward_template_id: reward_template_id.as_deref(),
            theme_color: theme_color.as_deref(),
            created_at: now(),
        })
        .execute(conn)?;
    info!(bounty_id = %id, reward_type = %reward_type, "bounty template created");

    let dto = find_bounty_template(conn, &id)?.to_dto()?;
    Ok(Outcome::new(dto).broadcast(template_event(
        family_id,
        TemplateTarget::BountyTemplate,
        TemplateAction::Created,
    )))
}

/// Absent fields keep their stored value; a blank `rewardTemplateId` unlinks.
pub fn update_bounty_template(
    conn: &mut SqliteConnection,
    caller_id: &str,
    bounty_id: &str,
    req: BountyTemplateReq,
) -> Result<Outcome<BountyTemplateDto>, LifecycleError> {
    let actor = load_actor(conn, caller_id)?;
    let existing = find_bounty_template(conn, bounty_id)?;
    actor.require_parent(&existing.family_id)?;

    let reward_type = match req.reward_type {
        Some(t) => t,
        None => existing.reward_type()?,
    };
    let reward_value = non_blank(req.reward_value).unwrap_or(existing.reward_value.clone());
    check_reward_value(reward_type, &reward_value)?;
    let reward_template_id = match req.reward_template_id {
        Some(raw) => non_blank(Some(raw)),
        None => existing.reward_template_id.clone(),
    };
    check_reward_link(conn, &existing.family_id, reward_template_id.as_deref())?;

    diesel::update(bounty_templates::table.filter(bounty_templates::id.eq(&existing.id)))
        .set((
            bounty_templates::title.eq(non_blank(req.title).unwrap_or(existing.title.clone())),
            bounty_templates::emoji.eq(non_blank(req.emoji).unwrap_or(existing.emoji.clone())),
            bounty_templates::reward_type.eq(reward_type.as_str()),
            bounty_templates::reward_value.eq(reward_value.trim()),
            bounty_templates::is_fcfs.eq(req.is_fcfs.unwrap_or(existing.is_fcfs)),
            bounty_templates::reward_template_id.eq(reward_template_id),
            bounty_templates::theme_color.eq(req.theme_color.or(existing.theme_color.clone())),
        ))
        .execute(conn)?;

    let dto = find_bounty_template(conn, &existing.id)?.to_dto()?;
    Ok(Outcome::new(dto).broadcast(template_event(
        &existing.family_id,
        TemplateTarget::BountyTemplate,
        TemplateAction::Updated,
    )))
}

/// Removes the template together with all of its assignments.
pub fn delete_bounty_template(
    conn: &mut SqliteConnection,
    caller_id: &str,
    bounty_id: &str,
) -> Result<Outcome<()>, LifecycleError> {
    let actor = load_actor(conn, caller_id)?;
    let existing = find_bounty_template(conn, bounty_id)?;
    actor.require_parent(&existing.family_id)?;

    let removed = diesel::delete(
        bounty_assignments::table.filter(bounty_assignments::bounty_template_id.eq(&existing.id)),
    )
    .execute(conn)?;
    diesel::delete(bounty_templates::table.filter(bounty_templates::id.eq(&existing.id)))
        .execute(conn)?;
    info!(bounty_id = %existing.id, assignments = removed, "bounty template deleted");

    Ok(Outcome::new(()).broadcast(template_event(
        &existing.family_id,
        TemplateTarget::BountyTemplate,
        TemplateAction::Deleted,
    )))
}

// Store items

fn find_store_item(conn: &mut SqliteConnection, id: &str) -> Result<StoreItem, LifecycleError> {
    store_items::table
        .filter(store_items::id.eq(id))
        .select(StoreItem::as_select())
        .first(conn)
        .optional()?
        .ok_or(LifecycleError::NotFound(ErrorCode::ItemNotFound))
}

pub fn list_store_items(
    conn: &mut SqliteConnection,
    caller_id: &str,
    family_id: &str,
) -> Result<Vec<StoreItemDto>, LifecycleError> {
    load_actor(conn, caller_id)?.require_member(family_id)?;
    let rows = store_items::table
        .filter(store_items::family_id.eq(family_id))
        .order(store_items::created_at.asc())
        .select(StoreItem::as_select())
        .load(conn)?;
    Ok(rows.iter().map(StoreItemDto::from).collect())
}

pub fn create_store_item(
    conn: &mut SqliteConnection,
    caller_id: &str,
    family_id: &str,
    req: StoreItemReq,
) -> Result<Outcome<StoreItemDto>, LifecycleError> {
    let title = required(req.title)?;
    let cost = req
        .cost
        .ok_or(LifecycleError::Validation(ErrorCode::MissingFields))?;
    if cost < 0 {
        return Err(LifecycleError::Validation(ErrorCode::InvalidAmount));
    }

    load_actor(conn, caller_id)?.require_parent(family_id)?;

    let id = new_id();
    let image_url = non_blank(req.image_url);
    let product_url = non_blank(req.product_url);
    let description = non_blank(req.description);
    diesel::insert_into(store_items::table)
        .values(&NewStoreItem {
            id: &id,
            family_id,
            title: &title,
            cost,
            image_url: image_url.as_deref(),
            product_url: product_url.as_deref(),
            description: description.as_deref(),
            created_at: now(),
        })
        .execute(conn)?;
    info!(item_id = %id, cost, "store item created");

    let dto = StoreItemDto::from(&find_store_item(conn, &id)?);
    Ok(Outcome::new(dto).broadcast(ServerEvent::StoreItemAdded {
        family_id: family_id.to_string(),
        item_id: id,
        timestamp: now_ms(),
    }))
}

pub fn update_store_item(
    conn: &mut SqliteConnection,
    caller_id: &str,
    item_id: &str,
    req: StoreItemReq,
) -> Result<Outcome<StoreItemDto>, LifecycleError> {
    let actor = load_actor(conn, caller_id)?;
    let existing = find_store_item(conn, item_id)?;
    actor.require_parent(&existing.family_id)?;
    let cost = req.cost.unwrap_or(existing.cost);
    if cost < 0 {
        return Err(LifecycleError::Validation(ErrorCode::InvalidAmount));
    }

    diesel::update(store_items::table.filter(store_items::id.eq(&existing.id)))
        .set((
            store_items::title.eq(non_blank(req.title).unwrap_or(existing.title.clone())),
            store_items::cost.eq(cost),
            store_items::image_url.eq(req.image_url.or(existing.image_url.clone())),
            store_items::product_url.eq(req.product_url.or(existing.product_url.clone())),
            store_items::description.eq(req.description.or(existing.description.clone())),
        ))
        .execute(conn)?;

    let dto = StoreItemDto::from(&find_store_item(conn, &existing.id)?);
    Ok(Outcome::new(dto).broadcast(ServerEvent::StoreItemUpdated {
        family_id: existing.family_id.clone(),
        item_id: existing.id.clone(),
        timestamp: now_ms(),
    }))
}

/// Prizes already bought from the item are snapshots and survive.
pub fn delete_store_item(
    conn: &mut SqliteConnection,
    caller_id: &str,
    item_id: &str,
) -> Result<Outcome<()>, LifecycleError> {
    let actor = load_actor(conn, caller_id)?;
    let existing = find_store_item(conn, item_id)?;
    actor.require_parent(&existing.family_id)?;

    diesel::delete(store_items::table.filter(store_items::id.eq(&existing.id))).execute(conn)?;
    info!(item_id = %existing.id, "store item deleted");

    Ok(Outcome::new(()).broadcast(ServerEvent::StoreItemDeleted {
        family_id: existing.family_id.clone(),
        item_id: existing.id.clone(),
        timestamp: now_ms(),
    }))
}
