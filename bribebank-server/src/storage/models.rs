use std::str::FromStr;

use bribebank_shared::api::{
    AssignedPrizeDto, BountyAssignmentDto, BountyTemplateDto, FamilyDto, HistoryEventDto,
    NotificationDto, RewardTemplateDto, StoreItemDto, UserDto, UserSummaryDto, WheelSegmentDto,
};
use bribebank_shared::auth::Role;
use bribebank_shared::domain::{BountyStatus, PrizeStatus, PrizeType, RewardType, UnknownVariant};
use chrono::{NaiveDateTime, SecondsFormat};
use diesel::prelude::*;

use super::StorageError;
use crate::storage::schema::{
    assigned_prizes, bounty_assignments, bounty_templates, families, history_events,
    notifications, push_subscriptions, reward_templates, sessions, store_items, users,
    wheel_segments,
};

/// RFC3339 with millisecond precision, always `Z`.
pub fn fmt_ts(ts: NaiveDateTime) -> String {
    ts.and_utc().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse<T>(raw: &str) -> Result<T, StorageError>
where
    T: FromStr<Err = UnknownVariant>,
{
    raw.parse::<T>()
        .map_err(|e| StorageError::InvalidValue(e.to_string()))
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = families)]
pub struct Family {
    pub id: String,
    pub name: String,
    pub join_code: Option<String>,
    pub join_code_expires_at: Option<NaiveDateTime>,
    pub spin_cost: i32,
    pub created_at: NaiveDateTime,
}

impl Family {
    pub fn to_dto(&self) -> FamilyDto {
        FamilyDto {
            id: self.id.clone(),
            name: self.name.clone(),
            join_code: self.join_code.clone(),
            join_code_expires_at: self.join_code_expires_at.map(fmt_ts),
            spin_cost: self.spin_cost,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = families)]
pub struct NewFamily<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub join_code: Option<&'a str>,
    pub join_code_expires_at: Option<NaiveDateTime>,
    pub spin_cost: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: String,
    pub family_id: String,
    pub username: String,
    pub password_hash: String,
    pub display_name: String,
    pub role: String,
    pub avatar_color: String,
    pub ticket_balance: i32,
    pub created_at: NaiveDateTime,
}

impl User {
    pub fn role(&self) -> Result<Role, StorageError> {
        parse(&self.role)
    }

    pub fn to_dto(&self) -> Result<UserDto, StorageError> {
        Ok(UserDto {
            id: self.id.clone(),
            family_id: self.family_id.clone(),
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            role: self.role()?,
            avatar_color: self.avatar_color.clone(),
            ticket_balance: self.ticket_balance,
            created_at: fmt_ts(self.created_at),
        })
    }

    pub fn to_summary(&self) -> Result<UserSummaryDto, StorageError> {
        Ok(UserSummaryDto {
            id: self.id.clone(),
            display_name: self.display_name.clone(),
            role: self.role()?,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub id: &'a str,
    pub family_id: &'a str,
    pub username: &'a str,
    pub password_hash: &'a str,
    pub display_name: &'a str,
    pub role: &'a str,
    pub avatar_color: &'a str,
    pub ticket_balance: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = reward_templates)]
pub struct RewardTemplate {
    pub id: String,
    pub family_id: String,
    pub title: String,
    pub emoji: String,
    pub description: Option<String>,
    pub prize_type: String,
    pub theme_color: Option<String>,
    pub created_at: NaiveDateTime,
}

impl RewardTemplate {
    pub fn prize_type(&self) -> Result<PrizeType, StorageError> {
        parse(&self.prize_type)
    }

    pub fn to_dto(&self) -> Result<RewardTemplateDto, StorageError> {
        Ok(RewardTemplateDto {
            id: self.id.clone(),
            family_id: self.family_id.clone(),
            title: self.title.clone(),
            emoji: self.emoji.clone(),
            description: self.description.clone(),
            prize_type: self.prize_type()?,
            theme_color: self.theme_color.clone(),
            created_at: fmt_ts(self.created_at),
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = reward_templates)]
pub struct NewRewardTemplate<'a> {
    pub id: &'a str,
    pub family_id: &'a str,
    pub title: &'a str,
    pub emoji: &'a str,
    pub description: Option<&'a str>,
    pub prize_type: &'a str,
    pub theme_color: Option<&'a str>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = bounty_templates)]
pub struct BountyTemplate {
    pub id: String,
    pub family_id: String,
    pub title: String,
    pub emoji: String,
    pub reward_type: String,
    pub reward_value: String,
    pub is_fcfs: bool,
    pub reward_template_id: Option<String>,
    pub theme_color: Option<String>,
    pub created_at: NaiveDateTime,
}

impl BountyTemplate {
    pub fn reward_type(&self) -> Result<RewardType, StorageError> {
        parse(&self.reward_type)
    }

    pub fn to_dto(&self) -> Result<BountyTemplateDto, StorageError> {
        Ok(BountyTemplateDto {
            id: self.id.clone(),
            family_id: self.family_id.clone(),
            title: self.title.clone(),
            emoji: self.emoji.clone(),
            reward_type: self.reward_type()?,
            reward_value: self.reward_value.clone(),
            is_fcfs: self.is_fcfs,
            reward_template_id: self.reward_template_id.clone(),
            theme_color: self.theme_color.clone(),
            created_at: fmt_ts(self.created_at),
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = bounty_templates)]
pub struct NewBountyTemplate<'a> {
    pub id: &'a str,
    pub family_id: &'a str,
    pub title: &'a str,
    pub emoji: &'a str,
    pub reward_type: &'a str,
    pub reward_value: &'a str,
    pub is_fcfs: bool,
    pub reward_template_id: Option<&'a str>,
    pub theme_color: Option<&'a str>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Associations)]
#[diesel(table_name = bounty_assignments)]
#[diesel(belongs_to(BountyTemplate, foreign_key = bounty_template_id))]
#[diesel(belongs_to(User, foreign_key = user_id))]
pub struct BountyAssignment {
    pub id: String,
    pub family_id: String,
    pub bounty_template_id: String,
    pub user_id: String,
    pub assigned_by: String,
    pub status: String,
    pub assigned_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
}

impl BountyAssignment {
    pub fn status(&self) -> Result<BountyStatus, StorageError> {
        parse(&self.status)
    }

    /// Bare assignment; `with_joins` attaches the template and assignee.
    pub fn to_dto(&self) -> Result<BountyAssignmentDto, StorageError> {
        Ok(BountyAssignmentDto {
            id: self.id.clone(),
            family_id: self.family_id.clone(),
            bounty_template_id: self.bounty_template_id.clone(),
            user_id: self.user_id.clone(),
            assigned_by: self.assigned_by.clone(),
            status: self.status()?,
            assigned_at: fmt_ts(self.assigned_at),
            completed_at: self.completed_at.map(fmt_ts),
            bounty: None,
            user: None,
        })
    }

    pub fn with_joins(
        &self,
        bounty: &BountyTemplate,
        user: &User,
    ) -> Result<BountyAssignmentDto, StorageError> {
        let mut dto = self.to_dto()?;
        dto.bounty = Some(bounty.to_dto()?);
        dto.user = Some(user.to_summary()?);
        Ok(dto)
    }
}

#[derive(Insertable)]
#[diesel(table_name = bounty_assignments)]
pub struct NewBountyAssignment<'a> {
    pub id: &'a str,
    pub family_id: &'a str,
    pub bounty_template_id: &'a str,
    pub user_id: &'a str,
    pub assigned_by: &'a str,
    pub status: &'a str,
    pub assigned_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = assigned_prizes)]
pub struct AssignedPrize {
    pub id: String,
    pub family_id: String,
    pub template_id: Option<String>,
    pub user_id: String,
    pub assigned_by: String,
    pub origin: String,
    pub status: String,
    pub title: String,
    pub emoji: String,
    pub description: Option<String>,
    pub prize_type: String,
    pub theme_color: Option<String>,
    pub assigned_at: NaiveDateTime,
    pub claimed_at: Option<NaiveDateTime>,
    pub redeemed_at: Option<NaiveDateTime>,
}

impl AssignedPrize {
    pub fn status(&self) -> Result<PrizeStatus, StorageError> {
        parse(&self.status)
    }

    pub fn to_dto(&self) -> Result<AssignedPrizeDto, StorageError> {
        Ok(AssignedPrizeDto {
            id: self.id.clone(),
            family_id: self.family_id.clone(),
            template_id: self.template_id.clone(),
            user_id: self.user_id.clone(),
            assigned_by: self.assigned_by.clone(),
            origin: parse(&self.origin)?,
            status: self.status()?,
            title: self.title.clone(),
            emoji: self.emoji.clone(),
            description: self.description.clone(),
            prize_type: parse(&self.prize_type)?,
            theme_color: self.theme_color.clone(),
            assigned_at: fmt_ts(self.assigned_at),
            claimed_at: self.claimed_at.map(fmt_ts),
            redeemed_at: self.redeemed_at.map(fmt_ts),
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = assigned_prizes)]
pub struct NewAssignedPrize<'a> {
    pub id: &'a str,
    pub family_id: &'a str,
    pub template_id: Option<&'a str>,
    pub user_id: &'a str,
    pub assigned_by: &'a str,
    pub origin: &'a str,
    pub status: &'a str,
    pub title: &'a str,
    pub emoji: &'a str,
    pub description: Option<&'a str>,
    pub prize_type: &'a str,
    pub theme_color: Option<&'a str>,
    pub assigned_at: NaiveDateTime,
    pub claimed_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = store_items)]
pub struct StoreItem {
    pub id: String,
    pub family_id: String,
    pub title: String,
    pub cost: i32,
    pub image_url: Option<String>,
    pub product_url: Option<String>,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

impl From<&StoreItem> for StoreItemDto {
    fn from(item: &StoreItem) -> Self {
        StoreItemDto {
            id: item.id.clone(),
            family_id: item.family_id.clone(),
            title: item.title.clone(),
            cost: item.cost,
            image_url: item.image_url.clone(),
            product_url: item.product_url.clone(),
            description: item.description.clone(),
            created_at: fmt_ts(item.created_at),
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = store_items)]
pub struct NewStoreItem<'a> {
    pub id: &'a str,
    pub family_id: &'a str,
    pub title: &'a str,
    pub cost: i32,
    pub image_url: Option<&'a str>,
    pub product_url: Option<&'a str>,
    pub description: Option<&'a str>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable, Insertable)]
#[diesel(table_name = wheel_segments)]
pub struct WheelSegment {
    pub id: String,
    pub family_id: String,
    pub position: i32,
    pub label: String,
    pub color: String,
    pub prob: f64,
    pub is_losing: bool,
    pub emoji: String,
}

impl From<&WheelSegment> for WheelSegmentDto {
    fn from(s: &WheelSegment) -> Self {
        WheelSegmentDto {
            id: s.id.clone(),
            position: s.position,
            label: s.label.clone(),
            color: s.color.clone(),
            prob: s.prob,
            is_losing: s.is_losing,
            emoji: s.emoji.clone(),
        }
    }
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = history_events)]
pub struct HistoryEvent {
    pub id: i32,
    pub family_id: String,
    pub user_id: String,
    pub user_name: String,
    pub title: String,
    pub emoji: String,
    pub action: String,
    pub assigner_name: String,
    pub created_at: NaiveDateTime,
}

impl From<&HistoryEvent> for HistoryEventDto {
    fn from(h: &HistoryEvent) -> Self {
        HistoryEventDto {
            id: h.id,
            family_id: h.family_id.clone(),
            user_id: h.user_id.clone(),
            user_name: h.user_name.clone(),
            title: h.title.clone(),
            emoji: h.emoji.clone(),
            action: h.action.clone(),
            assigner_name: h.assigner_name.clone(),
            created_at: fmt_ts(h.created_at),
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = history_events)]
pub struct NewHistoryEvent<'a> {
    pub family_id: &'a str,
    pub user_id: &'a str,
    pub user_name: &'a str,
    pub title: &'a str,
    pub emoji: &'a str,
    pub action: &'a str,
    pub assigner_name: &'a str,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = notifications)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
}

impl From<&Notification> for NotificationDto {
    fn from(n: &Notification) -> Self {
        NotificationDto {
            id: n.id.clone(),
            user_id: n.user_id.clone(),
            message: n.message.clone(),
            is_read: n.is_read,
            created_at: fmt_ts(n.created_at),
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub message: &'a str,
    pub is_read: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[diesel(table_name = sessions)]
pub struct NewSession<'a> {
    pub jti: &'a str,
    pub user_id: &'a str,
}

#[derive(Debug, Clone, Queryable, Identifiable, Selectable)]
#[diesel(table_name = push_subscriptions)]
pub struct PushSubscription {
    pub id: i32,
    pub family_id: String,
    pub user_id: String,
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub last_success_at: Option<NaiveDateTime>,
    pub last_error: Option<String>,
}

#[derive(Insertable)]
#[diesel(table_name = push_subscriptions)]
pub struct NewPushSubscription<'a> {
    pub family_id: &'a str,
    pub user_id: &'a str,
    pub endpoint: &'a str,
    pub p256dh: &'a str,
    pub auth: &'a str,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
