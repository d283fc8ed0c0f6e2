use serde::{Deserialize, Serialize};

use crate::auth::Role;
use crate::domain::{BountyStatus, PrizeOrigin, PrizeStatus, PrizeType, RewardType};

pub mod endpoints;
mod events;

pub use events::{ChildActionKind, ServerEvent, TemplateAction, TemplateTarget, WalletReason};

pub const API_V1_PREFIX: &str = "/api/v1";

/// Stable, machine-readable failure codes. Clients branch on these; the
/// JSON body of every error response is `{"error": "<CODE>"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MissingFields,
    InvalidAmount,
    InvalidTicketAmount,
    InvalidSegments,
    ProbabilitiesMustSumToOne,
    InvalidSubscription,
    MissingEndpoint,
    CannotDeleteSelf,
    CannotAssignSelf,
    CannotChangeOwnRole,
    InvalidJoinCode,
    InvalidAvatarColor,
    Unauthenticated,
    InvalidCredentials,
    Forbidden,
    ParentOnly,
    OnlyAssigneeCanAccept,
    OnlyAssigneeCanComplete,
    OnlyAssigneeCanClaim,
    CannotVerifyOwnTask,
    NotFound,
    BountyNotFound,
    UserNotFound,
    TemplateNotFound,
    ItemNotFound,
    FamilyNotFound,
    InvalidStatus,
    InsufficientTickets,
    NoWheelSegments,
    UsernameTaken,
    PushNotConfigured,
    InternalServerError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MissingFields => "MISSING_FIELDS",
            ErrorCode::InvalidAmount => "INVALID_AMOUNT",
            ErrorCode::InvalidTicketAmount => "INVALID_TICKET_AMOUNT",
            ErrorCode::InvalidSegments => "INVALID_SEGMENTS",
            ErrorCode::ProbabilitiesMustSumToOne => "PROBABILITIES_MUST_SUM_TO_ONE",
            ErrorCode::InvalidSubscription => "INVALID_SUBSCRIPTION",
            ErrorCode::MissingEndpoint => "MISSING_ENDPOINT",
            ErrorCode::CannotDeleteSelf => "CANNOT_DELETE_SELF",
            ErrorCode::CannotAssignSelf => "CANNOT_ASSIGN_SELF",
            ErrorCode::CannotChangeOwnRole => "CANNOT_CHANGE_OWN_ROLE",
            ErrorCode::InvalidJoinCode => "INVALID_JOIN_CODE",
            ErrorCode::InvalidAvatarColor => "INVALID_AVATAR_COLOR",
            ErrorCode::Unauthenticated => "UNAUTHENTICATED",
            ErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::ParentOnly => "PARENT_ONLY",
            ErrorCode::OnlyAssigneeCanAccept => "ONLY_ASSIGNEE_CAN_ACCEPT",
            ErrorCode::OnlyAssigneeCanComplete => "ONLY_ASSIGNEE_CAN_COMPLETE",
            ErrorCode::OnlyAssigneeCanClaim => "ONLY_ASSIGNEE_CAN_CLAIM",
            ErrorCode::CannotVerifyOwnTask => "CANNOT_VERIFY_OWN_TASK",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::BountyNotFound => "BOUNTY_NOT_FOUND",
            ErrorCode::UserNotFound => "USER_NOT_FOUND",
            ErrorCode::TemplateNotFound => "TEMPLATE_NOT_FOUND",
            ErrorCode::ItemNotFound => "ITEM_NOT_FOUND",
            ErrorCode::FamilyNotFound => "FAMILY_NOT_FOUND",
            ErrorCode::InvalidStatus => "INVALID_STATUS",
            ErrorCode::InsufficientTickets => "INSUFFICIENT_TICKETS",
            ErrorCode::NoWheelSegments => "NO_WHEEL_SEGMENTS",
            ErrorCode::UsernameTaken => "USERNAME_TAKEN",
            ErrorCode::PushNotConfigured => "PUSH_NOT_CONFIGURED",
            ErrorCode::InternalServerError => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorCode,
}

// Auth
#[derive(Debug, Serialize, Deserialize)]
pub struct AuthReq {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterReq {
    pub username: Option<String>,
    pub password: Option<String>,
    pub display_name: Option<String>,
    pub family_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResp {
    pub token: String,
    pub user: UserDto,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResp {
    pub token: String,
    pub join_code: String,
    pub user: UserDto,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinFamilyReq {
    pub join_code: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinFamilyResp {
    pub token: String,
    pub family_name: String,
    pub user: UserDto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyDto {
    pub id: String,
    pub name: String,
    pub join_code: Option<String>,
    pub join_code_expires_at: Option<String>,
    pub spin_cost: i32,
}

/// The caller's own profile together with their family.
#[derive(Debug, Serialize, Deserialize)]
pub struct MeResp {
    pub user: UserDto,
    pub family: FamilyDto,
}

// Family members
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub id: String,
    pub family_id: String,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub avatar_color: String,
    pub ticket_balance: i32,
    pub created_at: String, // RFC3339 UTC
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummaryDto {
    pub id: String,
    pub display_name: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserReq {
    pub username: Option<String>,
    pub password: Option<String>,
    pub display_name: Option<String>,
    pub role: Option<Role>,
}

/// Profile edit; omitted fields keep their current value.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserReq {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub role: Option<Role>,
    pub avatar_color: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordReq {
    pub new_password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinCodeResp {
    pub join_code: String,
    pub expires_at: String,
}

// Reward templates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardTemplateDto {
    pub id: String,
    pub family_id: String,
    pub title: String,
    pub emoji: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub prize_type: PrizeType,
    pub theme_color: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardTemplateReq {
    pub title: Option<String>,
    pub emoji: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub prize_type: Option<PrizeType>,
    pub theme_color: Option<String>,
}

// Bounty templates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BountyTemplateDto {
    pub id: String,
    pub family_id: String,
    pub title: String,
    pub emoji: String,
    pub reward_type: RewardType,
    pub reward_value: String,
    #[serde(rename = "isFCFS")]
    pub is_fcfs: bool,
    pub reward_template_id: Option<String>,
    pub theme_color: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BountyTemplateReq {
    pub title: Option<String>,
    pub emoji: Option<String>,
    pub reward_type: Option<RewardType>,
    pub reward_value: Option<String>,
    #[serde(rename = "isFCFS")]
    pub is_fcfs: Option<bool>,
    pub reward_template_id: Option<String>,
    pub theme_color: Option<String>,
}

// Bounty assignments
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BountyAssignmentDto {
    pub id: String,
    pub family_id: String,
    pub bounty_template_id: String,
    pub user_id: String,
    pub assigned_by: String,
    pub status: BountyStatus,
    pub assigned_at: String,
    pub completed_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounty: Option<BountyTemplateDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummaryDto>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignBountyReq {
    #[serde(alias = "bountyTemplateId")]
    pub bounty_id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyBountyResp {
    pub assignment: BountyAssignmentDto,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prize: Option<AssignedPrizeDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tickets_awarded: Option<i32>,
}

// Assigned prizes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedPrizeDto {
    pub id: String,
    pub family_id: String,
    pub template_id: Option<String>,
    pub user_id: String,
    pub assigned_by: String,
    pub origin: PrizeOrigin,
    pub status: PrizeStatus,
    pub title: String,
    pub emoji: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub prize_type: PrizeType,
    pub theme_color: Option<String>,
    pub assigned_at: String,
    pub claimed_at: Option<String>,
    pub redeemed_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignPrizeReq {
    pub template_id: Option<String>,
    pub user_id: Option<String>,
}

// Store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreItemDto {
    pub id: String,
    pub family_id: String,
    pub title: String,
    pub cost: i32,
    pub image_url: Option<String>,
    pub product_url: Option<String>,
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreItemReq {
    pub title: Option<String>,
    pub cost: Option<i32>,
    pub image_url: Option<String>,
    pub product_url: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseReq {
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseResp {
    pub success: bool,
    pub ticket_balance: i32,
    pub assignment_id: String,
}

// Tickets
#[derive(Debug, Serialize, Deserialize)]
pub struct GiveTicketsReq {
    pub amount: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketBalanceResp {
    pub user_id: String,
    pub ticket_balance: i32,
}

// Wheel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WheelSegmentDto {
    pub id: String,
    pub position: i32,
    pub label: String,
    pub color: String,
    pub prob: f64,
    pub is_losing: bool,
    pub emoji: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WheelSegmentInput {
    pub label: Option<String>,
    pub color: Option<String>,
    pub prob: Option<f64>,
    pub is_losing: Option<bool>,
    pub emoji: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateWheelReq {
    pub segments: Option<Vec<WheelSegmentInput>>,
    pub spin_cost: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WheelConfigDto {
    pub segments: Vec<WheelSegmentDto>,
    pub spin_cost: i32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinCostDto {
    pub spin_cost: i32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinReq {
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpinResp {
    pub won: bool,
    pub prize: String,
    pub emoji: String,
    pub new_balance: i32,
}

// History & notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEventDto {
    pub id: i32,
    pub family_id: String,
    pub user_id: String,
    pub user_name: String,
    pub title: String,
    pub emoji: String,
    pub action: String,
    pub assigner_name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationDto {
    pub id: String,
    pub user_id: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: String,
}

// Push
#[derive(Debug, Serialize, Deserialize)]
pub struct PushKeys {
    pub p256dh: Option<String>,
    pub auth: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PushSubscribeReq {
    pub endpoint: Option<String>,
    pub keys: Option<PushKeys>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PushUnsubscribeReq {
    pub endpoint: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PushSubscribeResp {
    pub id: i32,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPublicKeyResp {
    pub public_key: String,
}

/// Body delivered to a device by web push. Operation-specific fields ride in
/// `extra` and are flattened into the top-level object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub tag: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub family_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PushPayload {
    pub fn new(
        kind: &str,
        tag: &str,
        family_id: &str,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            tag: tag.to_string(),
            kind: kind.to_string(),
            family_id: family_id.to_string(),
            url: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    pub fn with_field(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }
}
