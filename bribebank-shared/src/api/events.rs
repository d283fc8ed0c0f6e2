use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemplateTarget {
    RewardTemplate,
    BountyTemplate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TemplateAction {
    Created,
    Updated,
    Deleted,
}

/// Why a family's wallets or boards changed. Clients refetch on any of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WalletReason {
    TaskAssigned,
    TaskAccepted,
    TaskRejected,
    TaskVerified,
    RewardAssigned,
    RewardApproved,
    RewardRejected,
    RewardDeleted,
    WheelSpin,
    WheelUpdated,
    WheelReset,
    UserJoined,
    UserUpdated,
    UserRemoved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChildActionKind {
    TaskCompleted,
    RewardClaimed,
}

/// Events published on the family's realtime stream. Timestamps are unix
/// milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    Connected {
        message: String,
        timestamp: i64,
    },
    TemplateUpdate {
        family_id: String,
        target: TemplateTarget,
        action: TemplateAction,
        timestamp: i64,
    },
    WalletUpdate {
        family_id: String,
        reason: WalletReason,
        timestamp: i64,
    },
    ChildAction {
        family_id: String,
        subtype: ChildActionKind,
        id: String,
        user_id: String,
        timestamp: i64,
    },
    TicketsGiven {
        family_id: String,
        user_id: String,
        amount: i32,
        new_balance: i32,
        timestamp: i64,
    },
    StoreItemAdded {
        family_id: String,
        item_id: String,
        timestamp: i64,
    },
    StoreItemUpdated {
        family_id: String,
        item_id: String,
        timestamp: i64,
    },
    StoreItemDeleted {
        family_id: String,
        item_id: String,
        timestamp: i64,
    },
    StorePurchase {
        family_id: String,
        user_id: String,
        item_id: String,
        assignment_id: String,
        new_balance: i32,
        timestamp: i64,
    },
}

impl ServerEvent {
    /// Family whose subscribers receive the event; `None` for per-connection frames.
    pub fn family_id(&self) -> Option<&str> {
        match self {
            ServerEvent::Connected { .. } => None,
            ServerEvent::TemplateUpdate { family_id, .. }
            | ServerEvent::WalletUpdate { family_id, .. }
            | ServerEvent::ChildAction { family_id, .. }
            | ServerEvent::TicketsGiven { family_id, .. }
            | ServerEvent::StoreItemAdded { family_id, .. }
            | ServerEvent::StoreItemUpdated { family_id, .. }
            | ServerEvent::StoreItemDeleted { family_id, .. }
            | ServerEvent::StorePurchase { family_id, .. } => Some(family_id),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerEvent::Connected { .. } => "CONNECTED",
            ServerEvent::TemplateUpdate { .. } => "TEMPLATE_UPDATE",
            ServerEvent::WalletUpdate { .. } => "WALLET_UPDATE",
            ServerEvent::ChildAction { .. } => "CHILD_ACTION",
            ServerEvent::TicketsGiven { .. } => "TICKETS_GIVEN",
            ServerEvent::StoreItemAdded { .. } => "STORE_ITEM_ADDED",
            ServerEvent::StoreItemUpdated { .. } => "STORE_ITEM_UPDATED",
            ServerEvent::StoreItemDeleted { .. } => "STORE_ITEM_DELETED",
            ServerEvent::StorePurchase { .. } => "STORE_PURCHASE",
        }
    }
}
