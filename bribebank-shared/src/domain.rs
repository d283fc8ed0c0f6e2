//! Lifecycle vocabulary shared by the server and its clients.
//!
//! Every enum here is stored as its SCREAMING_SNAKE_CASE spelling in the
//! database and travels the same way over the wire.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($kind:literal) {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant::new($kind, other)),
                }
            }
        }
    };
}

wire_enum! {
    /// `OFFERED -> IN_PROGRESS -> COMPLETED -> VERIFIED`.
    BountyStatus ("bounty status") {
        Offered => "OFFERED",
        InProgress => "IN_PROGRESS",
        Completed => "COMPLETED",
        Verified => "VERIFIED",
    }
}

wire_enum! {
    /// `AVAILABLE -> PENDING_APPROVAL -> REDEEMED`, with rejection reverting
    /// `PENDING_APPROVAL -> AVAILABLE`.
    PrizeStatus ("prize status") {
        Available => "AVAILABLE",
        PendingApproval => "PENDING_APPROVAL",
        Redeemed => "REDEEMED",
    }
}

wire_enum! {
    /// How a verified bounty pays out.
    RewardType ("reward type") {
        Value => "VALUE",
        Tickets => "TICKETS",
    }
}

wire_enum! {
    PrizeType ("prize type") {
        Food => "FOOD",
        Activity => "ACTIVITY",
        Privilege => "PRIVILEGE",
        Money => "MONEY",
        Custom => "CUSTOM",
    }
}

wire_enum! {
    /// Where an assigned prize came from.
    PrizeOrigin ("prize origin") {
        Template => "TEMPLATE",
        TaskReward => "TASK_REWARD",
        Wheel => "WHEEL",
        Store => "STORE",
        TicketPayout => "TICKET_PAYOUT",
    }
}

impl BountyStatus {
    /// The only status `self` may move to, if any.
    pub fn next(&self) -> Option<BountyStatus> {
        match self {
            BountyStatus::Offered => Some(BountyStatus::InProgress),
            BountyStatus::InProgress => Some(BountyStatus::Completed),
            BountyStatus::Completed => Some(BountyStatus::Verified),
            BountyStatus::Verified => None,
        }
    }
}

/// Parses a ticket bounty's `reward_value`. Only strictly positive integers
/// are accepted.
pub fn parse_ticket_amount(raw: &str) -> Option<i32> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    trimmed.parse::<i32>().ok().filter(|n| *n > 0)
}
