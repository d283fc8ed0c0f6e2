//! Probability-weighted prize wheel.
//!
//! Segments are stored in presentation order and the draw walks them
//! cumulatively, so replacing the set always deletes and re-inserts the whole
//! list in one transaction.

use bribebank_shared::api::{
    ErrorCode, ServerEvent, SpinCostDto, SpinReq, SpinResp, UpdateWheelReq, WalletReason,
    WheelConfigDto, WheelSegmentDto, WheelSegmentInput,
};
use bribebank_shared::domain::{PrizeOrigin, PrizeStatus, PrizeType};
use diesel::prelude::*;
use tracing::info;

use super::guard::{family_user, load_actor, load_family};
use super::records::{HistoryAction, HistoryEntry, log_history, notify};
use super::store::spend_tickets;
use super::{LifecycleError, Outcome, new_id, now, now_ms, required};
use crate::storage::models::{NewAssignedPrize, WheelSegment};
use crate::storage::schema::{assigned_prizes, families, wheel_segments};

/// Allowed distance between a submitted probability sum and 1.0.
pub const PROBABILITY_TOLERANCE: f64 = 0.01;

const WHEEL_ASSIGNER: &str = "Prize Wheel";
const WHEEL_THEME: &str = "bg-gradient-to-r from-purple-400 to-pink-600";
const LOSING_EMOJI: &str = "❌";
const DEFAULT_COLOR: &str = "#9CA3AF";

const DEFAULT_SEGMENTS: [(&str, &str, f64); 9] = [
    ("Not this time", "#9CA3AF", 0.2),
    ("30 Minute Screen Time", "#60A5FA", 0.1),
    ("Pick supper", "#F472B6", 0.1),
    ("Free Pop", "#818CF8", 0.1),
    ("Candy Run", "#FCD34D", 0.1),
    ("Date Night", "#9CA3AF", 0.1),
    ("1 Hour Screen Time", "#34D399", 0.1),
    ("Movie Night", "#A78BFA", 0.1),
    ("JACKPOT - $20", "#EF4444", 0.1),
];

/// A validated segment ready to be stored.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSpec {
    pub label: String,
    pub color: String,
    pub prob: f64,
    pub is_losing: bool,
    pub emoji: String,
}

/// Picks the first index whose cumulative probability reaches `r`.
///
/// Falls back to index 0 when rounding leaves the total a hair under `r`.
/// Returns `None` only for an empty wheel.
pub fn pick_index<I>(probs: I, r: f64) -> Option<usize>
where
    I: IntoIterator<Item = f64>,
{
    let mut cumulative = 0.0;
    let mut any = false;
    for (i, p) in probs.into_iter().enumerate() {
        any = true;
        cumulative += p;
        if r <= cumulative {
            return Some(i);
        }
    }
    any.then_some(0)
}

/// Labels that mean "no prize" when the client does not say so explicitly.
pub fn is_losing_label(label: &str) -> bool {
    let lower = label.to_lowercase();
    lower.contains("try again") || lower.contains("not this time")
}

pub fn emoji_for_label(label: &str) -> &'static str {
    let lower = label.to_lowercase();
    if lower.contains("screen") || lower.contains("tv") {
        "📺"
    } else if lower.contains("candy") {
        "🍬"
    } else if lower.contains("pop") || lower.contains("soda") {
        "🥤"
    } else if lower.contains("movie") {
        "🎬"
    } else if lower.contains("money") || lower.contains('$') {
        "💵"
    } else if lower.contains("supper") || lower.contains("dinner") {
        "🍽️"
    } else if lower.contains("date") {
        "❤️"
    } else {
        "🎁"
    }
}

fn spec_from_label(label: &str, color: Option<String>, prob: f64) -> SegmentSpec {
    let is_losing = is_losing_label(label);
    SegmentSpec {
        label: label.to_string(),
        color: color.unwrap_or_else(|| DEFAULT_COLOR.to_string()),
        prob,
        is_losing,
        emoji: if is_losing {
            LOSING_EMOJI.to_string()
        } else {
            emoji_for_label(label).to_string()
        },
    }
}

/// Validates a submitted wheel and rescales it to sum to exactly 1.0.
///
/// `isLosing` and `emoji` are derived from the label when omitted.
pub fn validate_segments(
    inputs: Vec<WheelSegmentInput>,
) -> Result<Vec<SegmentSpec>, LifecycleError> {
    if inputs.is_empty() {
        return Err(LifecycleError::Validation(ErrorCode::InvalidSegments));
    }
    let mut specs = Vec::with_capacity(inputs.len());
    for input in inputs {
        let label = required(input.label)
            .map_err(|_| LifecycleError::Validation(ErrorCode::InvalidSegments))?;
        let prob = input
            .prob
            .filter(|p| p.is_finite() && *p >= 0.0)
            .ok_or(LifecycleError::Validation(ErrorCode::InvalidSegments))?;
        let mut spec = spec_from_label(&label, super::non_blank(input.color), prob);
        if let Some(losing) = input.is_losing {
            spec.is_losing = losing;
            if input.emoji.is_none() {
                spec.emoji = if losing {
                    LOSING_EMOJI.to_string()
                } else {
                    emoji_for_label(&label).to_string()
                };
            }
        }
        if let Some(emoji) = super::non_blank(input.emoji) {
            spec.emoji = emoji;
        }
        specs.push(spec);
    }

    let total: f64 = specs.iter().map(|s| s.prob).sum();
    if (total - 1.0).abs() > PROBABILITY_TOLERANCE {
        return Err(LifecycleError::Validation(ErrorCode::ProbabilitiesMustSumToOne));
    }
    for spec in &mut specs {
        spec.prob /= total;
    }
    Ok(specs)
}

pub fn default_segments() -> Vec<SegmentSpec> {
    DEFAULT_SEGMENTS
        .iter()
        .map(|(label, color, prob)| spec_from_label(label, Some(color.to_string()), *prob))
        .collect()
}

fn load_segments(
    conn: &mut SqliteConnection,
    family_id: &str,
) -> Result<Vec<WheelSegment>, LifecycleError> {
    Ok(wheel_segments::table
        .filter(wheel_segments::family_id.eq(family_id))
        .order(wheel_segments::position.asc())
        .select(WheelSegment::as_select())
        .load(conn)?)
}

/// Delete-then-insert; callers hold the transaction so readers never see a
/// half-written wheel.
pub(crate) fn replace_segments(
    conn: &mut SqliteConnection,
    family_id: &str,
    specs: &[SegmentSpec],
) -> Result<Vec<WheelSegment>, LifecycleError> {
    diesel::delete(wheel_segments::table.filter(wheel_segments::family_id.eq(family_id)))
        .execute(conn)?;
    let rows: Vec<WheelSegment> = specs
        .iter()
        .enumerate()
        .map(|(i, s)| WheelSegment {
            id: new_id(),
            family_id: family_id.to_string(),
            position: i as i32,
            label: s.label.clone(),
            color: s.color.clone(),
            prob: s.prob,
            is_losing: s.is_losing,
            emoji: s.emoji.clone(),
        })
        .collect();
    diesel::insert_into(wheel_segments::table)
        .values(&rows)
        .execute(conn)?;
    Ok(rows)
}

/// Spends the spin cost, then draws with `r` in `[0, 1)`. The spend stands
/// whether or not the spin wins.
pub fn spin(
    conn: &mut SqliteConnection,
    caller_id: &str,
    family_id: &str,
    req: SpinReq,
    r: f64,
) -> Result<Outcome<SpinResp>, LifecycleError> {
    let user_id = required(req.user_id)?;

    let actor = load_actor(conn, caller_id)?;
    actor.require_member(family_id)?;
    let family = load_family(conn, family_id)?;
    let user = family_user(conn, family_id, &user_id)?;

    if user.ticket_balance < family.spin_cost {
        return Err(LifecycleError::InvalidState(ErrorCode::InsufficientTickets));
    }
    let segments = load_segments(conn, family_id)?;
    let Some(index) = pick_index(segments.iter().map(|s| s.prob), r) else {
        return Err(LifecycleError::InvalidState(ErrorCode::NoWheelSegments));
    };
    let new_balance = spend_tickets(conn, &user.id, family.spin_cost)?;
    let winner = &segments[index];

    if !winner.is_losing {
        let message = format!("You spun the wheel and won: {}!", winner.label);
        notify(conn, &user.id, &message)?;
        log_history(
            conn,
            HistoryEntry {
                family_id,
                user_id: &user.id,
                user_name: &user.display_name,
                title: &winner.label,
                emoji: &winner.emoji,
                action: HistoryAction::WheelSpinWon,
                assigner_name: WHEEL_ASSIGNER,
            },
        )?;
        diesel::insert_into(assigned_prizes::table)
            .values(&NewAssignedPrize {
                id: &new_id(),
                family_id,
                template_id: None,
                user_id: &user.id,
                assigned_by: WHEEL_ASSIGNER,
                origin: PrizeOrigin::Wheel.as_str(),
                status: PrizeStatus::Available.as_str(),
                title: &winner.label,
                emoji: &winner.emoji,
                description: Some("Won from Prize Wheel!"),
                prize_type: PrizeType::Privilege.as_str(),
                theme_color: Some(WHEEL_THEME),
                assigned_at: now(),
                claimed_at: None,
            })
            .execute(conn)?;
    }

    info!(
        user_id = %user.id,
        segment = %winner.label,
        won = !winner.is_losing,
        new_balance,
        "wheel spun"
    );

    Ok(Outcome::new(SpinResp {
        won: !winner.is_losing,
        prize: winner.label.clone(),
        emoji: winner.emoji.clone(),
        new_balance,
    })
    .broadcast(ServerEvent::WalletUpdate {
        family_id: family_id.to_string(),
        reason: WalletReason::WheelSpin,
        timestamp: now_ms(),
    }))
}

/// Replaces the whole wheel and optionally the spin cost.
pub fn update(
    conn: &mut SqliteConnection,
    caller_id: &str,
    family_id: &str,
    req: UpdateWheelReq,
) -> Result<Outcome<WheelConfigDto>, LifecycleError> {
    let inputs = req
        .segments
        .ok_or(LifecycleError::Validation(ErrorCode::InvalidSegments))?;
    if req.spin_cost.is_some_and(|c| c < 0) {
        return Err(LifecycleError::Validation(ErrorCode::InvalidAmount));
    }
    let specs = validate_segments(inputs)?;

    let parent = load_actor(conn, caller_id)?;
    parent.require_parent(family_id)?;
    let family = load_family(conn, family_id)?;

    let rows = replace_segments(conn, family_id, &specs)?;
    let spin_cost = match req.spin_cost {
        Some(cost) => {
            diesel::update(families::table.filter(families::id.eq(&family.id)))
                .set(families::spin_cost.eq(cost))
                .execute(conn)?;
            cost
        }
        None => family.spin_cost,
    };
    info!(family_id, segments = rows.len(), spin_cost, "wheel updated");

    Ok(Outcome::new(WheelConfigDto {
        segments: rows.iter().map(WheelSegmentDto::from).collect(),
        spin_cost,
    })
    .broadcast(ServerEvent::WalletUpdate {
        family_id: family_id.to_string(),
        reason: WalletReason::WheelUpdated,
        timestamp: now_ms(),
    }))
}

/// Restores the stock nine-segment wheel.
pub fn reset(
    conn: &mut SqliteConnection,
    caller_id: &str,
    family_id: &str,
) -> Result<Outcome<WheelConfigDto>, LifecycleError> {
    let parent = load_actor(conn, caller_id)?;
    parent.require_parent(family_id)?;
    let family = load_family(conn, family_id)?;
    let rows = replace_segments(conn, family_id, &default_segments())?;
    info!(family_id, "wheel reset to defaults");

    Ok(Outcome::new(WheelConfigDto {
        segments: rows.iter().map(WheelSegmentDto::from).collect(),
        spin_cost: family.spin_cost,
    })
    .broadcast(ServerEvent::WalletUpdate {
        family_id: family_id.to_string(),
        reason: WalletReason::WheelReset,
        timestamp: now_ms(),
    }))
}

pub fn segments(
    conn: &mut SqliteConnection,
    caller_id: &str,
    family_id: &str,
) -> Result<Vec<WheelSegmentDto>, LifecycleError> {
    load_actor(conn, caller_id)?.require_member(family_id)?;
    Ok(load_segments(conn, family_id)?
        .iter()
        .map(WheelSegmentDto::from)
        .collect())
}

pub fn config(
    conn: &mut SqliteConnection,
    caller_id: &str,
    family_id: &str,
) -> Result<SpinCostDto, LifecycleError> {
    load_actor(conn, caller_id)?.require_member(family_id)?;
    Ok(SpinCostDto {
        spin_cost: load_family(conn, family_id)?.spin_cost,
    })
}
