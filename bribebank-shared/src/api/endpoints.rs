use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

use super::API_V1_PREFIX;

fn base_join(base: &str, path: &str) -> String {
    let b = base.trim_end_matches('/');
    let p = path.trim_start_matches('/');
    format!("{}/{}", b, p)
}

/// RFC 3986 unreserved characters stay literal, so JWTs pass through as-is.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn enc(s: &str) -> String {
    utf8_percent_encode(s, COMPONENT).to_string()
}

fn api(base: &str, path: &str) -> String {
    base_join(base, &format!("{}/{}", API_V1_PREFIX, path))
}

fn family_scope(base: &str, family_id: &str, rest: &str) -> String {
    api(base, &format!("families/{}/{}", enc(family_id), rest))
}

pub fn auth_login(base: &str) -> String {
    api(base, "auth/login")
}
pub fn auth_register(base: &str) -> String {
    api(base, "auth/register")
}
pub fn auth_join_family(base: &str) -> String {
    api(base, "auth/join-family")
}
pub fn auth_me(base: &str) -> String {
    api(base, "auth/me")
}

pub fn events(base: &str, token: &str) -> String {
    format!("{}?token={}", api(base, "events"), enc(token))
}

pub fn push_public_key(base: &str) -> String {
    api(base, "push/public-key")
}
pub fn push_subscriptions(base: &str) -> String {
    api(base, "push/subscriptions")
}
pub fn push_unsubscribe(base: &str) -> String {
    api(base, "push/subscriptions/unsubscribe")
}

pub fn family_users(base: &str, family_id: &str) -> String {
    family_scope(base, family_id, "users")
}
pub fn family_join_code(base: &str, family_id: &str) -> String {
    family_scope(base, family_id, "join-code")
}
pub fn user(base: &str, user_id: &str) -> String {
    api(base, &format!("users/{}", enc(user_id)))
}
pub fn user_password(base: &str, user_id: &str) -> String {
    api(base, &format!("users/{}/password", enc(user_id)))
}
pub fn user_tickets(base: &str, user_id: &str) -> String {
    api(base, &format!("users/{}/tickets", enc(user_id)))
}
pub fn user_notifications(base: &str, user_id: &str) -> String {
    api(base, &format!("users/{}/notifications", enc(user_id)))
}
pub fn user_notifications_read_all(base: &str, user_id: &str) -> String {
    api(base, &format!("users/{}/notifications/read-all", enc(user_id)))
}
pub fn notification_read(base: &str, notification_id: &str) -> String {
    api(base, &format!("notifications/{}/read", enc(notification_id)))
}

pub fn reward_templates(base: &str, family_id: &str) -> String {
    family_scope(base, family_id, "reward-templates")
}
pub fn reward_template(base: &str, template_id: &str) -> String {
    api(base, &format!("reward-templates/{}", enc(template_id)))
}
pub fn bounty_templates(base: &str, family_id: &str) -> String {
    family_scope(base, family_id, "bounty-templates")
}
pub fn bounty_template(base: &str, template_id: &str) -> String {
    api(base, &format!("bounty-templates/{}", enc(template_id)))
}
pub fn store_items(base: &str, family_id: &str) -> String {
    family_scope(base, family_id, "store-items")
}
pub fn store_item(base: &str, item_id: &str) -> String {
    api(base, &format!("store-items/{}", enc(item_id)))
}
pub fn store_item_purchase(base: &str, item_id: &str) -> String {
    api(base, &format!("store-items/{}/purchase", enc(item_id)))
}

pub fn bounty_assignments(base: &str, family_id: &str) -> String {
    family_scope(base, family_id, "bounty-assignments")
}
pub fn bounty_assignment(base: &str, assignment_id: &str) -> String {
    api(base, &format!("bounty-assignments/{}", enc(assignment_id)))
}
pub fn bounty_assignment_accept(base: &str, assignment_id: &str) -> String {
    api(base, &format!("bounty-assignments/{}/accept", enc(assignment_id)))
}
pub fn bounty_assignment_complete(base: &str, assignment_id: &str) -> String {
    api(
        base,
        &format!("bounty-assignments/{}/complete", enc(assignment_id)),
    )
}
pub fn bounty_assignment_verify(base: &str, assignment_id: &str) -> String {
    api(base, &format!("bounty-assignments/{}/verify", enc(assignment_id)))
}

pub fn assigned_prizes(base: &str, family_id: &str) -> String {
    family_scope(base, family_id, "assigned-prizes")
}
pub fn assigned_prize(base: &str, prize_id: &str) -> String {
    api(base, &format!("assigned-prizes/{}", enc(prize_id)))
}
pub fn assigned_prize_claim(base: &str, prize_id: &str) -> String {
    api(base, &format!("assigned-prizes/{}/claim", enc(prize_id)))
}
pub fn assigned_prize_approve(base: &str, prize_id: &str) -> String {
    api(base, &format!("assigned-prizes/{}/approve", enc(prize_id)))
}
pub fn assigned_prize_reject(base: &str, prize_id: &str) -> String {
    api(base, &format!("assigned-prizes/{}/reject", enc(prize_id)))
}

pub fn wheel_segments(base: &str, family_id: &str) -> String {
    family_scope(base, family_id, "wheel-segments")
}
pub fn wheel_spin(base: &str, family_id: &str) -> String {
    family_scope(base, family_id, "wheel-segments/spin")
}
pub fn wheel_reset(base: &str, family_id: &str) -> String {
    family_scope(base, family_id, "wheel-segments/reset")
}
pub fn wheel_config(base: &str, family_id: &str) -> String {
    family_scope(base, family_id, "wheel-config")
}

pub fn history(base: &str, family_id: &str, user_id: Option<&str>) -> String {
    let url = family_scope(base, family_id, "history");
    match user_id {
        Some(uid) => format!("{}?userId={}", url, enc(uid)),
        None => url,
    }
}
