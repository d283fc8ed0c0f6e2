use bribebank_server::lifecycle::{
    Effect, LifecycleError, Outcome, accounts, catalog, inbox, prizes, store, tasks, wheel,
};
use bribebank_server::storage::Store;
use bribebank_shared::api::{ErrorCode, ServerEvent, WalletReason};
use bribebank_shared::auth::Role;
use bribebank_shared::domain::{BountyStatus, PrizeOrigin, PrizeStatus};
use diesel::SqliteConnection;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

/// A freshly registered family with one parent and one child.
struct Household {
    store: Store,
    family: String,
    parent: String,
    child: String,
    _tempdir: tempfile::TempDir,
}

fn req<T: DeserializeOwned>(value: Value) -> T {
    serde_json::from_value(value).expect("request body")
}

impl Household {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("engine.db");
        let store = Store::connect_sqlite(db_path.to_str().unwrap())
            .await
            .unwrap();

        let registration = store
            .transact(|c| {
                accounts::register(
                    c,
                    req(json!({
                        "username": "Mom",
                        "password": "hunter22",
                        "displayName": "Mom",
                        "familyName": "Smith"
                    })),
                )
            })
            .await
            .unwrap();
        let parent = registration.user.id.clone();
        let family = registration.user.family_id.clone();

        let (p, f) = (parent.clone(), family.clone());
        let child = store
            .transact(move |c| {
                accounts::create_member(
                    c,
                    &p,
                    &f,
                    req(json!({"username": "alice", "password": "kidpass", "displayName": "Alice"})),
                )
            })
            .await
            .unwrap()
            .value
            .id;

        Self {
            store,
            family,
            parent,
            child,
            _tempdir: dir,
        }
    }

    async fn run<T, F>(&self, f: F) -> Result<T, LifecycleError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, LifecycleError> + Send + 'static,
        T: Send + 'static,
    {
        self.store.transact(f).await
    }

    async fn add_child(&self, username: &str, name: &str) -> String {
        let (p, f) = (self.parent.clone(), self.family.clone());
        let body = req(json!({"username": username, "password": "kidpass", "displayName": name}));
        self.run(move |c| accounts::create_member(c, &p, &f, body))
            .await
            .unwrap()
            .value
            .id
    }

    async fn bounty(&self, body: Value) -> String {
        let (p, f) = (self.parent.clone(), self.family.clone());
        self.run(move |c| catalog::create_bounty_template(c, &p, &f, req(body)))
            .await
            .unwrap()
            .value
            .id
    }

    async fn offer(&self, bounty_id: &str, user_id: &str) -> String {
        let (p, f) = (self.parent.clone(), self.family.clone());
        let body = req(json!({"bountyId": bounty_id, "userId": user_id}));
        self.run(move |c| tasks::assign(c, &p, &f, body))
            .await
            .unwrap()
            .value
            .id
    }

    async fn as_user<T, F>(&self, user_id: &str, f: F) -> Result<Outcome<T>, LifecycleError>
    where
        F: FnOnce(&mut SqliteConnection, &str) -> Result<Outcome<T>, LifecycleError>
            + Send
            + 'static,
        T: Send + 'static,
    {
        let uid = user_id.to_string();
        self.run(move |c| f(c, &uid)).await
    }

    async fn give(&self, user_id: &str, amount: i64) {
        let (p, uid) = (self.parent.clone(), user_id.to_string());
        self.run(move |c| store::give_tickets(c, &p, &uid, req(json!({"amount": amount}))))
            .await
            .unwrap();
    }

    async fn balance(&self, user_id: &str) -> i32 {
        let (p, uid) = (self.parent.clone(), user_id.to_string());
        self.run(move |c| store::balance(c, &p, &uid))
            .await
            .unwrap()
            .ticket_balance
    }

    async fn prizes(&self) -> Vec<bribebank_shared::api::AssignedPrizeDto> {
        let (p, f) = (self.parent.clone(), self.family.clone());
        self.run(move |c| prizes::list(c, &p, &f)).await.unwrap()
    }

    async fn unread(&self, user_id: &str) -> Vec<String> {
        let uid = user_id.to_string();
        self.run(move |c| inbox::unread(c, &uid, &uid))
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.message)
            .collect()
    }
}

fn code_of(err: LifecycleError) -> ErrorCode {
    err.code()
}

fn wallet_reason<T>(outcome: &Outcome<T>) -> Option<WalletReason> {
    outcome.broadcasts().find_map(|e| match e {
        ServerEvent::WalletUpdate { reason, .. } => Some(*reason),
        _ => None,
    })
}

fn push_targets<T>(outcome: &Outcome<T>) -> Vec<Vec<String>> {
    outcome
        .effects
        .iter()
        .filter_map(|e| match e {
            Effect::Push { user_ids, .. } => Some(user_ids.clone()),
            Effect::Broadcast(_) => None,
        })
        .collect()
}

#[tokio::test]
async fn ticket_bounty_pays_out_on_verification() {
    let h = Household::new().await;
    let bounty = h
        .bounty(json!({"title": "Dishes", "emoji": "🍽️", "type": "TICKETS", "rewardValue": "5"}))
        .await;
    let assignment = h.offer(&bounty, &h.child).await;

    assert!(
        h.unread(&h.child)
            .await
            .iter()
            .any(|m| m == "Mom assigned you a new task: Dishes")
    );

    let a = assignment.clone();
    let accepted = h
        .as_user(&h.child, move |c, me| tasks::accept(c, me, &a))
        .await
        .unwrap();
    assert_eq!(accepted.value.status, BountyStatus::InProgress);
    assert_eq!(wallet_reason(&accepted), Some(WalletReason::TaskAccepted));
    assert_eq!(push_targets(&accepted), vec![vec![h.parent.clone()]]);

    let a = assignment.clone();
    let completed = h
        .as_user(&h.child, move |c, me| tasks::complete(c, me, &a))
        .await
        .unwrap();
    assert_eq!(completed.value.status, BountyStatus::Completed);
    assert!(completed.value.completed_at.is_some());

    let a = assignment.clone();
    let verified = h
        .as_user(&h.parent, move |c, me| tasks::verify(c, me, &a))
        .await
        .unwrap();
    assert_eq!(verified.value.assignment.status, BountyStatus::Verified);
    assert_eq!(verified.value.tickets_awarded, Some(5));
    assert!(verified.value.prize.is_none());
    assert_eq!(wallet_reason(&verified), Some(WalletReason::TaskVerified));

    assert_eq!(h.balance(&h.child).await, 5);
    assert!(h.prizes().await.is_empty());

    let (p, f) = (h.parent.clone(), h.family.clone());
    let history = h
        .run(move |c| inbox::history(c, &p, &f, None))
        .await
        .unwrap();
    let actions: Vec<&str> = history.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(
        actions,
        vec![
            "EARNED_TICKETS",
            "VERIFIED_TASK",
            "COMPLETED_TASK",
            "ACCEPTED_TASK",
            "ASSIGNED_TASK"
        ]
    );
    assert_eq!(history[0].title, "5 Tickets");
}

#[tokio::test]
async fn value_bounty_creates_an_available_prize() {
    let h = Household::new().await;
    let bounty = h
        .bounty(json!({"title": "Mow lawn", "emoji": "🌿", "rewardValue": "Pick a movie"}))
        .await;
    let assignment = h.offer(&bounty, &h.child).await;
    for step in [tasks::accept, tasks::complete] {
        let a = assignment.clone();
        h.as_user(&h.child, move |c, me| step(c, me, &a))
            .await
            .unwrap();
    }
    let a = assignment.clone();
    let verified = h
        .as_user(&h.parent, move |c, me| tasks::verify(c, me, &a))
        .await
        .unwrap()
        .value;

    assert_eq!(verified.tickets_awarded, None);
    let prize = verified.prize.expect("task reward");
    assert_eq!(prize.title, "Pick a movie");
    assert_eq!(prize.origin, PrizeOrigin::TaskReward);
    assert_eq!(prize.status, PrizeStatus::Available);
    assert_eq!(prize.user_id, h.child);
    assert_eq!(h.balance(&h.child).await, 0);
}

#[tokio::test]
async fn fcfs_acceptance_withdraws_competing_offers() {
    let h = Household::new().await;
    let bob = h.add_child("bob", "Bob").await;
    let bounty = h
        .bounty(json!({
            "title": "Walk dog",
            "emoji": "🐕",
            "type": "TICKETS",
            "rewardValue": "3",
            "isFCFS": true
        }))
        .await;
    let alice_offer = h.offer(&bounty, &h.child).await;
    let bob_offer = h.offer(&bounty, &bob).await;

    let a = alice_offer.clone();
    let accepted = h
        .as_user(&h.child, move |c, me| tasks::accept(c, me, &a))
        .await
        .unwrap();
    assert_eq!(
        push_targets(&accepted),
        vec![vec![h.parent.clone()], vec![bob.clone()]]
    );

    let b = bob_offer.clone();
    let err = h
        .as_user(&bob, move |c, me| tasks::accept(c, me, &b))
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::NotFound);

    assert!(
        h.unread(&bob)
            .await
            .iter()
            .any(|m| m == "Task \"Walk dog\" was claimed by someone else.")
    );

    let (p, f) = (h.parent.clone(), h.family.clone());
    let remaining = h.run(move |c| tasks::list(c, &p, &f)).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, alice_offer);
    assert_eq!(remaining[0].status, BountyStatus::InProgress);
}

#[tokio::test]
async fn transitions_are_enforced() {
    let h = Household::new().await;
    let bounty = h
        .bounty(json!({"title": "Homework", "emoji": "📚", "type": "TICKETS", "rewardValue": "2"}))
        .await;
    let assignment = h.offer(&bounty, &h.child).await;

    let a = assignment.clone();
    let err = h
        .as_user(&h.child, move |c, me| tasks::complete(c, me, &a))
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::InvalidStatus);

    let a = assignment.clone();
    let err = h
        .as_user(&h.parent, move |c, me| tasks::verify(c, me, &a))
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::InvalidStatus);

    let a = assignment.clone();
    let err = h
        .as_user(&h.parent, move |c, me| tasks::accept(c, me, &a))
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::OnlyAssigneeCanAccept);

    let a = assignment.clone();
    h.as_user(&h.child, move |c, me| tasks::accept(c, me, &a))
        .await
        .unwrap();
    let a = assignment.clone();
    let err = h
        .as_user(&h.child, move |c, me| tasks::accept(c, me, &a))
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::InvalidStatus);

    // A child can only withdraw an offer it has not accepted yet.
    let a = assignment.clone();
    let err = h
        .as_user(&h.child, move |c, me| tasks::delete(c, me, &a))
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::Forbidden);

    let a = assignment.clone();
    let deleted = h
        .as_user(&h.parent, move |c, me| tasks::delete(c, me, &a))
        .await
        .unwrap();
    assert_eq!(wallet_reason(&deleted), Some(WalletReason::TaskRejected));
}

#[tokio::test]
async fn parents_cannot_take_tasks_themselves() {
    let h = Household::new().await;
    let bounty = h
        .bounty(json!({"title": "Laundry", "emoji": "🧺", "rewardValue": "Treat"}))
        .await;
    let (p, f) = (h.parent.clone(), h.family.clone());
    let body = req(json!({"bountyId": bounty, "userId": h.parent}));
    let err = h
        .run(move |c| tasks::assign(c, &p, &f, body))
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::CannotAssignSelf);

    let (c_id, f) = (h.child.clone(), h.family.clone());
    let body = req(json!({"bountyId": bounty, "userId": h.child}));
    let err = h
        .run(move |c| tasks::assign(c, &c_id, &f, body))
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::ParentOnly);
}

#[tokio::test]
async fn rejected_claims_can_be_claimed_again() {
    let h = Household::new().await;
    let (p, f) = (h.parent.clone(), h.family.clone());
    let template = h
        .run(move |c| {
            catalog::create_reward_template(
                c,
                &p,
                &f,
                req(json!({"title": "Ice cream", "emoji": "🍦", "type": "PRIVILEGE"})),
            )
        })
        .await
        .unwrap()
        .value
        .id;

    let (p, f) = (h.parent.clone(), h.family.clone());
    let body = req(json!({"templateId": template, "userId": h.child}));
    let prize = h
        .run(move |c| prizes::assign(c, &p, &f, body))
        .await
        .unwrap()
        .value;
    assert_eq!(prize.origin, PrizeOrigin::Template);

    let id = prize.id.clone();
    let claimed = h
        .as_user(&h.child, move |c, me| prizes::claim(c, me, &id))
        .await
        .unwrap();
    assert_eq!(claimed.value.status, PrizeStatus::PendingApproval);
    assert!(claimed.value.claimed_at.is_some());

    let id = prize.id.clone();
    let rejected = h
        .as_user(&h.parent, move |c, me| prizes::reject(c, me, &id))
        .await
        .unwrap()
        .value;
    assert_eq!(rejected.status, PrizeStatus::Available);
    assert!(rejected.claimed_at.is_none());

    let id = prize.id.clone();
    h.as_user(&h.child, move |c, me| prizes::claim(c, me, &id))
        .await
        .unwrap();
    let id = prize.id.clone();
    let approved = h
        .as_user(&h.parent, move |c, me| prizes::approve(c, me, &id))
        .await
        .unwrap()
        .value;
    assert_eq!(approved.status, PrizeStatus::Redeemed);
    assert!(approved.redeemed_at.is_some());

    let id = prize.id.clone();
    let err = h
        .as_user(&h.child, move |c, me| prizes::claim(c, me, &id))
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::InvalidStatus);
}

#[tokio::test]
async fn granted_prizes_keep_their_snapshot() {
    let h = Household::new().await;
    let (p, f) = (h.parent.clone(), h.family.clone());
    let template = h
        .run(move |c| {
            catalog::create_reward_template(
                c,
                &p,
                &f,
                req(json!({"title": "Park trip", "emoji": "🌳", "type": "EXPERIENCE"})),
            )
        })
        .await
        .unwrap()
        .value
        .id;
    let (p, f) = (h.parent.clone(), h.family.clone());
    let body = req(json!({"templateId": template, "userId": h.child}));
    h.run(move |c| prizes::assign(c, &p, &f, body))
        .await
        .unwrap();

    let (p, t) = (h.parent.clone(), template.clone());
    let updated = h
        .run(move |c| catalog::update_reward_template(c, &p, &t, req(json!({"title": "Zoo trip"}))))
        .await
        .unwrap()
        .value;
    assert_eq!(updated.title, "Zoo trip");
    assert_eq!(updated.emoji, "🌳");

    let held = h.prizes().await;
    assert_eq!(held.len(), 1);
    assert_eq!(held[0].title, "Park trip");
    assert_eq!(held[0].template_id.as_deref(), Some(template.as_str()));
}

#[tokio::test]
async fn store_purchase_spends_and_awaits_fulfilment() {
    let h = Household::new().await;
    h.give(&h.child, 5).await;

    let (p, f) = (h.parent.clone(), h.family.clone());
    let item = h
        .run(move |c| {
            catalog::create_store_item(
                c,
                &p,
                &f,
                req(json!({"title": "Lego set", "cost": 3, "productUrl": "https://example.com/lego"})),
            )
        })
        .await
        .unwrap()
        .value
        .id;

    let (i, child) = (item.clone(), h.child.clone());
    let bought = h
        .as_user(&h.child, move |c, me| {
            store::purchase(c, me, &i, req(json!({"userId": child})))
        })
        .await
        .unwrap();
    assert!(bought.value.success);
    assert_eq!(bought.value.ticket_balance, 2);
    assert_eq!(push_targets(&bought), vec![vec![h.parent.clone()]]);
    assert!(bought.broadcasts().any(|e| matches!(
        e,
        ServerEvent::StorePurchase { new_balance: 2, .. }
    )));

    let held = h.prizes().await;
    assert_eq!(held.len(), 1);
    assert_eq!(held[0].id, bought.value.assignment_id);
    assert_eq!(held[0].status, PrizeStatus::PendingApproval);
    assert_eq!(held[0].origin, PrizeOrigin::Store);
    assert_eq!(held[0].title, "STORE: Lego set");

    assert!(
        h.unread(&h.parent)
            .await
            .iter()
            .any(|m| m == "Alice bought \"Lego set\" from the store! Please fulfill.")
    );

    let (i, child) = (item.clone(), h.child.clone());
    let err = h
        .as_user(&h.child, move |c, me| {
            store::purchase(c, me, &i, req(json!({"userId": child})))
        })
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::InsufficientTickets);
    assert_eq!(h.balance(&h.child).await, 2);
}

#[tokio::test]
async fn wheel_spin_charges_and_awards() {
    let h = Household::new().await;
    h.give(&h.child, 3).await;

    let (p, f) = (h.parent.clone(), h.family.clone());
    let body = req(json!({
        "spinCost": 2,
        "segments": [
            {"label": "Not this time", "color": "#9CA3AF", "prob": 0.5},
            {"label": "Candy Run", "color": "#FCD34D", "prob": 0.5}
        ]
    }));
    let config = h
        .run(move |c| wheel::update(c, &p, &f, body))
        .await
        .unwrap()
        .value;
    assert_eq!(config.spin_cost, 2);
    assert_eq!(config.segments.len(), 2);
    assert!(config.segments[0].is_losing);

    let (f, child) = (h.family.clone(), h.child.clone());
    let spun = h
        .as_user(&h.child, move |c, me| {
            wheel::spin(c, me, &f, req(json!({"userId": child})), 0.6)
        })
        .await
        .unwrap();
    assert!(spun.value.won);
    assert_eq!(spun.value.prize, "Candy Run");
    assert_eq!(spun.value.emoji, "🍬");
    assert_eq!(spun.value.new_balance, 1);
    assert_eq!(wallet_reason(&spun), Some(WalletReason::WheelSpin));

    let held = h.prizes().await;
    assert_eq!(held.len(), 1);
    assert_eq!(held[0].origin, PrizeOrigin::Wheel);
    assert_eq!(held[0].status, PrizeStatus::Available);

    let (f, child) = (h.family.clone(), h.child.clone());
    let err = h
        .as_user(&h.child, move |c, me| {
            wheel::spin(c, me, &f, req(json!({"userId": child})), 0.1)
        })
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::InsufficientTickets);
    assert_eq!(h.balance(&h.child).await, 1);
}

#[tokio::test]
async fn losing_spin_still_costs_a_ticket() {
    let h = Household::new().await;
    h.give(&h.child, 1).await;

    let (f, child) = (h.family.clone(), h.child.clone());
    let spun = h
        .as_user(&h.child, move |c, me| {
            wheel::spin(c, me, &f, req(json!({"userId": child})), 0.05)
        })
        .await
        .unwrap()
        .value;
    assert!(!spun.won);
    assert_eq!(spun.prize, "Not this time");
    assert_eq!(spun.new_balance, 0);
    assert!(h.prizes().await.is_empty());
}

#[tokio::test]
async fn wheel_reset_restores_defaults() {
    let h = Household::new().await;
    let (p, f) = (h.parent.clone(), h.family.clone());
    let body = req(json!({"segments": [{"label": "Candy Run", "prob": 1.0}]}));
    h.run(move |c| wheel::update(c, &p, &f, body))
        .await
        .unwrap();

    let (p, f) = (h.parent.clone(), h.family.clone());
    let reset = h.run(move |c| wheel::reset(c, &p, &f)).await.unwrap();
    assert_eq!(wallet_reason(&reset), Some(WalletReason::WheelReset));
    assert_eq!(reset.value.segments.len(), 9);
    assert_eq!(reset.value.spin_cost, 1);

    let (c_id, f) = (h.child.clone(), h.family.clone());
    let err = h
        .run(move |c| wheel::reset(c, &c_id, &f))
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::ParentOnly);
}

#[tokio::test]
async fn give_tickets_rejects_non_positive_amounts() {
    let h = Household::new().await;
    for amount in [0, -4] {
        let (p, c_id) = (h.parent.clone(), h.child.clone());
        let err = h
            .run(move |c| store::give_tickets(c, &p, &c_id, req(json!({"amount": amount}))))
            .await
            .unwrap_err();
        assert_eq!(code_of(err), ErrorCode::InvalidAmount);
    }
    assert_eq!(h.balance(&h.child).await, 0);
}

#[tokio::test]
async fn other_families_are_invisible() {
    let h = Household::new().await;
    let stranger = h
        .store
        .transact(|c| {
            accounts::register(
                c,
                req(json!({
                    "username": "dad2",
                    "password": "pw",
                    "displayName": "Other Dad",
                    "familyName": "Jones"
                })),
            )
        })
        .await
        .unwrap()
        .user
        .id;

    let f = h.family.clone();
    let err = h
        .as_user(&stranger, move |c, me| {
            catalog::create_store_item(c, me, &f, req(json!({"title": "Bike", "cost": 10})))
        })
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::Forbidden);

    let (s, child) = (stranger.clone(), h.child.clone());
    let err = h
        .run(move |c| store::balance(c, &s, &child))
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::Forbidden);
}

#[tokio::test]
async fn removing_a_member_clears_their_rows() {
    let h = Household::new().await;
    let bounty = h
        .bounty(json!({"title": "Trash", "emoji": "🗑️", "rewardValue": "Sticker"}))
        .await;
    h.offer(&bounty, &h.child).await;

    let c_id = h.child.clone();
    let err = h
        .as_user(&h.parent, move |c, me| accounts::delete_member(c, me, me))
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::CannotDeleteSelf);

    let removed = h
        .as_user(&h.parent, move |c, me| accounts::delete_member(c, me, &c_id))
        .await
        .unwrap();
    assert_eq!(wallet_reason(&removed), Some(WalletReason::UserRemoved));

    let (p, f) = (h.parent.clone(), h.family.clone());
    assert!(h.run(move |c| tasks::list(c, &p, &f)).await.unwrap().is_empty());
    let (p, f) = (h.parent.clone(), h.family.clone());
    let members = h
        .run(move |c| accounts::list_members(c, &p, &f))
        .await
        .unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].username, "mom");
}

#[tokio::test]
async fn login_is_case_insensitive() {
    let h = Household::new().await;
    let user = h
        .store
        .read(|c| accounts::authenticate(c, "MOM", "hunter22"))
        .await
        .unwrap();
    assert_eq!(user.id, h.parent);

    let err = h
        .store
        .read(|c| accounts::authenticate(c, "mom", "wrong"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::Unauthenticated(ErrorCode::InvalidCredentials)
    ));
}

#[tokio::test]
async fn notifications_can_be_marked_read() {
    let h = Household::new().await;
    h.give(&h.child, 2).await;
    let c_id = h.child.clone();
    let notes = h
        .run(move |c| inbox::unread(c, &c_id, &c_id))
        .await
        .unwrap();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].message, "Mom gave you 2 tickets!");

    let (p, n) = (h.parent.clone(), notes[0].id.clone());
    let err = h
        .run(move |c| inbox::mark_read(c, &p, &n))
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::Forbidden);

    let (c_id, n) = (h.child.clone(), notes[0].id.clone());
    let read = h.run(move |c| inbox::mark_read(c, &c_id, &n)).await.unwrap();
    assert!(read.is_read);
    assert!(h.unread(&h.child).await.is_empty());
}

#[tokio::test]
async fn ticket_credit_that_would_overflow_is_refused() {
    let h = Household::new().await;
    let bounty = h
        .bounty(json!({
            "title": "Paint fence",
            "emoji": "🎨",
            "type": "TICKETS",
            "rewardValue": "2000000000"
        }))
        .await;

    let mut outcomes = Vec::new();
    for _ in 0..2 {
        let assignment = h.offer(&bounty, &h.child).await;
        for step in [tasks::accept, tasks::complete] {
            let a = assignment.clone();
            h.as_user(&h.child, move |c, me| step(c, me, &a))
                .await
                .unwrap();
        }
        let a = assignment.clone();
        outcomes.push((
            assignment,
            h.as_user(&h.parent, move |c, me| tasks::verify(c, me, &a))
                .await,
        ));
    }

    assert_eq!(
        outcomes[0].1.as_ref().unwrap().value.tickets_awarded,
        Some(2_000_000_000)
    );
    let (second, result) = outcomes.pop().unwrap();
    let err = result.unwrap_err();
    assert_eq!(code_of(err), ErrorCode::InvalidTicketAmount);
    assert_eq!(h.balance(&h.child).await, 2_000_000_000);

    let (p, f) = (h.parent.clone(), h.family.clone());
    let board = h.run(move |c| tasks::list(c, &p, &f)).await.unwrap();
    let still_open = board.iter().find(|a| a.id == second).unwrap();
    assert_eq!(still_open.status, BountyStatus::Completed);
}

async fn join_code_of(h: &Household) -> String {
    let p = h.parent.clone();
    h.store
        .read(move |c| accounts::me(c, &p))
        .await
        .unwrap()
        .family
        .join_code
        .expect("parents see the join code")
}

#[tokio::test]
async fn children_join_with_a_live_code() {
    let h = Household::new().await;
    let code = join_code_of(&h).await;

    let body = req(json!({
        "joinCode": format!("  {}  ", code.to_lowercase()),
        "username": "Charlie",
        "password": "kidpass",
        "displayName": "Charlie"
    }));
    let joined = h.run(move |c| accounts::join_family(c, body)).await.unwrap();
    assert_eq!(wallet_reason(&joined), Some(WalletReason::UserJoined));
    assert_eq!(joined.value.family_name, "Smith");
    assert_eq!(joined.value.user.family_id, h.family);
    assert_eq!(joined.value.user.username, "charlie");
    assert_eq!(joined.value.user.role, "CHILD");

    let charlie = joined.value.user.id.clone();
    let me = h
        .store
        .read(move |c| accounts::me(c, &charlie))
        .await
        .unwrap();
    assert_eq!(me.family.id, h.family);
    assert_eq!(me.family.name, "Smith");
    assert!(me.family.join_code.is_none());

    let body = req(json!({
        "joinCode": "ZZZZZZ",
        "username": "dora",
        "password": "kidpass",
        "displayName": "Dora"
    }));
    let err = h
        .run(move |c| accounts::join_family(c, body))
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::InvalidJoinCode);

    let body = req(json!({
        "joinCode": code,
        "username": "alice",
        "password": "kidpass",
        "displayName": "Alice again"
    }));
    let err = h
        .run(move |c| accounts::join_family(c, body))
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::UsernameTaken);
}

#[tokio::test]
async fn expired_join_codes_are_refused() {
    use bribebank_server::storage::schema::families;
    use diesel::prelude::*;

    let h = Household::new().await;
    let code = join_code_of(&h).await;
    let f = h.family.clone();
    h.run(move |c| {
        let yesterday = chrono::Utc::now().naive_utc() - chrono::Duration::days(1);
        diesel::update(families::table.filter(families::id.eq(&f)))
            .set(families::join_code_expires_at.eq(Some(yesterday)))
            .execute(c)?;
        Ok(())
    })
    .await
    .unwrap();

    let body = req(json!({
        "joinCode": code,
        "username": "eve",
        "password": "kidpass",
        "displayName": "Eve"
    }));
    let err = h
        .run(move |c| accounts::join_family(c, body))
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::InvalidJoinCode);

    let (p, f) = (h.parent.clone(), h.family.clone());
    h.run(move |c| accounts::regenerate_join_code(c, &p, &f))
        .await
        .unwrap();
    let code = join_code_of(&h).await;
    let body = req(json!({
        "joinCode": code,
        "username": "eve",
        "password": "kidpass",
        "displayName": "Eve"
    }));
    h.run(move |c| accounts::join_family(c, body))
        .await
        .unwrap();
}

#[tokio::test]
async fn profile_edits_respect_roles() {
    let h = Household::new().await;
    let bob = h.add_child("bob", "Bob").await;

    let c_id = h.child.clone();
    let edited = h
        .as_user(&h.child, move |c, me| {
            accounts::update_member(
                c,
                me,
                &c_id,
                req(json!({"displayName": "Ali", "avatarColor": "bg-teal-400"})),
            )
        })
        .await
        .unwrap();
    assert_eq!(wallet_reason(&edited), Some(WalletReason::UserUpdated));
    assert_eq!(edited.value.display_name, "Ali");
    assert_eq!(edited.value.avatar_color, "bg-teal-400");
    assert_eq!(edited.value.username, "alice");

    let c_id = h.child.clone();
    let err = h
        .as_user(&h.child, move |c, me| {
            accounts::update_member(c, me, &c_id, req(json!({"avatarColor": "bg-black"})))
        })
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::InvalidAvatarColor);

    let c_id = h.child.clone();
    let err = h
        .as_user(&h.child, move |c, me| {
            accounts::update_member(c, me, &c_id, req(json!({"role": "PARENT"})))
        })
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::ParentOnly);

    let b = bob.clone();
    let err = h
        .as_user(&h.child, move |c, me| {
            accounts::update_member(c, me, &b, req(json!({"displayName": "Bobby"})))
        })
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::ParentOnly);

    let err = h
        .as_user(&h.parent, move |c, me| {
            accounts::update_member(c, me, me, req(json!({"role": "CHILD"})))
        })
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::CannotChangeOwnRole);

    let b = bob.clone();
    let err = h
        .as_user(&h.parent, move |c, me| {
            accounts::update_member(c, me, &b, req(json!({"username": "ALICE"})))
        })
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::UsernameTaken);

    let b = bob.clone();
    let promoted = h
        .as_user(&h.parent, move |c, me| {
            let body = req(json!({"role": "PARENT", "username": "Robert"}));
            accounts::update_member(c, me, &b, body)
        })
        .await
        .unwrap()
        .value;
    assert_eq!(promoted.role, Role::Parent);
    assert_eq!(promoted.username, "robert");

    // The promoted member can now act as a parent.
    let c_id = h.child.clone();
    h.as_user(&bob, move |c, me| {
        store::give_tickets(c, me, &c_id, req(json!({"amount": 1})))
    })
    .await
    .unwrap();
    assert_eq!(h.balance(&h.child).await, 1);
}

#[tokio::test]
async fn passwords_can_be_changed_by_self_or_parent() {
    let h = Household::new().await;

    let c_id = h.child.clone();
    h.as_user(&h.child, move |c, me| {
        accounts::change_password(c, me, &c_id, req(json!({"newPassword": "newkidpass"})))
    })
    .await
    .unwrap();
    let user = h
        .store
        .read(|c| accounts::authenticate(c, "alice", "newkidpass"))
        .await
        .unwrap();
    assert_eq!(user.id, h.child);
    let err = h
        .store
        .read(|c| accounts::authenticate(c, "alice", "kidpass"))
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::InvalidCredentials);

    let c_id = h.child.clone();
    h.as_user(&h.parent, move |c, me| {
        accounts::change_password(c, me, &c_id, req(json!({"newPassword": "reset123"})))
    })
    .await
    .unwrap();
    h.store
        .read(|c| accounts::authenticate(c, "alice", "reset123"))
        .await
        .unwrap();

    let c_id = h.child.clone();
    let err = h
        .as_user(&h.child, move |c, me| {
            accounts::change_password(c, me, &c_id, req(json!({"newPassword": "  "})))
        })
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::MissingFields);

    let p = h.parent.clone();
    let err = h
        .as_user(&h.child, move |c, me| {
            accounts::change_password(c, me, &p, req(json!({"newPassword": "gotcha"})))
        })
        .await
        .unwrap_err();
    assert_eq!(code_of(err), ErrorCode::ParentOnly);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_fcfs_accepts_have_one_winner() {
    let h = Household::new().await;
    let bounty = h
        .bounty(json!({
            "title": "Wash car",
            "emoji": "🚗",
            "type": "TICKETS",
            "rewardValue": "4",
            "isFCFS": true
        }))
        .await;

    let mut offers = Vec::new();
    offers.push((h.child.clone(), h.offer(&bounty, &h.child).await));
    for i in 0..7 {
        let kid = h.add_child(&format!("kid{i}"), &format!("Kid {i}")).await;
        let offer = h.offer(&bounty, &kid).await;
        offers.push((kid, offer));
    }

    let handles: Vec<_> = offers
        .into_iter()
        .map(|(kid, offer)| {
            let store = h.store.clone();
            tokio::spawn(async move {
                store
                    .transact(move |c| tasks::accept(c, &kid, &offer))
                    .await
            })
        })
        .collect();

    let mut winners = 0;
    let mut losers = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(e) => {
                assert_eq!(code_of(e), ErrorCode::NotFound);
                losers += 1;
            }
        }
    }
    assert_eq!((winners, losers), (1, 7));

    let (p, f) = (h.parent.clone(), h.family.clone());
    let board = h.run(move |c| tasks::list(c, &p, &f)).await.unwrap();
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].status, BountyStatus::InProgress);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_spins_never_overdraw() {
    let h = Household::new().await;
    h.give(&h.child, 3).await;

    let handles: Vec<_> = (0..10)
        .map(|_| {
            let store = h.store.clone();
            let (f, child) = (h.family.clone(), h.child.clone());
            tokio::spawn(async move {
                store
                    .transact(move |c| {
                        let body = req(json!({"userId": child}));
                        wheel::spin(c, &child, &f, body, 0.5)
                    })
                    .await
            })
        })
        .collect();

    let mut spun = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => spun += 1,
            Err(e) => assert_eq!(code_of(e), ErrorCode::InsufficientTickets),
        }
    }
    assert_eq!(spun, 3);
    assert_eq!(h.balance(&h.child).await, 0);
}
