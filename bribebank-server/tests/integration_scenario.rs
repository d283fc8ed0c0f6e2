use axum::http::StatusCode;
use bribebank_server::{server, storage};
use bribebank_shared::api::endpoints;
use reqwest::Client;
use serde_json::{Value, json};
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;


struct TestServer {
    base: String,
    client: Client,
    handle: tokio::task::JoinHandle<()>,
    _tempdir: tempfile::TempDir,
}

/// Tokens and ids of a registered family with one child.
struct Family {
    id: String,
    parent_token: String,
    child_id: String,
    child_token: String,
}

impl TestServer {
    async fn spawn() -> Option<Self> {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let (addr, handle) = match start_server(&db_path).await {
            Ok(v) => v,
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                eprintln!("Skipping test due to sandbox restrictions: {e}");
                return None;
            }
            Err(e) => panic!("failed to start server: {e}"),
        };
        Some(Self {
            base: format!("http://{}", addr),
            client: Client::new(),
            handle,
            _tempdir: dir,
        })
    }

    async fn login(&self, username: &str, password: &str) -> String {
        let body = self
            .request_expect(
                "POST",
                &endpoints::auth_login(""),
                None,
                Some(json!({"username": username, "password": password})),
                StatusCode::OK,
            )
            .await;
        body.get("token")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .expect("token missing from auth response")
    }

    async fn register_family(&self, parent: &str, child: &str) -> Family {
        let reg = self
            .request_expect(
                "POST",
                &endpoints::auth_register(""),
                None,
                Some(json!({
                    "username": parent,
                    "password": "secret123",
                    "displayName": "Mom",
                    "familyName": "Smith"
                })),
                StatusCode::CREATED,
            )
            .await;
        let id = str_field(&reg["user"], "familyId");
        let parent_token = str_field(&reg, "token");
        assert_eq!(str_field(&reg, "joinCode").len(), 6);

        let created = self
            .request_expect(
                "POST",
                &endpoints::family_users("", &id),
                Some(&parent_token),
                Some(json!({"username": child, "password": "kidpass", "displayName": "Alice"})),
                StatusCode::CREATED,
            )
            .await;
        assert_eq!(str_field(&created, "role"), "CHILD");
        let child_token = self.login(child, "kidpass").await;
        Family {
            id,
            parent_token,
            child_id: str_field(&created, "id"),
            child_token,
        }
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let url = format!("{}{}", self.base, path);
        let mut req = match method {
            "GET" => self.client.get(&url),
            "POST" => self.client.post(&url),
            "PUT" => self.client.put(&url),
            "PATCH" => self.client.patch(&url),
            "DELETE" => self.client.delete(&url),
            other => panic!("unsupported method {other}"),
        };
        if let Some(t) = token {
            req = req.bearer_auth(t);
        }
        if let Some(b) = body {
            req = req.json(&b);
        }
        let resp = req.send().await.unwrap();
        let status = resp.status();
        let text = resp.text().await.unwrap();
        let val = if text.is_empty() {
            json!(null)
        } else {
            serde_json::from_str(&text).unwrap_or(json!({"raw": text}))
        };
        (status, val)
    }

    async fn request_expect(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
        expected: StatusCode,
    ) -> Value {
        let (status, value) = self.request(method, path, token, body).await;
        assert_eq!(
            status, expected,
            "{method} {path} returned {status:?} with body {value:?}",
        );
        value
    }

    async fn expect_error(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
        expected: StatusCode,
        code: &str,
    ) {
        let value = self
            .request_expect(method, path, token, body, expected)
            .await;
        assert_eq!(value["error"], code, "{method} {path}");
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn start_server(
    tmp_db: &Path,
) -> Result<(SocketAddr, tokio::task::JoinHandle<()>), std::io::Error> {
    let config = server::AppConfig::from_yaml("jwt_secret: testsecret\n").expect("config");
    let store = storage::Store::connect_sqlite(tmp_db.to_str().unwrap())
        .await
        .expect("db");

    let state = server::AppState::new(config, store);
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0)).await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Ok((addr, handle))
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| panic!("missing {key} in {value:?}"))
        .to_string()
}

#[tokio::test]
async fn public_endpoints_work() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    server
        .request_expect("GET", "/healthz", None, None, StatusCode::OK)
        .await;
    server
        .expect_error(
            "GET",
            &endpoints::push_public_key(""),
            None,
            None,
            StatusCode::INTERNAL_SERVER_ERROR,
            "PUSH_NOT_CONFIGURED",
        )
        .await;
    let family = server.register_family("mom", "alice").await;
    assert!(!family.parent_token.is_empty());
    // usernames are case-insensitive
    server.login("MOM", "secret123").await;
}

#[tokio::test]
async fn login_and_registration_errors() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    server.register_family("mom", "alice").await;

    server
        .expect_error(
            "POST",
            &endpoints::auth_login(""),
            None,
            Some(json!({"username": "mom", "password": "nope"})),
            StatusCode::UNAUTHORIZED,
            "INVALID_CREDENTIALS",
        )
        .await;
    server
        .expect_error(
            "POST",
            &endpoints::auth_login(""),
            None,
            Some(json!({"username": "mom"})),
            StatusCode::BAD_REQUEST,
            "MISSING_FIELDS",
        )
        .await;
    server
        .expect_error(
            "POST",
            &endpoints::auth_register(""),
            None,
            Some(json!({
                "username": "Mom",
                "password": "x",
                "displayName": "Other",
                "familyName": "Other"
            })),
            StatusCode::CONFLICT,
            "USERNAME_TAKEN",
        )
        .await;
}

#[tokio::test]
async fn unauthenticated_requests_are_rejected() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let cases: Vec<(&str, &str, Option<Value>)> = vec![
        ("GET", "/api/v1/families/f1/users", None),
        ("GET", "/api/v1/families/f1/bounty-assignments", None),
        ("POST", "/api/v1/bounty-assignments/a1/accept", None),
        ("POST", "/api/v1/assigned-prizes/p1/claim", None),
        ("POST", "/api/v1/users/u1/tickets", Some(json!({"amount": 5}))),
        ("POST", "/api/v1/families/f1/wheel-segments/spin", Some(json!({"userId": "u1"}))),
        ("GET", "/api/v1/users/u1/notifications", None),
        ("GET", "/api/v1/events", None),
    ];
    for (method, path, body) in cases {
        server
            .expect_error(
                method,
                path,
                None,
                body.clone(),
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
            )
            .await;
        server
            .request_expect(method, path, Some("garbage"), body, StatusCode::UNAUTHORIZED)
            .await;
    }
}

#[tokio::test]
async fn ticket_task_scenario() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let family = server.register_family("mom", "alice").await;

    let bounty = server
        .request_expect(
            "POST",
            &endpoints::bounty_templates("", &family.id),
            Some(&family.parent_token),
            Some(json!({"title": "Dishes", "emoji": "🍽️", "type": "TICKETS", "rewardValue": "5"})),
            StatusCode::CREATED,
        )
        .await;
    let assignment = server
        .request_expect(
            "POST",
            &endpoints::bounty_assignments("", &family.id),
            Some(&family.parent_token),
            Some(json!({"bountyId": str_field(&bounty, "id"), "userId": family.child_id})),
            StatusCode::CREATED,
        )
        .await;
    let aid = str_field(&assignment, "id");
    assert_eq!(str_field(&assignment, "status"), "OFFERED");

    // children cannot verify, parents cannot accept on a child's behalf
    server
        .expect_error(
            "POST",
            &endpoints::bounty_assignment_accept("", &aid),
            Some(&family.parent_token),
            None,
            StatusCode::FORBIDDEN,
            "ONLY_ASSIGNEE_CAN_ACCEPT",
        )
        .await;

    let accepted = server
        .request_expect(
            "POST",
            &endpoints::bounty_assignment_accept("", &aid),
            Some(&family.child_token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(str_field(&accepted, "status"), "IN_PROGRESS");
    server
        .request_expect(
            "POST",
            &endpoints::bounty_assignment_complete("", &aid),
            Some(&family.child_token),
            None,
            StatusCode::OK,
        )
        .await;
    server
        .expect_error(
            "POST",
            &endpoints::bounty_assignment_verify("", &aid),
            Some(&family.child_token),
            None,
            StatusCode::FORBIDDEN,
            "PARENT_ONLY",
        )
        .await;

    let verified = server
        .request_expect(
            "POST",
            &endpoints::bounty_assignment_verify("", &aid),
            Some(&family.parent_token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(verified["ticketsAwarded"], 5);
    assert!(verified.get("prize").is_none());
    assert_eq!(verified["assignment"]["status"], "VERIFIED");

    let balance = server
        .request_expect(
            "GET",
            &endpoints::user_tickets("", &family.child_id),
            Some(&family.child_token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(balance["ticketBalance"], 5);

    server
        .expect_error(
            "POST",
            &endpoints::bounty_assignment_verify("", &aid),
            Some(&family.parent_token),
            None,
            StatusCode::BAD_REQUEST,
            "INVALID_STATUS",
        )
        .await;

    let history = server
        .request_expect(
            "GET",
            &endpoints::history("", &family.id, Some(&family.child_id)),
            Some(&family.parent_token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(history[0]["action"], "EARNED_TICKETS");
    assert_eq!(history.as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn fcfs_scenario() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let family = server.register_family("mom", "alice").await;
    let bob = server
        .request_expect(
            "POST",
            &endpoints::family_users("", &family.id),
            Some(&family.parent_token),
            Some(json!({"username": "bob", "password": "kidpass", "displayName": "Bob"})),
            StatusCode::CREATED,
        )
        .await;
    let bob_id = str_field(&bob, "id");
    let bob_token = server.login("bob", "kidpass").await;

    let bounty = server
        .request_expect(
            "POST",
            &endpoints::bounty_templates("", &family.id),
            Some(&family.parent_token),
            Some(json!({
                "title": "Walk dog",
                "emoji": "🐕",
                "type": "TICKETS",
                "rewardValue": "3",
                "isFCFS": true
            })),
            StatusCode::CREATED,
        )
        .await;
    assert_eq!(bounty["isFCFS"], true);
    let bounty_id = str_field(&bounty, "id");

    let mut offers = Vec::new();
    for user in [family.child_id.as_str(), bob_id.as_str()] {
        let a = server
            .request_expect(
                "POST",
                &endpoints::bounty_assignments("", &family.id),
                Some(&family.parent_token),
                Some(json!({"bountyId": bounty_id, "userId": user})),
                StatusCode::CREATED,
            )
            .await;
        offers.push(str_field(&a, "id"));
    }

    server
        .request_expect(
            "POST",
            &endpoints::bounty_assignment_accept("", &offers[0]),
            Some(&family.child_token),
            None,
            StatusCode::OK,
        )
        .await;
    server
        .expect_error(
            "POST",
            &endpoints::bounty_assignment_accept("", &offers[1]),
            Some(&bob_token),
            None,
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
        )
        .await;

    let notes = server
        .request_expect(
            "GET",
            &endpoints::user_notifications("", &bob_id),
            Some(&bob_token),
            None,
            StatusCode::OK,
        )
        .await;
    assert!(
        notes
            .as_array()
            .unwrap()
            .iter()
            .any(|n| n["message"] == "Task \"Walk dog\" was claimed by someone else.")
    );

    // other members' inboxes stay private
    server
        .expect_error(
            "GET",
            &endpoints::user_notifications("", &bob_id),
            Some(&family.child_token),
            None,
            StatusCode::FORBIDDEN,
            "FORBIDDEN",
        )
        .await;
    server
        .request_expect(
            "POST",
            &endpoints::user_notifications_read_all("", &bob_id),
            Some(&bob_token),
            None,
            StatusCode::NO_CONTENT,
        )
        .await;
    let notes = server
        .request_expect(
            "GET",
            &endpoints::user_notifications("", &bob_id),
            Some(&bob_token),
            None,
            StatusCode::OK,
        )
        .await;
    assert!(notes.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn store_and_reward_scenario() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let family = server.register_family("mom", "alice").await;

    server
        .expect_error(
            "POST",
            &endpoints::user_tickets("", &family.child_id),
            Some(&family.parent_token),
            Some(json!({"amount": 0})),
            StatusCode::BAD_REQUEST,
            "INVALID_AMOUNT",
        )
        .await;
    let given = server
        .request_expect(
            "POST",
            &endpoints::user_tickets("", &family.child_id),
            Some(&family.parent_token),
            Some(json!({"amount": 5})),
            StatusCode::OK,
        )
        .await;
    assert_eq!(given["ticketBalance"], 5);

    let item = server
        .request_expect(
            "POST",
            &endpoints::store_items("", &family.id),
            Some(&family.parent_token),
            Some(json!({"title": "Lego set", "cost": 3})),
            StatusCode::CREATED,
        )
        .await;
    let item_id = str_field(&item, "id");

    let bought = server
        .request_expect(
            "POST",
            &endpoints::store_item_purchase("", &item_id),
            Some(&family.child_token),
            Some(json!({"userId": family.child_id})),
            StatusCode::OK,
        )
        .await;
    assert_eq!(bought["success"], true);
    assert_eq!(bought["ticketBalance"], 2);
    let prize_id = str_field(&bought, "assignmentId");

    server
        .expect_error(
            "POST",
            &endpoints::store_item_purchase("", &item_id),
            Some(&family.child_token),
            Some(json!({"userId": family.child_id})),
            StatusCode::BAD_REQUEST,
            "INSUFFICIENT_TICKETS",
        )
        .await;

    // reject sends it back to AVAILABLE, the child claims again, then approval
    let rejected = server
        .request_expect(
            "POST",
            &endpoints::assigned_prize_reject("", &prize_id),
            Some(&family.parent_token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(rejected["status"], "AVAILABLE");
    server
        .request_expect(
            "POST",
            &endpoints::assigned_prize_claim("", &prize_id),
            Some(&family.child_token),
            None,
            StatusCode::OK,
        )
        .await;
    let approved = server
        .request_expect(
            "POST",
            &endpoints::assigned_prize_approve("", &prize_id),
            Some(&family.parent_token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(approved["status"], "REDEEMED");
    assert_eq!(approved["origin"], "STORE");

    server
        .request_expect(
            "DELETE",
            &endpoints::assigned_prize("", &prize_id),
            Some(&family.parent_token),
            None,
            StatusCode::NO_CONTENT,
        )
        .await;
    let prizes = server
        .request_expect(
            "GET",
            &endpoints::assigned_prizes("", &family.id),
            Some(&family.child_token),
            None,
            StatusCode::OK,
        )
        .await;
    assert!(prizes.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn wheel_configuration_scenario() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let family = server.register_family("mom", "alice").await;

    let segments = server
        .request_expect(
            "GET",
            &endpoints::wheel_segments("", &family.id),
            Some(&family.child_token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(segments.as_array().unwrap().len(), 9);

    server
        .expect_error(
            "PUT",
            &endpoints::wheel_segments("", &family.id),
            Some(&family.parent_token),
            Some(json!({"segments": [
                {"label": "Candy Run", "prob": 0.5},
                {"label": "Movie Night", "prob": 0.3}
            ]})),
            StatusCode::BAD_REQUEST,
            "PROBABILITIES_MUST_SUM_TO_ONE",
        )
        .await;

    let config = server
        .request_expect(
            "PUT",
            &endpoints::wheel_segments("", &family.id),
            Some(&family.parent_token),
            Some(json!({"spinCost": 2, "segments": [{"label": "Candy Run", "prob": 1.0}]})),
            StatusCode::OK,
        )
        .await;
    assert_eq!(config["spinCost"], 2);
    assert_eq!(config["segments"][0]["emoji"], "🍬");

    server
        .expect_error(
            "POST",
            &endpoints::wheel_spin("", &family.id),
            Some(&family.child_token),
            Some(json!({"userId": family.child_id})),
            StatusCode::BAD_REQUEST,
            "INSUFFICIENT_TICKETS",
        )
        .await;

    server
        .request_expect(
            "POST",
            &endpoints::user_tickets("", &family.child_id),
            Some(&family.parent_token),
            Some(json!({"amount": 2})),
            StatusCode::OK,
        )
        .await;
    let spun = server
        .request_expect(
            "POST",
            &endpoints::wheel_spin("", &family.id),
            Some(&family.child_token),
            Some(json!({"userId": family.child_id})),
            StatusCode::OK,
        )
        .await;
    assert_eq!(spun["won"], true);
    assert_eq!(spun["prize"], "Candy Run");
    assert_eq!(spun["newBalance"], 0);

    let cost = server
        .request_expect(
            "GET",
            &endpoints::wheel_config("", &family.id),
            Some(&family.child_token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(cost["spinCost"], 2);

    let reset = server
        .request_expect(
            "POST",
            &endpoints::wheel_reset("", &family.id),
            Some(&family.parent_token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(reset["segments"].as_array().unwrap().len(), 9);
}

#[tokio::test]
async fn families_are_isolated() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let smiths = server.register_family("mom", "alice").await;
    let joneses = server.register_family("dad", "carl").await;

    server
        .expect_error(
            "GET",
            &endpoints::bounty_assignments("", &smiths.id),
            Some(&joneses.parent_token),
            None,
            StatusCode::FORBIDDEN,
            "FORBIDDEN",
        )
        .await;
    server
        .expect_error(
            "POST",
            &endpoints::user_tickets("", &smiths.child_id),
            Some(&joneses.parent_token),
            Some(json!({"amount": 3})),
            StatusCode::FORBIDDEN,
            "FORBIDDEN",
        )
        .await;
    server
        .expect_error(
            "DELETE",
            &endpoints::user("", &smiths.child_id),
            Some(&joneses.parent_token),
            None,
            StatusCode::NOT_FOUND,
            "USER_NOT_FOUND",
        )
        .await;
}

#[tokio::test]
async fn realtime_stream_delivers_family_events() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let family = server.register_family("mom", "alice").await;

    let mut stream = server
        .client
        .get(endpoints::events(&server.base, &family.child_token))
        .send()
        .await
        .unwrap();
    assert_eq!(stream.status(), StatusCode::OK);

    let mut seen = String::new();
    read_until(&mut stream, &mut seen, "CONNECTED").await;

    server
        .request_expect(
            "POST",
            &endpoints::user_tickets("", &family.child_id),
            Some(&family.parent_token),
            Some(json!({"amount": 4})),
            StatusCode::OK,
        )
        .await;
    read_until(&mut stream, &mut seen, "TICKETS_GIVEN").await;
    assert!(seen.contains("\"newBalance\":4"), "stream was {seen}");
}

#[tokio::test]
async fn realtime_stream_accepts_percent_encoded_query_token() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let family = server.register_family("mom", "alice").await;

    let encoded = family.child_token.replace('.', "%2E");
    let mut stream = server
        .client
        .get(format!("{}/api/v1/events?token={}", server.base, encoded))
        .send()
        .await
        .unwrap();
    assert_eq!(stream.status(), StatusCode::OK);
    let mut seen = String::new();
    read_until(&mut stream, &mut seen, "CONNECTED").await;

    // Only the realtime stream takes its token from the query string.
    let path = format!(
        "{}?token={}",
        endpoints::family_users("", &family.id),
        family.parent_token
    );
    server
        .expect_error("GET", &path, None, None, StatusCode::UNAUTHORIZED, "UNAUTHENTICATED")
        .await;
}

async fn read_until(stream: &mut reqwest::Response, seen: &mut String, needle: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !seen.contains(needle) {
        let chunk = tokio::time::timeout_at(deadline, stream.chunk())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {needle}; got {seen}"))
            .unwrap()
            .expect("stream ended");
        seen.push_str(&String::from_utf8_lossy(&chunk));
    }
}

#[tokio::test]
async fn push_subscriptions_are_upserted() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let family = server.register_family("mom", "alice").await;
    let path = &endpoints::push_subscriptions("");
    let sub = json!({
        "endpoint": "https://push.example.com/abc",
        "keys": {"p256dh": "BKey", "auth": "secret"}
    });

    let first = server
        .request_expect(
            "POST",
            path,
            Some(&family.child_token),
            Some(sub.clone()),
            StatusCode::CREATED,
        )
        .await;
    let again = server
        .request_expect("POST", path, Some(&family.child_token), Some(sub), StatusCode::OK)
        .await;
    assert_eq!(first["id"], again["id"]);

    server
        .expect_error(
            "POST",
            path,
            Some(&family.child_token),
            Some(json!({"endpoint": "https://push.example.com/abc", "keys": {"auth": "x"}})),
            StatusCode::BAD_REQUEST,
            "INVALID_SUBSCRIPTION",
        )
        .await;
    server
        .expect_error(
            "POST",
            &endpoints::push_unsubscribe(""),
            Some(&family.child_token),
            Some(json!({})),
            StatusCode::BAD_REQUEST,
            "MISSING_ENDPOINT",
        )
        .await;
    server
        .request_expect(
            "POST",
            &endpoints::push_unsubscribe(""),
            Some(&family.child_token),
            Some(json!({"endpoint": "https://push.example.com/abc"})),
            StatusCode::NO_CONTENT,
        )
        .await;
}

#[tokio::test]
async fn children_join_and_edit_their_profile() {
    let Some(server) = TestServer::spawn().await else {
        return;
    };
    let family = server.register_family("mom", "alice").await;

    server
        .expect_error(
            "GET",
            &endpoints::auth_me(""),
            None,
            None,
            StatusCode::UNAUTHORIZED,
            "UNAUTHENTICATED",
        )
        .await;

    let me = server
        .request_expect(
            "GET",
            &endpoints::auth_me(""),
            Some(&family.parent_token),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(str_field(&me["user"], "role"), "PARENT");
    assert_eq!(str_field(&me["family"], "id"), family.id);
    let join_code = str_field(&me["family"], "joinCode");

    server
        .expect_error(
            "POST",
            &endpoints::auth_join_family(""),
            None,
            Some(json!({
                "joinCode": "NOPE00",
                "username": "bob",
                "password": "kidpass",
                "displayName": "Bob"
            })),
            StatusCode::BAD_REQUEST,
            "INVALID_JOIN_CODE",
        )
        .await;
    server
        .expect_error(
            "POST",
            &endpoints::auth_join_family(""),
            None,
            Some(json!({"joinCode": join_code, "username": "bob"})),
            StatusCode::BAD_REQUEST,
            "MISSING_FIELDS",
        )
        .await;

    let joined = server
        .request_expect(
            "POST",
            &endpoints::auth_join_family(""),
            None,
            Some(json!({
                "joinCode": join_code.to_lowercase(),
                "username": "Bob",
                "password": "kidpass",
                "displayName": "Bob"
            })),
            StatusCode::CREATED,
        )
        .await;
    assert_eq!(str_field(&joined, "familyName"), "Smith");
    assert_eq!(str_field(&joined["user"], "role"), "CHILD");
    let bob_id = str_field(&joined["user"], "id");
    let bob_token = str_field(&joined, "token");

    let me = server
        .request_expect("GET", &endpoints::auth_me(""), Some(&bob_token), None, StatusCode::OK)
        .await;
    assert_eq!(str_field(&me["user"], "username"), "bob");
    assert_eq!(str_field(&me["family"], "name"), "Smith");
    assert!(me["family"]["joinCode"].is_null());

    let edited = server
        .request_expect(
            "PATCH",
            &endpoints::user("", &bob_id),
            Some(&bob_token),
            Some(json!({"displayName": "Bobby", "avatarColor": "bg-orange-400"})),
            StatusCode::OK,
        )
        .await;
    assert_eq!(str_field(&edited, "displayName"), "Bobby");
    assert_eq!(str_field(&edited, "avatarColor"), "bg-orange-400");

    server
        .expect_error(
            "PATCH",
            &endpoints::user("", &family.child_id),
            Some(&bob_token),
            Some(json!({"displayName": "Nope"})),
            StatusCode::FORBIDDEN,
            "PARENT_ONLY",
        )
        .await;
    server
        .expect_error(
            "PATCH",
            &endpoints::user("", &bob_id),
            Some(&family.parent_token),
            Some(json!({"username": "alice"})),
            StatusCode::CONFLICT,
            "USERNAME_TAKEN",
        )
        .await;

    server
        .request_expect(
            "PATCH",
            &endpoints::user_password("", &bob_id),
            Some(&family.parent_token),
            Some(json!({"newPassword": "fresh-start"})),
            StatusCode::NO_CONTENT,
        )
        .await;
    server.login("bob", "fresh-start").await;
    server
        .expect_error(
            "POST",
            &endpoints::auth_login(""),
            None,
            Some(json!({"username": "bob", "password": "kidpass"})),
            StatusCode::UNAUTHORIZED,
            "INVALID_CREDENTIALS",
        )
        .await;
}
