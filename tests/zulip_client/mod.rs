//! `ZulipClient` tests: notifications are posted to the messages API of a
//! fake Zulip.

use crate::common::{Method, Response, TestBuilder, silent_server};
use redmine_watchbot::zulip::{Notifier, Origin, Recipient, ZulipClient};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;

fn client(url: String) -> ZulipClient {
    ZulipClient::new(
        url,
        "bot@zulip.test".into(),
        "token".to_string().into(),
        Duration::from_secs(5),
    )
    .unwrap()
}

fn form(body: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(body).into_owned().collect()
}

#[tokio::test]
async fn stream_notification() {
    let server = TestBuilder::default()
        .handler(Method::POST, "api/v1/messages", |req| {
            // "bot@zulip.test:token"
            assert_eq!(
                req.headers["authorization"],
                "Basic Ym90QHp1bGlwLnRlc3Q6dG9rZW4="
            );
            let form = form(&req.body);
            assert_eq!(form["type"], "stream");
            assert_eq!(form["to"], "12");
            assert_eq!(form["topic"], "alerts");
            assert_eq!(form["content"], "New issue in [Bug] Infrastructure: Disk full");
            Response::json(json!({"result": "success", "msg": "", "id": 42}))
        })
        .start();
    let zulip = client(server.url());
    let origin = Origin {
        recipient: Recipient::Stream {
            id: 12,
            name: "ops".into(),
            topic: "alerts".into(),
        },
        requester: "Jane Doe".into(),
    };
    zulip
        .deliver(&origin, "New issue in [Bug] Infrastructure: Disk full")
        .await;
    server.events.assert_eq(&[(Method::POST, "/api/v1/messages")]);
}

#[tokio::test]
async fn private_notification_and_failure() {
    let server = TestBuilder::default()
        .handler(Method::POST, "api/v1/messages", |req| {
            let form = form(&req.body);
            assert_eq!(form["type"], "private");
            assert_eq!(form["to"], "jane@example.com");
            assert!(!form.contains_key("topic"), "{}", req.body_str());
            Response::json(json!({"result": "error", "msg": "Invalid email"})).code(400)
        })
        .start();
    let zulip = client(server.url());
    let origin = Origin {
        recipient: Recipient::Private {
            email: "jane@example.com".into(),
        },
        requester: "Jane Doe".into(),
    };
    // Delivery failures are only logged.
    zulip.deliver(&origin, "hello").await;
    server.events.assert_eq(&[(Method::POST, "/api/v1/messages")]);
}

#[tokio::test]
async fn unresponsive_server_times_out() {
    let zulip = ZulipClient::new(
        silent_server(),
        "bot@zulip.test".into(),
        "token".to_string().into(),
        Duration::from_millis(200),
    )
    .unwrap();
    let origin = Origin {
        recipient: Recipient::Private {
            email: "jane@example.com".into(),
        },
        requester: "Jane Doe".into(),
    };
    // The poller awaits delivery inline, so a hung Zulip must not stall it.
    tokio::time::timeout(Duration::from_secs(5), zulip.deliver(&origin, "hello"))
        .await
        .expect("delivery should give up after the request timeout");
}
