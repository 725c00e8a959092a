//! End-to-end dispatch through the gateway, from signed raw request to
//! serialized ack.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use nacre::app::App;
use nacre::auth;
use nacre::commands::{Command, DefinitionBuilder, ValueType};
use nacre::config::AppConfig;
use nacre::gateway::{Gateway, RawRequest};
use nacre::listeners::Callback;

const SECRET: &str = "integration-secret";

fn hello_app() -> App {
    let definition = DefinitionBuilder::new()
        .name("test")
        .sub_command("hello")
        .arg("name", ValueType::Str, true)
        .opt("caps", ValueType::Bool, None)
        .build()
        .unwrap();

    App::new()
        .with_config(AppConfig::new().with_signing_secret(SECRET))
        .command(
            "test",
            Command::new(definition, |cx, input| {
                let name = input.get_str("name").unwrap_or("world");
                let mut greeting = format!("Hello, {name}!");
                if input.get_bool("caps") {
                    greeting = greeting.to_uppercase();
                }
                cx.ack_text(&greeting)
            }),
        )
}

fn dispatch_form(gateway: &Gateway, body: &str) -> Result<(u16, Option<Value>), u16> {
    let timestamp = auth::unix_now();
    let signature = auth::sign(timestamp, body.as_bytes(), SECRET);
    dispatch_signed(gateway, body, "application/x-www-form-urlencoded", &signature, timestamp)
}

fn dispatch_signed(
    gateway: &Gateway,
    body: &str,
    content_type: &str,
    signature: &str,
    timestamp: i64,
) -> Result<(u16, Option<Value>), u16> {
    let timestamp = timestamp.to_string();
    gateway
        .dispatch(&RawRequest {
            body: body.as_bytes(),
            content_type: Some(content_type),
            signature: Some(signature),
            timestamp: Some(&timestamp),
        })
        .map(|ack| {
            let body = ack.body.map(|b| serde_json::from_str(&b).unwrap());
            (ack.status, body)
        })
        .map_err(|err| err.status())
}

#[test]
fn test_signed_command_round_trip() {
    let gateway = Gateway::new(Arc::new(hello_app()));
    let (status, body) =
        dispatch_form(&gateway, "command=%2Ftest&text=hello+Jeremy+--caps").unwrap();

    assert_eq!(status, 200);
    assert_eq!(body, Some(json!({"text": "HELLO, JEREMY!"})));
}

#[test]
fn test_bad_command_text_gets_usage_help() {
    let gateway = Gateway::new(Arc::new(hello_app()));
    let (status, body) = dispatch_form(&gateway, "command=%2Ftest&text=hello").unwrap();

    assert_eq!(status, 200);
    let text = body.unwrap()["text"].as_str().unwrap().to_string();
    assert!(text.contains("missing required arg"));
    assert!(text.contains("/test hello <name:string>"));
}

#[test]
fn test_tampered_signature_is_rejected() {
    let gateway = Gateway::new(Arc::new(hello_app()));
    let body = "command=%2Ftest&text=hello+Jeremy";
    let timestamp = auth::unix_now();
    let signature = auth::sign(timestamp, body.as_bytes(), "some-other-secret");

    let status = dispatch_signed(
        &gateway,
        body,
        "application/x-www-form-urlencoded",
        &signature,
        timestamp,
    )
    .unwrap_err();
    assert_eq!(status, 401);
}

#[test]
fn test_stale_timestamp_is_rejected() {
    let gateway = Gateway::new(Arc::new(hello_app()));
    let body = "command=%2Ftest&text=hello+Jeremy";
    let timestamp = auth::unix_now() - 600;
    let signature = auth::sign(timestamp, body.as_bytes(), SECRET);

    let status = dispatch_signed(
        &gateway,
        body,
        "application/x-www-form-urlencoded",
        &signature,
        timestamp,
    )
    .unwrap_err();
    assert_eq!(status, 401);
}

#[test]
fn test_url_verification_handshake() {
    let app = App::new()
        .with_config(AppConfig::new().with_signing_secret(SECRET))
        .event("app_mention", Callback::new(|cx| cx.ack_text("hi")));
    let gateway = Gateway::new(Arc::new(app));

    let body = r#"{"type": "url_verification", "challenge": "ch-123"}"#;
    let timestamp = auth::unix_now();
    let signature = auth::sign(timestamp, body.as_bytes(), SECRET);

    let (status, response) =
        dispatch_signed(&gateway, body, "application/json", &signature, timestamp).unwrap();
    assert_eq!(status, 200);
    assert_eq!(response, Some(json!({"challenge": "ch-123"})));
}

#[test]
fn test_deferred_command_acks_then_runs_post_ack_phase() {
    let phases: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&phases);

    let app = App::new()
        .with_config(AppConfig::new().with_signing_secret(SECRET))
        .with_command_ack(json!({"text": "on it..."}))
        .command_deferred(
            "slow",
            Callback::new(move |cx| {
                assert!(cx.is_acknowledged());
                seen.lock().push("post_ack");
                Ok(())
            }),
        );
    let gateway = Gateway::new(Arc::new(app));

    let (status, body) = dispatch_form(&gateway, "command=%2Fslow&text=").unwrap();

    // The ack is the configured waiting message; the real work ran after
    // it was fixed, exactly once.
    assert_eq!(status, 200);
    assert_eq!(body, Some(json!({"text": "on it..."})));
    assert_eq!(*phases.lock(), ["post_ack"]);
}

#[test]
fn test_unmatched_payload_still_acks() {
    let gateway = Gateway::new(Arc::new(hello_app()));
    let body = r#"{"type": "shortcut", "callback_id": "nothing_here"}"#;
    let timestamp = auth::unix_now();
    let signature = auth::sign(timestamp, body.as_bytes(), SECRET);

    let (status, response) =
        dispatch_signed(&gateway, body, "application/json", &signature, timestamp).unwrap();
    assert_eq!(status, 200);
    assert_eq!(response, None);
}
