use super::*;

use serde_json::json;

fn parse(value: serde_json::Value) -> ChatEvent {
    serde_json::from_value(value).unwrap()
}

#[test]
fn privmsg_parses_into_post() {
    let event = parse(json!({
        "msg_type": "privmsg",
        "id": "m1",
        "display-name": "Alice",
        "user-id": "42",
        "nickname": "alice",
        "color": "#FF0000",
        "msg_text": "hello",
        "badges": ["https://cdn.example/b1.png", "https://cdn.example/b2.png"],
    }));

    let ChatEvent::Post(post) = event else {
        panic!("expected a post");
    };
    assert_eq!(post.message_id, "m1");
    assert_eq!(post.author(), "Alice");
    assert_eq!(post.user_id, "42");
    assert_eq!(post.login, "alice");
    assert_eq!(post.badges.len(), 2);
    assert!(!post.is_action());
}

#[test]
fn badge_tag_string_renders_no_badges() {
    let event = parse(json!({
        "msg_type": "privmsg",
        "id": "m1",
        "msg_text": "hi",
        "badges": "broadcaster/1,subscriber/0",
    }));

    let ChatEvent::Post(post) = event else {
        panic!("expected a post");
    };
    assert!(post.badges.is_empty());
}

#[test]
fn author_falls_back_to_login() {
    let post = PostEvent {
        login: "bob".to_owned(),
        ..Default::default()
    };
    assert_eq!(post.author(), "bob");
}

#[test]
fn action_marker_flags_post() {
    let post = PostEvent {
        text: "\u{1}ACTIONdances\u{1}".to_owned(),
        ..Default::default()
    };
    assert!(post.is_action());
}

#[test]
fn clearchat_without_username_is_clear_all() {
    let event = parse(json!({ "msg_type": "clearchat", "username": "" }));
    assert_eq!(event.kind(), "clear-all");
    assert_eq!(event.id(), None);
}

#[test]
fn clearchat_with_username_targets_user() {
    let event = parse(json!({
        "msg_type": "clearchat",
        "username": "alice",
        "target-user-id": "42",
    }));
    assert_eq!(event.kind(), "clear-user");
    assert_eq!(event.id(), Some("42"));
}

#[test]
fn clearmsg_carries_target_message() {
    let event = parse(json!({
        "msg_type": "clearmsg",
        "target-msg-id": "m9",
        "login": "alice",
    }));
    assert_eq!(event.kind(), "clear-message");
    assert_eq!(event.id(), Some("m9"));
}

#[test]
fn unknown_discriminator_is_unknown() {
    let event = parse(json!({ "msg_type": "usernotice", "id": "x" }));
    assert_eq!(event, ChatEvent::Unknown);
}

#[test]
fn missing_discriminator_is_an_error() {
    let result = serde_json::from_value::<ChatEvent>(json!({ "id": "x" }));
    assert!(result.is_err());
}
