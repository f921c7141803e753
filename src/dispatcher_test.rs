use super::*;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::pronouns::{LookupError, PronounRecord, PronounService, UserPronoun};
use crate::render::{RenderOptions, Viewport};

/// Everyone is "They/Them"; user lookups take `delay` to answer.
struct SlowService {
    delay: Duration,
}

#[async_trait]
impl PronounService for SlowService {
    async fn fetch_pronouns(&self) -> Result<Vec<PronounRecord>, LookupError> {
        Ok(vec![PronounRecord {
            name: "theythem".to_owned(),
            display: "They/Them".to_owned(),
        }])
    }

    async fn fetch_user(&self, _login: &str) -> Result<Vec<UserPronoun>, LookupError> {
        tokio::time::sleep(self.delay).await;
        Ok(vec![UserPronoun {
            pronoun_id: "theythem".to_owned(),
        }])
    }
}

fn dispatcher(pronoun_delay: Option<Duration>) -> (Dispatcher, Arc<Mutex<Overlay>>) {
    let options = RenderOptions {
        badges: false,
        pronouns: pronoun_delay.is_some(),
    };
    let overlay = Arc::new(Mutex::new(Overlay::new(Viewport::default(), options)));
    let pronouns = pronoun_delay.map(|delay| {
        Arc::new(PronounCache::new(
            Arc::new(SlowService { delay }),
            Duration::from_secs(500),
        ))
    });
    (Dispatcher::new(overlay.clone(), pronouns), overlay)
}

fn privmsg(id: &str, user_id: &str, text: &str) -> String {
    json!({
        "msg_type": "privmsg",
        "id": id,
        "display-name": format!("User{user_id}"),
        "user-id": user_id,
        "nickname": format!("user{user_id}"),
        "color": "#1E90FF",
        "msg_text": text,
    })
    .to_string()
}

async fn ids(overlay: &Arc<Mutex<Overlay>>) -> Vec<String> {
    overlay
        .lock()
        .await
        .container()
        .elements()
        .filter_map(|message| message.id.clone())
        .collect()
}

async fn pronoun_text(overlay: &Arc<Mutex<Overlay>>, id: &str) -> Option<String> {
    overlay
        .lock()
        .await
        .message(id)
        .and_then(|message| message.child_by_class("pronouns"))
        .map(crate::dom::Element::text_content)
}

#[test]
fn parse_frame_rejects_malformed_json() {
    assert!(matches!(
        parse_frame("{not json"),
        Err(DispatchError::Malformed(_))
    ));
}

#[tokio::test]
async fn malformed_frame_twice_changes_nothing() {
    let (dispatcher, overlay) = dispatcher(None);
    dispatcher.dispatch(&privmsg("m1", "1", "hello")).await;
    let before = overlay.lock().await.to_html();

    dispatcher.dispatch("{\"msg_type\": \"privmsg\",").await;
    dispatcher.dispatch("{\"msg_type\": \"privmsg\",").await;

    assert_eq!(overlay.lock().await.to_html(), before);
}

#[tokio::test]
async fn unknown_msg_type_is_dropped() {
    let (dispatcher, overlay) = dispatcher(None);
    dispatcher
        .dispatch(&json!({ "msg_type": "usernotice", "id": "x" }).to_string())
        .await;

    assert_eq!(overlay.lock().await.len(), 0);
}

#[tokio::test]
async fn out_of_range_emote_tag_renders_plain_text() {
    let (dispatcher, overlay) = dispatcher(None);
    for (id, emotes) in [("m1", "25:0-18446744073709551615"), ("m2", "25:9-18446744073709551615")] {
        let frame = json!({
            "msg_type": "privmsg",
            "id": id,
            "user-id": "1",
            "nickname": "user1",
            "msg_text": "hello",
            "emotes": emotes,
        });
        dispatcher.dispatch(&frame.to_string()).await;
    }
    dispatcher.dispatch(&privmsg("m3", "2", "still rendering")).await;

    assert_eq!(ids(&overlay).await, vec!["m1", "m2", "m3"]);
    let html = overlay.lock().await.to_html();
    assert!(!html.contains("emote"));
}

#[tokio::test]
async fn frames_render_in_arrival_order() {
    let (dispatcher, overlay) = dispatcher(None);
    for i in 0..5 {
        dispatcher
            .dispatch(&privmsg(&format!("m{i}"), &i.to_string(), "hi"))
            .await;
    }

    assert_eq!(ids(&overlay).await, vec!["m0", "m1", "m2", "m3", "m4"]);
}

#[tokio::test]
async fn clearmsg_empties_the_target_only() {
    let (dispatcher, overlay) = dispatcher(None);
    dispatcher.dispatch(&privmsg("m1", "1", "one")).await;
    dispatcher.dispatch(&privmsg("m2", "2", "two")).await;

    let clear = json!({ "msg_type": "clearmsg", "target-msg-id": "m1", "login": "user1" });
    dispatcher.dispatch(&clear.to_string()).await;
    let unknown = json!({ "msg_type": "clearmsg", "target-msg-id": "zzz" });
    dispatcher.dispatch(&unknown.to_string()).await;

    let overlay = overlay.lock().await;
    assert!(overlay.message("m1").unwrap().is_empty());
    assert!(!overlay.message("m2").unwrap().is_empty());
    assert_eq!(overlay.len(), 2);
}

#[tokio::test]
async fn clearchat_for_user_keeps_other_users_in_order() {
    let (dispatcher, overlay) = dispatcher(None);
    for (id, user) in [("a", "1"), ("b", "2"), ("c", "3"), ("d", "2"), ("e", "4")] {
        dispatcher.dispatch(&privmsg(id, user, "text")).await;
    }

    let clear = json!({ "msg_type": "clearchat", "username": "user2", "target-user-id": "2" });
    dispatcher.dispatch(&clear.to_string()).await;

    assert_eq!(ids(&overlay).await, vec!["a", "c", "e"]);
}

#[tokio::test]
async fn clearchat_without_username_empties_everything() {
    for count in [0, 1, 7] {
        let (dispatcher, overlay) = dispatcher(None);
        for i in 0..count {
            dispatcher
                .dispatch(&privmsg(&format!("m{i}"), &(i % 3).to_string(), "text"))
                .await;
        }

        let clear = json!({ "msg_type": "clearchat", "username": "" });
        dispatcher.dispatch(&clear.to_string()).await;

        assert_eq!(overlay.lock().await.len(), 0, "after {count} posts");
    }
}

#[tokio::test(start_paused = true)]
async fn enrichment_fills_placeholder() {
    let (dispatcher, overlay) = dispatcher(Some(Duration::ZERO));
    dispatcher.dispatch(&privmsg("m1", "1", "hi")).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(pronoun_text(&overlay, "m1").await.as_deref(), Some("They/Them"));
}

#[tokio::test(start_paused = true)]
async fn later_frames_render_while_enrichment_is_pending() {
    let (dispatcher, overlay) = dispatcher(Some(Duration::from_secs(1)));
    dispatcher.dispatch(&privmsg("m1", "1", "first")).await;
    dispatcher.dispatch(&privmsg("m2", "2", "second")).await;

    assert_eq!(ids(&overlay).await, vec!["m1", "m2"]);
    assert_eq!(pronoun_text(&overlay, "m1").await.as_deref(), Some(""));

    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(pronoun_text(&overlay, "m1").await.as_deref(), Some("They/Them"));
    assert_eq!(pronoun_text(&overlay, "m2").await.as_deref(), Some("They/Them"));
}

#[tokio::test(start_paused = true)]
async fn enrichment_for_cleared_message_is_tolerated() {
    let (dispatcher, overlay) = dispatcher(Some(Duration::from_secs(1)));
    dispatcher.dispatch(&privmsg("m1", "1", "first")).await;
    let clear = json!({ "msg_type": "clearchat", "username": "" });
    dispatcher.dispatch(&clear.to_string()).await;

    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(overlay.lock().await.len(), 0);
}
