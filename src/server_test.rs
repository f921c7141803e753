use super::*;

use crate::messages::PostEvent;
use crate::render::{RenderOptions, Viewport};

fn style() -> StyleConfig {
    StyleConfig {
        font: "Comic Neue".to_owned(),
        font_size: 24,
        line_height: 30,
    }
}

fn idle() -> watch::Receiver<ConnectionState> {
    watch::channel(ConnectionState::Idle).1
}

fn overlay_with_post() -> Arc<Mutex<Overlay>> {
    let mut overlay = Overlay::new(Viewport::default(), RenderOptions::default());
    overlay.post(&PostEvent {
        message_id: "m1".to_owned(),
        display_name: "Alice".to_owned(),
        user_id: "42".to_owned(),
        text: "<b>hi</b>".to_owned(),
        ..Default::default()
    });
    Arc::new(Mutex::new(overlay))
}

#[tokio::test]
async fn index_embeds_the_current_container() {
    let routes = routes(overlay_with_post(), idle(), &style());

    let response = warp::test::request().path("/").reply(&routes).await;

    assert_eq!(response.status(), 200);
    let body = String::from_utf8(response.body().to_vec()).unwrap();
    assert!(body.contains(r#"<div id="chat"><div id="m1" class="message" data-user-id="42">"#));
    assert!(body.contains("&lt;b&gt;hi&lt;/b&gt;"));
    assert!(body.contains(r#"href="style.css""#));
}

#[tokio::test]
async fn fragment_is_the_bare_container() {
    let overlay = overlay_with_post();
    let routes = routes(overlay.clone(), idle(), &style());

    let response = warp::test::request()
        .path("/overlay.html")
        .reply(&routes)
        .await;

    let body = String::from_utf8(response.body().to_vec()).unwrap();
    assert_eq!(body, overlay.lock().await.to_html());
}

#[tokio::test]
async fn stylesheet_uses_configured_font() {
    let routes = routes(overlay_with_post(), idle(), &style());

    let response = warp::test::request().path("/style.css").reply(&routes).await;

    assert_eq!(response.headers()[CONTENT_TYPE], "text/css");
    let body = String::from_utf8(response.body().to_vec()).unwrap();
    assert!(body.contains("font-family: \"Comic Neue\", sans-serif"));
    assert!(body.contains("font-size: 24px; line-height: 30px"));
}

#[tokio::test]
async fn status_reports_connection_and_message_count() {
    let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
    let routes = routes(overlay_with_post(), state_rx, &style());
    state_tx.send_replace(ConnectionState::Open);

    let response = warp::test::request().path("/status").reply(&routes).await;

    assert_eq!(response.status(), 200);
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(body, json!({ "connection": "open", "messages": 1 }));
}

#[tokio::test]
async fn unknown_paths_are_not_found() {
    let routes = routes(overlay_with_post(), idle(), &style());

    let response = warp::test::request().path("/nope").reply(&routes).await;

    assert_eq!(response.status(), 404);
}

#[test]
fn font_names_cannot_break_out_of_the_rule() {
    let css = stylesheet(&StyleConfig {
        font: "Arial\"; } body { display: none".to_owned(),
        ..style()
    });

    assert!(css.contains("font-family: \"Arial  body  display: none\", sans-serif"));
}
