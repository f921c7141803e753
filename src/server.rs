//! Local HTTP server exposing the overlay to a browser source.

use std::net::SocketAddr;
use std::sync::Arc;

use log::info;
use serde_json::json;
use tokio::sync::{watch, Mutex};
use warp::http::header::CONTENT_TYPE;
use warp::{Filter, Rejection, Reply};

use crate::connection::ConnectionState;
use crate::render::Overlay;

const REFRESH_SECS: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleConfig {
    pub font: String,
    pub font_size: u32,
    pub line_height: u32,
}

pub fn stylesheet(style: &StyleConfig) -> String {
    let font: String = style
        .font
        .chars()
        .filter(|c| !matches!(c, ';' | '{' | '}' | '"' | '<'))
        .collect();
    format!(
        "body {{ margin: 0; background: transparent; overflow: hidden; }}\n\
         #chat {{ position: absolute; bottom: 0; width: 100%; font-family: \"{font}\", sans-serif; \
         font-size: {}px; line-height: {}px; color: #ffffff; }}\n\
         .message {{ min-height: 0; }}\n\
         .badge {{ height: 1em; margin-right: 0.2em; vertical-align: middle; }}\n\
         .display-name {{ font-weight: bold; margin-right: 0.4em; }}\n\
         .pronouns {{ font-size: 0.8em; opacity: 0.8; margin-right: 0.4em; }}\n\
         .emote {{ height: 1.5em; vertical-align: middle; }}\n\
         .message-text.action {{ font-style: italic; }}\n",
        style.font_size, style.line_height
    )
}

pub fn page(container_html: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <meta http-equiv=\"refresh\" content=\"{REFRESH_SECS}\">\n\
         <link rel=\"stylesheet\" href=\"style.css\">\n<title>Chat overlay</title>\n\
         </head>\n<body>\n{container_html}\n</body>\n</html>\n"
    )
}

pub fn routes(
    overlay: Arc<Mutex<Overlay>>,
    state: watch::Receiver<ConnectionState>,
    style: &StyleConfig,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let with_overlay = warp::any().map(move || overlay.clone());
    let with_state = warp::any().map(move || state.clone());

    let index = warp::path::end()
        .and(warp::get())
        .and(with_overlay.clone())
        .then(|overlay: Arc<Mutex<Overlay>>| async move {
            let container = overlay.lock().await.to_html();
            warp::reply::html(page(&container))
        });

    let fragment = warp::path!("overlay.html")
        .and(warp::get())
        .and(with_overlay.clone())
        .then(|overlay: Arc<Mutex<Overlay>>| async move {
            warp::reply::html(overlay.lock().await.to_html())
        });

    let css = stylesheet(style);
    let styles = warp::path!("style.css")
        .and(warp::get())
        .map(move || warp::reply::with_header(css.clone(), CONTENT_TYPE, "text/css"));

    let status = warp::path!("status")
        .and(warp::get())
        .and(with_overlay)
        .and(with_state)
        .then(
            |overlay: Arc<Mutex<Overlay>>, state: watch::Receiver<ConnectionState>| async move {
                let connection = state.borrow().to_string();
                let messages = overlay.lock().await.len();
                warp::reply::json(&json!({ "connection": connection, "messages": messages }))
            },
        );

    index.or(fragment).or(styles).or(status)
}

/// Bind the overlay server. The returned future runs until `shutdown`
/// flips to `true`.
pub fn serve(
    addr: SocketAddr,
    overlay: Arc<Mutex<Overlay>>,
    state: watch::Receiver<ConnectionState>,
    style: &StyleConfig,
    mut shutdown: watch::Receiver<bool>,
) -> Result<impl std::future::Future<Output = ()>, warp::Error> {
    let (bound, server) = warp::serve(routes(overlay, state, style)).try_bind_with_graceful_shutdown(
        addr,
        async move {
            let _ = shutdown.wait_for(|stopped| *stopped).await;
        },
    )?;
    info!("Serving overlay on http://{bound}/");
    Ok(server)
}

#[cfg(test)]
#[path = "server_test.rs"]
mod tests;
