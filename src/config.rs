use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

use crate::pronouns::DEFAULT_PRONOUN_API;
use crate::render::{RenderOptions, Viewport};
use crate::server::StyleConfig;

#[derive(Parser, Debug, Clone)]
#[command(name = "chat_overlay", about = "Live chat overlay client")]
pub struct OverlayConfig {
    /// Chat event websocket to follow
    #[arg(long, env = "OVERLAY_ENDPOINT", default_value = "ws://127.0.0.1:8080/chat_overlay/ws")]
    pub endpoint: String,

    /// Seconds to wait before reconnecting after the socket closes
    #[arg(long, env = "OVERLAY_RECONNECT_DELAY_SECS", default_value_t = 3)]
    pub reconnect_delay_secs: u64,

    /// Render the badge strip in front of display names
    #[arg(long, env = "OVERLAY_BADGES")]
    pub badges: bool,

    /// Look up and show pronouns next to display names
    #[arg(long, env = "OVERLAY_PRONOUNS")]
    pub pronouns: bool,

    #[arg(long, env = "OVERLAY_PRONOUN_API", default_value = DEFAULT_PRONOUN_API)]
    pub pronoun_api: String,

    /// Seconds a cached pronoun lookup stays fresh
    #[arg(long, env = "OVERLAY_PRONOUN_STALE_SECS", default_value_t = 500)]
    pub pronoun_stale_secs: u64,

    /// Height of the overlay area in pixels
    #[arg(long, env = "OVERLAY_VIEWPORT_HEIGHT", default_value_t = 1080)]
    pub viewport_height: u32,

    #[arg(long, env = "OVERLAY_LINE_HEIGHT", default_value_t = 28)]
    pub line_height: u32,

    /// Characters that fit on one rendered line
    #[arg(long, env = "OVERLAY_LINE_CHARS", default_value_t = 40)]
    pub line_chars: usize,

    /// Address serving the overlay page
    #[arg(long, env = "OVERLAY_LISTEN", default_value = "127.0.0.1:8081")]
    pub listen: SocketAddr,

    #[arg(long, env = "OVERLAY_FONT", default_value = "Arial")]
    pub font: String,

    #[arg(long, env = "OVERLAY_FONT_SIZE", default_value_t = 20)]
    pub font_size: u32,
}

impl OverlayConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn pronoun_stale_after(&self) -> Duration {
        Duration::from_secs(self.pronoun_stale_secs)
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            badges: self.badges,
            pronouns: self.pronouns,
        }
    }

    pub fn viewport(&self) -> Viewport {
        Viewport {
            height: self.viewport_height,
            line_height: self.line_height,
            line_chars: self.line_chars,
        }
    }

    pub fn style(&self) -> StyleConfig {
        StyleConfig {
            font: self.font.clone(),
            font_size: self.font_size,
            line_height: self.line_height,
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
