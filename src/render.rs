//! Render engine: turns chat events into message subtrees inside the
//! overlay container and keeps the container inside its viewport.

use log::debug;

use crate::dom::{Element, Node};
use crate::messages::{ChatEvent, ClearChatEvent, PostEvent, ACTION_MARKER};

pub const CONTAINER_ID: &str = "chat";
pub const EMOTE_CDN: &str = "https://static-cdn.jtvnw.net/emoticons/v2";

const ACTION_PREFIX_CHARS: usize = 7;
const ACTION_SUFFIX_CHARS: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderOptions {
    pub badges: bool,
    pub pronouns: bool,
}

/// Geometry of the area the container is allowed to fill.
///
/// The container is anchored to the bottom of the viewport, so its top edge
/// sits at `height - content height`; a negative top edge means the oldest
/// messages have scrolled out of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub height: u32,
    pub line_height: u32,
    pub line_chars: usize,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport {
            height: 1080,
            line_height: 28,
            line_chars: 40,
        }
    }
}

impl Viewport {
    fn message_height(&self, message: &Element) -> i64 {
        if message.is_empty() {
            return 0;
        }
        let chars = message.text_content().chars().count();
        let lines = chars.div_ceil(self.line_chars.max(1)).max(1);
        i64::try_from(lines)
            .unwrap_or(i64::MAX)
            .saturating_mul(i64::from(self.line_height))
    }
}

pub struct Overlay {
    container: Element,
    viewport: Viewport,
    options: RenderOptions,
}

impl Overlay {
    pub fn new(viewport: Viewport, options: RenderOptions) -> Self {
        Overlay {
            container: Element::new("div").with_id(CONTAINER_ID),
            viewport,
            options,
        }
    }

    pub fn render(&mut self, event: &ChatEvent) {
        match event {
            ChatEvent::Post(post) => self.post(post),
            ChatEvent::ClearChat(clear) => {
                self.clear_chat(clear);
            }
            ChatEvent::ClearMessage(clear) => {
                self.clear_message(&clear.target_message_id);
            }
            ChatEvent::Unknown => {}
        }
    }

    /// Append one message subtree, then evict the oldest message if the
    /// container has grown past the top of the viewport.
    pub fn post(&mut self, event: &PostEvent) {
        let message = self.build_message(event);
        self.container.children.push(Node::Element(message));
        if self.top_edge() < 0 {
            self.evict_oldest();
        }
    }

    /// Remove every message by the targeted user, or everything when the
    /// event names no user. Returns how many messages were removed.
    pub fn clear_chat(&mut self, event: &ClearChatEvent) -> usize {
        let before = self.container.children.len();
        match event.target() {
            None => self.container.children.clear(),
            Some(user_id) => self.container.children.retain(|node| match node {
                Node::Element(message) => message.attr("data-user-id") != Some(user_id),
                Node::Text(_) => true,
            }),
        }
        before - self.container.children.len()
    }

    /// Empty a message in place. The node itself stays so the layout does
    /// not jump. Unknown ids are ignored.
    pub fn clear_message(&mut self, message_id: &str) -> bool {
        match self.message_mut(message_id) {
            Some(message) => {
                message.children.clear();
                true
            }
            None => {
                debug!("clearmsg for {message_id}: not on screen");
                false
            }
        }
    }

    /// Write resolved pronoun text into a message's placeholder. A message
    /// that has scrolled off or been cleared is a no-op.
    pub fn set_pronoun(&mut self, message_id: &str, text: &str) -> bool {
        let Some(placeholder) = self
            .message_mut(message_id)
            .and_then(|message| message.child_by_class_mut("pronouns"))
        else {
            return false;
        };
        placeholder.set_text(text);
        true
    }

    #[cfg(test)]
    pub fn message(&self, message_id: &str) -> Option<&Element> {
        self.container
            .elements()
            .find(|message| message.id.as_deref() == Some(message_id))
    }

    fn message_mut(&mut self, message_id: &str) -> Option<&mut Element> {
        self.container
            .elements_mut()
            .find(|message| message.id.as_deref() == Some(message_id))
    }

    #[cfg(test)]
    pub fn container(&self) -> &Element {
        &self.container
    }

    pub fn len(&self) -> usize {
        self.container.children.len()
    }

    pub fn to_html(&self) -> String {
        self.container.to_html()
    }

    fn top_edge(&self) -> i64 {
        let content: i64 = self
            .container
            .elements()
            .map(|message| self.viewport.message_height(message))
            .sum();
        i64::from(self.viewport.height) - content
    }

    fn evict_oldest(&mut self) {
        if self.container.children.is_empty() {
            return;
        }
        if let Node::Element(evicted) = self.container.children.remove(0) {
            debug!(
                "evicted {} to stay inside the viewport",
                evicted.id.as_deref().unwrap_or_default()
            );
        }
    }

    fn build_message(&self, event: &PostEvent) -> Element {
        let mut message = Element::new("div")
            .with_id(event.message_id.clone())
            .with_class("message")
            .with_attr("data-user-id", event.user_id.clone());

        if self.options.badges && !event.badges.is_empty() {
            let badges = event.badges.iter().fold(
                Element::new("span").with_class("badges"),
                |strip, url| {
                    strip.with_child(
                        Element::new("img")
                            .with_class("badge")
                            .with_attr("src", url.clone()),
                    )
                },
            );
            message = message.with_child(badges);
        }

        let mut name = Element::new("span").with_class("display-name");
        if let Some(color) = css_color(&event.color) {
            name = name.with_attr("style", format!("color: {color}"));
        }
        message = message.with_child(name.with_text(event.author()));

        if self.options.pronouns {
            message = message.with_child(Element::new("span").with_class("pronouns"));
        }

        message.with_child(message_body(event))
    }
}

/// Build the text body, stripping the action wrapper and expanding emotes.
pub fn message_body(event: &PostEvent) -> Element {
    let mut body = Element::new("span").with_class("message-text");
    let text = if event.text.contains(ACTION_MARKER) {
        strip_action(&event.text)
    } else {
        event.text.clone()
    };
    if event.is_action() {
        body = body.with_class("action");
    }
    body.children = emote_nodes(&text, &event.emotes);
    body
}

fn strip_action(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() < ACTION_PREFIX_CHARS + ACTION_SUFFIX_CHARS {
        return String::new();
    }
    chars[ACTION_PREFIX_CHARS..chars.len() - ACTION_SUFFIX_CHARS]
        .iter()
        .collect()
}

/// Only `#rgb` and `#rrggbb` literals make it into a style attribute.
fn css_color(color: &str) -> Option<&str> {
    let hex = color.strip_prefix('#')?;
    let valid = matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit());
    valid.then_some(color)
}

/// One emote occurrence, as character offsets into the body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmoteSpan {
    pub start: usize,
    pub end: usize,
    pub id: String,
}

/// Parse the chat source's emote tag, `id:start-end,start-end/id:start-end`,
/// into spans sorted by position. `end` is exclusive. Returns `None` on any
/// malformed entry.
pub fn parse_emotes(tag: &str) -> Option<Vec<EmoteSpan>> {
    let mut spans = Vec::new();
    if tag.is_empty() {
        return Some(spans);
    }
    for emote in tag.split('/') {
        let (id, placements) = emote.split_once(':')?;
        for placement in placements.split(',') {
            let (start, end) = placement.split_once('-')?;
            let start: usize = start.parse().ok()?;
            let end: usize = end.parse().ok()?;
            if end < start {
                return None;
            }
            spans.push(EmoteSpan {
                start,
                end: end.checked_add(1)?,
                id: id.to_owned(),
            });
        }
    }
    spans.sort_by_key(|span| span.start);
    Some(spans)
}

fn emote_nodes(text: &str, tag: &str) -> Vec<Node> {
    let plain = || vec![Node::Text(text.to_owned())];
    let Some(spans) = parse_emotes(tag) else {
        return plain();
    };
    if spans.is_empty() {
        return plain();
    }

    let chars: Vec<char> = text.chars().collect();
    let mut nodes = Vec::new();
    let mut cursor = 0;
    for span in &spans {
        if span.start < cursor || span.start >= span.end || span.end > chars.len() {
            return plain();
        }
        if span.start > cursor {
            nodes.push(Node::Text(chars[cursor..span.start].iter().collect()));
        }
        let name: String = chars[span.start..span.end].iter().collect();
        nodes.push(Node::Element(
            Element::new("img")
                .with_class("emote")
                .with_attr("src", format!("{EMOTE_CDN}/{}/default/light/1.0", span.id))
                .with_attr("alt", name),
        ));
        cursor = span.end;
    }
    if cursor < chars.len() {
        nodes.push(Node::Text(chars[cursor..].iter().collect()));
    }
    nodes
}

#[cfg(test)]
#[path = "render_test.rs"]
mod tests;
