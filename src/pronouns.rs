//! Pronoun enrichment: a time-bounded per-login cache in front of the
//! pronoun lookup service.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

pub const DEFAULT_PRONOUN_API: &str = "https://pronouns.alejo.io/api";

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("pronoun lookup request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected pronoun lookup response: {0}")]
    UnexpectedShape(String),
    #[error("invalid pronoun api url: {0}")]
    InvalidBaseUrl(String),
}

/// One entry of the pronoun table, e.g. `{"name": "theythem", "display": "They/Them"}`.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct PronounRecord {
    pub name: String,
    pub display: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct UserPronoun {
    pub pronoun_id: String,
}

#[async_trait]
pub trait PronounService: Send + Sync + 'static {
    async fn fetch_pronouns(&self) -> Result<Vec<PronounRecord>, LookupError>;
    async fn fetch_user(&self, login: &str) -> Result<Vec<UserPronoun>, LookupError>;
}

pub struct HttpPronounService {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpPronounService {
    pub fn new(base_url: &str) -> Result<Self, LookupError> {
        let parsed = Url::parse(base_url)
            .map_err(|e| LookupError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        if parsed.cannot_be_a_base() {
            return Err(LookupError::InvalidBaseUrl(base_url.to_owned()));
        }
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(HttpPronounService {
            client,
            base_url: parsed,
        })
    }

    /// Base URL with `segments` appended, each percent-encoded as a single
    /// path segment.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get_list<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, LookupError> {
        let body: Value = self
            .client
            .get(url.clone())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if !body.is_array() {
            return Err(LookupError::UnexpectedShape(format!("{url} did not return a list")));
        }
        serde_json::from_value(body).map_err(|e| LookupError::UnexpectedShape(e.to_string()))
    }
}

#[async_trait]
impl PronounService for HttpPronounService {
    async fn fetch_pronouns(&self) -> Result<Vec<PronounRecord>, LookupError> {
        self.get_list(self.endpoint(&["pronouns"])).await
    }

    async fn fetch_user(&self, login: &str) -> Result<Vec<UserPronoun>, LookupError> {
        self.get_list(self.endpoint(&["users", login])).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PronounCacheEntry {
    pub text: String,
    pub refreshed_at: Instant,
}

/// Per-login pronoun text plus the shared id -> display table.
///
/// Both maps live as long as the cache. Entries are never removed, only
/// refreshed once older than the staleness window. Overlapping lookups for
/// the same login are not coalesced; the last one to finish wins.
pub struct PronounCache {
    service: Arc<dyn PronounService>,
    lookup: RwLock<HashMap<String, String>>,
    users: Mutex<HashMap<String, PronounCacheEntry>>,
    stale_after: Duration,
}

impl PronounCache {
    pub fn new(service: Arc<dyn PronounService>, stale_after: Duration) -> Self {
        PronounCache {
            service,
            lookup: RwLock::new(HashMap::new()),
            users: Mutex::new(HashMap::new()),
            stale_after,
        }
    }

    /// Pronoun display text for `login`, empty when unknown or when the
    /// lookup service is unavailable.
    pub async fn resolve(&self, login: &str) -> String {
        if login.is_empty() {
            debug!("post without a login, skipping pronoun lookup");
            return String::new();
        }
        if let Some(entry) = self.users.lock().await.get(login) {
            if entry.refreshed_at.elapsed() < self.stale_after {
                return entry.text.clone();
            }
            debug!("pronouns for {login} are stale, refreshing");
        }

        let text = self.lookup_text(login).await;
        self.users.lock().await.insert(
            login.to_owned(),
            PronounCacheEntry {
                text: text.clone(),
                refreshed_at: Instant::now(),
            },
        );
        text
    }

    #[cfg(test)]
    pub async fn entry(&self, login: &str) -> Option<PronounCacheEntry> {
        self.users.lock().await.get(login).cloned()
    }

    async fn lookup_text(&self, login: &str) -> String {
        self.ensure_table().await;
        let Some(pronoun_id) = self.user_pronoun_id(login).await else {
            return String::new();
        };
        self.lookup
            .read()
            .await
            .get(&pronoun_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn ensure_table(&self) {
        if !self.lookup.read().await.is_empty() {
            return;
        }
        match self.service.fetch_pronouns().await {
            Ok(records) => {
                let mut table = self.lookup.write().await;
                for record in records {
                    table.insert(record.name, record.display);
                }
                debug!("loaded {} pronoun names", table.len());
            }
            Err(e) => warn!("Failed to load pronoun table: {e}"),
        }
    }

    async fn user_pronoun_id(&self, login: &str) -> Option<String> {
        match self.service.fetch_user(login).await {
            Ok(mut records) if records.len() == 1 => records.pop().map(|record| record.pronoun_id),
            Ok(records) => {
                debug!("{} pronoun records for {login}, using none", records.len());
                None
            }
            Err(e) => {
                warn!("Failed to look up pronouns for {login}: {e}");
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "pronouns_test.rs"]
mod tests;
