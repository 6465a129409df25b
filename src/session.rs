use std::collections::HashMap;

use parking_lot::RwLock;

use crate::sanitize::sanitize_query;

pub const SEARCH_QUERY_KEY: &str = "searchQuery";
pub const SCROLL_POSITION_KEY: &str = "scrollPosition";

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{key} holds an invalid offset: {value:?}")]
    InvalidOffset { key: &'static str, value: String },
}

/// Session-scoped key/value store. Lives as long as the process, which plays
/// the role of a browser tab: it survives moving between screens but not a restart.
#[derive(Debug, Default)]
pub struct Store {
    values: RwLock<HashMap<String, String>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    pub fn set(&self, key: &str, value: impl Into<String>) {
        self.values.write().insert(key.to_string(), value.into());
    }

    pub fn remove(&self, key: &str) -> Option<String> {
        self.values.write().remove(key)
    }

    pub fn search_query(&self) -> Option<String> {
        self.get(SEARCH_QUERY_KEY)
            .filter(|query| !query.trim().is_empty())
    }

    /// Stores the sanitized query. A query that sanitizes to nothing clears the key.
    pub fn set_search_query(&self, raw: &str) -> Option<String> {
        match sanitize_query(raw) {
            Some(query) => {
                self.set(SEARCH_QUERY_KEY, query.clone());
                Some(query)
            }
            None => {
                self.clear_search_query();
                None
            }
        }
    }

    pub fn clear_search_query(&self) {
        self.remove(SEARCH_QUERY_KEY);
    }

    pub fn save_scroll_position(&self, offset: u32) {
        self.set(SCROLL_POSITION_KEY, offset.to_string());
    }

    pub fn peek_scroll_position(&self) -> Result<Option<u32>, SessionError> {
        self.get(SCROLL_POSITION_KEY)
            .map(|value| parse_offset(SCROLL_POSITION_KEY, value))
            .transpose()
    }

    /// Reads and deletes the saved offset. A malformed value is dropped and reads as absent.
    pub fn take_scroll_position(&self) -> Option<u32> {
        let value = self.remove(SCROLL_POSITION_KEY)?;
        match parse_offset(SCROLL_POSITION_KEY, value) {
            Ok(offset) => Some(offset),
            Err(err) => {
                log::warn!("session: discarding saved scroll position: {err}");
                None
            }
        }
    }
}

fn parse_offset(key: &'static str, value: String) -> Result<u32, SessionError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| SessionError::InvalidOffset { key, value })
}
