// src/bot/whitelist.rs - Approved exception substrings that cancel a banned-term hit

use log::debug;

use crate::bot::normalizer::normalize;

/// Exception list checked against every matched token.
///
/// A hit is dropped when an exception substring occurs inside the same
/// word-bounded token, so `блямба` survives the `бля` root while a bare
/// `бля` elsewhere in the message is still caught.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    entries: Vec<String>,
}

impl Whitelist {
    pub fn new(entries: &[String]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|entry| normalize(entry.trim()))
                .filter(|entry| !entry.is_empty())
                .collect(),
        }
    }

    /// Exception that covers the matched span, if any
    pub fn exception_for(&self, span: &str) -> Option<&str> {
        span.split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
            .find_map(|token| {
                self.entries
                    .iter()
                    .find(|entry| token.contains(entry.as_str()))
                    .map(String::as_str)
            })
    }

    /// Whether the matched span must be dropped
    pub fn suppresses(&self, span: &str) -> bool {
        match self.exception_for(span) {
            Some(entry) => {
                debug!("Whitelist '{}' covers '{}', passing", entry, span);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
