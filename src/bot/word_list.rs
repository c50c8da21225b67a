// src/bot/word_list.rs - Literal banned-word lists

use log::debug;
use regex::Regex;

use crate::bot::normalizer::normalize;
use crate::bot::pattern_matching::RuleError;
use crate::bot::whitelist::Whitelist;

/// Literal entries, each searched as the whole word token containing it.
///
/// Unlike `PatternMatcher` the search is exhaustive: every entry is tried and
/// every surviving token is collected.
#[derive(Debug, Clone, Default)]
pub struct WordList {
    entries: Vec<(String, Regex)>,
}

impl WordList {
    pub fn compile(entries: &[String]) -> Result<Self, RuleError> {
        let mut compiled = Vec::with_capacity(entries.len());

        for entry in entries {
            let literal = normalize(entry.trim());
            if literal.is_empty() {
                continue;
            }

            let regex = Regex::new(&format!(r"\w*{}\w*", regex::escape(&literal))).map_err(|source| {
                RuleError::InvalidRegex {
                    template: entry.clone(),
                    source,
                }
            })?;
            compiled.push((literal, regex));
        }

        Ok(Self { entries: compiled })
    }

    /// All tokens containing a listed literal, minus whitelisted ones
    pub fn find(&self, text: &str, whitelist: &Whitelist) -> Vec<String> {
        let mut found = Vec::new();

        for (literal, regex) in &self.entries {
            let matches: Vec<&str> = regex.find_iter(text).map(|m| m.as_str()).collect();
            if matches.is_empty() {
                continue;
            }

            debug!("Word '{}' matches: {:?}", literal, matches);
            found.extend(
                matches
                    .into_iter()
                    .filter(|token| !whitelist.suppresses(token))
                    .map(String::from),
            );
        }

        found
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
