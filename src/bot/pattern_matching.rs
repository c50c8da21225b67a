// src/bot/pattern_matching.rs - Obfuscation-aware patterns for banned roots

use log::debug;
use regex::{Captures, Regex, RegexBuilder};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::bot::whitelist::Whitelist;

/// Compiled programs get a larger budget than the regex default: every
/// template letter expands into a Unicode class and the rule is wrapped
/// in Unicode `\w*` / `\b`.
const RULE_SIZE_LIMIT: usize = 64 * (1 << 20);

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("unknown alphabet letter '{letter}' in pattern '{template}'")]
    UnknownLetter { letter: char, template: String },

    #[error("invalid pattern '{template}': {source}")]
    InvalidRegex {
        template: String,
        #[source]
        source: regex::Error,
    },
}

/// Expand `{x}` placeholders into the alphabet's look-alike class for `x`.
///
/// Only a single alphabetic character between braces is a placeholder;
/// `{2}` or `{1,3}` stay as regex quantifiers.
pub fn expand_template(template: &str, alphabet: &BTreeMap<String, String>) -> Result<String, RuleError> {
    let chars: Vec<char> = template.chars().collect();
    let mut expanded = String::with_capacity(template.len() * 4);
    let mut i = 0;

    while i < chars.len() {
        let is_placeholder = chars[i] == '{'
            && i + 2 < chars.len()
            && chars[i + 2] == '}'
            && chars[i + 1].is_alphabetic();

        if is_placeholder {
            let letter = chars[i + 1];
            let class = alphabet
                .get(letter.to_string().as_str())
                .ok_or_else(|| RuleError::UnknownLetter {
                    letter,
                    template: template.to_string(),
                })?;
            expanded.push_str(class);
            i += 3;
        } else {
            expanded.push(chars[i]);
            i += 1;
        }
    }

    Ok(expanded)
}

/// One ordered rule: the template as configured and its compiled form
#[derive(Debug, Clone)]
pub struct PatternRule {
    pub template: String,
    regex: Regex,
}

impl PatternRule {
    pub fn compile(template: &str, alphabet: &BTreeMap<String, String>) -> Result<Self, RuleError> {
        let expanded = expand_template(template, alphabet)?;
        // Whole word token around the root
        let wrapped = format!(r"\b\w*(?P<root>{})\w*\b", expanded);

        let regex = RegexBuilder::new(&wrapped)
            .size_limit(RULE_SIZE_LIMIT)
            .build()
            .map_err(|source| RuleError::InvalidRegex {
                template: template.to_string(),
                source,
            })?;

        Ok(Self {
            template: template.to_string(),
            regex,
        })
    }

    /// Every matched word token in the text
    pub fn find_all(&self, text: &str) -> Vec<String> {
        self.regex
            .captures_iter(text)
            .filter_map(|caps| root_token(text, &caps))
            .filter(|term| !term.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Cut a match down to the word run holding the root.
///
/// A rule may open with a space alternative, which lets the leading `\w*`
/// swallow the previous word; only the token the root sits in is reported.
fn root_token<'t>(text: &'t str, caps: &Captures<'t>) -> Option<&'t str> {
    let whole = caps.get(0)?;
    let root = caps.name("root")?;
    let root_start = root.end() - root.as_str().trim_start().len();

    let start = text[whole.start()..root_start]
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_alphanumeric() || *c == '_')
        .last()
        .map_or(root_start, |(offset, _)| whole.start() + offset);

    Some(text[start..whole.end()].trim())
}

/// Terms found by a pattern scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternScan {
    /// Index of the first rule that matched anything, whitelisted or not
    pub matched_rule: Option<usize>,
    /// Matches that survived the whitelist
    pub terms: Vec<String>,
}

/// Ordered list of obfuscation patterns.
///
/// Scanning stops at the first rule with any match, even when the
/// whitelist then drops every one of its hits.
#[derive(Debug, Clone, Default)]
pub struct PatternMatcher {
    rules: Vec<PatternRule>,
}

impl PatternMatcher {
    pub fn compile(templates: &[String], alphabet: &BTreeMap<String, String>) -> Result<Self, RuleError> {
        let rules = templates
            .iter()
            .map(|template| PatternRule::compile(template, alphabet))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    pub fn scan(&self, text: &str, whitelist: &Whitelist) -> PatternScan {
        for (index, rule) in self.rules.iter().enumerate() {
            let matches = rule.find_all(text);
            if matches.is_empty() {
                continue;
            }

            debug!("Rule #{} '{}' matches: {:?}", index, rule.template, matches);
            let terms: Vec<String> = matches
                .into_iter()
                .filter(|term| !whitelist.suppresses(term))
                .collect();

            return PatternScan {
                matched_rule: Some(index),
                terms,
            };
        }

        PatternScan::default()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
