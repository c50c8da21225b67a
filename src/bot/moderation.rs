// src/bot/moderation.rs - Rule table and the priority-ordered content classifier

use log::debug;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::bot::normalizer::{compact, normalize};
use crate::bot::pattern_matching::{PatternMatcher, RuleError};
use crate::bot::scoring::SuspicionScore;
use crate::bot::whitelist::Whitelist;
use crate::bot::word_list::WordList;
use crate::config::RulesConfig;
use crate::types::{cases, Attachment, ClassificationResult, Message};

const PHONE_PATTERN: &str = r"\+?[0-9]{1}[ ‑\-]?\d{3}[ ‑\-]?\d{3}[ ‑\-]?\d{2}[ ‑\-]?\d{2}";
const CARD_PATTERN: &str = r"\b\d{16}\b";
const LATIN_PATTERN: &str = r"[A-Za-z].+";
const TEXT_CHAR_PATTERN: &str = r"[а-яa-z0-9]";

/// Patterns first; the literal list only runs when no pattern term survived
#[derive(Debug, Clone, Default)]
pub struct TermSet {
    patterns: PatternMatcher,
    words: WordList,
}

impl TermSet {
    pub fn compile(
        templates: &[String],
        words: &[String],
        alphabet: &BTreeMap<String, String>,
    ) -> Result<Self, RuleError> {
        Ok(Self {
            patterns: PatternMatcher::compile(templates, alphabet)?,
            words: WordList::compile(words)?,
        })
    }

    pub fn find(&self, text: &str, whitelist: &Whitelist) -> Vec<String> {
        let scan = self.patterns.scan(text, whitelist);
        if !scan.terms.is_empty() {
            return scan.terms;
        }
        self.words.find(text, whitelist)
    }
}

/// Fixed-shape detectors that do not come from configuration
#[derive(Debug, Clone)]
struct Heuristics {
    phone: Regex,
    card: Regex,
    latin: Regex,
    text_char: Regex,
}

impl Heuristics {
    fn compile() -> Result<Self, RuleError> {
        let build = |pattern: &str| {
            Regex::new(pattern).map_err(|source| RuleError::InvalidRegex {
                template: pattern.to_string(),
                source,
            })
        };

        Ok(Self {
            phone: build(PHONE_PATTERN)?,
            card: build(CARD_PATTERN)?,
            latin: build(LATIN_PATTERN)?,
            text_char: build(TEXT_CHAR_PATTERN)?,
        })
    }
}

/// Compiled, read-only rule set shared by every classification
#[derive(Debug, Clone)]
pub struct RuleTable {
    curses: TermSet,
    suspicious: TermSet,
    spam_substrings: Vec<String>,
    whitelist: Whitelist,
    suspicion_threshold: usize,
    non_text_length_limit: Option<usize>,
    heuristics: Heuristics,
}

impl RuleTable {
    pub fn compile(config: &RulesConfig) -> Result<Self, RuleError> {
        let table = Self {
            curses: TermSet::compile(&config.curse_patterns, &config.curse_substrings, &config.alphabet)?,
            suspicious: TermSet::compile(
                &config.suspicious_patterns,
                &config.suspicious_substrings,
                &config.alphabet,
            )?,
            spam_substrings: config
                .spam_substrings
                .iter()
                .map(|entry| compact(entry))
                .filter(|entry| !entry.is_empty())
                .collect(),
            whitelist: Whitelist::new(&config.whitelist_substrings),
            suspicion_threshold: config.suspicion_threshold,
            non_text_length_limit: config.non_text_length_limit,
            heuristics: Heuristics::compile()?,
        };

        debug!(
            "Rule table compiled: {} curse patterns, {} suspicious patterns, {} whitelist entries",
            table.curses.patterns.len(),
            table.suspicious.patterns.len(),
            table.whitelist.len()
        );
        Ok(table)
    }

    /// First spam entry contained in the text, compared without spaces
    fn spam_entry_in(&self, text: &str) -> Option<&str> {
        let compacted = compact(text);
        self.spam_substrings
            .iter()
            .find(|entry| compacted.contains(entry.as_str()))
            .map(String::as_str)
    }
}

/// One text under inspection, in every form the checks need
struct TextContext<'a> {
    normalized: String,
    raw: &'a str,
    username: &'a str,
    is_member: bool,
}

type Check = fn(&Classifier, &TextContext<'_>) -> Option<ClassificationResult>;

/// A hit stops evaluation immediately; the first one wins
const HARD_CHECKS: &[(&str, Check)] = &[
    ("spam link", Classifier::check_spam_link),
    ("curses", Classifier::check_curses),
    ("suspicious words", Classifier::check_suspicious_words),
];

/// Pending signals used only when no hard check fired; the last one wins
const SOFT_CHECKS: &[(&str, Check)] = &[
    ("latin bot", Classifier::check_latin_bot),
    ("phone", Classifier::check_phone),
    ("card", Classifier::check_card),
    ("latin", Classifier::check_latin),
    ("non text", Classifier::check_non_text),
];

/// Stateless content classifier. Clone it freely, every call returns its own result.
#[derive(Debug, Clone)]
pub struct Classifier {
    rules: Arc<RuleTable>,
}

impl Classifier {
    pub fn new(rules: Arc<RuleTable>) -> Self {
        Self { rules }
    }

    pub fn from_config(config: &RulesConfig) -> Result<Self, RuleError> {
        Ok(Self::new(Arc::new(RuleTable::compile(config)?)))
    }

    /// Attachments first, then the message text
    pub fn classify(&self, message: &Message) -> ClassificationResult {
        for attachment in &message.attachments {
            match attachment {
                Attachment::Link { url } => {
                    if let Some(entry) = self.rules.spam_entry_in(url) {
                        let details = format!("Forbidden '{}' from spam list found in attachment", defang(entry));
                        debug!("{}", details);
                        return ClassificationResult::block(
                            cases::SPAM_LINK_ATTACHMENT,
                            vec![entry.to_string()],
                            details,
                        );
                    }
                }
                Attachment::Other { kind } => {
                    debug!("Skipping attachment of type {}", kind);
                }
                repost => {
                    let text = repost.nested_text().unwrap_or_default();
                    let result = self.check_text(text, &message.username, message.is_member);
                    if !result.is_clean() {
                        return result.from_attachment();
                    }
                }
            }
        }

        self.check_text(&message.text, &message.username, message.is_member)
    }

    /// Text pipeline: hard checks in priority order, then the pending soft verdict
    pub fn check_text(&self, text: &str, username: &str, is_member: bool) -> ClassificationResult {
        if text.trim().is_empty() {
            return ClassificationResult::clean();
        }

        let ctx = TextContext {
            normalized: normalize(text),
            raw: text,
            username,
            is_member,
        };

        for (name, check) in HARD_CHECKS {
            if let Some(result) = check(self, &ctx) {
                debug!("Hard check '{}' fired: {}", name, result.case_description);
                return result;
            }
        }

        let pending: Vec<(&str, ClassificationResult)> = SOFT_CHECKS
            .iter()
            .filter_map(|(name, check)| check(self, &ctx).map(|result| (*name, result)))
            .collect();

        let reasons: Vec<&str> = pending
            .iter()
            .map(|(_, result)| result.case_description.as_str())
            .collect();
        let details = format!("{} with '{}' was caught: {}", username, text, reasons.join("; "));

        match pending.last() {
            Some((name, result)) => {
                debug!("Soft check '{}' sets the verdict", name);
                let mut result = result.clone();
                result.details = details;
                result
            }
            None => ClassificationResult::clean(),
        }
    }

    fn check_spam_link(&self, ctx: &TextContext<'_>) -> Option<ClassificationResult> {
        let entry = self.rules.spam_entry_in(&ctx.normalized)?;
        let details = format!("Forbidden '{}' from spam list found", defang(entry));
        Some(ClassificationResult::block(cases::SPAM_LINK, vec![entry.to_string()], details))
    }

    fn check_curses(&self, ctx: &TextContext<'_>) -> Option<ClassificationResult> {
        let terms = self.rules.curses.find(&ctx.normalized, &self.rules.whitelist);
        if terms.is_empty() {
            return None;
        }

        let details = format!("Forbidden {:?} from curses list found", terms);
        Some(ClassificationResult::block(cases::PROFANITY, terms, details))
    }

    fn check_suspicious_words(&self, ctx: &TextContext<'_>) -> Option<ClassificationResult> {
        let terms = self.rules.suspicious.find(&ctx.normalized, &self.rules.whitelist);
        SuspicionScore::compute(terms, ctx.is_member, self.rules.suspicion_threshold).into_result()
    }

    fn check_latin_bot(&self, ctx: &TextContext<'_>) -> Option<ClassificationResult> {
        let latin = &self.rules.heuristics.latin;
        (latin.is_match(ctx.raw) && latin.is_match(ctx.username))
            .then(|| ClassificationResult::suspicious(cases::LATIN_BOT, Vec::new(), ""))
    }

    fn check_phone(&self, ctx: &TextContext<'_>) -> Option<ClassificationResult> {
        let found = self.rules.heuristics.phone.find(&ctx.normalized)?;
        Some(ClassificationResult::suspicious(
            cases::PHONE_NUMBER,
            vec![found.as_str().to_string()],
            "",
        ))
    }

    fn check_card(&self, ctx: &TextContext<'_>) -> Option<ClassificationResult> {
        let found = self.rules.heuristics.card.find(&ctx.normalized)?;
        Some(ClassificationResult::suspicious(
            cases::CARD_NUMBER,
            vec![found.as_str().to_string()],
            "",
        ))
    }

    fn check_latin(&self, ctx: &TextContext<'_>) -> Option<ClassificationResult> {
        self.rules
            .heuristics
            .latin
            .is_match(ctx.raw)
            .then(|| ClassificationResult::suspicious(cases::LATIN_MESSAGE, Vec::new(), ""))
    }

    fn check_non_text(&self, ctx: &TextContext<'_>) -> Option<ClassificationResult> {
        let limit = self.rules.non_text_length_limit?;
        if self.rules.heuristics.text_char.is_match(&ctx.normalized) {
            return None;
        }

        let length = ctx.normalized.chars().filter(|c| !c.is_whitespace()).count();
        (length > limit).then(|| ClassificationResult::suspicious(cases::NON_TEXT, Vec::new(), ""))
    }
}

/// Make a link unclickable for logs and notices
fn defang(entry: &str) -> String {
    entry.replace('.', "[.]")
}
