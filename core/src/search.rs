//! Log search behind `blast`
//!
//! Scans the loaded record sequence in order with a literal or regex
//! predicate, truncates to the most recent `limit` matches, and expands each
//! surviving match into a clamped before/after context window. Windows are
//! emitted in match order but share a global already-shown set, so a record
//! sitting in two overlapping windows appears exactly once, at its first
//! occurrence.

use std::collections::HashSet;

use regex::RegexBuilder;

use crate::error::Result;
use crate::log::Record;

/// A single search request. Pure value, nothing persisted.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub pattern: String,
    pub is_regex: bool,
    pub case_sensitive: bool,
    /// Records to show before each match
    pub before: usize,
    /// Records to show after each match
    pub after: usize,
    /// Keep only the last N matches when set
    pub limit: Option<usize>,
}

impl SearchQuery {
    pub fn literal(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            is_regex: false,
            case_sensitive: true,
            before: 0,
            after: 0,
            limit: None,
        }
    }
}

/// One line of a rendered match window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowLine {
    /// Index into the record sequence the search ran over
    pub index: usize,
    /// Whether this line is the match itself rather than context
    pub is_match: bool,
}

/// A match plus the context lines it contributes to the output.
///
/// `lines` is already deduplicated against earlier windows; it can be empty
/// when every line was claimed by a previous window.
#[derive(Debug, Clone)]
pub struct MatchWindow {
    pub match_index: usize,
    pub lines: Vec<WindowLine>,
}

enum Matcher {
    Literal { needle: String, fold_case: bool },
    Pattern(regex::Regex),
}

impl Matcher {
    fn build(query: &SearchQuery) -> Result<Self> {
        if query.is_regex {
            let pattern = RegexBuilder::new(&query.pattern)
                .case_insensitive(!query.case_sensitive)
                .build()?;
            Ok(Matcher::Pattern(pattern))
        } else if query.case_sensitive {
            Ok(Matcher::Literal {
                needle: query.pattern.clone(),
                fold_case: false,
            })
        } else {
            Ok(Matcher::Literal {
                needle: query.pattern.to_lowercase(),
                fold_case: true,
            })
        }
    }

    fn is_match(&self, text: &str) -> bool {
        match self {
            Matcher::Literal { needle, fold_case } => {
                if *fold_case {
                    text.to_lowercase().contains(needle)
                } else {
                    text.contains(needle)
                }
            }
            Matcher::Pattern(pattern) => pattern.is_match(text),
        }
    }
}

pub struct SearchEngine;

impl SearchEngine {
    /// Indices of matching records, in order, after limit truncation.
    ///
    /// An invalid regex fails here, before any record is scanned. A `limit`
    /// keeps the last N matches: `blast` answers "when did I most recently
    /// run this", so recent history wins over old.
    pub fn match_indices(records: &[Record], query: &SearchQuery) -> Result<Vec<usize>> {
        let matcher = Matcher::build(query)?;

        let mut matches: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, record)| matcher.is_match(&record.text))
            .map(|(index, _)| index)
            .collect();

        if let Some(limit) = query.limit {
            if matches.len() > limit {
                matches.drain(..matches.len() - limit);
            }
        }

        Ok(matches)
    }

    /// Full search: match, truncate, and expand context windows.
    ///
    /// Empty result means no matches; callers report that explicitly rather
    /// than printing nothing.
    pub fn search(records: &[Record], query: &SearchQuery) -> Result<Vec<MatchWindow>> {
        let matches = Self::match_indices(records, query)?;
        Ok(Self::context_windows(&matches, records.len(), query))
    }

    /// Materialize before/after windows for the surviving matches.
    ///
    /// Ranges are clamped to the valid index range silently; the shown set
    /// is global across windows.
    pub fn context_windows(matches: &[usize], len: usize, query: &SearchQuery) -> Vec<MatchWindow> {
        let mut shown: HashSet<usize> = HashSet::new();
        let mut windows = Vec::with_capacity(matches.len());

        for &match_index in matches {
            let mut lines = Vec::new();

            let start = match_index.saturating_sub(query.before);
            for index in start..match_index {
                if shown.insert(index) {
                    lines.push(WindowLine {
                        index,
                        is_match: false,
                    });
                }
            }

            if shown.insert(match_index) {
                lines.push(WindowLine {
                    index: match_index,
                    is_match: true,
                });
            }

            let end = len.min(match_index + query.after + 1);
            for index in match_index + 1..end {
                if shown.insert(index) {
                    lines.push(WindowLine {
                        index,
                        is_match: false,
                    });
                }
            }

            if !lines.is_empty() {
                windows.push(MatchWindow { match_index, lines });
            }
        }

        windows
    }
}
