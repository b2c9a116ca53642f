use serde::Serialize;
use std::collections::{BTreeSet, VecDeque};

use crate::dedupe;

pub const MAX_GENERATED_TEXTS: usize = 7;
pub const MAX_KEY_PHRASES: usize = 20;
/// How many accepted texts a candidate is compared against.
pub const DEDUPE_WINDOW: usize = 5;
/// How many key phrases are fed back into the prompt.
pub const PROMPT_PHRASE_WINDOW: usize = 10;

/// Rolling per-session record of accepted messages and their key phrases.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionHistory {
    generated_texts: VecDeque<String>,
    key_phrases: VecDeque<String>,
    selected_tags: BTreeSet<String>,
}

impl SessionHistory {
    pub fn new() -> Self { Self::default() }

    pub fn generated_texts(&self) -> impl Iterator<Item = &str> {
        self.generated_texts.iter().map(String::as_str)
    }

    pub fn key_phrases(&self) -> impl Iterator<Item = &str> {
        self.key_phrases.iter().map(String::as_str)
    }

    pub fn selected_tags(&self) -> Vec<String> {
        self.selected_tags.iter().cloned().collect()
    }

    /// Replaces the selection. Blank labels are dropped, duplicates collapse.
    pub fn set_selected_tags<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.selected_tags = tags
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
    }

    pub fn recent_texts(&self) -> Vec<&str> {
        let skip = self.generated_texts.len().saturating_sub(DEDUPE_WINDOW);
        self.generated_texts.iter().skip(skip).map(String::as_str).collect()
    }

    pub fn recent_key_phrases(&self) -> Vec<&str> {
        let skip = self.key_phrases.len().saturating_sub(PROMPT_PHRASE_WINDOW);
        self.key_phrases.iter().skip(skip).map(String::as_str).collect()
    }

    pub fn is_unique(&self, candidate: &str) -> bool {
        dedupe::is_unique(candidate, &self.recent_texts())
    }

    /// Commits an accepted message and returns the phrases extracted from it.
    pub fn record_accepted(&mut self, text: &str) -> Vec<String> {
        let phrases = dedupe::extract_key_phrases(text);
        self.generated_texts.push_back(text.to_string());
        while self.generated_texts.len() > MAX_GENERATED_TEXTS {
            self.generated_texts.pop_front();
        }
        self.key_phrases.extend(phrases.iter().cloned());
        while self.key_phrases.len() > MAX_KEY_PHRASES {
            self.key_phrases.pop_front();
        }
        phrases
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caps_are_fifo() {
        let mut h = SessionHistory::new();
        for i in 0..10 {
            h.record_accepted(&format!("message number {i} is here today"));
        }
        let texts: Vec<&str> = h.generated_texts().collect();
        assert_eq!(texts.len(), MAX_GENERATED_TEXTS);
        assert_eq!(texts[0], "message number 3 is here today");
        assert_eq!(texts[6], "message number 9 is here today");

        let phrases: Vec<&str> = h.key_phrases().collect();
        assert_eq!(phrases.len(), MAX_KEY_PHRASES);
        assert_eq!(*phrases.last().unwrap(), "is here today");
    }

    #[test]
    fn windows_take_most_recent() {
        let mut h = SessionHistory::new();
        for i in 0..7 {
            h.record_accepted(&format!("w{i}"));
        }
        assert_eq!(h.recent_texts(), vec!["w2", "w3", "w4", "w5", "w6"]);
        assert_eq!(h.recent_key_phrases().len(), 7);
        // w0 and w1 have fallen out of the comparison window
        assert!(h.is_unique("w0"));
        assert!(!h.is_unique("W6"));
    }

    #[test]
    fn prompt_window_holds_ten() {
        let mut h = SessionHistory::new();
        for i in 0..5 {
            h.record_accepted(&format!("a{i} b c d e f"));
        }
        let recent = h.recent_key_phrases();
        assert_eq!(recent.len(), PROMPT_PHRASE_WINDOW);
        assert_eq!(recent[0], "d e f");
        assert_eq!(recent[1], "a2 b c");
    }

    #[test]
    fn tags_are_a_set() {
        let mut h = SessionHistory::new();
        h.set_selected_tags(["Joy", "Fear", "Joy", "  ", " Anger "]);
        assert_eq!(h.selected_tags(), vec!["Anger", "Fear", "Joy"]);
    }
}
