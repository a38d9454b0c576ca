//! Keyword lexicon for wake, stop, exit, confirm, and cancel phrases.
//!
//! Recognized text is matched against a closed set of command categories,
//! resolved once at startup from config word lists. Matching is
//! substring-based with a Thai word-boundary rule: an occurrence counts only
//! when the characters around it are not Thai letters, so a keyword embedded
//! in a longer Thai word does not fire.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Wake,
    Stop,
    Exit,
    Confirm,
    Cancel,
}

pub struct KeywordLexicon {
    entries: Vec<(String, CommandKind)>,
}

impl KeywordLexicon {
    pub fn new(
        wake: &[String],
        stop: &[String],
        exit: &[String],
        confirm: &[String],
        cancel: &[String],
    ) -> Self {
        let mut entries = Vec::new();
        let mut add = |words: &[String], kind: CommandKind| {
            for word in words {
                let word = word.trim().to_lowercase();
                if !word.is_empty() {
                    entries.push((word, kind));
                }
            }
        };
        // Order matters for match_kind: control words win over dialog words.
        add(exit, CommandKind::Exit);
        add(stop, CommandKind::Stop);
        add(cancel, CommandKind::Cancel);
        add(confirm, CommandKind::Confirm);
        add(wake, CommandKind::Wake);
        Self { entries }
    }

    /// First category with a matching keyword, in priority order.
    pub fn match_kind(&self, text: &str) -> Option<CommandKind> {
        let text = text.to_lowercase();
        self.entries
            .iter()
            .find(|(word, _)| is_full_word_match(&text, word))
            .map(|&(_, kind)| kind)
    }

    pub fn detect(&self, text: &str, kind: CommandKind) -> bool {
        let text = text.to_lowercase();
        self.entries
            .iter()
            .filter(|&&(_, k)| k == kind)
            .any(|(word, _)| is_full_word_match(&text, word))
    }

    /// Keywords-only post-filter: pass text through only when it contains at
    /// least one known keyword, otherwise discard it as noise.
    pub fn filter_keywords<'a>(&self, text: &'a str) -> Option<&'a str> {
        if self.match_kind(text).is_some() {
            Some(text)
        } else {
            None
        }
    }
}

fn is_thai_letter(c: char) -> bool {
    ('ก'..='๙').contains(&c)
}

/// Occurrence counts only when not embedded inside a longer Thai word.
pub fn is_full_word_match(text: &str, word: &str) -> bool {
    if word.is_empty() {
        return false;
    }
    let mut search_from = 0;
    while let Some(pos) = text[search_from..].find(word) {
        let start = search_from + pos;
        let end = start + word.len();
        let before_ok = text[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !is_thai_letter(c));
        let after_ok = text[end..].chars().next().map_or(true, |c| !is_thai_letter(c));
        if before_ok && after_ok {
            return true;
        }
        search_from = end;
    }
    false
}
