//! Diary entry domain model.
//!
//! # Responsibility
//! - Define the immutable record every repository read returns.
//! - Provide the text projections shared by all renderers (plain text,
//!   snippet, corpus link).
//!
//! # Invariants
//! - `id` is unique across the corpus.
//! - `person_id` groups entries by author and always resolves in the same
//!   corpus.
//! - The embedding vector never leaves the storage boundary.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static LINE_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<br\s*?/?>").expect("valid line break regex"));
static MARKUP_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid markup tag regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

const CORPUS_NOTE_URL: &str = "https://corpus.prozhito.org/note";

/// Primary key of an entry.
pub type EntryId = i64;

/// Author key shared by all entries of one diarist.
pub type PersonId = i64;

/// One diary entry as stored in the corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiaryEntry {
    pub id: EntryId,
    pub person_id: PersonId,
    /// Raw body; may contain inline HTML markup.
    pub text: String,
    /// Display order is meaningful; filtering treats them as a set.
    pub tags: Vec<String>,
}

impl DiaryEntry {
    /// Body with markup removed and whitespace collapsed.
    ///
    /// `<br>` variants become line breaks before collapsing, so they end up
    /// as single spaces like every other whitespace run.
    pub fn plain_text(&self) -> String {
        clean_entry_text(&self.text)
    }

    /// Plain text cut to `max_chars` characters, `...` appended when cut.
    pub fn snippet(&self, max_chars: usize) -> String {
        let text = self.plain_text();
        if text.chars().count() <= max_chars {
            return text;
        }
        let mut truncated = text.chars().take(max_chars).collect::<String>();
        truncated.push_str("...");
        truncated
    }

    /// Link to this entry in the public corpus.
    pub fn corpus_url(&self) -> String {
        format!("{CORPUS_NOTE_URL}/{}", self.id)
    }

    pub fn is_same_author(&self, other: &DiaryEntry) -> bool {
        self.person_id == other.person_id
    }

    /// Whether every tag in `required` is present on this entry.
    pub fn has_all_tags(&self, required: &[String]) -> bool {
        required.iter().all(|tag| self.tags.contains(tag))
    }
}

/// Strips inline markup from an entry body.
pub fn clean_entry_text(text: &str) -> String {
    let text = LINE_BREAK_RE.replace_all(text, "\n");
    let text = MARKUP_TAG_RE.replace_all(&text, "");
    WHITESPACE_RE.replace_all(&text, " ").into_owned()
}
