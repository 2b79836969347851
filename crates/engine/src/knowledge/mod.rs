//! Checklist knowledge retrieval for the compliance role.
//!
//! Lexical only: passages are ranked by how many distinct query terms they
//! contain. There is no embedding index.

use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;

use crate::document::{DocumentError, PageSource};

/// A retrieved passage of the checklist guide.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Passage {
    /// Position of the passage in the guide.
    pub index: usize,
    pub text: String,
}

/// Source of reference passages for a query.
pub trait KnowledgeBase: Send + Sync {
    /// Up to `limit` passages, most relevant first.
    fn retrieve_context(&self, query: &str, limit: usize) -> Vec<Passage>;
}

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "with", "that", "this", "from", "any", "all", "not", "has",
    "have", "was", "will", "shall", "its", "into", "what", "does", "which",
];

/// Checklist guide split into passages, searched by term overlap.
pub struct ChecklistKnowledge {
    passages: Vec<Passage>,
    terms: Vec<HashSet<String>>,
}

impl ChecklistKnowledge {
    /// Load the checklist guide through a page source.
    pub fn load(
        path: &Path,
        source: &dyn PageSource,
        passage_chars: usize,
    ) -> Result<Self, DocumentError> {
        if !path.is_file() {
            return Err(DocumentError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let text = source
            .extract_pages(path)?
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join("\n\n");

        let knowledge = Self::from_text(&text, passage_chars);
        tracing::info!(
            path = %path.display(),
            passages = knowledge.len(),
            "Checklist knowledge loaded"
        );
        Ok(knowledge)
    }

    pub fn from_text(text: &str, passage_chars: usize) -> Self {
        let passages: Vec<Passage> = chunk(text, passage_chars)
            .into_iter()
            .enumerate()
            .map(|(index, text)| Passage { index, text })
            .collect();
        let terms = passages.iter().map(|p| terms(&p.text)).collect();
        Self { passages, terms }
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

impl KnowledgeBase for ChecklistKnowledge {
    fn retrieve_context(&self, query: &str, limit: usize) -> Vec<Passage> {
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, usize)> = self
            .terms
            .iter()
            .enumerate()
            .map(|(i, passage_terms)| (i, query_terms.intersection(passage_terms).count()))
            .filter(|(_, score)| *score > 0)
            .collect();

        // Stable: equal scores keep guide order.
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        scored
            .into_iter()
            .take(limit)
            .map(|(i, _)| self.passages[i].clone())
            .collect()
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Pack paragraphs into passages of at most `max_chars`, splitting oversized
/// paragraphs on word boundaries.
fn chunk(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut passages = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    let paragraphs = text
        .split("\n\n")
        .map(|p| p.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|p| !p.is_empty());

    for paragraph in paragraphs {
        for piece in split_long(&paragraph, max_chars) {
            let piece_chars = piece.chars().count();
            if current_chars > 0 && current_chars + 1 + piece_chars > max_chars {
                passages.push(std::mem::take(&mut current));
                current_chars = 0;
            }
            if current_chars > 0 {
                current.push('\n');
                current_chars += 1;
            }
            current.push_str(&piece);
            current_chars += piece_chars;
        }
    }

    if !current.is_empty() {
        passages.push(current);
    }
    passages
}

fn split_long(paragraph: &str, max_chars: usize) -> Vec<String> {
    if paragraph.chars().count() <= max_chars {
        return vec![paragraph.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;
    for word in paragraph.split(' ') {
        let word_chars = word.chars().count();
        if current_chars > 0 && current_chars + 1 + word_chars > max_chars {
            pieces.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        if current_chars > 0 {
            current.push(' ');
            current_chars += 1;
        }
        current.push_str(word);
        current_chars += word_chars;
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    const GUIDE: &str = "\
Parties. Verify the parties are correctly identified and have legal status.

Indemnification. Identify indemnification and hold harmless clauses. \
Categorize each as one-sided, intermediate, or limited.

Insurance. Document insurance requirements, limits, certificates and \
additional insured provisions.

Signature authority. Confirm signing authority for both parties.";

    #[test]
    fn test_chunk_respects_limit() {
        let passages = chunk(GUIDE, 120);
        assert!(passages.len() >= 3);
        assert!(passages.iter().all(|p| p.len() <= 120));
    }

    #[test]
    fn test_limit_counts_characters_not_bytes() {
        // 10 characters, 20 bytes.
        let word = "é".repeat(10);
        let guide = format!("{word} {word}\n\n{word}");
        let passages = chunk(&guide, 21);
        assert_eq!(passages, vec![format!("{word} {word}"), word.clone()]);
        assert!(passages.iter().all(|p| p.chars().count() <= 21));
    }

    #[test]
    fn test_small_paragraphs_are_packed() {
        let passages = chunk("one\n\ntwo\n\nthree", 100);
        assert_eq!(passages, vec!["one\ntwo\nthree"]);
    }

    #[test]
    fn test_retrieve_ranks_by_overlap() {
        let kb = ChecklistKnowledge::from_text(GUIDE, 200);
        let hits = kb.retrieve_context("indemnification one-sided hold harmless", 2);
        assert!(!hits.is_empty());
        assert!(hits[0].text.starts_with("Indemnification."));
    }

    #[test]
    fn test_ties_keep_guide_order() {
        let kb = ChecklistKnowledge::from_text(GUIDE, 150);
        let hits = kb.retrieve_context("parties", 5);
        let indices: Vec<_> = hits.iter().map(|p| p.index).collect();
        let mut sorted = indices.clone();
        sorted.sort();
        assert_eq!(indices, sorted);
        assert!(hits.len() >= 2);
    }

    #[test]
    fn test_no_match_returns_nothing() {
        let kb = ChecklistKnowledge::from_text(GUIDE, 200);
        assert!(kb.retrieve_context("cryptocurrency", 3).is_empty());
        assert!(kb.retrieve_context("the and", 3).is_empty());
    }

    #[test]
    fn test_limit_applied() {
        let kb = ChecklistKnowledge::from_text(GUIDE, 100);
        assert!(kb.retrieve_context("parties insurance indemnification signing", 1).len() == 1);
    }
}
