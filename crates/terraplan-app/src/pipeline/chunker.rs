//! Token-bounded text chunking.
//!
//! Splits extracted plan text on whitespace and greedily packs words into
//! chunks whose encoded token count stays under the configured budget. The
//! token accounting matches the chunk model's vocabulary so downstream
//! completion requests stay inside the context window.

use std::sync::OnceLock;

use tiktoken_rs::CoreBPE;

/// Collaborator mapping a string to its encoded token count.
pub trait TokenCounter: Send + Sync {
    fn count(&self, text: &str) -> usize;
}

/// cl100k_base byte-pair encoding, shared by the gpt-3.5 model family.
pub struct Cl100kCounter;

impl TokenCounter for Cl100kCounter {
    fn count(&self, text: &str) -> usize {
        encoder().encode_with_special_tokens(text).len()
    }
}

fn encoder() -> &'static CoreBPE {
    static ENCODER: OnceLock<CoreBPE> = OnceLock::new();
    ENCODER.get_or_init(|| tiktoken_rs::cl100k_base().expect("cl100k vocabulary loads"))
}

/// Split `text` into ordered chunks of whitespace-separated words, each chunk
/// staying within `max_tokens` encoded tokens. A single word whose own token
/// count exceeds the budget is still emitted alone in its own chunk, never
/// split and never dropped. Empty input yields an empty sequence.
pub fn split_into_chunks(
    text: &str,
    max_tokens: usize,
    counter: &dyn TokenCounter,
) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut used = 0usize;

    for word in text.split_whitespace() {
        let cost = counter.count(word);
        if !current.is_empty() && used + cost > max_tokens {
            chunks.push(current.join(" "));
            current.clear();
            used = 0;
        }
        current.push(word);
        used += cost;
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    /// One token per word, so chunk budgets translate to word counts.
    struct WordCounter;

    impl TokenCounter for WordCounter {
        fn count(&self, text: &str) -> usize {
            text.split_whitespace().count()
        }
    }

    /// Every character is a token; lets a single word blow the budget.
    struct CharCounter;

    impl TokenCounter for CharCounter {
        fn count(&self, text: &str) -> usize {
            text.chars().count()
        }
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(split_into_chunks("", 100, &WordCounter).is_empty());
        assert!(split_into_chunks("  \n\t ", 100, &WordCounter).is_empty());
    }

    #[test]
    fn concatenated_chunks_reconstruct_word_sequence() {
        let text = "Územní plán obce vymezuje zastavitelné plochy a koridory dopravní infrastruktury";
        for limit in 1..=10 {
            let chunks = split_into_chunks(text, limit, &WordCounter);
            let rebuilt: Vec<&str> = chunks
                .iter()
                .flat_map(|c| c.split_whitespace())
                .collect();
            let original: Vec<&str> = text.split_whitespace().collect();
            assert_eq!(rebuilt, original, "limit {limit}");
        }
    }

    #[test]
    fn chunks_respect_token_budget() {
        let text = "jedna dva tri ctyri pet sest sedm osm devet deset";
        let chunks = split_into_chunks(text, 3, &WordCounter);
        for chunk in &chunks {
            assert!(WordCounter.count(chunk) <= 3, "chunk over budget: {chunk}");
        }
        assert_eq!(chunks.len(), 4);
    }

    #[test]
    fn oversized_word_gets_its_own_chunk() {
        let text = "a neuveritelnedlouheslovo b";
        let chunks = split_into_chunks(text, 5, &CharCounter);
        assert_eq!(chunks, vec!["a", "neuveritelnedlouheslovo", "b"]);
    }

    #[test]
    fn boundary_word_starts_next_chunk() {
        let chunks = split_into_chunks("aa bb cc", 2, &WordCounter);
        assert_eq!(chunks, vec!["aa bb", "cc"]);
    }
}
