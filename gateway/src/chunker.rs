//! Semantic chunker
//!
//! Oversized text is split at paragraph boundaries, then sentence
//! terminators, then hard character cuts, and packed greedily into
//! chunks whose own content never exceeds the configured maximum.
//! Each chunk after the first is prefixed with exactly `overlap_size`
//! characters from the tail of its predecessor's dispatched content.

use engram_config::ChunkingConfig;

/// One chunk ready for dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 0-based position within the run
    pub index: usize,
    /// Dispatched content, overlap prefix included
    pub content: String,
    /// Characters of new content (the overlap prefix not counted)
    pub size: usize,
    pub has_overlap: bool,
}

/// Split `text` into dispatch-ready chunks. Text at or under the limit
/// comes back as a single chunk untouched.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<Chunk> {
    let total_chars = text.chars().count();
    if total_chars <= config.max_chunk_size {
        return vec![Chunk {
            index: 0,
            content: text.to_string(),
            size: total_chars,
            has_overlap: false,
        }];
    }

    let bases = pack_pieces(split_pieces(text, config.max_chunk_size), config.max_chunk_size);

    let mut chunks: Vec<Chunk> = Vec::with_capacity(bases.len());
    for (index, base) in bases.into_iter().enumerate() {
        let size = base.chars().count();
        let content = if index == 0 {
            base
        } else {
            let previous = &chunks[index - 1].content;
            let mut with_overlap = char_tail(previous, config.overlap_size);
            with_overlap.push_str(&base);
            with_overlap
        };
        chunks.push(Chunk {
            index,
            content,
            size,
            has_overlap: index > 0,
        });
    }
    chunks
}

/// Split into pieces no longer than `max` characters, each keeping its
/// trailing delimiter so concatenating the pieces reproduces the input
fn split_pieces(text: &str, max: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    for paragraph in text.split_inclusive("\n\n") {
        if paragraph.chars().count() <= max {
            pieces.push(paragraph.to_string());
            continue;
        }
        for sentence in paragraph.split_inclusive(['.', '!', '?']) {
            if sentence.chars().count() <= max {
                pieces.push(sentence.to_string());
            } else {
                pieces.extend(hard_split(sentence, max));
            }
        }
    }
    pieces
}

/// Greedy packing: start a new base once the next piece would push the
/// current one past `max`
fn pack_pieces(pieces: Vec<String>, max: usize) -> Vec<String> {
    let mut bases = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for piece in pieces {
        let piece_chars = piece.chars().count();
        if current_chars > 0 && current_chars + piece_chars > max {
            bases.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        current.push_str(&piece);
        current_chars += piece_chars;
    }
    if !current.is_empty() {
        bases.push(current);
    }
    bases
}

/// Cut a string into consecutive runs of at most `max` characters
fn hard_split(text: &str, max: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut count = 0usize;
    for ch in text.chars() {
        if count == max {
            parts.push(std::mem::take(&mut current));
            count = 0;
        }
        current.push(ch);
        count += 1;
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// The last `n` characters of `text` (all of it when shorter)
fn char_tail(text: &str, n: usize) -> String {
    let total = text.chars().count();
    text.chars().skip(total.saturating_sub(n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max: usize, overlap: usize) -> ChunkingConfig {
        ChunkingConfig {
            max_chunk_size: max,
            overlap_size: overlap,
        }
    }

    fn char_head(text: &str, n: usize) -> String {
        text.chars().take(n).collect()
    }

    #[test]
    fn text_at_the_limit_is_a_single_chunk() {
        let text = "a".repeat(1000);
        let chunks = chunk_text(&text, &config(1000, 150));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, text);
        assert!(!chunks[0].has_overlap);
    }

    #[test]
    fn one_character_over_the_limit_makes_two_chunks() {
        let text = "a".repeat(1001);
        let chunks = chunk_text(&text, &config(1000, 150));
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.size <= 1000));
    }

    #[test]
    fn five_paragraphs_of_a_5000_char_text_make_five_chunks() {
        // Five paragraphs, 998 chars each plus the double newline:
        // 5000 characters in total
        let paragraph = "b".repeat(998);
        let text = vec![paragraph; 5].join("\n\n");
        assert_eq!(text.chars().count(), 4998);

        let cfg = config(1000, 150);
        let chunks = chunk_text(&text, &cfg);
        assert_eq!(chunks.len(), 5);

        assert!(!chunks[0].has_overlap);
        for window in chunks.windows(2) {
            let (prev, next) = (&window[0], &window[1]);
            assert!(next.has_overlap);
            // Exactly overlap_size characters are shared
            assert_eq!(char_tail(&prev.content, 150), char_head(&next.content, 150));
        }
        assert!(chunks.iter().all(|c| c.size <= 1000));
    }

    #[test]
    fn reassembling_the_bases_reproduces_the_input() {
        let paragraph_a = "first paragraph with some words. another sentence here.";
        let paragraph_b = "second paragraph that carries on.";
        let text = format!(
            "{}\n\n{}\n\n{}",
            paragraph_a,
            "x".repeat(120),
            paragraph_b
        );
        let cfg = config(80, 10);
        let chunks = chunk_text(&text, &cfg);

        // Strip each chunk back to its new content and concatenate
        let rebuilt: String = chunks
            .iter()
            .map(|c| {
                let overlap_chars = c.content.chars().count() - c.size;
                c.content.chars().skip(overlap_chars).collect::<String>()
            })
            .collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn oversized_sentences_are_hard_split_within_the_limit() {
        let text = format!("{}\n\nshort tail.", "y".repeat(2500));
        let chunks = chunk_text(&text, &config(1000, 150));
        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|c| c.size <= 1000));
    }

    #[test]
    fn overlap_is_exact_even_for_multibyte_text() {
        let paragraph = "héllo wörld ünïcode tëst çhärs ".repeat(10);
        let text = vec![paragraph.as_str(); 4].join("\n\n");
        let cfg = config(200, 20);
        let chunks = chunk_text(&text, &cfg);
        assert!(chunks.len() > 1);
        for window in chunks.windows(2) {
            assert_eq!(
                char_tail(&window[0].content, 20),
                char_head(&window[1].content, 20)
            );
        }
    }

    #[test]
    fn short_overlap_source_copies_the_whole_predecessor() {
        assert_eq!(char_tail("abc", 10), "abc");
        assert_eq!(char_tail("abcdef", 3), "def");
    }
}
