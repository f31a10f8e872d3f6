use crate::error::IngestError;
use crate::models::IngestionOptions;
use std::collections::VecDeque;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Recursive character splitter: tries paragraph breaks first, then line
/// breaks, then spaces, then single characters, so that every chunk fits in
/// `chunk_size` characters. Consecutive chunks share up to `chunk_overlap`
/// characters of trailing context.
#[derive(Debug, Clone, Copy)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveSplitter {
    pub fn new(options: IngestionOptions) -> Result<Self, IngestError> {
        if options.chunk_size == 0 {
            return Err(IngestError::InvalidChunkOptions(
                "chunk_size must be at least 1".to_string(),
            ));
        }
        if options.chunk_overlap >= options.chunk_size {
            return Err(IngestError::InvalidChunkOptions(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                options.chunk_overlap, options.chunk_size
            )));
        }

        Ok(Self {
            chunk_size: options.chunk_size,
            chunk_overlap: options.chunk_overlap,
        })
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|separator| separator.is_empty() || text.contains(separator))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let remaining = separators.get(position + 1..).unwrap_or(&[]);

        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(offset, ch)| &text[offset..offset + ch.len_utf8()])
                .collect()
        } else {
            text.split(separator).filter(|piece| !piece.is_empty()).collect()
        };

        let mut chunks = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                chunks.extend(self.merge(&fitting, separator));
                fitting.clear();
            }

            if remaining.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_with(piece, remaining));
            }
        }

        if !fitting.is_empty() {
            chunks.extend(self.merge(&fitting, separator));
        }

        chunks
    }

    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let separator_len = char_len(separator);
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { separator_len };

            if total + len + joiner > self.chunk_size && !window.is_empty() {
                push_joined(&mut chunks, &window, separator);

                loop {
                    let joiner = if window.is_empty() { 0 } else { separator_len };
                    let over_budget = total > 0 && total + len + joiner > self.chunk_size;
                    if total <= self.chunk_overlap && !over_budget {
                        break;
                    }
                    let Some(front) = window.pop_front() else {
                        break;
                    };
                    let dropped_joiner = if window.is_empty() { 0 } else { separator_len };
                    total = total.saturating_sub(char_len(front) + dropped_joiner);
                }
            }

            let joiner = if window.is_empty() { 0 } else { separator_len };
            window.push_back(piece);
            total += len + joiner;
        }

        push_joined(&mut chunks, &window, separator);
        chunks
    }
}

fn push_joined(chunks: &mut Vec<String>, window: &VecDeque<&str>, separator: &str) {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

pub fn normalize_whitespace(text: &str) -> String {
    text.replace('\u{a0}', " ")
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn splitter(chunk_size: usize, chunk_overlap: usize) -> RecursiveSplitter {
        RecursiveSplitter::new(IngestionOptions {
            chunk_size,
            chunk_overlap,
        })
        .expect("valid options")
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = splitter(500, 50).split("A short abstract.");
        assert_eq!(chunks, vec!["A short abstract."]);
    }

    #[test]
    fn paragraphs_are_preferred_split_points() {
        let text = "First paragraph here.\n\nSecond paragraph here.";
        let chunks = splitter(30, 0).split(text);
        assert_eq!(chunks, vec!["First paragraph here.", "Second paragraph here."]);
    }

    #[test]
    fn every_chunk_respects_chunk_size() {
        let text = "word ".repeat(400);
        let chunks = splitter(50, 10).split(&text);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 50));
    }

    #[test]
    fn consecutive_chunks_overlap() {
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let chunks = splitter(20, 10).split(text);
        assert_eq!(
            chunks,
            vec![
                "alpha beta gamma",
                "beta gamma delta",
                "delta epsilon zeta",
                "zeta eta theta",
            ]
        );
    }

    #[test]
    fn unbroken_text_falls_back_to_characters() {
        let chunks = splitter(4, 0).split("abcdefghij");
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let result = RecursiveSplitter::new(IngestionOptions {
            chunk_size: 10,
            chunk_overlap: 10,
        });
        assert!(matches!(result, Err(IngestError::InvalidChunkOptions(_))));
    }

    #[test]
    fn whitespace_is_normalized_per_line() {
        let input = "A  \t  lot\u{a0}of\nspacing   here";
        assert_eq!(normalize_whitespace(input), "A lot of\nspacing here");
    }
}
