pub mod pdf;

use std::collections::VecDeque;

/// Paragraph, line, sentence, word, then single characters.
const SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

/// Text chunking using recursive character splitting.
/// Splits text into chunks of at most `chunk_size` characters; consecutive
/// chunks share up to `chunk_overlap` characters of trailing/leading content.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if text.trim().is_empty() || chunk_size == 0 {
        return vec![];
    }
    recursive_split(text, &SEPARATORS, chunk_size, chunk_overlap)
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn recursive_split(
    text: &str,
    separators: &[&str],
    chunk_size: usize,
    chunk_overlap: usize,
) -> Vec<String> {
    // First separator present in the text; "" always matches.
    let position = separators
        .iter()
        .position(|sep| sep.is_empty() || text.contains(sep))
        .unwrap_or(separators.len().saturating_sub(1));
    let separator = separators.get(position).copied().unwrap_or("");
    let remaining = separators.get(position + 1..).unwrap_or(&[]);

    let pieces: Vec<&str> = if separator.is_empty() {
        text.char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect()
    } else {
        text.split_inclusive(separator)
            .filter(|p| !p.is_empty())
            .collect()
    };

    let mut chunks = Vec::new();
    let mut pending: Vec<&str> = Vec::new();

    for piece in pieces {
        if char_len(piece) <= chunk_size {
            pending.push(piece);
            continue;
        }

        if !pending.is_empty() {
            chunks.extend(merge_pieces(&pending, chunk_size, chunk_overlap));
            pending.clear();
        }

        if remaining.is_empty() {
            let trimmed = piece.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }
        } else {
            chunks.extend(recursive_split(piece, remaining, chunk_size, chunk_overlap));
        }
    }

    if !pending.is_empty() {
        chunks.extend(merge_pieces(&pending, chunk_size, chunk_overlap));
    }

    chunks
}

/// Greedily packs pieces into windows of at most `chunk_size` characters.
/// When a window is emitted, pieces are dropped from its front until the
/// retained tail fits in `chunk_overlap`; that tail opens the next window.
fn merge_pieces(pieces: &[&str], chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: VecDeque<(&str, usize)> = VecDeque::new();
    let mut total = 0usize;

    for &piece in pieces {
        let len = char_len(piece);

        if total + len > chunk_size && !window.is_empty() {
            emit_window(&mut chunks, &window);

            while total > chunk_overlap || (total > 0 && total + len > chunk_size) {
                match window.pop_front() {
                    Some((_, front_len)) => total -= front_len,
                    None => break,
                }
            }
        }

        window.push_back((piece, len));
        total += len;
    }

    emit_window(&mut chunks, &window);
    chunks
}

fn emit_window(chunks: &mut Vec<String>, window: &VecDeque<(&str, usize)>) {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_small_text() {
        let chunks = split_text("hello", 1000, 100);
        assert_eq!(chunks, vec!["hello"]);
    }

    #[test]
    fn test_split_empty() {
        assert!(split_text("", 1000, 100).is_empty());
        assert!(split_text("  \n\n  ", 1000, 100).is_empty());
    }

    #[test]
    fn test_split_multiple_chunks() {
        let text = "a".repeat(500) + "\n\n" + &"b".repeat(500);
        let chunks = split_text(&text, 600, 50);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "a".repeat(500));
        assert_eq!(chunks[1], "b".repeat(500));
    }

    #[test]
    fn test_chunks_respect_size_limit() {
        let text = (0..40)
            .map(|i| format!("Paragraph {i}. {}", "lorem ipsum dolor ".repeat(i % 7 + 1)))
            .collect::<Vec<_>>()
            .join("\n\n");
        let chunks = split_text(&text, 120, 20);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(char_len(chunk) <= 120, "Chunk too large: {} chars", char_len(chunk));
        }
    }

    #[test]
    fn test_character_overlap_between_consecutive_chunks() {
        let text = "abcdefghijklmnopqrstuvwxyz".repeat(4);
        let chunks = split_text(&text, 10, 3);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].chars().collect();
            if prev.len() < 10 {
                continue;
            }
            let tail: String = prev[prev.len() - 3..].iter().collect();
            assert!(
                pair[1].starts_with(&tail),
                "{:?} does not continue {:?}",
                pair[1],
                pair[0]
            );
        }
        for chunk in &chunks[..chunks.len() - 1] {
            assert_eq!(char_len(chunk), 10);
        }
    }

    #[test]
    fn test_word_overlap_between_consecutive_chunks() {
        let text = (0..60).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ");
        let chunks = split_text(&text, 50, 10);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            // Tail of up to 10 chars is two "wNN " pieces.
            let prev: Vec<&str> = pair[0].split_whitespace().collect();
            let next: Vec<&str> = pair[1].split_whitespace().collect();
            assert_eq!(&prev[prev.len() - 2..], &next[..2]);
        }
    }

    #[test]
    fn test_sentence_boundaries_preferred_over_words() {
        let text = "The CPU schedules processes. A process is a unit of execution. Threads share memory.";
        let chunks = split_text(text, 40, 0);
        assert_eq!(
            chunks,
            vec![
                "The CPU schedules processes.",
                "A process is a unit of execution.",
                "Threads share memory."
            ]
        );
    }

    #[test]
    fn test_multibyte_text_is_split_on_char_boundaries() {
        let text = "überprüfung".repeat(30);
        let chunks = split_text(&text, 25, 5);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(char_len(chunk) <= 25);
        }
    }

    #[test]
    fn test_split_is_deterministic() {
        let text = (0..25)
            .map(|i| format!("Section {i}\nVirtual memory maps pages to frames. {}", "x ".repeat(i)))
            .collect::<Vec<_>>()
            .join("\n\n");
        assert_eq!(split_text(&text, 80, 15), split_text(&text, 80, 15));
    }
}
