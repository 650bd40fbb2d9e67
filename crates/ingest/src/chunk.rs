use sha2::{Digest, Sha256};
use study_models::ChunkingConfig;

/// Split text into overlapping windows, preferring to break on a newline,
/// then on a space, at least `min_break` characters into the window.
pub fn chunk_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = text.trim().chars().collect();
    let n = chars.len();
    if n == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut i = 0;
    while i < n {
        let j = (i + config.max_chars).min(n);
        let lo = i + config.min_break;
        let k = rfind(&chars, '\n', lo, j)
            .or_else(|| rfind(&chars, ' ', lo, j))
            .unwrap_or(j);

        let piece: String = chars[i..k].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
        if k >= n {
            break;
        }
        i = k.saturating_sub(config.overlap).max(i + 1);
    }
    chunks
}

fn rfind(chars: &[char], needle: char, lo: usize, hi: usize) -> Option<usize> {
    if lo >= hi {
        return None;
    }
    chars[lo..hi]
        .iter()
        .rposition(|c| *c == needle)
        .map(|pos| lo + pos)
}

/// Deterministic chunk id so re-indexing the same file overwrites its chunks.
pub fn stable_id(docset_id: &str, source: &str, index: usize) -> String {
    let digest = Sha256::digest(format!("{}|{}|{}", docset_id, source, index).as_bytes());
    let hex = hex::encode(digest);
    format!("{}-{}", docset_id, &hex[..24])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ChunkingConfig {
        ChunkingConfig {
            max_chars: 1200,
            overlap: 200,
            min_break: 200,
        }
    }

    #[test]
    fn empty_and_blank_text() {
        assert!(chunk_text("", &config()).is_empty());
        assert!(chunk_text("   \n\t ", &config()).is_empty());
    }

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(chunk_text("  hello world  ", &config()), vec!["hello world"]);
    }

    #[test]
    fn prefers_newline_breaks() {
        let first = "a".repeat(700);
        let second = "b".repeat(700);
        let text = format!("{}\n{}", first, second);
        let chunks = chunk_text(&text, &config());

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], first);
        // the second window starts `overlap` characters before the break and
        // finds the same newline again
        assert_eq!(chunks[1], "a".repeat(200));
        assert!(chunks[2].starts_with(&"a".repeat(199)));
        assert!(chunks[2].ends_with('b'));
    }

    #[test]
    fn falls_back_to_spaces_then_hard_cut() {
        let words = vec!["word"; 400].join(" ");
        let chunks = chunk_text(&words, &config());
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 1200);
            assert!(!chunk.starts_with(' '));
        }

        let solid = "x".repeat(3000);
        let chunks = chunk_text(&solid, &config());
        assert_eq!(chunks[0].len(), 1200);
        assert_eq!(chunks[1].len(), 1200);
    }

    #[test]
    fn windows_cover_the_whole_text() {
        let solid = "y".repeat(2500);
        let chunks = chunk_text(&solid, &config());
        let last = chunks.last().unwrap();
        assert_eq!(last.len(), 2500 - (1000 * (chunks.len() - 1)));
    }

    #[test]
    fn stops_once_the_end_is_reached() {
        let chunks = chunk_text(&"z".repeat(1300), &config());
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].len(), 300);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "é".repeat(1500);
        let chunks = chunk_text(&text, &config());
        assert_eq!(chunks[0].chars().count(), 1200);
    }

    #[test]
    fn stable_ids_are_deterministic() {
        let a = stable_id("job", "notes.md", 0);
        assert_eq!(a, stable_id("job", "notes.md", 0));
        assert_ne!(a, stable_id("job", "notes.md", 1));
        assert!(a.starts_with("job-"));
        assert_eq!(a.len(), "job-".len() + 24);
    }
}
