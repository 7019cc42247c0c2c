use crate::error::IngestError;
use crate::models::IngestionOptions;

/// A half-open character range `[start, end)` of the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkWindow {
    pub start: usize,
    pub end: usize,
}

/// Fixed-size character chunker with overlap between consecutive windows.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    max_chars: usize,
    overlap_chars: usize,
}

impl Chunker {
    /// Fails when the cursor could not advance, i.e. `overlap_chars >= max_chars`.
    pub fn new(max_chars: usize, overlap_chars: usize) -> Result<Self, IngestError> {
        if max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "max_chars must be greater than zero".to_string(),
            ));
        }

        if overlap_chars >= max_chars {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {overlap_chars} must be smaller than max_chars {max_chars}"
            )));
        }

        Ok(Self {
            max_chars,
            overlap_chars,
        })
    }

    pub fn from_options(options: &IngestionOptions) -> Result<Self, IngestError> {
        Self::new(options.chunk_max_chars, options.chunk_overlap_chars)
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn overlap_chars(&self) -> usize {
        self.overlap_chars
    }

    pub fn windows(&self, text: &str) -> Vec<ChunkWindow> {
        let len = text.chars().count();
        let mut windows = Vec::new();
        let mut start = 0;

        while start < len {
            let end = (start + self.max_chars).min(len);
            windows.push(ChunkWindow { start, end });
            if end == len {
                break;
            }
            start = end - self.overlap_chars;
        }

        windows
    }

    /// Splits `text` into trimmed, non-empty chunks in document order.
    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();

        self.windows(text)
            .into_iter()
            .filter_map(|window| {
                let piece: String = chars[window.start..window.end].iter().collect();
                let trimmed = piece.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
            .collect()
    }
}

impl Default for Chunker {
    fn default() -> Self {
        let options = IngestionOptions::default();
        Self {
            max_chars: options.chunk_max_chars,
            overlap_chars: options.chunk_overlap_chars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_text() -> String {
        (0..40)
            .map(|n| format!("Sentence number {n} about sponsoring and events. "))
            .collect()
    }

    #[test]
    fn overlap_not_smaller_than_max_is_rejected() {
        assert!(matches!(
            Chunker::new(100, 100),
            Err(IngestError::InvalidChunkConfig(_))
        ));
        assert!(matches!(
            Chunker::new(100, 250),
            Err(IngestError::InvalidChunkConfig(_))
        ));
        assert!(matches!(
            Chunker::new(0, 0),
            Err(IngestError::InvalidChunkConfig(_))
        ));
        assert!(Chunker::new(100, 99).is_ok());
        assert!(Chunker::new(100, 0).is_ok());
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        let chunker = Chunker::default();
        assert!(chunker.chunk_text("").is_empty());
        assert!(chunker.windows("").is_empty());
    }

    #[test]
    fn short_text_is_a_single_trimmed_chunk() {
        let chunker = Chunker::default();
        assert_eq!(chunker.chunk_text("  Hello world \n"), vec!["Hello world"]);
    }

    #[test]
    fn whitespace_only_windows_are_dropped() {
        let chunker = Chunker::new(10, 2).unwrap();
        let text = format!("abcdefghij{}klm", " ".repeat(30));
        let chunks = chunker.chunk_text(&text);

        assert!(chunks.iter().all(|chunk| !chunk.is_empty()));
        assert_eq!(chunks.first().map(String::as_str), Some("abcdefghij"));
        assert_eq!(chunks.last().map(String::as_str), Some("klm"));
    }

    #[test]
    fn windows_respect_bounds_and_overlap() {
        let text = sample_text();
        let len = text.chars().count();

        for (max_chars, overlap) in [(800, 150), (50, 10), (37, 36), (64, 0)] {
            let chunker = Chunker::new(max_chars, overlap).unwrap();
            let windows = chunker.windows(&text);

            assert_eq!(windows.first().map(|w| w.start), Some(0));
            assert_eq!(windows.last().map(|w| w.end), Some(len));
            for window in &windows {
                assert!(window.end - window.start <= max_chars);
            }
            for pair in windows.windows(2) {
                assert_eq!(pair[1].start, pair[0].end - overlap);
            }
        }
    }

    #[test]
    fn non_overlapping_regions_rebuild_the_source() {
        let text = sample_text();
        let chars: Vec<char> = text.chars().collect();
        let chunker = Chunker::new(120, 30).unwrap();

        let mut rebuilt = String::new();
        let mut covered = 0;
        for window in chunker.windows(&text) {
            let fresh = covered.max(window.start);
            rebuilt.extend(&chars[fresh..window.end]);
            covered = window.end;
        }

        assert_eq!(rebuilt, text);
    }

    #[test]
    fn chunks_count_characters_not_bytes() {
        let chunker = Chunker::new(4, 1).unwrap();
        let chunks = chunker.chunk_text("äöüßäöüß");

        assert_eq!(chunks, vec!["äöüß", "ßäöü", "üß"]);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 4));
    }
}
