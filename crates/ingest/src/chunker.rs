use crate::chunk::Chunk;

/// Break points tried from the end of a window, strongest first.
const SEPARATORS: [&[char]; 3] = [&['\n', '\n'], &['\n'], &[' ']];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkerConfig {
    /// Window size in characters
    pub chunk_size: usize,
    /// Characters shared between consecutive windows
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2000,
            chunk_overlap: 200,
        }
    }
}

/// Fixed-size, overlapping character windows.
///
/// A window ends on the strongest separator found in its second half,
/// or exactly at `chunk_size` when there is none. The same input always
/// produces the same windows.
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        let chunk_size = config.chunk_size.max(1);
        let chunk_overlap = config.chunk_overlap.min(chunk_size - 1);

        Self {
            config: ChunkerConfig {
                chunk_size,
                chunk_overlap,
            },
        }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Split a document and assign chunk ids in window order.
    pub fn chunk_text(&self, doc_id: &str, text: &str) -> Vec<Chunk> {
        self.split(text)
            .into_iter()
            .enumerate()
            .map(|(index, window)| Chunk::new(doc_id.to_string(), index, window))
            .collect()
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let mut windows = Vec::new();
        let mut start = 0;

        while start < total {
            let limit = (start + self.config.chunk_size).min(total);
            let end = if limit == total {
                total
            } else {
                self.find_break(&chars, start, limit)
            };

            let window: String = chars[start..end].iter().collect();
            let trimmed = window.trim();
            if !trimmed.is_empty() {
                windows.push(trimmed.to_string());
            }

            if end == total {
                break;
            }
            start = self.next_start(&chars, start, end);
        }

        windows
    }

    fn find_break(&self, chars: &[char], start: usize, limit: usize) -> usize {
        let earliest = start + self.config.chunk_size / 2;

        for separator in SEPARATORS {
            let width = separator.len();
            let mut end = limit;

            while end >= earliest.max(start + width) {
                if &chars[end - width..end] == separator {
                    return end;
                }
                end -= 1;
            }
        }

        limit
    }

    fn next_start(&self, chars: &[char], start: usize, end: usize) -> usize {
        let candidate = end.saturating_sub(self.config.chunk_overlap);
        if candidate <= start {
            return end;
        }
        if chars[candidate - 1].is_whitespace() {
            return candidate;
        }

        // Begin the overlap at the next word instead of mid-word
        match chars[candidate..end].iter().position(|c| c.is_whitespace()) {
            Some(offset) => {
                let boundary = candidate + offset;
                chars[boundary..end]
                    .iter()
                    .position(|c| !c.is_whitespace())
                    .map(|o| boundary + o)
                    .unwrap_or(end)
            }
            None => candidate,
        }
    }
}
