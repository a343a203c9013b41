use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{Chunk, PageRange, PageSpan, Provenance};
use crate::error::AppError;

/// Chunk sizing. All lengths are measured in characters, not bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkConfig {
    pub chunk_size: usize,
    pub overlap: usize,
    pub min_chunk_chars: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10_000,
            overlap: 1_000,
            min_chunk_chars: 100,
        }
    }
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
            ..Self::default()
        }
    }

    pub fn with_min_chunk_chars(mut self, min_chunk_chars: usize) -> Self {
        self.min_chunk_chars = min_chunk_chars;
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.chunk_size == 0 {
            return Err(AppError::new(
                "CHUNK_CONFIG_INVALID",
                "chunk_size must be greater than 0",
            ));
        }
        if self.overlap >= self.chunk_size {
            return Err(AppError::new(
                "CHUNK_CONFIG_INVALID",
                "overlap must be smaller than chunk_size",
            )
            .with_details(format!(
                "chunk_size={}; overlap={}",
                self.chunk_size, self.overlap
            )));
        }
        Ok(())
    }
}

/// Split page-tagged text into overlapping chunks.
///
/// Spans are grouped per document in first-appearance order; chunks never cross documents.
/// Within a document, pages are joined with a blank line so a page break is also a paragraph
/// break for boundary selection.
pub fn chunk_pages(spans: &[PageSpan], cfg: &ChunkConfig) -> Result<Vec<Chunk>, AppError> {
    cfg.validate()?;

    let mut order: Vec<&str> = Vec::new();
    for s in spans {
        if !order.contains(&s.document.as_str()) {
            order.push(s.document.as_str());
        }
    }

    let mut out = Vec::new();
    for doc in order {
        let pages = spans
            .iter()
            .filter(|s| s.document == doc)
            .collect::<Vec<_>>();
        out.extend(chunk_document(doc, &pages, cfg));
    }
    Ok(out)
}

fn chunk_document(document: &str, pages: &[&PageSpan], cfg: &ChunkConfig) -> Vec<Chunk> {
    let mut chars: Vec<char> = Vec::new();
    // (char offset where the page starts, page number), ascending by offset.
    let mut page_starts: Vec<(usize, u32)> = Vec::new();
    for p in pages {
        let text = normalize_text(&p.text);
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        if !chars.is_empty() {
            chars.push('\n');
            chars.push('\n');
        }
        page_starts.push((chars.len(), p.page));
        chars.extend(text.chars());
    }
    if chars.is_empty() {
        return Vec::new();
    }

    let mut out = Vec::new();
    let mut ordinal: u32 = 0;
    for (start, end) in split_ranges(&chars, cfg.chunk_size, cfg.overlap) {
        let text: String = chars[start..end].iter().collect();
        let text = text.trim_end().to_string();
        if text.chars().count() < cfg.min_chunk_chars {
            continue;
        }
        let last_idx = start + text.chars().count() - 1;
        let pages = PageRange {
            first: page_at(&page_starts, start),
            last: page_at(&page_starts, last_idx),
        };
        out.push(make_chunk(document, ordinal, text, pages));
        ordinal += 1;
    }
    out
}

fn make_chunk(document: &str, ordinal: u32, text: String, pages: PageRange) -> Chunk {
    let text_sha256 = sha256_hex(text.as_bytes());
    let id_input = format!(
        "v1|{}|{}|{}|{}-{}",
        document, ordinal, text_sha256, pages.first, pages.last
    );
    Chunk {
        chunk_id: sha256_hex(id_input.as_bytes()),
        ordinal,
        text,
        text_sha256,
        provenance: Provenance {
            document: document.to_string(),
            pages,
        },
    }
}

fn page_at(page_starts: &[(usize, u32)], offset: usize) -> u32 {
    let mut page = page_starts.first().map(|p| p.1).unwrap_or(1);
    for (start, p) in page_starts {
        if *start > offset {
            break;
        }
        page = *p;
    }
    page
}

/// Greedy window split returning `[start, end)` char ranges. Each range starts on a
/// non-whitespace char and is at most `size` long.
fn split_ranges(chars: &[char], size: usize, overlap: usize) -> Vec<(usize, usize)> {
    let n = chars.len();
    let mut out = Vec::new();
    let mut start = 0usize;

    while start < n {
        while start < n && chars[start].is_whitespace() {
            start += 1;
        }
        if start >= n {
            break;
        }

        let limit = (start + size).min(n);
        let end = if limit == n {
            n
        } else {
            find_break(chars, start, limit)
        };
        out.push((start, end));
        if end >= n {
            break;
        }

        let mut next = end.saturating_sub(overlap);
        if next <= start {
            // Chunk is not longer than the overlap; no room to step back.
            next = end;
        }
        // Do not start the next chunk in the middle of a word.
        while next < end
            && next > 0
            && !chars[next - 1].is_whitespace()
            && !chars[next].is_whitespace()
        {
            next += 1;
        }
        start = next;
    }

    out
}

/// Pick the end of a window `[start, limit)`: the latest paragraph break, else the latest
/// sentence end, else the latest whitespace, searching only the back half of the window.
fn find_break(chars: &[char], start: usize, limit: usize) -> usize {
    let min_pos = start + (limit - start) / 2;

    for q in (min_pos..limit).rev() {
        if chars[q] == '\n' && chars.get(q + 1) == Some(&'\n') && q > start {
            return q;
        }
    }

    for q in (min_pos..limit).rev() {
        if matches!(chars[q], '.' | '!' | '?')
            && chars.get(q + 1).map_or(true, |c| c.is_whitespace())
        {
            return q + 1;
        }
    }

    for q in (min_pos..=limit).rev() {
        if q > start && chars[q].is_whitespace() {
            return q;
        }
    }

    limit
}

pub fn normalize_text(s: &str) -> String {
    s.replace("\r\n", "\n").replace('\r', "\n").replace('\u{0}', "")
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
