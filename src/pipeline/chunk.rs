//! Chunker: split the corpus into overlapping windows of bounded length.
//!
//! Lengths and offsets are counted in characters (Unicode scalar values), so a
//! Spanish or Greek PDF gets the same window size as an English one.
//!
//! Each chunk ends at the best boundary inside its window, preferring, in order:
//!
//! 1. a paragraph break (`\n\n`)
//! 2. a sentence end (`.`, `!` or `?` followed by a space or newline)
//! 3. any whitespace
//! 4. a hard cut at the window edge
//!
//! A boundary only counts when the chunk it closes is longer than the overlap,
//! so the next window always starts strictly after the previous one. The next
//! chunk starts `overlap` characters before the previous end, which makes
//! consecutive chunks share exactly `overlap` characters.

use crate::output::Chunk;
use tracing::debug;

/// Split `text` into chunks of at most `chunk_size` characters with
/// `chunk_overlap` characters shared between neighbours.
///
/// Empty or whitespace-only text yields no chunks. An overlap that is not
/// smaller than the chunk size is reduced to `chunk_size - 1`.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    if chunk_size == 0 || text.trim().is_empty() {
        return Vec::new();
    }
    let overlap = chunk_overlap.min(chunk_size - 1);
    let chars: Vec<char> = text.chars().collect();
    let total = chars.len();

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        if total - start <= chunk_size {
            chunks.push(make_chunk(&chars, chunks.len(), start, total));
            break;
        }
        let window_end = start + chunk_size;
        let end = find_boundary(&chars, start + overlap + 1, window_end);
        chunks.push(make_chunk(&chars, chunks.len(), start, end));
        start = end - overlap;
    }

    debug!(
        "Split {} chars into {} chunks (size {}, overlap {})",
        total,
        chunks.len(),
        chunk_size,
        overlap
    );
    chunks
}

fn make_chunk(chars: &[char], index: usize, start: usize, end: usize) -> Chunk {
    Chunk {
        index,
        start,
        text: chars[start..end].iter().collect(),
    }
}

/// Best exclusive end offset in `min_end..=window_end`.
fn find_boundary(chars: &[char], min_end: usize, window_end: usize) -> usize {
    let candidates = || (min_end..=window_end).rev();

    if let Some(end) = candidates().find(|&e| e >= 2 && chars[e - 2] == '\n' && chars[e - 1] == '\n')
    {
        return end;
    }
    if let Some(end) = candidates().find(|&e| {
        e >= 2 && matches!(chars[e - 2], '.' | '!' | '?') && matches!(chars[e - 1], ' ' | '\n')
    }) {
        return end;
    }
    if let Some(end) = candidates().find(|&e| e >= 1 && chars[e - 1].is_whitespace()) {
        return end;
    }
    window_end
}
