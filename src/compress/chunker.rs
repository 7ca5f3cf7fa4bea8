//! Overlapping windows over a turn sequence.

use crate::transcript::Turn;
use crate::util::excerpt;

/// Characters of a neighbouring turn quoted in a chunk's context preamble.
const NEIGHBOUR_EXCERPT_CHARS: usize = 50;

/// A contiguous window of turns, summarized independently in the map stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub turns: Vec<Turn>,
    /// Position of this chunk, 0-based.
    pub ordinal: usize,
    pub total_chunks: usize,
    /// Index of `turns[0]` in the source sequence.
    pub start: usize,
    pub is_first: bool,
    pub is_last: bool,
}

impl Chunk {
    /// Source index one past the last turn.
    pub fn end(&self) -> usize {
        self.start + self.turns.len()
    }
}

/// Splits turns into windows of `window` turns sharing `overlap` turns with
/// their neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    window: usize,
    overlap: usize,
}

impl Chunker {
    /// Caller guarantees `window > 0` and `2 * overlap <= window`, so every
    /// turn lands in at most two chunks. `CompressorConfig::validate`
    /// enforces both.
    pub fn new(window: usize, overlap: usize) -> Self {
        debug_assert!(window > 0 && overlap * 2 <= window);
        Self { window, overlap }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `turns` into chunks. `total_chunks` is final on every chunk.
    pub fn chunk(&self, turns: &[Turn]) -> Vec<Chunk> {
        let spans = self.spans(turns.len());
        let total_chunks = spans.len();

        spans
            .into_iter()
            .enumerate()
            .map(|(ordinal, (start, end))| Chunk {
                turns: turns[start..end].to_vec(),
                ordinal,
                total_chunks,
                start,
                is_first: ordinal == 0,
                is_last: ordinal + 1 == total_chunks,
            })
            .collect()
    }

    /// `[start, end)` ranges of each window.
    fn spans(&self, len: usize) -> Vec<(usize, usize)> {
        if len == 0 {
            return Vec::new();
        }
        if len <= self.window {
            return vec![(0, len)];
        }

        let step = self.window - self.overlap;
        let mut spans: Vec<(usize, usize)> = Vec::new();
        let mut start = 0;
        loop {
            let end = (start + self.window).min(len);
            spans.push((start, end));
            if end == len {
                break;
            }
            start += step;
        }

        // A runt final window folds its uncovered turns into the previous one.
        if spans.len() > 1
            && let Some(&(last_start, last_end)) = spans.last()
            && last_end - last_start < self.window / 2
        {
            spans.pop();
            if let Some(prev) = spans.last_mut() {
                prev.1 = len;
            }
        }

        spans
    }
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(super::DEFAULT_WINDOW, super::DEFAULT_OVERLAP)
    }
}

/// Describe where `chunks[index]` sits in the conversation, quoting the
/// neighbouring turns on either side.
pub fn context_preamble(chunks: &[Chunk], index: usize) -> String {
    let chunk = &chunks[index];
    let mut context = format!(
        "This is part {} of {} of the conversation. ",
        chunk.ordinal + 1,
        chunk.total_chunks
    );

    let previous = index
        .checked_sub(1)
        .and_then(|i| chunks.get(i))
        .and_then(|prev| prev.turns.last());
    match previous {
        Some(turn) if !chunk.is_first => context.push_str(&format!(
            "It follows a message where the {} was discussing: '{}'. ",
            turn.role,
            excerpt(&turn.content, NEIGHBOUR_EXCERPT_CHARS)
        )),
        _ => context.push_str("This is the beginning of the conversation. "),
    }

    let next = chunks.get(index + 1).and_then(|next| next.turns.first());
    match next {
        Some(turn) if !chunk.is_last => context.push_str(&format!(
            "It is followed by a message where the {} begins discussing: '{}'.",
            turn.role,
            excerpt(&turn.content, NEIGHBOUR_EXCERPT_CHARS)
        )),
        _ => context.push_str("This is the end of the conversation being summarized."),
    }

    context
}
