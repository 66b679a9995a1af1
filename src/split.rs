//! Splitting a diff into pieces that fit a model's context window.
//!
//! Offsets are character offsets (Unicode scalar values) into the original
//! diff, never byte offsets, so a segment boundary can't land inside a
//! multi-byte character.

use crate::error::{PrError, Result};
use crate::tokens::TokenCounter;

/// Characters repeated at the start of each token-aware segment.
pub const DEFAULT_OVERLAP: usize = 1000;
/// Largest growth step, in characters, while searching for a segment end.
const GROWTH_STEP: usize = 1000;
/// A segment is complete once it is within this many tokens of the limit.
const TOKEN_TOLERANCE: usize = 10;
/// Below this much headroom, the whole candidate segment is re-encoded rather
/// than adding up the counts of the appended steps.
const REMEASURE_MARGIN: usize = 1000;

/// One bounded slice of the diff, sent to the model as a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffSegment {
    pub index: usize,
    pub start_offset: usize,
    pub end_offset: usize,
    pub text: String,
    pub overlap_with_previous: usize,
}

impl DiffSegment {
    pub fn char_len(&self) -> usize {
        self.end_offset - self.start_offset
    }
}

/// A way of cutting a diff into segments.
pub trait SplitStrategy {
    fn split(&self, text: &str) -> Result<Vec<DiffSegment>>;

    fn name(&self) -> &'static str;
}

/// Byte offset of every character, plus a sentinel for the end of text.
struct CharIndex {
    offsets: Vec<usize>,
}

impl CharIndex {
    fn new(text: &str) -> Self {
        let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        offsets.push(text.len());
        CharIndex { offsets }
    }

    fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    fn slice<'t>(&self, text: &'t str, start: usize, end: usize) -> &'t str {
        &text[self.offsets[start]..self.offsets[end]]
    }

    fn char_at_byte(&self, byte: usize) -> usize {
        self.offsets.binary_search(&byte).unwrap_or_else(|i| i)
    }
}

/// Fixed-width character split with no overlap and no line alignment.
#[derive(Debug, Clone, Copy)]
pub struct CharSplitter {
    max_chars: usize,
}

impl CharSplitter {
    pub fn new(max_chars: usize) -> Self {
        CharSplitter { max_chars }
    }
}

impl SplitStrategy for CharSplitter {
    fn split(&self, text: &str) -> Result<Vec<DiffSegment>> {
        if self.max_chars == 0 {
            return Err(PrError::invalid_split("max chars must be greater than 0"));
        }
        if text.is_empty() {
            return Err(PrError::invalid_split("cannot split empty text"));
        }

        let index = CharIndex::new(text);
        let total = index.len();
        let parts = total.div_ceil(self.max_chars);

        let segments = (0..parts)
            .map(|i| {
                let start = i * self.max_chars;
                let end = ((i + 1) * self.max_chars).min(total);
                DiffSegment {
                    index: i,
                    start_offset: start,
                    end_offset: end,
                    text: index.slice(text, start, end).to_string(),
                    overlap_with_previous: 0,
                }
            })
            .collect();

        Ok(segments)
    }

    fn name(&self) -> &'static str {
        "chars"
    }
}

/// Token-aware split that biases boundaries onto line ends and repeats a
/// fixed window of characters between consecutive segments.
pub struct TokenSplitter<'a> {
    counter: &'a dyn TokenCounter,
    token_limit: usize,
    overlap: usize,
}

impl<'a> TokenSplitter<'a> {
    pub fn new(counter: &'a dyn TokenCounter, token_limit: usize) -> Self {
        TokenSplitter {
            counter,
            token_limit,
            overlap: DEFAULT_OVERLAP,
        }
    }

    pub fn with_overlap(mut self, overlap: usize) -> Self {
        self.overlap = overlap;
        self
    }

    /// Furthest end for a segment starting at `start` whose token count stays
    /// within the limit.
    ///
    /// Far from the limit the running count is the sum of the appended steps;
    /// near it, or at the end of the text, the full slice is counted so the
    /// accepted end is exact.
    fn grow(&self, text: &str, index: &CharIndex, start: usize) -> usize {
        let total = index.len();
        let mut end = start;
        let mut used = 0;
        let mut step_cap = GROWTH_STEP;

        while end < total {
            let headroom = self.token_limit.saturating_sub(used);
            if end > start && headroom <= TOKEN_TOLERANCE {
                break;
            }

            let step = step_cap.min(headroom).max(1);
            let candidate = (end + step).min(total);
            let estimate = used + self.counter.count(index.slice(text, end, candidate));
            let tokens = if candidate < total && estimate + REMEASURE_MARGIN < self.token_limit {
                estimate
            } else {
                self.counter.count(index.slice(text, start, candidate))
            };

            if tokens > self.token_limit {
                if step == 1 {
                    break;
                }
                step_cap = step / 2;
                continue;
            }

            end = candidate;
            used = tokens;
        }

        if end == start {
            log::warn!(
                "Character at offset {start} alone exceeds the {} token limit; emitting it as its own segment",
                self.token_limit
            );
            end = start + 1;
        }

        end
    }

    /// Pull `end` back to just past the last newline, as long as the segment
    /// still reaches beyond the overlap window.
    fn align_to_line(&self, text: &str, index: &CharIndex, start: usize, end: usize) -> usize {
        let slice = index.slice(text, start, end);
        let Some(newline) = slice.rfind('\n') else {
            return end;
        };

        let byte = index.offsets[start] + newline + 1;
        let aligned = index.char_at_byte(byte);
        if aligned > start + self.overlap {
            aligned
        } else {
            end
        }
    }
}

impl SplitStrategy for TokenSplitter<'_> {
    fn split(&self, text: &str) -> Result<Vec<DiffSegment>> {
        if self.token_limit == 0 {
            return Err(PrError::invalid_split("token limit must be greater than 0"));
        }
        if text.is_empty() {
            return Err(PrError::invalid_split("cannot split empty text"));
        }

        let index = CharIndex::new(text);
        let total = index.len();
        let mut segments: Vec<DiffSegment> = Vec::new();
        let mut start = 0;

        loop {
            let mut end = self.grow(text, &index, start);
            if end < total {
                end = self.align_to_line(text, &index, start, end);
            }

            let overlap_with_previous = segments
                .last()
                .map(|prev| prev.end_offset - start)
                .unwrap_or(0);

            segments.push(DiffSegment {
                index: segments.len(),
                start_offset: start,
                end_offset: end,
                text: index.slice(text, start, end).to_string(),
                overlap_with_previous,
            });

            if end >= total {
                break;
            }

            start = match end.checked_sub(self.overlap) {
                Some(next) if next > start => next,
                _ => {
                    log::debug!(
                        "Segment {start}..{end} is not longer than the {} char overlap; next segment starts without overlap",
                        self.overlap
                    );
                    end
                }
            };
        }

        log::debug!(
            "Split {total} chars into {} segments (token limit {}, overlap {})",
            segments.len(),
            self.token_limit,
            self.overlap
        );

        Ok(segments)
    }

    fn name(&self) -> &'static str {
        "tokens"
    }
}
