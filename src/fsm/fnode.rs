//! Per-Fnode state: path links and authored write segments

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::message::Author;

/// A contiguous run of `Write` operations against one Fnode by one
/// author, addressed by the log byte range spanning the operations'
/// frames and their content.
///
/// Offsets are log offsets; `last_offset` is exclusive. Sequence bounds
/// are inclusive. An Fnode's live content is reconstructed only from its
/// segments, in order, belonging to the author chain that won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub author: Author,
    pub first_seq_no: u64,
    pub first_offset: u64,
    pub last_seq_no: u64,
    pub last_offset: u64,
}

impl Segment {
    /// Whether `seq_no` falls within this segment's inclusive bounds.
    pub fn contains_seq(&self, seq_no: u64) -> bool {
        self.first_seq_no <= seq_no && seq_no <= self.last_seq_no
    }
}

/// Live state of one Fnode.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FnodeState {
    /// Paths currently aliasing this Fnode. Never empty for a live node;
    /// removal of the last link releases the node.
    pub links: BTreeSet<String>,
    /// Ordered authored write runs sufficient to reconstruct content.
    pub segments: Vec<Segment>,
    /// Current byte extent of the file (max write end seen).
    pub size: u64,
}

impl FnodeState {
    /// Extends the segment list with one applied write.
    ///
    /// Consecutive writes by the same author merge into the trailing
    /// segment; an author change opens a new one.
    pub fn extend_segments(
        &mut self,
        author: Author,
        seq_no: u64,
        first_offset: u64,
        last_offset: u64,
    ) {
        if let Some(last) = self.segments.last_mut() {
            if last.author == author {
                last.last_seq_no = seq_no;
                last.last_offset = last_offset;
                return;
            }
        }
        self.segments.push(Segment {
            author,
            first_seq_no: seq_no,
            first_offset,
            last_seq_no: seq_no,
            last_offset,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A1: Author = Author(1);
    const A2: Author = Author(2);

    #[test]
    fn test_same_author_writes_merge() {
        let mut state = FnodeState::default();
        state.extend_segments(A1, 5, 100, 150);
        state.extend_segments(A1, 7, 180, 220);

        assert_eq!(state.segments.len(), 1);
        let seg = state.segments[0];
        assert_eq!(seg.first_seq_no, 5);
        assert_eq!(seg.last_seq_no, 7);
        assert_eq!(seg.first_offset, 100);
        assert_eq!(seg.last_offset, 220);
    }

    #[test]
    fn test_author_change_opens_new_segment() {
        let mut state = FnodeState::default();
        state.extend_segments(A1, 5, 100, 150);
        state.extend_segments(A2, 6, 150, 200);
        state.extend_segments(A2, 8, 230, 260);

        assert_eq!(state.segments.len(), 2);
        assert_eq!(state.segments[0].author, A1);
        assert_eq!(state.segments[1].author, A2);
        assert_eq!(state.segments[1].last_seq_no, 8);
    }

    #[test]
    fn test_contains_seq_bounds_inclusive() {
        let seg = Segment {
            author: A1,
            first_seq_no: 3,
            first_offset: 0,
            last_seq_no: 9,
            last_offset: 100,
        };
        assert!(seg.contains_seq(3));
        assert!(seg.contains_seq(9));
        assert!(!seg.contains_seq(2));
        assert!(!seg.contains_seq(10));
    }
}
