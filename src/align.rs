//! Record alignment
//!
//! Bridges whole-record insertions and deletions between the original and the processed
//! stream, using the identifier key as resynchronization anchor.
//!
//! When writing, [`RecordAligner::align`] scans at most `resync_window` original records
//! ahead for the key of the next processed record. Original records passed over on the way
//! to a match are reported as skipped; without a match the processed record is an
//! insertion and the scanned records stay buffered for the next processed record.
//!
//! When reading, [`OriginalCursor::skip`] and [`OriginalCursor::take`] consume the original
//! records in exactly the order the writer did.

use std::collections::VecDeque;

use tracing::trace;

use crate::error::{DeltaError, Result};
use crate::record::{Record, RecordReader, RECORD_LINES};
use crate::source::LineSource;

/// Read-only, forward-moving view over the original records
pub struct OriginalCursor<S: LineSource> {
    reader: RecordReader<S>,
    /// Records read ahead but not yet consumed
    pending: VecDeque<Record>,
    exhausted: bool,
    /// Number of original records consumed (skipped or taken)
    position: usize,
}
impl<S: LineSource> OriginalCursor<S> {
    pub fn new(source: S) -> Self {
        Self {
            reader: RecordReader::new(source),
            pending: VecDeque::new(),
            exhausted: false,
            position: 0,
        }
    }

    /// Number of original records consumed so far
    pub fn position(&self) -> usize {
        self.position
    }

    /// Whether the original input has no record left
    pub fn is_exhausted(&self) -> bool {
        self.exhausted && self.pending.is_empty()
    }

    fn fill(&mut self) -> Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        if let Some(record) = self.reader.read_record()? {
            self.pending.push_back(record);
            Ok(true)
        } else {
            self.exhausted = true;
            Ok(false)
        }
    }

    /// Consumes the next original record, if any
    pub fn take(&mut self) -> Result<Option<Record>> {
        if self.pending.is_empty() && !self.fill()? {
            return Ok(None);
        }
        self.position += 1;
        Ok(self.pending.pop_front())
    }

    /// Discards the next original record, checking it has the lengths recorded by the
    /// writer
    pub fn skip(&mut self, lengths: &[usize; RECORD_LINES]) -> Result<()> {
        let Some(record) = self.take()? else {
            return Err(DeltaError::SkipPastEnd.into());
        };
        let found = record.lengths();
        if &found != lengths {
            return Err(DeltaError::SkipMismatch {
                expected: *lengths,
                got: found,
            }
            .into());
        }
        Ok(())
    }

    /// Finds the first original record with the given key within the next `window`
    /// records, reading ahead as needed.
    ///
    /// Empty keys never match.
    pub fn find(&mut self, key: &str, window: usize) -> Result<Option<usize>> {
        if key.is_empty() {
            return Ok(None);
        }
        if let Some(idx) = self
            .pending
            .iter()
            .take(window)
            .position(|record| record.key() == key)
        {
            return Ok(Some(idx));
        }
        while self.pending.len() < window && self.fill()? {
            if self.pending.back().is_some_and(|record| record.key() == key) {
                return Ok(Some(self.pending.len() - 1));
            }
        }
        Ok(None)
    }

    pub fn is_rewindable(&self) -> bool {
        self.reader.is_rewindable()
    }

    /// Moves the cursor back to the first original record
    pub fn rewind(&mut self) -> Result<()> {
        self.reader.rewind()?;
        self.pending.clear();
        self.exhausted = false;
        self.position = 0;
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        self.reader.close()
    }
}

/// Outcome of aligning one processed record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alignment {
    /// The processed record replaces `original`, after discarding the records whose field
    /// lengths are listed in `skipped`
    Matched {
        skipped: Vec<[usize; RECORD_LINES]>,
        original: Record,
    },
    /// The processed record has no original counterpart
    Inserted,
}

/// Creation-direction aligner
pub struct RecordAligner<S: LineSource> {
    cursor: OriginalCursor<S>,
    window: usize,
}
impl<S: LineSource> RecordAligner<S> {
    pub fn new(original: S, window: usize) -> Self {
        Self {
            cursor: OriginalCursor::new(original),
            window: window.max(1),
        }
    }

    /// Aligns the next processed record against the original cursor
    pub fn align(&mut self, processed: &Record) -> Result<Alignment> {
        let Some(idx) = self.cursor.find(processed.key(), self.window)? else {
            trace!("No original match for {:?}, inserting", processed.key());
            return Ok(Alignment::Inserted);
        };
        let mut skipped = Vec::with_capacity(idx);
        for _ in 0..idx {
            if let Some(record) = self.cursor.take()? {
                skipped.push(record.lengths());
            }
        }
        let Some(original) = self.cursor.take()? else {
            return Err(DeltaError::SkipPastEnd.into());
        };
        if !skipped.is_empty() {
            trace!("Skipping {} original records before {:?}", skipped.len(), processed.key());
        }
        Ok(Alignment::Matched { skipped, original })
    }

    pub fn cursor(&self) -> &OriginalCursor<S> {
        &self.cursor
    }

    pub fn into_cursor(self) -> OriginalCursor<S> {
        self.cursor
    }
}
