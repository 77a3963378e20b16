//! Delta payload writer
//!
//! Aligns every processed record against the original, appends the resulting tokens to
//! an append-only sink and accumulates the processed checksum. The writer never reads
//! back what it wrote; [`DeltaWriter::finish`] writes the end marker and hands back the
//! sink together with the final digest, ready to be sealed into a container.

use std::io::Write;

use tracing::{debug, warn};

use super::token::{write_end, write_field, write_insert, write_skip};
use crate::align::{Alignment, RecordAligner};
use crate::checksum::{ChecksumTracker, Digest};
use crate::codec::FieldDiffCodec;
use crate::config::DeltaConfig;
use crate::error::Result;
use crate::record::{Record, RECORD_LINES};
use crate::source::LineSource;

/// Counters describing a written delta
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeltaStats {
    /// Processed records written
    pub records: u64,
    /// Processed records aligned against an original record
    pub matched: u64,
    /// Processed records without original counterpart
    pub inserted: u64,
    /// Original records skipped
    pub skipped: u64,
}

/// Writes the delta between an original record source and processed records
///
/// # Type Parameters
///
/// * `S` - The original line source
/// * `W` - The sink receiving the delta payload
pub struct DeltaWriter<S: LineSource, W: Write> {
    inner: W,
    aligner: RecordAligner<S>,
    codec: FieldDiffCodec,
    checksum: ChecksumTracker,

    /// Complete lines not yet forming a full record
    leftover: Vec<String>,
    /// Incomplete trailing line of the last [`DeltaWriter::write_str`] call
    partial: String,
    /// Set once a blank identifier line ends the processed input
    ended: bool,

    stats: DeltaStats,
}
impl<S: LineSource, W: Write> DeltaWriter<S, W> {
    pub fn new(inner: W, original: S, config: &DeltaConfig) -> Self {
        Self {
            inner,
            aligner: RecordAligner::new(original, config.resync_window),
            codec: FieldDiffCodec::new(config.diff),
            checksum: ChecksumTracker::new(),
            leftover: Vec::with_capacity(RECORD_LINES),
            partial: String::new(),
            ended: false,
            stats: DeltaStats::default(),
        }
    }

    /// Writes the tokens of one processed record
    ///
    /// A record with a blank identifier ends the processed input; it and every following
    /// record are ignored.
    pub fn write_record(&mut self, record: &Record) -> Result<()> {
        if self.ended {
            return Ok(());
        }
        if record.id.is_empty() {
            debug!("Blank identifier after {} records, ending input", self.stats.records);
            self.ended = true;
            return Ok(());
        }

        self.checksum.update_record(record);
        let original = match self.aligner.align(record)? {
            Alignment::Matched { skipped, original } => {
                for lengths in &skipped {
                    write_skip(&mut self.inner, lengths)?;
                }
                self.stats.skipped += skipped.len() as u64;
                self.stats.matched += 1;
                original
            }
            Alignment::Inserted => {
                write_insert(&mut self.inner)?;
                self.stats.inserted += 1;
                Record::default()
            }
        };
        for (old, new) in original.fields().into_iter().zip(record.fields()) {
            write_field(&mut self.inner, &self.codec.encode(old, new))?;
        }
        self.stats.records += 1;
        Ok(())
    }

    /// Writes processed lines (without terminators), four lines per record.
    ///
    /// Lines that do not complete a record are kept until the next call.
    pub fn write_lines<I, L>(&mut self, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = L>,
        L: AsRef<str>,
    {
        for line in lines {
            self.leftover.push(line.as_ref().to_string());
            if self.leftover.len() == RECORD_LINES {
                let mut fields = self.leftover.drain(..);
                let record = Record {
                    id: fields.next().unwrap_or_default(),
                    seq: fields.next().unwrap_or_default(),
                    com: fields.next().unwrap_or_default(),
                    qual: fields.next().unwrap_or_default(),
                };
                drop(fields);
                self.write_record(&record)?;
            }
        }
        Ok(())
    }

    /// Writes a chunk of processed text; chunks may split lines and records anywhere
    pub fn write_str(&mut self, text: &str) -> Result<()> {
        self.partial.push_str(text);
        let Some(last_newline) = self.partial.rfind('\n') else {
            return Ok(());
        };
        let complete: String = self.partial.drain(..=last_newline).collect();
        self.write_lines(complete.lines())
    }

    /// Digest of the processed records written so far
    pub fn digest(&self) -> Digest {
        self.checksum.finalize()
    }

    pub fn stats(&self) -> DeltaStats {
        self.stats
    }

    /// Terminates the payload and returns the sink with the final digest
    pub fn finish(mut self) -> Result<(W, Digest, DeltaStats)> {
        if !self.partial.is_empty() {
            let line = std::mem::take(&mut self.partial);
            self.write_lines([line.trim_end_matches('\r')])?;
        }
        if !self.leftover.is_empty() && !self.ended {
            warn!(
                "Ignoring incomplete trailing record ({} of {} lines)",
                self.leftover.len(),
                RECORD_LINES
            );
        }
        write_end(&mut self.inner)?;
        self.inner.flush()?;

        let mut cursor = self.aligner.into_cursor();
        cursor.close()?;
        debug!(
            "Delta written: {} records ({} matched, {} inserted), {} original records skipped",
            self.stats.records, self.stats.matched, self.stats.inserted, self.stats.skipped
        );
        Ok((self.inner, self.checksum.finalize(), self.stats))
    }
}
