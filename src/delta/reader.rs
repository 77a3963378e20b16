//! Delta payload reader
//!
//! Replays a delta payload against the original records, yielding the reconstructed
//! processed records one at a time.
//!
//! A reader moves through the following states:
//!
//! | State       | Meaning                                                            |
//! | ----------- | ------------------------------------------------------------------ |
//! | `Open`      | payload and original positioned at their start                     |
//! | `Streaming` | records are being reconstructed                                    |
//! | `Exhausted` | the payload ended and the checksum has been verified               |
//! | `Closed`    | all resources have been released                                   |
//!
//! Reaching the end of the payload verifies the accumulated digest against the stored one.
//! A mismatch is yielded as the final item of the iterator, after every reconstructed
//! record, so the caller still holds the complete output when deciding what to do with it.

use std::io::Write;

use tracing::{debug, warn};

use super::token::DeltaToken;
use crate::align::OriginalCursor;
use crate::checksum::{to_hex, ChecksumTracker, Digest};
use crate::codec::FieldDiffCodec;
use crate::error::{DeltaError, Result, SourceError};
use crate::record::{Record, RECORD_LINES};
use crate::source::LineSource;

/// Lifecycle of a [`DeltaReader`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Open,
    Streaming,
    Exhausted,
    Closed,
}

/// Reconstructs processed records from a delta payload and the original records
///
/// # Type Parameters
///
/// * `P` - The line source of the delta payload
/// * `S` - The line source of the original records
pub struct DeltaReader<P: LineSource, S: LineSource> {
    payload: P,
    cursor: OriginalCursor<S>,
    codec: FieldDiffCodec,
    checksum: ChecksumTracker,
    expected: Digest,
    state: ReaderState,

    /// Keep resources alive at the end of the payload so the reader can be reset
    reusable: bool,
    /// Whether payload and original have been closed
    released: bool,

    line: String,
    line_no: usize,
    records: u64,
}
impl<P: LineSource, S: LineSource> DeltaReader<P, S> {
    /// Creates a reader replaying `payload` against `original`, expecting the processed
    /// records to hash to `expected`
    pub fn new(payload: P, original: S, expected: Digest, codec: FieldDiffCodec) -> Self {
        Self {
            payload,
            cursor: OriginalCursor::new(original),
            codec,
            checksum: ChecksumTracker::new(),
            expected,
            state: ReaderState::Open,
            reusable: false,
            released: false,
            line: String::new(),
            line_no: 0,
            records: 0,
        }
    }

    /// Keeps the payload and original open once exhausted, so [`DeltaReader::reset`] can
    /// replay them
    #[must_use]
    pub fn reusable(mut self, reusable: bool) -> Self {
        self.reusable = reusable;
        self
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// The digest stored alongside the payload
    pub fn expected_digest(&self) -> Digest {
        self.expected
    }

    /// The digest of the records reconstructed so far
    pub fn digest(&self) -> Digest {
        self.checksum.finalize()
    }

    /// Number of records reconstructed since the last reset
    pub fn records(&self) -> u64 {
        self.records
    }

    fn next_token(&mut self) -> Result<Option<DeltaToken>> {
        if !self.payload.read_line(&mut self.line)? {
            return Ok(None);
        }
        self.line_no += 1;
        DeltaToken::parse(&self.line, self.line_no)
    }

    /// Reads the next field token of the current record
    fn next_field(&mut self, index: usize) -> Result<String> {
        match self.next_token()? {
            Some(DeltaToken::Field(script)) => Ok(script),
            Some(DeltaToken::Skip(_)) => Err(DeltaError::UnexpectedSkip(self.line_no).into()),
            Some(DeltaToken::Insert) => Err(DeltaError::MalformedToken {
                line: self.line_no,
                reason: "insert marker inside a record".to_string(),
            }
            .into()),
            None => Err(DeltaError::TruncatedRecord(index).into()),
        }
    }

    /// Resolves the next processed record, consuming any skip markers before it
    fn next_record(&mut self) -> Result<Option<Record>> {
        let mut inserted = false;
        let mut skipped = false;
        let first = loop {
            match self.next_token()? {
                // markers announce a record that must follow
                None if inserted || skipped => {
                    return Err(DeltaError::TruncatedRecord(0).into());
                }
                None => return Ok(None),
                Some(DeltaToken::Skip(lengths)) => {
                    if inserted {
                        return Err(DeltaError::UnexpectedSkip(self.line_no).into());
                    }
                    self.cursor.skip(&lengths)?;
                    skipped = true;
                }
                Some(DeltaToken::Insert) => {
                    if inserted {
                        return Err(DeltaError::MalformedToken {
                            line: self.line_no,
                            reason: "repeated insert marker".to_string(),
                        }
                        .into());
                    }
                    inserted = true;
                }
                Some(DeltaToken::Field(script)) => break script,
            }
        };

        // an exhausted original aligns like an inserted record
        let original = if inserted {
            Record::default()
        } else {
            self.cursor.take()?.unwrap_or_default()
        };

        let mut scripts: [String; RECORD_LINES] = Default::default();
        scripts[0] = first;
        for (index, script) in scripts.iter_mut().enumerate().skip(1) {
            *script = self.next_field(index)?;
        }

        let [id, seq, com, qual] = original.fields();
        let [sid, sseq, scom, squal] = &scripts;
        let record = Record {
            id: self.codec.decode(id, sid)?,
            seq: self.codec.decode(seq, sseq)?,
            com: self.codec.decode(com, scom)?,
            qual: self.codec.decode(qual, squal)?,
        };
        self.checksum.update_record(&record);
        self.records += 1;
        Ok(Some(record))
    }

    /// Moves to `Exhausted` and verifies the digest
    fn finish(&mut self) -> Result<()> {
        self.state = ReaderState::Exhausted;
        let outcome = self.checksum.check(&self.expected);
        match &outcome {
            Ok(()) => debug!(
                "Rebuilt {} records, checksum {} verified",
                self.records,
                to_hex(&self.expected)
            ),
            Err(e) => warn!("{e}"),
        }
        if !self.reusable {
            self.release();
        }
        outcome
    }

    /// Releases payload and original, ignoring cleanup failures
    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = self.payload.close() {
            warn!("Failed to release delta payload: {e}");
        }
        if let Err(e) = self.cursor.close() {
            warn!("Failed to release original input: {e}");
        }
    }

    /// Releases all resources. Closing twice is a no-op.
    pub fn close(&mut self) {
        self.release();
        self.state = ReaderState::Closed;
    }

    /// Rewinds payload and original to their start and clears the checksum state
    ///
    /// Fails with [`SourceError::NotRewindable`] when either source cannot rewind, and
    /// with [`DeltaError::Closed`] once the resources have been released.
    pub fn reset(&mut self) -> Result<()> {
        if self.released {
            return Err(DeltaError::Closed.into());
        }
        if !self.payload.is_rewindable() || !self.cursor.is_rewindable() {
            return Err(SourceError::NotRewindable.into());
        }
        self.payload.rewind()?;
        self.cursor.rewind()?;
        self.checksum.reset();
        self.line_no = 0;
        self.records = 0;
        self.state = ReaderState::Open;
        Ok(())
    }

    /// Writes every remaining record to `writer`.
    ///
    /// The output is flushed before a checksum mismatch is reported.
    pub fn write_records<W: Write>(&mut self, writer: &mut W) -> Result<u64> {
        let mut written = 0;
        for record in self.by_ref() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    writer.flush()?;
                    return Err(e);
                }
            };
            record.write_to(writer)?;
            written += 1;
        }
        writer.flush()?;
        Ok(written)
    }
}
impl<P: LineSource, S: LineSource> Iterator for DeltaReader<P, S> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            ReaderState::Exhausted | ReaderState::Closed => return None,
            ReaderState::Open => self.state = ReaderState::Streaming,
            ReaderState::Streaming => {}
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => self.finish().err().map(Err),
            Err(e) => {
                self.close();
                Some(Err(e))
            }
        }
    }
}
impl<P: LineSource, S: LineSource> Drop for DeltaReader<P, S> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeltaConfig;
    use crate::delta::DeltaWriter;
    use crate::source::SeekableSource;
    use std::io::Cursor;

    const ORIGINAL: &str = "@a\nACGT\n+\nIIII\n@b\nGGCC\n+\n####\n@c\nTTTT\n+\nAAAA\n";

    fn source(data: impl Into<String>) -> SeekableSource<Cursor<String>> {
        SeekableSource::new(Cursor::new(data.into()))
    }

    fn write_delta(records: &[Record]) -> Result<(String, Digest)> {
        let mut writer = DeltaWriter::new(Vec::new(), source(ORIGINAL), &DeltaConfig::default());
        for record in records {
            writer.write_record(record)?;
        }
        let (payload, digest, _) = writer.finish()?;
        Ok((String::from_utf8(payload).map_err(anyhow::Error::from)?, digest))
    }

    fn reader(
        payload: &str,
        digest: Digest,
    ) -> DeltaReader<SeekableSource<Cursor<String>>, SeekableSource<Cursor<String>>> {
        DeltaReader::new(source(payload), source(ORIGINAL), digest, FieldDiffCodec::default())
    }

    fn processed() -> Vec<Record> {
        vec![
            Record::new("@a", "ACG", "+", "III"),
            Record::new("@new", "NNNN", "+", "!!!!"),
            Record::new("@c", "TTTT", "+", "AAAA"),
        ]
    }

    #[test]
    fn test_state_machine() -> Result<()> {
        let (payload, digest) = write_delta(&processed())?;
        let mut reader = reader(&payload, digest);
        assert_eq!(reader.state(), ReaderState::Open);
        let first = reader.next().transpose()?;
        assert_eq!(first, Some(processed()[0].clone()));
        assert_eq!(reader.state(), ReaderState::Streaming);
        let rest = reader.by_ref().collect::<Result<Vec<_>>>()?;
        assert_eq!(rest, processed()[1..]);
        assert_eq!(reader.state(), ReaderState::Exhausted);
        assert!(reader.next().is_none());

        reader.close();
        reader.close();
        assert_eq!(reader.state(), ReaderState::Closed);
        Ok(())
    }

    #[test]
    fn test_mismatch_is_last_item() -> Result<()> {
        let (payload, _) = write_delta(&processed())?;
        let items: Vec<_> = reader(&payload, [0; 16]).collect();
        assert_eq!(items.len(), processed().len() + 1);
        assert!(items[..3].iter().all(Result::is_ok));
        assert!(items[3].as_ref().is_err_and(crate::Error::is_checksum_mismatch));
        Ok(())
    }

    #[test]
    fn test_reset_replays_identically() -> Result<()> {
        let (payload, digest) = write_delta(&processed())?;
        let mut reader = reader(&payload, digest).reusable(true);
        let first = reader.by_ref().collect::<Result<Vec<_>>>()?;
        reader.reset()?;
        assert_eq!(reader.state(), ReaderState::Open);
        let second = reader.by_ref().collect::<Result<Vec<_>>>()?;
        assert_eq!(first, second);
        assert_eq!(reader.digest(), digest);
        Ok(())
    }

    #[test]
    fn test_reset_after_release_fails() -> Result<()> {
        let (payload, digest) = write_delta(&processed())?;
        let mut reader = reader(&payload, digest);
        reader.by_ref().collect::<Result<Vec<_>>>()?;
        assert!(matches!(
            reader.reset(),
            Err(crate::Error::DeltaError(DeltaError::Closed))
        ));
        Ok(())
    }

    #[test]
    fn test_reset_needs_rewindable_original() -> Result<()> {
        let (payload, digest) = write_delta(&processed())?;
        let original = crate::source::StreamSource::new(Cursor::new(ORIGINAL));
        let mut reader =
            DeltaReader::new(source(payload), original, digest, FieldDiffCodec::default()).reusable(true);
        reader.by_ref().collect::<Result<Vec<_>>>()?;
        assert!(matches!(
            reader.reset(),
            Err(crate::Error::SourceError(SourceError::NotRewindable))
        ));
        Ok(())
    }

    #[test]
    fn test_truncated_payload() -> Result<()> {
        let (payload, digest) = write_delta(&processed())?;
        let truncated: String = payload.lines().take(2).map(|l| format!("{l}\n")).collect();
        let items: Vec<_> = reader(&truncated, digest).collect();
        assert!(matches!(
            items.last(),
            Some(Err(crate::Error::DeltaError(DeltaError::TruncatedRecord(2))))
        ));
        Ok(())
    }

    #[test]
    fn test_dangling_markers_are_truncated() {
        for payload in ["=2\n=4\n=1\n=4\n^\n\n", "!2\t4\t1\t4\n\n", "!2\t4\t1\t4\n^\n"] {
            let items: Vec<_> = reader(payload, [0; 16]).collect();
            assert!(
                matches!(
                    items.last(),
                    Some(Err(crate::Error::DeltaError(DeltaError::TruncatedRecord(0))))
                ),
                "{payload:?} should be truncated"
            );
        }
    }

    #[test]
    fn test_skip_inside_record_is_malformed() {
        let payload = "=2\n!2\t4\t1\t4\n";
        let items: Vec<_> = reader(payload, [0; 16]).collect();
        assert!(matches!(
            items.as_slice(),
            [Err(crate::Error::DeltaError(DeltaError::UnexpectedSkip(2)))]
        ));
    }

    #[test]
    fn test_payload_against_wrong_original_is_malformed() -> Result<()> {
        let (payload, digest) = write_delta(&processed())?;
        let mut reader = DeltaReader::new(
            source(payload),
            source("@zz\nA\n+\nI\n"),
            digest,
            FieldDiffCodec::default(),
        );
        assert!(matches!(
            reader.next(),
            Some(Err(crate::Error::DeltaError(DeltaError::LengthMismatch { .. })))
        ));
        assert_eq!(reader.state(), ReaderState::Closed);
        Ok(())
    }
}
