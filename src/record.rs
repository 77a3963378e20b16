use std::io::Write;

use memchr::memchr;

use crate::error::{DeltaError, Result};
use crate::source::LineSource;

/// Number of lines making up one FASTQ record
pub const RECORD_LINES: usize = 4;

/// Returns the match-relevant prefix of an identifier line
///
/// The key ends at the first horizontal tab. Identifiers without a tab are cut at their
/// first whitespace character instead.
#[must_use]
pub fn key(id: &str) -> &str {
    let end = memchr(b'\t', id.as_bytes())
        .or_else(|| id.find(char::is_whitespace))
        .unwrap_or(id.len());
    &id[..end]
}

/// A single FASTQ record, stored as its four terminator-stripped lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub seq: String,
    pub com: String,
    pub qual: String,
}
impl Record {
    pub fn new(
        id: impl Into<String>,
        seq: impl Into<String>,
        com: impl Into<String>,
        qual: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            seq: seq.into(),
            com: com.into(),
            qual: qual.into(),
        }
    }

    /// The identifier key used to align original and processed records
    #[must_use]
    pub fn key(&self) -> &str {
        key(&self.id)
    }

    /// The four fields in record order
    #[must_use]
    pub fn fields(&self) -> [&str; RECORD_LINES] {
        [&self.id, &self.seq, &self.com, &self.qual]
    }

    /// Byte lengths of the four fields in record order
    #[must_use]
    pub fn lengths(&self) -> [usize; RECORD_LINES] {
        self.fields().map(str::len)
    }

    /// Writes the record as four newline-terminated lines
    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        for field in self.fields() {
            writer.write_all(field.as_bytes())?;
            writer.write_all(b"\n")?;
        }
        Ok(())
    }
}
impl From<[String; RECORD_LINES]> for Record {
    fn from([id, seq, com, qual]: [String; RECORD_LINES]) -> Self {
        Self { id, seq, com, qual }
    }
}

/// Groups the lines of a [`LineSource`] into FASTQ records
pub struct RecordReader<S: LineSource> {
    source: S,
    buf: String,
}
impl<S: LineSource> RecordReader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            buf: String::with_capacity(512),
        }
    }

    /// Reads the next complete record.
    ///
    /// Returns `Ok(None)` at a clean end of input and [`DeltaError::PartialRecord`] when the
    /// input stops in the middle of a record.
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        let mut lines: [String; RECORD_LINES] = Default::default();
        for (idx, line) in lines.iter_mut().enumerate() {
            if !self.source.read_line(&mut self.buf)? {
                if idx == 0 {
                    return Ok(None);
                }
                return Err(DeltaError::PartialRecord(idx).into());
            }
            line.push_str(&self.buf);
        }
        Ok(Some(Record::from(lines)))
    }

    pub fn is_rewindable(&self) -> bool {
        self.source.is_rewindable()
    }

    pub fn rewind(&mut self) -> Result<()> {
        self.source.rewind()
    }

    pub fn close(&mut self) -> Result<()> {
        self.source.close()
    }

    pub fn into_inner(self) -> S {
        self.source
    }
}
impl<S: LineSource> Iterator for RecordReader<S> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SeekableSource;
    use std::io::Cursor;

    #[test]
    fn test_key_stops_at_tab() {
        assert_eq!(key("@read1\tlane=2"), "@read1");
        assert_eq!(key("@read1 1:N:0\textra"), "@read1 1:N:0");
    }

    #[test]
    fn test_key_stops_at_whitespace_without_tab() {
        assert_eq!(key("@read1 1:N:0"), "@read1");
        assert_eq!(key("@read1"), "@read1");
        assert_eq!(key(""), "");
    }

    #[test]
    fn test_read_records() -> Result<()> {
        let data = "@a\nACGT\n+\nIIII\n@b\nGG\n+\n##\n";
        let reader = RecordReader::new(SeekableSource::new(Cursor::new(data)));
        let records = reader.collect::<Result<Vec<_>>>()?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], Record::new("@b", "GG", "+", "##"));
        assert_eq!(records[0].lengths(), [2, 4, 1, 4]);
        Ok(())
    }

    #[test]
    fn test_partial_record_is_an_error() {
        let data = "@a\nACGT\n+\nIIII\n@b\nGG\n";
        let mut reader = RecordReader::new(SeekableSource::new(Cursor::new(data)));
        assert!(reader.read_record().unwrap().is_some());
        assert!(matches!(
            reader.read_record(),
            Err(crate::Error::DeltaError(DeltaError::PartialRecord(2)))
        ));
    }

    #[test]
    fn test_write_record() -> Result<()> {
        let mut out = Vec::new();
        Record::new("@a", "AC", "+", "II").write_to(&mut out)?;
        assert_eq!(out, b"@a\nAC\n+\nII\n");
        Ok(())
    }
}
