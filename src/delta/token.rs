use std::io::Write;

use crate::error::{DeltaError, Result};
use crate::record::RECORD_LINES;

/// Leading character of a skip marker line
pub const SKIP_SENTINEL: char = '!';

/// Line marking the next record as inserted
pub const INSERT_SENTINEL: &str = "^";

/// Separator between the lengths of a skip marker
const LENGTH_SEPARATOR: char = '\t';

/// A single line of a delta payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaToken {
    /// Discard one original record whose fields had the given byte lengths
    Skip([usize; RECORD_LINES]),
    /// The next record is aligned against an empty original and consumes no original record
    Insert,
    /// Edit script turning one original field into the processed field
    Field(String),
}
impl DeltaToken {
    /// Parses one payload line.
    ///
    /// Returns `Ok(None)` for the blank end-of-stream line. `line_no` is only used for error
    /// reporting.
    pub fn parse(line: &str, line_no: usize) -> Result<Option<Self>> {
        if line.is_empty() {
            return Ok(None);
        }
        if line == INSERT_SENTINEL {
            return Ok(Some(Self::Insert));
        }
        let Some(lengths) = line.strip_prefix(SKIP_SENTINEL) else {
            return Ok(Some(Self::Field(line.to_string())));
        };

        let malformed = |reason: String| DeltaError::MalformedToken {
            line: line_no,
            reason,
        };
        let mut parsed = [0usize; RECORD_LINES];
        let mut parts = lengths.split(LENGTH_SEPARATOR);
        for slot in &mut parsed {
            let part = parts
                .next()
                .ok_or_else(|| malformed(format!("skip marker needs {RECORD_LINES} lengths")))?;
            *slot = part
                .parse()
                .map_err(|_| malformed(format!("invalid skip length '{part}'")))?;
        }
        if parts.next().is_some() {
            return Err(malformed(format!("skip marker has more than {RECORD_LINES} lengths")).into());
        }
        Ok(Some(Self::Skip(parsed)))
    }

    /// Writes the token as one newline-terminated line
    pub fn write_to<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            Self::Skip(lengths) => write_skip(writer, lengths),
            Self::Insert => write_insert(writer),
            Self::Field(script) => write_field(writer, script),
        }
    }
}

pub(crate) fn write_skip<W: Write>(writer: &mut W, lengths: &[usize; RECORD_LINES]) -> std::io::Result<()> {
    let mut ibuf = itoa::Buffer::new();
    let mut sep = [0u8; 4];
    writer.write_all(SKIP_SENTINEL.encode_utf8(&mut sep).as_bytes())?;
    for (idx, len) in lengths.iter().enumerate() {
        if idx > 0 {
            writer.write_all(LENGTH_SEPARATOR.encode_utf8(&mut sep).as_bytes())?;
        }
        writer.write_all(ibuf.format(*len).as_bytes())?;
    }
    writer.write_all(b"\n")
}

pub(crate) fn write_insert<W: Write>(writer: &mut W) -> std::io::Result<()> {
    writer.write_all(INSERT_SENTINEL.as_bytes())?;
    writer.write_all(b"\n")
}

pub(crate) fn write_field<W: Write>(writer: &mut W, script: &str) -> std::io::Result<()> {
    writer.write_all(script.as_bytes())?;
    writer.write_all(b"\n")
}

/// Writes the blank end-of-stream line
pub(crate) fn write_end<W: Write>(writer: &mut W) -> std::io::Result<()> {
    writer.write_all(b"\n")
}
