//! # delta
//!
//! Sequential encoder and decoder of the delta payload: a flat sequence of lines, each a
//! skip marker, an insert marker or a field edit script, terminated by a blank line.
//!
//! ## Payload format
//!
//! | Line                 | Token                                                        |
//! | -------------------- | ------------------------------------------------------------ |
//! | `!L1\tL2\tL3\tL4`    | skip one original record with these field lengths (bytes)    |
//! | `^`                  | the next record has no original counterpart                  |
//! | edit script          | one field of the current record (see [`crate::codec`])       |
//! | blank line           | end of stream                                                |
//!
//! Every processed record is encoded as zero or more skip markers, an optional insert
//! marker, then exactly four edit scripts (identifier, sequence, comment, quality).
//!
//! ## Example
//!
//! ```
//! use fqdelta::{DeltaConfig, DeltaReader, DeltaWriter, FieldDiffCodec, Record, SeekableSource};
//! use std::io::Cursor;
//!
//! # fn main() -> fqdelta::Result<()> {
//! let original = "@r1\nNACGT\n+\n#IIII\n@r2\nGGGG\n+\nIIII\n";
//!
//! // record the processed version against the original
//! let source = SeekableSource::new(Cursor::new(original));
//! let mut writer = DeltaWriter::new(Vec::new(), source, &DeltaConfig::default());
//! writer.write_record(&Record::new("@r1", "ACGT", "+", "IIII"))?;
//! let (payload, digest, _stats) = writer.finish()?;
//!
//! // replay it
//! let reader = DeltaReader::new(
//!     SeekableSource::new(Cursor::new(payload)),
//!     SeekableSource::new(Cursor::new(original)),
//!     digest,
//!     FieldDiffCodec::default(),
//! );
//! let records = reader.collect::<fqdelta::Result<Vec<_>>>()?;
//! assert_eq!(records, vec![Record::new("@r1", "ACGT", "+", "IIII")]);
//! # Ok(())
//! # }
//! ```

mod reader;
mod token;
mod writer;

pub use reader::{DeltaReader, ReaderState};
pub use token::{DeltaToken, INSERT_SENTINEL, SKIP_SENTINEL};
pub use writer::{DeltaStats, DeltaWriter};
