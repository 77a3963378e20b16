//! # fqdelta
//!
//! Stores a processed FASTQ file (trimmed, filtered, renamed...) as a compact delta against
//! its original, and rebuilds the processed records from the original and the delta.
//!
//! A delta is a zip container holding two entries: the payload, a line-oriented stream of
//! per-field edit scripts interleaved with skip and insert markers (see [`delta`]), and the
//! MD5 digest of the processed records, checked when the delta is replayed.
//!
//! ## Example
//!
//! ```
//! use fqdelta::{ops, DeltaConfig, SeekableSource};
//! use std::io::Cursor;
//!
//! # fn main() -> fqdelta::Result<()> {
//! let original = "@r1\nACGTN\n+\nIIII#\n@r2\nGGGG\n+\nIIII\n";
//! let processed = "@r2\nGGG\n+\nIII\n";
//! let config = DeltaConfig::default();
//!
//! let (container, _digest, stats) = ops::create(
//!     SeekableSource::new(Cursor::new(original)),
//!     SeekableSource::new(Cursor::new(processed)),
//!     "trimmed.fastq",
//!     Cursor::new(Vec::new()),
//!     &config,
//!     None,
//! )?;
//! assert_eq!(stats.skipped, 1);
//!
//! let mut rebuilt = Vec::new();
//! ops::rebuild(
//!     Cursor::new(container.into_inner()),
//!     "trimmed.fastq",
//!     SeekableSource::new(Cursor::new(original)),
//!     &mut rebuilt,
//!     &config,
//! )?;
//! assert_eq!(rebuilt, processed.as_bytes());
//! # Ok(())
//! # }
//! ```

pub mod align;
pub mod checksum;
pub mod codec;
pub mod config;
pub mod container;
pub mod delta;
mod error;
pub mod ops;
pub mod record;
pub mod source;

pub use align::{Alignment, OriginalCursor, RecordAligner};
pub use checksum::{ChecksumTracker, Digest};
pub use codec::{Edit, EditScript, FieldDiffCodec};
pub use config::{DeltaConfig, DeltaConfigBuilder, DiffConfig, DiffConfigBuilder};
pub use container::{Container, TempPayload};
pub use delta::{DeltaReader, DeltaStats, DeltaToken, DeltaWriter, ReaderState};
pub use error::{
    ChecksumError, ContainerError, DeltaError, Error, InputError, Result, SourceError,
};
pub use ops::Input;
pub use record::{Record, RecordReader};
pub use source::{LineSource, SeekableSource, StreamSource};
