//! Running integrity digest over processed records
//!
//! Both the writer and the reader feed every processed field (identifier, sequence,
//! comment, quality, without line terminators) into the same MD5 state, so a replayed
//! delta can be verified against the digest sealed in its container.

use md5::{Digest as _, Md5};

use crate::error::{ChecksumError, Result};
use crate::record::Record;

/// Size of the digest in bytes
pub const DIGEST_SIZE: usize = 16;

/// A finalized MD5 digest
pub type Digest = [u8; DIGEST_SIZE];

/// Formats a digest as a lowercase hex string
#[must_use]
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Parses the raw bytes of a checksum entry
pub fn digest_from_slice(bytes: &[u8]) -> Result<Digest> {
    let Ok(digest) = bytes.try_into() else {
        return Err(ChecksumError::InvalidLength(bytes.len()).into());
    };
    Ok(digest)
}

/// Incremental digest accumulated over processed record fields
#[derive(Clone, Default)]
pub struct ChecksumTracker {
    hasher: Md5,
    /// Number of fields accumulated since the last reset
    fields: u64,
}
impl ChecksumTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one field into the digest
    pub fn update(&mut self, field: &[u8]) {
        self.hasher.update(field);
        self.fields += 1;
    }

    /// Feeds the four fields of a record into the digest, in record order
    pub fn update_record(&mut self, record: &Record) {
        for field in record.fields() {
            self.update(field.as_bytes());
        }
    }

    /// Returns the digest of everything accumulated so far.
    ///
    /// The tracker keeps accumulating afterwards.
    #[must_use]
    pub fn finalize(&self) -> Digest {
        let mut digest = [0u8; DIGEST_SIZE];
        digest.copy_from_slice(&self.hasher.clone().finalize());
        digest
    }

    /// Clears all accumulated state
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Number of fields accumulated since the last reset
    #[must_use]
    pub fn fields(&self) -> u64 {
        self.fields
    }

    /// Whether the accumulated digest equals `expected`
    #[must_use]
    pub fn verify(&self, expected: &[u8]) -> bool {
        self.finalize().as_slice() == expected
    }

    /// Like [`ChecksumTracker::verify`], reporting a mismatch as [`ChecksumError::Mismatch`]
    pub fn check(&self, expected: &[u8]) -> Result<()> {
        let actual = self.finalize();
        if actual.as_slice() == expected {
            Ok(())
        } else {
            Err(ChecksumError::Mismatch {
                expected: to_hex(expected),
                actual: to_hex(&actual),
            }
            .into())
        }
    }
}
