/// Custom Result type for fqdelta operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the fqdelta library, encompassing all possible error cases
/// that can occur while creating or replaying a delta.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    /// Ambiguous or invalid input configuration
    InputError(#[from] InputError),
    /// Missing or mismatching checksums
    ChecksumError(#[from] ChecksumError),
    /// Delta tokens that cannot be parsed or replayed
    DeltaError(#[from] DeltaError),
    /// Errors related to the archive container
    ContainerError(#[from] ContainerError),
    /// Errors raised by line sources
    SourceError(#[from] SourceError),
    /// Standard I/O errors from the Rust standard library
    IoError(#[from] std::io::Error),
    /// Errors from the zip archive library
    ZipError(#[from] zip::result::ZipError),
    /// Generic errors that can occur in any part of the system
    AnyhowError(#[from] anyhow::Error),
}
impl Error {
    /// Whether the error is a checksum mismatch detected at the end of a rebuild
    #[must_use]
    pub fn is_checksum_mismatch(&self) -> bool {
        matches!(self, Self::ChecksumError(ChecksumError::Mismatch { .. }))
    }

    /// Whether the error is a container without checksum entry
    #[must_use]
    pub fn is_missing_checksum(&self) -> bool {
        matches!(self, Self::ChecksumError(ChecksumError::Missing))
    }
}

/// Errors raised before any I/O when the inputs are configured ambiguously
#[derive(thiserror::Error, Debug)]
pub enum InputError {
    /// Both the original and the processed input are bound to standard input
    #[error("Only one of the input files can be read from stdin")]
    BothStdin,

    /// No delta name was provided and none could be derived from the inputs
    #[error("Unable to derive a delta name, please provide one explicitly")]
    MissingDeltaName,
}

/// Errors concerning the integrity digest of a delta
#[derive(thiserror::Error, Debug)]
pub enum ChecksumError {
    /// The container does not hold a checksum entry
    #[error("No checksum found in container")]
    Missing,

    /// The stored checksum entry has an unexpected size
    ///
    /// # Arguments
    /// * `usize` - The number of bytes found in the checksum entry
    #[error("Checksum entry holds {0} bytes, expected 16")]
    InvalidLength(usize),

    /// The digest of the reconstructed records differs from the stored digest
    #[error("Checksum did not match: expected {expected}, got {actual}")]
    Mismatch { expected: String, actual: String },
}

/// Errors raised while parsing or replaying delta tokens
#[derive(thiserror::Error, Debug)]
pub enum DeltaError {
    /// A token line could not be parsed
    ///
    /// # Fields
    /// * `line` - The 1-based line number within the delta payload
    /// * `reason` - What made the token unparsable
    #[error("Malformed delta token at line {line}: {reason}")]
    MalformedToken { line: usize, reason: String },

    /// An edit script does not fit the original line it is applied to
    ///
    /// # Fields
    /// * `expected` - The number of characters the edit script consumes
    /// * `got` - The number of characters in the original line
    #[error("Edit script consumes {expected} characters but the original line has {got}")]
    LengthMismatch { expected: usize, got: usize },

    /// An edit script could not be decoded
    ///
    /// # Arguments
    /// * `String` - Description of the failing operation
    #[error("Invalid edit script: {0}")]
    InvalidScript(String),

    /// A skip token was found where a field token was required
    ///
    /// # Arguments
    /// * `usize` - The 1-based line number within the delta payload
    #[error("Unexpected skip marker inside a record at line {0}")]
    UnexpectedSkip(usize),

    /// The delta payload ended in the middle of a record
    ///
    /// # Arguments
    /// * `usize` - The number of field tokens read for the incomplete record
    #[error("Delta ended after {0} of 4 field tokens")]
    TruncatedRecord(usize),

    /// A skip token requested an original record that does not exist
    #[error("Skip marker beyond the end of the original input")]
    SkipPastEnd,

    /// The original record discarded by a skip token does not have the recorded lengths,
    /// meaning the delta was created against a different original
    #[error("Skipped original record has field lengths {got:?}, delta expects {expected:?}")]
    SkipMismatch {
        expected: [usize; 4],
        got: [usize; 4],
    },

    /// The original input ended in the middle of a record
    ///
    /// # Arguments
    /// * `usize` - The number of lines of the incomplete record
    #[error("Original input ended after {0} of 4 record lines")]
    PartialRecord(usize),

    /// A reader was used after being closed
    #[error("Delta reader has been closed")]
    Closed,
}

/// Errors related to the zip container holding a delta
#[derive(thiserror::Error, Debug)]
pub enum ContainerError {
    /// The container holds no entry besides the checksum
    #[error("Container holds no delta payload")]
    MissingPayload,

    /// The container path has no usable file name
    ///
    /// # Arguments
    /// * `String` - The offending path
    #[error("Container path has no file name: {0}")]
    InvalidName(String),
}

/// Errors raised by line sources
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    /// A reset was requested on a source that cannot seek back to its start
    #[error("Source cannot be rewound")]
    NotRewindable,

    /// The source produced bytes that are not valid UTF-8
    ///
    /// # Arguments
    /// * `usize` - The 1-based line number of the offending line
    #[error("Invalid UTF-8 in line {0}")]
    InvalidUtf8(usize),

    /// The external decompression process could not be started
    ///
    /// # Arguments
    /// * `String` - The command that failed to spawn
    #[error("Unable to start decompression command: {0}")]
    SpawnFailed(String),

    /// Errors from the niffler decompression library
    #[error(transparent)]
    Niffler(#[from] niffler::Error),
}
