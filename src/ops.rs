//! Creating and rebuilding deltas
//!
//! [`create`] drives the aligner, the codec and the checksum over a processed input and
//! seals the result into a container. [`open_delta`] opens a container and returns a lazy
//! [`DeltaReader`] over the reconstructed records; [`rebuild`] drains one into a writer.
//!
//! The `*_files` variants work on paths and standard streams, as used by the command line.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::checksum::{to_hex, Digest};
use crate::codec::FieldDiffCodec;
use crate::config::DeltaConfig;
use crate::container::{self, Container, TempPayload};
use crate::delta::{DeltaReader, DeltaStats, DeltaWriter};
use crate::error::{DeltaError, Error, InputError, Result};
use crate::record::RecordReader;
use crate::source::{self, LineSource};

/// Name standing for standard input on the command line
pub const STDIN_NAME: &str = "-";

/// Exit code of a rebuild whose checksum did not match
pub const EXIT_MISMATCH: u8 = 1;
/// Exit code of a rebuild from a container without checksum
pub const EXIT_MISSING_CHECKSUM: u8 = 2;
pub const EXIT_FAILURE: u8 = 3;

/// Suffix given to the output of a rebuild that failed its checksum
pub const CORRUPT_SUFFIX: &str = "corrupt";

/// Where an original or processed FASTQ is read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Stdin,
    Path(PathBuf),
}
impl Input {
    pub fn is_stdin(&self) -> bool {
        matches!(self, Self::Stdin)
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Stdin => None,
            Self::Path(path) => Some(path),
        }
    }

    /// Opens the input as a line source
    pub fn open(&self) -> Result<Box<dyn LineSource>> {
        match self {
            Self::Stdin => Ok(source::stdin()),
            Self::Path(path) => source::open_path(path),
        }
    }
}
impl From<PathBuf> for Input {
    fn from(path: PathBuf) -> Self {
        if path.as_os_str() == STDIN_NAME {
            Self::Stdin
        } else {
            Self::Path(path)
        }
    }
}

/// Rejects configurations where both inputs would read standard input
pub fn check_inputs(original: &Input, processed: &Input) -> Result<()> {
    if original.is_stdin() && processed.is_stdin() {
        return Err(InputError::BothStdin.into());
    }
    Ok(())
}

/// Writes every byte to both inner writers
struct Tee<A: Write, B: Write>(A, B);
impl<A: Write, B: Write> Write for Tee<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write_all(buf)?;
        self.1.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()?;
        self.1.flush()
    }
}

/// Creates the delta of `processed` against `original` and seals it into `out`
///
/// # Arguments
///
/// * `original` - The original FASTQ lines
/// * `processed` - The processed FASTQ lines
/// * `payload_name` - Name of the payload entry in the container
/// * `out` - Sink receiving the container
/// * `config` - Tuning of the codec and aligner
/// * `echo` - Optional writer receiving a copy of every processed record
pub fn create<S, P, W>(
    original: S,
    processed: P,
    payload_name: &str,
    out: W,
    config: &DeltaConfig,
    mut echo: Option<&mut dyn Write>,
) -> Result<(W, Digest, DeltaStats)>
where
    S: LineSource,
    P: LineSource,
    W: Write + Seek,
{
    let spool = match &config.temp_dir {
        Some(dir) => tempfile::tempfile_in(dir)?,
        None => tempfile::tempfile()?,
    };
    let mut writer = DeltaWriter::new(BufWriter::new(spool), original, config);

    let mut processed = RecordReader::new(processed);
    loop {
        let record = match processed.read_record() {
            Ok(Some(record)) => record,
            Ok(None) => break,
            Err(Error::DeltaError(DeltaError::PartialRecord(lines))) => {
                warn!("Ignoring incomplete trailing record ({lines} lines)");
                break;
            }
            Err(e) => return Err(e),
        };
        if record.id.is_empty() {
            break;
        }
        writer.write_record(&record)?;
        if let Some(echo) = echo.as_mut() {
            record.write_to(echo)?;
        }
    }
    if let Some(echo) = echo {
        echo.flush()?;
    }
    processed.close()?;

    let (spool, digest, stats) = writer.finish()?;
    let mut spool = spool.into_inner().map_err(io::IntoInnerError::into_error)?;
    spool.seek(SeekFrom::Start(0))?;
    let out = container::seal(out, payload_name, &mut spool, &digest)?;
    info!(
        "Created delta {payload_name}: {} records ({} inserted), {} skipped, checksum {}",
        stats.records,
        stats.inserted,
        stats.skipped,
        to_hex(&digest)
    );
    Ok((out, digest, stats))
}

/// Creates a delta container on disk
///
/// The container is named after `delta_name` (or the processed file when absent) with
/// `.zip` appended. A partially written container is removed on failure.
///
/// Returns the path of the container.
pub fn create_files(
    original: &Input,
    processed: &Input,
    delta_name: Option<&Path>,
    config: &DeltaConfig,
    echo: bool,
) -> Result<PathBuf> {
    check_inputs(original, processed)?;
    let name = match delta_name {
        Some(name) => name,
        None => processed.path().ok_or(InputError::MissingDeltaName)?,
    };
    let (container_path, entry) = container::delta_paths(name)?;

    let original = original.open()?;
    let processed = processed.open()?;
    let out = BufWriter::new(File::create(&container_path)?);

    let stdout = io::stdout();
    let mut stdout = stdout.lock();
    let echo: Option<&mut dyn Write> = if echo { Some(&mut stdout) } else { None };

    let outcome = create(original, processed, &entry, out, config, echo).and_then(|(out, _, _)| {
        out.into_inner()
            .map_err(io::IntoInnerError::into_error)?
            .sync_all()?;
        Ok(())
    });
    if let Err(e) = outcome {
        let _ = fs::remove_file(&container_path);
        return Err(e);
    }
    Ok(container_path)
}

/// Opens a container and prepares the replay of its payload against `original`
///
/// Fails before producing anything when the container lacks its checksum entry. The
/// payload is decoded into a temporary file that is removed when the reader is closed,
/// exhausted (unless reusable) or dropped.
pub fn open_delta<R, S>(
    container: R,
    base_name: &str,
    original: S,
    config: &DeltaConfig,
) -> Result<DeltaReader<TempPayload, S>>
where
    R: Read + Seek,
    S: LineSource,
{
    let container = Container::open(container, base_name)?;
    reader_from(container, original, config)
}

/// Like [`open_delta`], for a container on disk
pub fn open_delta_path<P, S>(
    path: P,
    original: S,
    config: &DeltaConfig,
) -> Result<DeltaReader<TempPayload, S>>
where
    P: AsRef<Path>,
    S: LineSource,
{
    let container = Container::open_path(path)?;
    reader_from(container, original, config)
}

fn reader_from<R, S>(
    mut container: Container<R>,
    original: S,
    config: &DeltaConfig,
) -> Result<DeltaReader<TempPayload, S>>
where
    R: Read + Seek,
    S: LineSource,
{
    let payload = container.extract_payload(config.temp_dir.as_deref())?;
    Ok(DeltaReader::new(
        payload,
        original,
        container.checksum(),
        FieldDiffCodec::new(config.diff),
    ))
}

/// Rebuilds the processed records of a container into `out`
///
/// On a checksum mismatch the full output has been written and flushed before the error
/// is returned.
///
/// Returns the number of records written.
pub fn rebuild<R, S, W>(
    container: R,
    base_name: &str,
    original: S,
    out: &mut W,
    config: &DeltaConfig,
) -> Result<u64>
where
    R: Read + Seek,
    S: LineSource,
    W: Write,
{
    let mut reader = open_delta(container, base_name, original, config)?;
    reader.write_records(out)
}

/// Rebuilds a container on disk into `output` (standard output when absent)
///
/// The output file is only created once the container has been validated. With `echo`,
/// records are also copied to standard output. A failed rebuild leaves no output file
/// behind, except on a checksum mismatch where it is quarantined (see [`discard_output`]).
pub fn rebuild_files(
    container_path: &Path,
    original: &Input,
    output: Option<&Path>,
    config: &DeltaConfig,
    echo: bool,
) -> Result<u64> {
    let original = original.open()?;
    let mut reader = open_delta_path(container_path, original, config)?;

    let stdout = io::stdout();
    let written = match output {
        None => reader.write_records(&mut BufWriter::new(stdout.lock()))?,
        Some(path) => {
            let mut file = BufWriter::new(File::create(path)?);
            let outcome = if echo {
                reader.write_records(&mut Tee(file, BufWriter::new(stdout.lock())))
            } else {
                reader.write_records(&mut file)
            };
            match outcome {
                Ok(written) => written,
                Err(e) => {
                    discard_output(&e, path);
                    return Err(e);
                }
            }
        }
    };
    info!("Rebuilt {written} records from {}", container_path.display());
    Ok(written)
}

/// Path under which the output of a rebuild with a mismatching checksum is kept
pub fn corrupt_path(output: &Path) -> PathBuf {
    let mut corrupt = output.as_os_str().to_os_string();
    corrupt.push(".");
    corrupt.push(CORRUPT_SUFFIX);
    PathBuf::from(corrupt)
}

/// Quarantines or removes the output file of a failed rebuild
///
/// On a checksum mismatch the output is renamed to [`corrupt_path`], which is returned.
/// Any other error removes it.
pub fn discard_output(e: &Error, output: &Path) -> Option<PathBuf> {
    if !output.exists() {
        return None;
    }
    if e.is_checksum_mismatch() {
        let corrupt = corrupt_path(output);
        match fs::rename(output, &corrupt) {
            Ok(()) => {
                warn!("Output moved to {}", corrupt.display());
                return Some(corrupt);
            }
            Err(err) => warn!("Unable to rename {}: {err}", output.display()),
        }
    } else if let Err(err) = fs::remove_file(output) {
        warn!("Unable to remove {}: {err}", output.display());
    }
    None
}

/// Process exit code reporting `e`
///
/// * [`EXIT_MISMATCH`] - the rebuilt records do not match the stored checksum
/// * [`EXIT_MISSING_CHECKSUM`] - the container has no checksum entry
/// * [`EXIT_FAILURE`] - anything else
#[must_use]
pub fn exit_code(e: &Error) -> u8 {
    if e.is_checksum_mismatch() {
        EXIT_MISMATCH
    } else if e.is_missing_checksum() {
        EXIT_MISSING_CHECKSUM
    } else {
        EXIT_FAILURE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SeekableSource;
    use std::io::Cursor;

    const ORIGINAL: &str = "@a\nACGT\n+\nIIII\n@b\nGGCC\n+\n####\n";

    fn source(data: &str) -> SeekableSource<Cursor<String>> {
        SeekableSource::new(Cursor::new(data.to_string()))
    }

    #[test]
    fn test_both_stdin_is_rejected() {
        let err = check_inputs(&Input::Stdin, &Input::Stdin).unwrap_err();
        assert!(matches!(err, Error::InputError(InputError::BothStdin)));
        assert!(check_inputs(&Input::Stdin, &Input::Path("p.fq".into())).is_ok());
    }

    #[test]
    fn test_input_from_dash() {
        assert_eq!(Input::from(PathBuf::from("-")), Input::Stdin);
        assert_eq!(
            Input::from(PathBuf::from("reads.fq")),
            Input::Path(PathBuf::from("reads.fq"))
        );
    }

    #[test]
    fn test_create_then_rebuild_in_memory() -> Result<()> {
        let processed = "@a\nACG\n+\nIII\n@b\nGGCC\n+\n####\n";
        let mut echoed = Vec::new();
        let (sealed, digest, stats) = create(
            source(ORIGINAL),
            source(processed),
            "reads",
            Cursor::new(Vec::new()),
            &DeltaConfig::default(),
            Some(&mut echoed),
        )?;
        assert_eq!(stats.records, 2);
        assert_eq!(echoed, processed.as_bytes());

        let mut out = Vec::new();
        let written = rebuild(
            Cursor::new(sealed.into_inner()),
            "reads",
            source(ORIGINAL),
            &mut out,
            &DeltaConfig::default(),
        )?;
        assert_eq!(written, 2);
        assert_eq!(out, processed.as_bytes());
        Ok(())
    }

    #[test]
    fn test_open_delta_reads_stored_digest() -> Result<()> {
        let processed = "@b\nGGCC\n+\n####\n";
        let (sealed, digest, stats) = create(
            source(ORIGINAL),
            source(processed),
            "reads",
            Cursor::new(Vec::new()),
            &DeltaConfig::default(),
            None,
        )?;
        assert_eq!(stats.skipped, 1);

        let mut reader = open_delta(
            Cursor::new(sealed.into_inner()),
            "reads",
            source(ORIGINAL),
            &DeltaConfig::default(),
        )?;
        assert_eq!(reader.expected_digest(), digest);
        let record = reader.next().unwrap()?;
        assert_eq!(record.id, "@b");
        assert!(reader.next().is_none());
        assert_eq!(reader.digest(), digest);
        Ok(())
    }

    #[test]
    fn test_create_files_default_name() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let original = dir.path().join("reads.fastq");
        let processed = dir.path().join("reads.trimmed.fastq");
        fs::write(&original, ORIGINAL)?;
        fs::write(&processed, "@b\nGGC\n+\n###\n")?;

        let container = create_files(
            &Input::Path(original.clone()),
            &Input::Path(processed.clone()),
            None,
            &DeltaConfig::default(),
            false,
        )?;
        assert_eq!(container, dir.path().join("reads.trimmed.fastq.zip"));

        let output = dir.path().join("rebuilt.fastq");
        rebuild_files(
            &container,
            &Input::Path(original),
            Some(&output),
            &DeltaConfig::default(),
            false,
        )?;
        assert_eq!(fs::read(&output)?, fs::read(&processed)?);
        Ok(())
    }

    #[test]
    fn test_create_files_needs_a_name() {
        let err = create_files(
            &Input::Path("reads.fastq".into()),
            &Input::Stdin,
            None,
            &DeltaConfig::default(),
            false,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InputError(InputError::MissingDeltaName)));
    }

    fn write_container(dir: &Path, original: &Path, processed: &str) -> Result<PathBuf> {
        let processed_path = dir.join("reads.trimmed.fastq");
        fs::write(&processed_path, processed)?;
        create_files(
            &Input::Path(original.to_path_buf()),
            &Input::Path(processed_path),
            None,
            &DeltaConfig::default(),
            false,
        )
    }

    #[test]
    fn test_exit_codes() {
        use crate::error::ChecksumError;
        let mismatch = Error::from(ChecksumError::Mismatch {
            expected: "00".into(),
            actual: "11".into(),
        });
        assert_eq!(exit_code(&mismatch), EXIT_MISMATCH);
        assert_eq!(exit_code(&ChecksumError::Missing.into()), EXIT_MISSING_CHECKSUM);
        assert_eq!(exit_code(&DeltaError::SkipPastEnd.into()), EXIT_FAILURE);
        assert_eq!(exit_code(&InputError::BothStdin.into()), EXIT_FAILURE);
    }

    #[test]
    fn test_mismatching_output_is_quarantined() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let original = dir.path().join("reads.fastq");
        fs::write(&original, ORIGINAL)?;
        let container = write_container(dir.path(), &original, "@a\nACG\n+\nIII\n@b\nGGCC\n+\n####\n")?;

        // same shape, different quality
        fs::write(&original, "@a\nACGT\n+\nIIII\n@b\nGGCC\n+\n###$\n")?;
        let output = dir.path().join("rebuilt.fastq");
        let err = rebuild_files(
            &container,
            &Input::Path(original),
            Some(&output),
            &DeltaConfig::default(),
            false,
        )
        .unwrap_err();
        assert_eq!(exit_code(&err), EXIT_MISMATCH);
        assert!(!output.exists());
        let corrupt = corrupt_path(&output);
        assert_eq!(corrupt, dir.path().join("rebuilt.fastq.corrupt"));
        assert_eq!(fs::read(&corrupt)?, b"@a\nACG\n+\nIII\n@b\nGGCC\n+\n###$\n");
        Ok(())
    }

    #[test]
    fn test_malformed_replay_removes_output() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let original = dir.path().join("reads.fastq");
        fs::write(&original, ORIGINAL)?;
        let container = write_container(dir.path(), &original, "@a\nACG\n+\nIII\n")?;

        fs::write(&original, "@zz\nA\n+\nI\n")?;
        let output = dir.path().join("rebuilt.fastq");
        let err = rebuild_files(
            &container,
            &Input::Path(original),
            Some(&output),
            &DeltaConfig::default(),
            false,
        )
        .unwrap_err();
        assert_eq!(exit_code(&err), EXIT_FAILURE);
        assert!(!output.exists());
        assert!(!corrupt_path(&output).exists());
        Ok(())
    }

    #[test]
    fn test_discard_output_keeps_missing_files_untouched() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("never-written.fastq");
        let err = Error::from(crate::error::ChecksumError::Mismatch {
            expected: String::new(),
            actual: String::new(),
        });
        assert_eq!(discard_output(&err, &output), None);
        assert!(!corrupt_path(&output).exists());
        Ok(())
    }

    #[test]
    fn test_gzip_original_roundtrip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let original = dir.path().join("reads.fastq.gz");
        {
            let mut writer = niffler::to_path(&original, niffler::Format::Gzip, niffler::Level::Six)
                .map_err(crate::error::SourceError::from)?;
            writer.write_all(ORIGINAL.as_bytes())?;
        }
        let processed = "@b\nGGC\n+\n###\n";
        let container = write_container(dir.path(), &original, processed)?;

        let output = dir.path().join("rebuilt.fastq");
        let written = rebuild_files(
            &container,
            &Input::Path(original),
            Some(&output),
            &DeltaConfig::default(),
            false,
        )?;
        assert_eq!(written, 1);
        assert_eq!(fs::read_to_string(&output)?, processed);
        Ok(())
    }
}
