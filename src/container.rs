//! Zip container holding a delta payload and its checksum
//!
//! A container has two logical entries:
//!
//! 1. the payload, named after the delta (e.g. `sample.trimmed.fastq` inside
//!    `sample.trimmed.fastq.zip`)
//! 2. [`CHECKSUM_ENTRY`], holding the 16 raw bytes of the MD5 digest
//!
//! Containers produced by other tools may name the payload differently, so the payload is
//! resolved in order: the entry named after the container's base name, else the first
//! entry whose name contains `delta`, else the first entry that is not the checksum.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::checksum::{digest_from_slice, to_hex, Digest};
use crate::error::{ChecksumError, ContainerError, Result};
use crate::source::{LineSource, SeekableSource};

/// Name of the checksum entry
pub const CHECKSUM_ENTRY: &str = "md5_checksum";

/// Extension of container files
pub const CONTAINER_EXTENSION: &str = "zip";

/// Substring identifying a payload entry when no entry matches the container name
const PAYLOAD_HINT: &str = "delta";

/// Derives the container path and payload entry name from a requested delta name
///
/// A trailing `.zip` is ignored, the payload entry is the bare file name and the container
/// is the delta name with `.zip` appended.
pub fn delta_paths<P: AsRef<Path>>(name: P) -> Result<(PathBuf, String)> {
    let name = name.as_ref();
    let stem = if name
        .extension()
        .is_some_and(|ext| ext == CONTAINER_EXTENSION)
    {
        name.with_extension("")
    } else {
        name.to_path_buf()
    };
    let Some(entry) = stem.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return Err(ContainerError::InvalidName(name.display().to_string()).into());
    };
    let mut container = stem.into_os_string();
    container.push(".");
    container.push(CONTAINER_EXTENSION);
    Ok((PathBuf::from(container), entry))
}

/// The base name of a container: its file name without the last extension
pub fn base_name<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .ok_or_else(|| ContainerError::InvalidName(path.display().to_string()).into())
}

/// Seals a payload and its digest into a new container written to `inner`
pub fn seal<W: Write + Seek, R: Read>(
    inner: W,
    payload_name: &str,
    payload: &mut R,
    digest: &Digest,
) -> Result<W> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(inner);
    zip.start_file(payload_name, options)?;
    let bytes = io::copy(payload, &mut zip)?;
    zip.start_file(CHECKSUM_ENTRY, options)?;
    zip.write_all(digest)?;
    let inner = zip.finish()?;
    debug!(
        "Sealed {payload_name} ({bytes} bytes) with checksum {}",
        to_hex(digest)
    );
    Ok(inner)
}

/// Picks the payload entry among the entry names of a container
///
/// `names` must not contain the checksum entry.
pub fn resolve_payload<'a>(names: &'a [String], base_name: &str) -> Option<&'a str> {
    names
        .iter()
        .find(|name| *name == base_name)
        .or_else(|| names.iter().find(|name| name.contains(PAYLOAD_HINT)))
        .or_else(|| names.first())
        .map(String::as_str)
}

/// An opened container whose checksum entry has been validated
pub struct Container<R: Read + Seek> {
    archive: ZipArchive<R>,
    checksum: Digest,
    payload: String,
}
impl Container<BufReader<File>> {
    /// Opens the container at `path`, naming it after the file's base name
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = base_name(path)?;
        let file = File::open(path)?;
        let container = Self::open(BufReader::new(file), &name)?;
        info!("Opened {} (payload entry {})", path.display(), container.payload_name());
        Ok(container)
    }
}
impl<R: Read + Seek> Container<R> {
    /// Opens a container, rejecting it when the checksum entry is missing
    ///
    /// # Arguments
    ///
    /// * `reader` - The raw container bytes
    /// * `base_name` - The container's own name, used to resolve the payload entry
    pub fn open(reader: R, base_name: &str) -> Result<Self> {
        let mut archive = ZipArchive::new(reader)?;
        let mut names = Vec::with_capacity(archive.len());
        for idx in 0..archive.len() {
            names.push(archive.by_index(idx)?.name().to_string());
        }

        let Some(checksum_idx) = names.iter().position(|name| name == CHECKSUM_ENTRY) else {
            return Err(ChecksumError::Missing.into());
        };
        let mut raw = Vec::new();
        archive.by_index(checksum_idx)?.read_to_end(&mut raw)?;
        let checksum = digest_from_slice(&raw)?;

        names.remove(checksum_idx);
        let Some(payload) = resolve_payload(&names, base_name) else {
            return Err(ContainerError::MissingPayload.into());
        };
        let payload = payload.to_string();

        Ok(Self {
            archive,
            checksum,
            payload,
        })
    }

    /// The stored digest
    pub fn checksum(&self) -> Digest {
        self.checksum
    }

    /// Name of the resolved payload entry
    pub fn payload_name(&self) -> &str {
        &self.payload
    }

    /// Reads the whole payload into memory
    pub fn read_payload(&mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.archive.by_name(&self.payload)?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Decodes the payload into a temporary file
    ///
    /// # Arguments
    ///
    /// * `dir` - Directory receiving the temporary file, defaults to the system temp dir
    pub fn extract_payload(&mut self, dir: Option<&Path>) -> Result<TempPayload> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(".fqdelta-").suffix(".delta");
        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        {
            let mut entry = self.archive.by_name(&self.payload)?;
            io::copy(&mut entry, &mut file)?;
        }
        file.flush()?;
        TempPayload::new(file)
    }
}

/// A decoded payload stored in a temporary file
///
/// The file is removed when the payload is closed or dropped, whichever happens first.
pub struct TempPayload {
    file: Option<NamedTempFile>,
    source: SeekableSource<BufReader<File>>,
}
impl TempPayload {
    fn new(file: NamedTempFile) -> Result<Self> {
        let handle = file.reopen()?;
        Ok(Self {
            file: Some(file),
            source: SeekableSource::new(BufReader::new(handle)),
        })
    }

    /// Path of the temporary file while it exists
    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(NamedTempFile::path)
    }
}
impl LineSource for TempPayload {
    fn read_line(&mut self, buf: &mut String) -> Result<bool> {
        if self.file.is_none() {
            return Ok(false);
        }
        self.source.read_line(buf)
    }

    fn is_rewindable(&self) -> bool {
        self.file.is_some()
    }

    fn rewind(&mut self) -> Result<()> {
        self.source.rewind()
    }

    fn close(&mut self) -> Result<()> {
        if let Some(file) = self.file.take() {
            let path = file.path().to_path_buf();
            if let Err(e) = file.close() {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("Unable to remove {}: {e}", path.display());
                }
            }
        }
        Ok(())
    }
}
