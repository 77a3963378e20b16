//! Line sources
//!
//! Everything the delta engine reads (the original FASTQ, the processed FASTQ and the
//! decoded delta payload) is consumed through the [`LineSource`] trait, one
//! terminator-stripped line at a time.
//!
//! Rewinding is a declared capability: a [`SeekableSource`] can be reset to its first line,
//! while a [`StreamSource`] (stdin, a decompression pipe) cannot and will refuse with
//! [`SourceError::NotRewindable`].

use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};

use auto_impl::auto_impl;
use tracing::debug;

use crate::error::{Result, SourceError};

/// Extension of Quip-compressed FASTQ files, decoded through the external `unquip` tool
pub const QUIP_EXTENSION: &str = "qp";

/// A line-oriented input
#[auto_impl(&mut, Box)]
pub trait LineSource {
    /// Reads the next line into `buf`, without its line terminator.
    ///
    /// Returns `Ok(false)` once the source is exhausted.
    fn read_line(&mut self, buf: &mut String) -> Result<bool>;

    /// Whether [`LineSource::rewind`] is supported
    fn is_rewindable(&self) -> bool {
        false
    }

    /// Moves the source back to its first line
    fn rewind(&mut self) -> Result<()> {
        Err(SourceError::NotRewindable.into())
    }

    /// Releases any resource held by the source.
    ///
    /// Closing twice is a no-op.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Strips a trailing `\n` or `\r\n` in place
pub fn trim_terminator(line: &mut String) {
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
}

/// Shared line reading logic for buffered readers
fn read_buffered<R: BufRead>(reader: &mut R, buf: &mut String, line_no: &mut usize) -> Result<bool> {
    buf.clear();
    match reader.read_line(buf) {
        Ok(0) => Ok(false),
        Ok(_) => {
            *line_no += 1;
            if buf.ends_with('\n') {
                trim_terminator(buf);
            } else if buf.ends_with('\r') {
                // unterminated last line of a CRLF file
                buf.pop();
            }
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            Err(SourceError::InvalidUtf8(*line_no + 1).into())
        }
        Err(e) => Err(e.into()),
    }
}

/// A forward-only source over any buffered reader
///
/// Used for standard input and decompression streams.
pub struct StreamSource<R: BufRead> {
    inner: R,
    line_no: usize,
}
impl<R: BufRead> StreamSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, line_no: 0 }
    }

    /// Number of lines read so far
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}
impl<R: BufRead> LineSource for StreamSource<R> {
    fn read_line(&mut self, buf: &mut String) -> Result<bool> {
        read_buffered(&mut self.inner, buf, &mut self.line_no)
    }
}

/// A rewindable source over a seekable buffered reader
pub struct SeekableSource<R: BufRead + Seek> {
    inner: R,
    line_no: usize,
}
impl SeekableSource<BufReader<File>> {
    /// Opens a plain file as a rewindable source
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}
impl<R: BufRead + Seek> SeekableSource<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, line_no: 0 }
    }

    /// Number of lines read since the last rewind
    pub fn line_no(&self) -> usize {
        self.line_no
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}
impl<R: BufRead + Seek> LineSource for SeekableSource<R> {
    fn read_line(&mut self, buf: &mut String) -> Result<bool> {
        read_buffered(&mut self.inner, buf, &mut self.line_no)
    }

    fn is_rewindable(&self) -> bool {
        true
    }

    fn rewind(&mut self) -> Result<()> {
        self.inner.seek(SeekFrom::Start(0))?;
        self.line_no = 0;
        Ok(())
    }
}

/// A source reading the standard output of an external decompression command
///
/// The child process is reaped when the source is closed or dropped.
pub struct ProcessSource {
    child: Option<Child>,
    stream: StreamSource<BufReader<ChildStdout>>,
}
impl ProcessSource {
    /// Spawns `program args...` and reads its standard output
    pub fn spawn(program: &str, args: &[&str]) -> Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|_| SourceError::SpawnFailed(format!("{program} {}", args.join(" "))))?;
        let Some(stdout) = child.stdout.take() else {
            return Err(SourceError::SpawnFailed(program.to_string()).into());
        };
        Ok(Self {
            child: Some(child),
            stream: StreamSource::new(BufReader::new(stdout)),
        })
    }

    /// Decodes a Quip archive through `unquip -c`
    pub fn unquip<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_string_lossy().into_owned();
        Self::spawn("unquip", &["-c", &path])
    }
}
impl LineSource for ProcessSource {
    fn read_line(&mut self, buf: &mut String) -> Result<bool> {
        self.stream.read_line(buf)
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            // the reader may stop before the child has written everything
            let _ = child.kill();
            let _ = child.wait();
        }
        Ok(())
    }
}
impl Drop for ProcessSource {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Opens a FASTQ path as a line source
///
/// * `*.qp` files are streamed through `unquip -c`
/// * gzip, bzip2, xz and zstd files are transparently decompressed (not rewindable)
/// * anything else is opened as a plain, rewindable file
pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Box<dyn LineSource>> {
    let path = path.as_ref();
    if path.extension().is_some_and(|ext| ext == QUIP_EXTENSION) {
        debug!("Streaming {} through unquip", path.display());
        return Ok(Box::new(ProcessSource::unquip(path)?));
    }

    let (reader, format) = niffler::from_path(path).map_err(SourceError::from)?;
    if matches!(format, niffler::Format::No) {
        drop(reader);
        Ok(Box::new(SeekableSource::from_path(path)?))
    } else {
        debug!("Decompressing {} ({:?})", path.display(), format);
        Ok(Box::new(StreamSource::new(BufReader::new(reader))))
    }
}

/// Opens standard input as a forward-only line source
pub fn stdin() -> Box<dyn LineSource> {
    Box::new(StreamSource::new(io::stdin().lock()))
}
