//! Byte-level input and output cursors used by the checker.
//!
//! The checker reads one byte at a time and may seek the input backwards to a rewind point;
//! the repair output is written one byte at a time, sought back to the last confirmed
//! message, and finally truncated. Any `Read + Seek` works as input via [`SeekableSource`].

use byteorder::{ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Input the checker consumes.
pub trait ByteSource {
    /// Next byte, or `None` at end of input.
    fn read_one(&mut self) -> io::Result<Option<u8>>;
    /// Move to an absolute offset; the next `read_one` returns the byte at `offset`.
    fn seek_to(&mut self, offset: u64) -> io::Result<()>;
    /// Declared total length in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Output the repaired stream is written to.
pub trait ByteSink {
    fn write_byte(&mut self, byte: u8) -> io::Result<()>;
    fn seek_to(&mut self, offset: u64) -> io::Result<()>;
    /// Discard everything at and after `offset`.
    fn truncate_at(&mut self, offset: u64) -> io::Result<()>;
}

/// [`ByteSource`] over any seekable reader. The length is measured once at construction.
#[derive(Debug)]
pub struct SeekableSource<R> {
    inner: R,
    len: u64,
}

/// Buffered file input.
pub type FileSource = SeekableSource<BufReader<File>>;

impl<R: Read + Seek> SeekableSource<R> {
    pub fn new(mut inner: R) -> io::Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(SeekableSource { inner, len })
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl SeekableSource<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(SeekableSource {
            inner: BufReader::new(file),
            len,
        })
    }
}

impl<'a> SeekableSource<Cursor<&'a [u8]>> {
    pub fn from_slice(bytes: &'a [u8]) -> Self {
        SeekableSource {
            inner: Cursor::new(bytes),
            len: bytes.len() as u64,
        }
    }
}

impl<R: Read + Seek> ByteSource for SeekableSource<R> {
    fn read_one(&mut self) -> io::Result<Option<u8>> {
        match self.inner.read_u8() {
            Ok(b) => Ok(Some(b)),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(offset)).map(|_| ())
    }

    fn len(&self) -> u64 {
        self.len
    }
}

impl ByteSink for Cursor<Vec<u8>> {
    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.write_u8(byte)
    }

    fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        self.set_position(offset);
        Ok(())
    }

    fn truncate_at(&mut self, offset: u64) -> io::Result<()> {
        let len = usize::try_from(offset)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "offset exceeds usize"))?;
        self.get_mut().truncate(len);
        Ok(())
    }
}

impl ByteSink for BufWriter<File> {
    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.write_u8(byte)
    }

    fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        // BufWriter flushes before seeking
        self.seek(SeekFrom::Start(offset)).map(|_| ())
    }

    fn truncate_at(&mut self, offset: u64) -> io::Result<()> {
        self.flush()?;
        self.get_ref().set_len(offset)
    }
}

/// Create (or overwrite) a file for repaired output.
pub fn create_repair_file(path: impl AsRef<Path>) -> io::Result<BufWriter<File>> {
    Ok(BufWriter::new(File::create(path)?))
}
