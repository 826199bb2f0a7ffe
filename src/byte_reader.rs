//! Typed primitive extraction from a seekable byte source.
//!
//! A memory map is the default and the fast path for the random-access
//! pattern the decoder needs (header once, then scattered offset jumps
//! into object records and their attribute payloads). A buffered,
//! position-based fallback exists for byte sources memory-mapping can't
//! handle (named pipes, some network filesystems).

use std::cell::RefCell;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use memmap2::Mmap;

use crate::error::{AdxError, Result};

/// Anything seekable and readable; lets the buffered fallback be exercised
/// in tests against an in-memory cursor instead of a real file.
trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

pub enum ByteSource {
    Mapped(Mmap),
    Buffered(RefCell<Box<dyn ReadSeek>>),
}

impl ByteSource {
    pub fn mapped(file: &File) -> std::io::Result<Self> {
        let mmap = unsafe { Mmap::map(file)? };
        mmap.advise(memmap2::Advice::Random).ok();
        Ok(ByteSource::Mapped(mmap))
    }

    pub fn buffered(file: File) -> Self {
        ByteSource::Buffered(RefCell::new(Box::new(BufReader::new(file))))
    }

    pub fn len(&self) -> u64 {
        match self {
            ByteSource::Mapped(m) => m.len() as u64,
            ByteSource::Buffered(r) => {
                let mut guard = r.borrow_mut();
                let current = guard.stream_position().unwrap_or(0);
                let end = guard.seek(SeekFrom::End(0)).unwrap_or(0);
                guard.seek(SeekFrom::Start(current)).ok();
                end
            }
        }
    }

    fn read_exact_at(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        match self {
            ByteSource::Mapped(m) => {
                let start = offset as usize;
                let end = start
                    .checked_add(buf.len())
                    .ok_or_else(|| AdxError::TruncatedFile(format!("offset overflow at {offset}")))?;
                if end > m.len() {
                    return Err(AdxError::TruncatedFile(format!(
                        "read of {} bytes at offset {offset} exceeds mapped length {}",
                        buf.len(),
                        m.len()
                    )));
                }
                buf.copy_from_slice(&m[start..end]);
                Ok(())
            }
            ByteSource::Buffered(r) => {
                let mut guard = r.borrow_mut();
                guard.seek(SeekFrom::Start(offset))?;
                guard.read_exact(buf).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::UnexpectedEof {
                        AdxError::TruncatedFile(format!(
                            "read of {} bytes at offset {offset} hit end of file",
                            buf.len()
                        ))
                    } else {
                        AdxError::Io(e)
                    }
                })
            }
        }
    }

    pub fn read_bytes_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_exact_at(offset, &mut buf)?;
        Ok(buf)
    }

    pub fn read_u16_at(&self, offset: u64) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact_at(offset, &mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    pub fn read_u32_at(&self, offset: u64) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact_at(offset, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    pub fn read_i32_at(&self, offset: u64) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_exact_at(offset, &mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    pub fn read_i64_at(&self, offset: u64) -> Result<i64> {
        let mut buf = [0u8; 8];
        self.read_exact_at(offset, &mut buf)?;
        Ok(i64::from_le_bytes(buf))
    }

    pub fn read_u64_at(&self, offset: u64) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact_at(offset, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Reads `wide_chars` UTF-16LE code units and strips trailing NULs.
    pub fn read_wide_fixed_at(&self, offset: u64, wide_chars: usize) -> Result<String> {
        let bytes = self.read_bytes_at(offset, wide_chars * 2)?;
        Ok(decode_utf16le_stripped(&bytes))
    }

    /// Reads a NUL-terminated UTF-16LE string starting at `offset`, returning
    /// the string and the byte length consumed (including the terminator).
    pub fn read_wide_nul_terminated_at(&self, offset: u64) -> Result<String> {
        let mut units: Vec<u16> = Vec::new();
        let mut pos = offset;
        loop {
            let unit = self.read_u16_at(pos)?;
            if unit == 0 {
                break;
            }
            units.push(unit);
            pos += 2;
        }
        Ok(String::from_utf16_lossy(&units))
    }
}

fn decode_utf16le_stripped(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .collect();
    let s = String::from_utf16_lossy(&units);
    s.trim_end_matches('\u{0}').to_string()
}
