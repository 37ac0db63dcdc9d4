//! Line-oriented loading of word-list sources.
//!
//! Small files go through a `BufReader`; files at or above the mmap threshold
//! are mapped and split on `'\n'` with `memchr`. Both paths strip a trailing
//! `'\r'` and decode lossily, so a stray non-UTF-8 byte never aborts a load.
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use memmap2::Mmap;

use crate::error::{CrackError, Result};

/// Sources of this size or larger are memory-mapped.
pub const DEFAULT_MMAP_THRESHOLD_BYTES: u64 = 16 * 1024 * 1024; // 16 MiB

pub type LineIter = Box<dyn Iterator<Item = io::Result<String>> + Send + 'static>;

pub fn should_use_mmap(file_size_bytes: u64, threshold_bytes: u64) -> bool {
    file_size_bytes >= threshold_bytes
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => {
            CrackError::not_found(format!("word list {}", path.display()))
        }
        _ => CrackError::Io(e),
    })
}

pub fn iter_lines_bufread(path: &Path) -> Result<LineIter> {
    let reader = BufReader::new(open(path)?);
    Ok(Box::new(reader.split(b'\n').map(|chunk| chunk.map(|b| line_from_bytes(&b)))))
}

pub fn iter_lines_mmap(path: &Path) -> Result<LineIter> {
    let file = open(path)?;
    // The mapping is read-only and dropped with the iterator.
    let mmap = unsafe { Mmap::map(&file) }?;
    Ok(Box::new(MmapLines { mmap, pos: 0 }))
}

struct MmapLines {
    mmap: Mmap,
    pos: usize,
}

impl Iterator for MmapLines {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let data: &[u8] = &self.mmap;
        if self.pos >= data.len() {
            return None;
        }
        let start = self.pos;
        let end = match memchr::memchr(b'\n', &data[start..]) {
            Some(off) => start + off,
            None => data.len(),
        };
        self.pos = end + 1;
        Some(Ok(line_from_bytes(&data[start..end])))
    }
}

fn line_from_bytes(bytes: &[u8]) -> String {
    let slice = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(slice).into_owned()
}

pub fn iter_lines_auto(path: &Path, threshold_bytes: u64) -> Result<LineIter> {
    let meta = std::fs::metadata(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => {
            CrackError::not_found(format!("word list {}", path.display()))
        }
        _ => CrackError::Io(e),
    })?;
    if meta.is_file() && should_use_mmap(meta.len(), threshold_bytes) {
        iter_lines_mmap(path)
    } else {
        iter_lines_bufread(path)
    }
}

/// Read every non-blank line of `path`, trimmed, in file order.
pub fn read_entries(path: &Path, threshold_bytes: u64) -> Result<Vec<String>> {
    let mut entries = Vec::new();
    for line in iter_lines_auto(path, threshold_bytes)? {
        let line = line?;
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            entries.push(trimmed.to_string());
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn source(contents: &[u8]) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(contents).unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn bufread_and_mmap_agree() {
        let f = source(b"alpha\r\n\n  beta \ngamma");
        let buffered = read_entries(f.path(), u64::MAX).unwrap();
        let mapped = read_entries(f.path(), 1).unwrap();
        assert_eq!(buffered, vec!["alpha", "beta", "gamma"]);
        assert_eq!(buffered, mapped);
    }

    #[test]
    fn invalid_utf8_is_decoded_lossily() {
        let f = source(b"ok\n\xffbad\n");
        let entries = read_entries(f.path(), u64::MAX).unwrap();
        assert_eq!(entries[0], "ok");
        assert!(entries[1].ends_with("bad"));
    }

    #[test]
    fn missing_source_is_not_found() {
        let err = read_entries(Path::new("/nonexistent/words.txt"), u64::MAX).unwrap_err();
        assert!(matches!(err, CrackError::NotFound(_)));
    }
}
