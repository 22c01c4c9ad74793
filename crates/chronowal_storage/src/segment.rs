//! Segment files.
//!
//! A segment is one file in the WAL directory, named by its zero-based index
//! padded to eight digits (`00000000`, `00000001`, ...). Segments are written
//! in whole pages; a segment whose length is not a page multiple was torn by
//! an interrupted write.

use crate::dir::{parse_segment_name, segment_path};
use crate::error::{StorageError, StorageResult};
use crate::PAGE_SIZE;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// An open segment file together with its index and parent directory.
///
/// Dropping a `Segment` closes the underlying file. Use [`Segment::sync`]
/// first when the contents must be durable.
#[derive(Debug)]
pub struct Segment {
    file: File,
    dir: PathBuf,
    index: u64,
}

impl Segment {
    /// Creates segment `index` in `dir`, ready for appends.
    ///
    /// An existing file with the same name is opened in append mode rather
    /// than truncated.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(dir: &Path, index: u64) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(segment_path(dir, index))?;

        Ok(Self {
            file,
            dir: dir.to_path_buf(),
            index,
        })
    }

    /// Opens the existing segment `index` in `dir` for appends.
    ///
    /// If the last page is torn it is filled with zeros up to the next page
    /// boundary. When the tear happened after all records were written this
    /// only pads the page. When it happened mid-record, the replay that must
    /// precede new writes reports the damage as corruption.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or the padding cannot be
    /// written.
    pub fn open_for_write(dir: &Path, index: u64) -> StorageResult<Self> {
        let path = segment_path(dir, index);
        let mut file = OpenOptions::new().append(true).open(&path)?;

        let len = file.metadata()?.len();
        let torn = (len % PAGE_SIZE as u64) as usize;
        if torn != 0 {
            warn!(
                segment = %path.display(),
                len,
                "last page of the wal is torn, filling it with zeros"
            );
            file.write_all(&vec![0u8; PAGE_SIZE - torn])?;
        }

        Ok(Self {
            file,
            dir: dir.to_path_buf(),
            index,
        })
    }

    /// Opens the segment file at `path` read-only.
    ///
    /// The segment index is parsed from the file name.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidSegmentName`] if the file name is not a
    /// segment index, or an I/O error if the file cannot be opened.
    pub fn open_for_read(path: &Path) -> StorageResult<Self> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let index = parse_segment_name(&name)
            .ok_or(StorageError::InvalidSegmentName { name })?;

        let file = File::open(path)?;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        Ok(Self { file, dir, index })
    }

    /// Returns the index of the segment.
    #[must_use]
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Returns the directory holding the segment.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the current length of the segment file in bytes.
    pub fn len(&self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Flushes file data and metadata to durable storage.
    pub fn sync(&self) -> io::Result<()> {
        self.file.sync_all()
    }

    /// Closes the segment.
    ///
    /// Consumes the handle so the segment cannot be written afterwards.
    pub fn close(self) -> io::Result<()> {
        let mut file = self.file;
        file.flush()?;
        drop(file);
        Ok(())
    }
}

impl Read for Segment {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl Write for Segment {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_names_file_by_index() {
        let dir = tempdir().unwrap();
        let segment = Segment::create(dir.path(), 3).unwrap();

        assert_eq!(segment.index(), 3);
        assert!(dir.path().join("00000003").exists());
        assert_eq!(segment.len().unwrap(), 0);
    }

    #[test]
    fn create_appends_to_existing_file() {
        let dir = tempdir().unwrap();
        {
            let mut segment = Segment::create(dir.path(), 0).unwrap();
            segment.write_all(b"abc").unwrap();
        }
        let mut segment = Segment::create(dir.path(), 0).unwrap();
        segment.write_all(b"def").unwrap();
        assert_eq!(segment.len().unwrap(), 6);
    }

    #[test]
    fn open_for_write_requires_existing_file() {
        let dir = tempdir().unwrap();
        let err = Segment::open_for_write(dir.path(), 0).unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
    }

    #[test]
    fn open_for_write_pads_torn_page() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("00000000"), vec![1u8; PAGE_SIZE + 100]).unwrap();

        let segment = Segment::open_for_write(dir.path(), 0).unwrap();
        assert_eq!(segment.len().unwrap(), 2 * PAGE_SIZE as u64);
        drop(segment);

        let data = std::fs::read(dir.path().join("00000000")).unwrap();
        assert!(data[..PAGE_SIZE + 100].iter().all(|&b| b == 1));
        assert!(data[PAGE_SIZE + 100..].iter().all(|&b| b == 0));
    }

    #[test]
    fn open_for_write_leaves_aligned_segment_alone() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("00000001"), vec![7u8; PAGE_SIZE]).unwrap();

        let segment = Segment::open_for_write(dir.path(), 1).unwrap();
        assert_eq!(segment.len().unwrap(), PAGE_SIZE as u64);
    }

    #[test]
    fn open_for_read_parses_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("00000042");
        std::fs::write(&path, b"hello").unwrap();

        let mut segment = Segment::open_for_read(&path).unwrap();
        assert_eq!(segment.index(), 42);
        assert_eq!(segment.dir(), dir.path());

        let mut data = Vec::new();
        segment.read_to_end(&mut data).unwrap();
        assert_eq!(data, b"hello");
    }

    #[test]
    fn open_for_read_rejects_bad_name() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.log");
        std::fs::write(&path, b"").unwrap();

        let err = Segment::open_for_read(&path).unwrap_err();
        assert!(matches!(err, StorageError::InvalidSegmentName { .. }));
    }
}
