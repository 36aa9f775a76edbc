/*!
 * File Descriptor Table
 * Per-process map from descriptor ids to open files
 */

use crate::core::limits::FIRST_FILE_FD;
use crate::core::types::Fd;
use crate::vfs::OpenFile;
use std::collections::BTreeMap;
use std::fmt;

/// Descriptor table of one process
///
/// Ids start at 2 and only ever grow, so a closed id is never handed out
/// again. The id space ends at `max_open_files`; once it is used up every
/// further `insert` fails.
pub struct FdTable {
    files: BTreeMap<Fd, Box<dyn OpenFile>>,
    next_fd: Fd,
    max_fd: Fd,
}

impl FdTable {
    pub fn new(max_open_files: u32) -> Self {
        Self {
            files: BTreeMap::new(),
            next_fd: FIRST_FILE_FD,
            max_fd: Fd::try_from(max_open_files).unwrap_or(Fd::MAX),
        }
    }

    /// True once no further descriptor id can be allocated
    pub fn is_full(&self) -> bool {
        self.next_fd >= self.max_fd
    }

    /// Install `file` under the next id
    pub fn insert(&mut self, file: Box<dyn OpenFile>) -> Option<Fd> {
        if self.is_full() {
            return None;
        }
        let fd = self.next_fd;
        self.next_fd += 1;
        self.files.insert(fd, file);
        Some(fd)
    }

    pub fn get(&self, fd: Fd) -> Option<&dyn OpenFile> {
        self.files.get(&fd).map(|file| file.as_ref())
    }

    pub fn get_mut(&mut self, fd: Fd) -> Option<&mut (dyn OpenFile + 'static)> {
        self.files.get_mut(&fd).map(|file| file.as_mut())
    }

    /// Close `fd`; returns false if it was not open
    pub fn close(&mut self, fd: Fd) -> bool {
        self.files.remove(&fd).is_some()
    }

    /// Close every descriptor; returns how many were open
    pub fn close_all(&mut self) -> usize {
        let count = self.files.len();
        self.files.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Open descriptor ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = Fd> + '_ {
        self.files.keys().copied()
    }
}

impl fmt::Debug for FdTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FdTable")
            .field("open", &self.files.keys().collect::<Vec<_>>())
            .field("next_fd", &self.next_fd)
            .field("max_fd", &self.max_fd)
            .finish()
    }
}
