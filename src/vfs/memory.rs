/*!
 * In-Memory Filesystem Backend
 * Flat, volatile filesystem with inode-like shared file contents
 */

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::traits::{FileSystem, OpenFile};
use super::types::*;
use crate::core::limits::NAME_MAX;

/// File contents shared by every handle opened on the same name
type Inode = Arc<RwLock<Vec<u8>>>;

/// In-memory filesystem implementation
#[derive(Debug, Clone)]
pub struct MemFs {
    nodes: Arc<DashMap<String, Inode>>,
    max_size: Option<usize>,
    current_size: Arc<AtomicUsize>,
}

impl MemFs {
    /// Create new in-memory filesystem
    pub fn new() -> Self {
        Self {
            nodes: Arc::new(DashMap::new()),
            max_size: None,
            current_size: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create with size limit
    pub fn with_capacity(max_size: usize) -> Self {
        let mut fs = Self::new();
        fs.max_size = Some(max_size);
        fs
    }

    /// Create or replace `name` with `data`
    ///
    /// Host-side helper for installing executables and fixtures.
    pub fn install(&self, name: &str, data: &[u8]) -> VfsResult<()> {
        check_name(name)?;
        let old = self
            .nodes
            .get(name)
            .map(|inode| inode.read().len())
            .unwrap_or(0);
        if data.len() > old {
            self.check_and_reserve_space(data.len() - old)?;
        } else {
            self.release_space(old - data.len());
        }

        self.nodes
            .insert(name.to_string(), Arc::new(RwLock::new(data.to_vec())));
        debug!(name, size = data.len(), "Installed file");
        Ok(())
    }

    /// Whole contents of `name`
    pub fn contents(&self, name: &str) -> VfsResult<Vec<u8>> {
        self.nodes
            .get(name)
            .map(|inode| inode.read().clone())
            .ok_or_else(|| VfsError::NotFound(name.to_string()))
    }

    /// Bytes currently stored
    pub fn used(&self) -> usize {
        self.current_size.load(Ordering::SeqCst)
    }

    /// Check if space is available and reserve it atomically
    fn check_and_reserve_space(&self, additional: usize) -> VfsResult<()> {
        if let Some(max) = self.max_size {
            loop {
                let current = self.current_size.load(Ordering::SeqCst);
                if current + additional > max {
                    return Err(VfsError::OutOfSpace);
                }
                if self
                    .current_size
                    .compare_exchange(
                        current,
                        current + additional,
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    )
                    .is_ok()
                {
                    return Ok(());
                }
            }
        }
        self.current_size.fetch_add(additional, Ordering::SeqCst);
        Ok(())
    }

    fn release_space(&self, amount: usize) {
        self.current_size.fetch_sub(amount, Ordering::SeqCst);
    }
}

impl Default for MemFs {
    fn default() -> Self {
        Self::new()
    }
}

fn check_name(name: &str) -> VfsResult<()> {
    if name.is_empty() || name.len() > NAME_MAX || name.contains('/') {
        return Err(VfsError::InvalidPath(name.to_string()));
    }
    Ok(())
}

impl FileSystem for MemFs {
    fn create(&self, name: &str, initial_size: u32) -> VfsResult<()> {
        check_name(name)?;
        if self.nodes.contains_key(name) {
            return Err(VfsError::AlreadyExists(name.to_string()));
        }

        let size = initial_size as usize;
        self.check_and_reserve_space(size)?;
        match self.nodes.entry(name.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                self.release_space(size);
                Err(VfsError::AlreadyExists(name.to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Arc::new(RwLock::new(vec![0u8; size])));
                Ok(())
            }
        }
    }

    fn remove(&self, name: &str) -> VfsResult<()> {
        let (_, inode) = self
            .nodes
            .remove(name)
            .ok_or_else(|| VfsError::NotFound(name.to_string()))?;
        self.release_space(inode.read().len());
        Ok(())
    }

    fn open(&self, name: &str) -> VfsResult<Box<dyn OpenFile>> {
        let inode = self
            .nodes
            .get(name)
            .map(|inode| Arc::clone(&inode))
            .ok_or_else(|| VfsError::NotFound(name.to_string()))?;

        Ok(Box::new(MemFile { inode, pos: 0 }))
    }

    fn exists(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    fn name(&self) -> &str {
        "memory"
    }
}

struct MemFile {
    inode: Inode,
    pos: u32,
}

impl OpenFile for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> u32 {
        let data = self.inode.read();
        let start = (self.pos as usize).min(data.len());
        let count = buf.len().min(data.len() - start);
        buf[..count].copy_from_slice(&data[start..start + count]);
        self.pos += count as u32;
        count as u32
    }

    fn write(&mut self, buf: &[u8]) -> u32 {
        let mut data = self.inode.write();
        let start = (self.pos as usize).min(data.len());
        let count = buf.len().min(data.len() - start);
        data[start..start + count].copy_from_slice(&buf[..count]);
        self.pos += count as u32;
        count as u32
    }

    fn seek(&mut self, position: u32) {
        self.pos = position;
    }

    fn tell(&self) -> u32 {
        self.pos
    }

    fn length(&self) -> u32 {
        self.inode.read().len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memfs_basic() {
        let fs = MemFs::new();
        fs.create("test.txt", 5).unwrap();
        assert!(fs.exists("test.txt"));

        let mut file = fs.open("test.txt").unwrap();
        assert_eq!(file.length(), 5);
        assert_eq!(file.write(b"hello world"), 5);
        assert_eq!(file.tell(), 5);

        file.seek(0);
        let mut buf = [0u8; 16];
        assert_eq!(file.read(&mut buf), 5);
        assert_eq!(&buf[..5], b"hello");

        fs.remove("test.txt").unwrap();
        assert!(!fs.exists("test.txt"));
    }

    #[test]
    fn test_handles_share_contents() {
        let fs = MemFs::new();
        fs.install("shared", b"aaaa").unwrap();

        let mut writer = fs.open("shared").unwrap();
        let mut reader = fs.open("shared").unwrap();
        writer.write(b"bb");

        let mut buf = [0u8; 4];
        reader.read(&mut buf);
        assert_eq!(&buf, b"bbaa");
    }

    #[test]
    fn test_removed_file_stays_readable_while_open() {
        let fs = MemFs::new();
        fs.install("tmp", b"data").unwrap();
        let mut file = fs.open("tmp").unwrap();
        fs.remove("tmp").unwrap();

        assert!(fs.open("tmp").is_err());
        let mut buf = [0u8; 4];
        assert_eq!(file.read(&mut buf), 4);
        assert_eq!(&buf, b"data");
    }

    #[test]
    fn test_name_rules() {
        let fs = MemFs::new();
        assert!(matches!(fs.create("", 0), Err(VfsError::InvalidPath(_))));
        assert!(matches!(
            fs.create("a-very-long-file-name", 0),
            Err(VfsError::InvalidPath(_))
        ));
        fs.create("ok", 0).unwrap();
        assert_eq!(fs.create("ok", 0), Err(VfsError::AlreadyExists("ok".into())));
    }

    #[test]
    fn test_capacity_limit() {
        let fs = MemFs::with_capacity(10);
        fs.create("a", 8).unwrap();
        assert_eq!(fs.create("b", 8), Err(VfsError::OutOfSpace));
        fs.remove("a").unwrap();
        fs.create("b", 8).unwrap();
        assert_eq!(fs.used(), 8);
    }

    #[test]
    fn test_read_past_end() {
        let fs = MemFs::new();
        fs.install("f", b"abc").unwrap();
        let mut file = fs.open("f").unwrap();
        file.seek(10);
        let mut buf = [0u8; 2];
        assert_eq!(file.read(&mut buf), 0);
        assert_eq!(file.write(b"zz"), 0);
    }
}
