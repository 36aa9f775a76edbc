/*!
 * VFS Traits
 * File system and open-file contracts consumed by the loader and syscalls
 */

use super::types::VfsResult;

/// Flat file system
///
/// Names are plain strings; there are no directories.
pub trait FileSystem: Send + Sync {
    /// Create a file of `initial_size` zero bytes
    fn create(&self, name: &str, initial_size: u32) -> VfsResult<()>;

    /// Remove a file name; handles already open keep working
    fn remove(&self, name: &str) -> VfsResult<()>;

    /// Open a file for reading and writing
    fn open(&self, name: &str) -> VfsResult<Box<dyn OpenFile>>;

    /// Check whether a name exists
    fn exists(&self, name: &str) -> bool;

    /// Get filesystem name/type
    fn name(&self) -> &str;
}

/// Open file handle
///
/// Each handle has its own position. Closing is dropping.
pub trait OpenFile: Send + Sync {
    /// Read at the current position, advancing it; returns bytes read
    fn read(&mut self, buf: &mut [u8]) -> u32;

    /// Write at the current position, advancing it; returns bytes written
    ///
    /// Files do not grow: a write stops at end of file.
    fn write(&mut self, buf: &[u8]) -> u32;

    /// Move the position; positions past end of file are allowed
    fn seek(&mut self, position: u32);

    /// Current position
    fn tell(&self) -> u32;

    /// File length in bytes
    fn length(&self) -> u32;
}
