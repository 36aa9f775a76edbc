/*!
 * Virtual File System Module
 * File system seam used by the loader and the file syscalls
 */

pub mod memory;
pub mod traits;
pub mod types;

// Re-exports
pub use memory::MemFs;
pub use traits::{FileSystem, OpenFile};
pub use types::{VfsError, VfsResult};
