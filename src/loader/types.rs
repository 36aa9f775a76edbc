/*!
 * Loader Types
 * Load errors and the result of a successful load
 */

use crate::core::types::UserAddr;
use crate::memory::MemoryError;
use crate::vfs::VfsError;
use miette::Diagnostic;
use thiserror::Error;

/// Where a freshly loaded image starts running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedImage {
    /// `e_entry` of the image
    pub entry: UserAddr,
    /// Initial user stack pointer
    pub stack_pointer: UserAddr,
}

/// Why a loadable segment was refused
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentFault {
    #[error("file offset and virtual address differ in page offset")]
    Misaligned,

    #[error("file offset lies past the end of the file")]
    OffsetPastEnd,

    #[error("memory size is smaller than file size")]
    MemoryTooSmall,

    #[error("segment is empty")]
    Empty,

    #[error("segment reaches into kernel space")]
    NotUser,

    #[error("segment wraps around the address space")]
    Wraps,

    #[error("segment maps page 0")]
    PageZero,
}

/// Executable load errors
#[derive(Error, Debug, Diagnostic)]
pub enum LoadError {
    #[error("cannot allocate address space: {0}")]
    #[diagnostic(code(loader::address_space))]
    AddressSpace(#[source] MemoryError),

    #[error("open failed: {0}")]
    #[diagnostic(code(loader::open_failed))]
    Open(#[from] VfsError),

    #[error("executable header is truncated")]
    #[diagnostic(code(loader::short_header))]
    ShortHeader,

    #[error("bad executable header: {0}")]
    #[diagnostic(
        code(loader::bad_header),
        help("Only 32-bit little-endian i386 ELF executables can be loaded.")
    )]
    BadHeader(&'static str),

    #[error("{count} program headers exceed the limit of {limit}")]
    #[diagnostic(code(loader::too_many_segments))]
    TooManySegments { count: u16, limit: u16 },

    #[error("program header {index} lies outside the file")]
    #[diagnostic(code(loader::program_header))]
    ProgramHeaderOutOfFile { index: u16 },

    #[error("segment {index} of type {kind:#x} needs a dynamic linker")]
    #[diagnostic(
        code(loader::dynamic_segment),
        help("Link the program statically.")
    )]
    DynamicSegment { index: u16, kind: u32 },

    #[error("segment {index}: {reason}")]
    #[diagnostic(code(loader::bad_segment))]
    BadSegment { index: u16, reason: SegmentFault },

    #[error("segment {index}: short read at page 0x{page:08x}")]
    #[diagnostic(code(loader::short_read))]
    ShortRead { index: u16, page: UserAddr },

    #[error("segment {index}: {source}")]
    #[diagnostic(code(loader::map_failed))]
    Map {
        index: u16,
        #[source]
        source: MemoryError,
    },

    #[error("cannot set up stack: {0}")]
    #[diagnostic(code(loader::stack))]
    Stack(#[source] MemoryError),
}

impl LoadError {
    /// True if the failure came from running out of user pages
    pub fn is_out_of_memory(&self) -> bool {
        matches!(
            self,
            LoadError::AddressSpace(MemoryError::OutOfPages { .. })
                | LoadError::Stack(MemoryError::OutOfPages { .. })
                | LoadError::Map {
                    source: MemoryError::OutOfPages { .. },
                    ..
                }
        )
    }
}
