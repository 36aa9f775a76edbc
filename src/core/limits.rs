/*!
 * System Limits and Constants
 *
 * Fixed ABI values shared by the loader, the validator and the syscall layer.
 * Tunable values live in `core::config`.
 */

// =============================================================================
// ADDRESS SPACE
// =============================================================================

/// Page size in bytes
pub const PAGE_SIZE: usize = 4096;

/// Mask selecting the offset within a page
pub const PAGE_MASK: u32 = (PAGE_SIZE as u32) - 1;

/// Base of kernel virtual memory; every user address lies below it
/// [SECURITY] Anything at or above this split is rejected by the validator
pub const PHYS_BASE: u32 = 0xC000_0000;

/// Bytes in a user stack word
pub const WORD_SIZE: u32 = 4;

// =============================================================================
// EXECUTABLE IMAGES
// =============================================================================

/// ELF identification prefix: magic, 32-bit class, little endian, version 1
pub const ELF_IDENT: [u8; 7] = *b"\x7fELF\x01\x01\x01";

/// `e_type` for an executable file
pub const ET_EXEC: u16 = 2;

/// `e_machine` for i386
pub const EM_386: u16 = 3;

/// `e_version` accepted by the loader
pub const EV_CURRENT: u32 = 1;

/// Size of the ELF32 file header
pub const ELF_HEADER_SIZE: usize = 52;

/// Size of one ELF32 program header
pub const PROGRAM_HEADER_SIZE: usize = 32;

/// Upper bound on `e_phnum`
/// [SECURITY] Rejects pathological segment tables before they are walked
pub const MAX_SEGMENTS: u16 = 1024;

// =============================================================================
// PROCESSES
// =============================================================================

/// Default cap on tokens taken from a command line
pub const DEFAULT_MAX_ARGS: usize = 32;

/// Kernel copy of a command line is bounded to one page including the terminator
pub const MAX_COMMAND_LINE: usize = PAGE_SIZE - 1;

/// Descriptor for console input
pub const STDIN_FILENO: i32 = 0;

/// Descriptor for console output
pub const STDOUT_FILENO: i32 = 1;

/// First descriptor handed out by `open`
pub const FIRST_FILE_FD: i32 = 2;

/// Default size of a process's descriptor id space (ids 2..=129)
pub const DEFAULT_MAX_OPEN_FILES: u32 = 130;

// =============================================================================
// FILE SYSTEM
// =============================================================================

/// Longest file name accepted by the flat file system
pub const NAME_MAX: usize = 14;

// =============================================================================
// TIMER
// =============================================================================

/// Default timer interrupt frequency in Hz
pub const DEFAULT_TIMER_FREQ: u32 = 100;

/// Lowest frequency the 8254 divisor can express
pub const MIN_TIMER_FREQ: u32 = 19;

/// Highest frequency the kernel is tuned for
pub const MAX_TIMER_FREQ: u32 = 1000;

// =============================================================================
// MEMORY
// =============================================================================

/// Default number of frames in the user page pool (4MB)
pub const DEFAULT_USER_POOL_PAGES: usize = 1024;
