/*!
 * Memory Types
 * Common types and address helpers for page management
 */

use crate::core::limits::{PAGE_MASK, PAGE_SIZE, PHYS_BASE};
use crate::core::types::UserAddr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Memory operation result
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Memory errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MemoryError {
    #[error("Out of pages: pool of {total} frames exhausted")]
    OutOfPages { total: usize },

    #[error("Address 0x{0:08x} is not a user address")]
    NotUserAddress(UserAddr),

    #[error("Address 0x{0:08x} is not page aligned")]
    Unaligned(UserAddr),

    #[error("Page 0x{0:08x} is already mapped")]
    AlreadyMapped(UserAddr),

    #[error("Address 0x{0:08x} is not mapped")]
    Unmapped(UserAddr),
}

/// Pool usage snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub total_pages: usize,
    pub used_pages: usize,
    pub available_pages: usize,
}

/// True if `addr` lies below the kernel/user split
#[inline]
pub const fn is_user_vaddr(addr: UserAddr) -> bool {
    addr < PHYS_BASE
}

/// Offset of `addr` within its page
#[inline]
pub const fn pg_ofs(addr: UserAddr) -> u32 {
    addr & PAGE_MASK
}

/// Start of the page containing `addr`
#[inline]
pub const fn pg_round_down(addr: UserAddr) -> UserAddr {
    addr & !PAGE_MASK
}

/// Virtual page number of `addr`
#[inline]
pub const fn pg_no(addr: UserAddr) -> u32 {
    addr >> PAGE_SIZE.trailing_zeros()
}

/// Round `len` up to a whole number of pages
#[inline]
pub const fn round_up_to_page(len: u64) -> u64 {
    let page = PAGE_SIZE as u64;
    len.div_ceil(page) * page
}
