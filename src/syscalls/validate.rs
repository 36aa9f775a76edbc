/*!
 * User Pointer Validation
 *
 * Every user-supplied address is checked here before the kernel touches the
 * memory behind it. A failed check is a trust-boundary violation: the caller
 * is terminated with `Trap::killed()`.
 *
 * Ranges are checked on every page they touch, which is the same as checking
 * every byte: a range spanning a mapped and an unmapped page is rejected.
 */

use crate::core::errors::Trap;
use crate::core::limits::PAGE_SIZE;
use crate::core::types::UserAddr;
use crate::memory::{is_user_vaddr, pg_round_down, AddressSpace};
use tracing::warn;

/// Check that `addr` is a non-null, mapped user address
pub fn validate(space: &AddressSpace, addr: UserAddr) -> Result<(), Trap> {
    if addr == 0 || !is_user_vaddr(addr) || !space.is_mapped(addr) {
        warn!(addr, "Invalid user pointer");
        return Err(Trap::killed());
    }
    Ok(())
}

/// Check every byte of `[start, start + len)`
///
/// An empty range is always valid. A range whose end does not fit in 32 bits
/// is not.
pub fn validate_range(space: &AddressSpace, start: UserAddr, len: u32) -> Result<(), Trap> {
    if len == 0 {
        return Ok(());
    }
    let Some(end) = start.checked_add(len) else {
        warn!(start, len, "User range wraps");
        return Err(Trap::killed());
    };

    // One check per page touched
    let mut addr = start;
    while addr < end {
        validate(space, addr)?;
        let next_page = u64::from(pg_round_down(addr)) + PAGE_SIZE as u64;
        addr = next_page.min(u64::from(end)) as UserAddr;
    }
    Ok(())
}

/// Validate a NUL-terminated string byte by byte and copy it into the kernel
///
/// Invalid UTF-8 is replaced rather than rejected; names that are not valid
/// text simply will not match any file.
pub fn validate_c_string(space: &AddressSpace, ptr: UserAddr) -> Result<String, Trap> {
    let mut bytes = Vec::new();
    let mut addr = ptr;
    loop {
        validate(space, addr)?;
        let byte = space.read_byte(addr).map_err(|_| Trap::killed())?;
        if byte == 0 {
            break;
        }
        bytes.push(byte);
        addr = addr.checked_add(1).ok_or_else(Trap::killed)?;
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Copy `len` bytes of user memory into a kernel buffer
pub fn copy_in(space: &AddressSpace, src: UserAddr, len: u32) -> Result<Vec<u8>, Trap> {
    validate_range(space, src, len)?;
    let mut buf = vec![0u8; len as usize];
    space.read(src, &mut buf).map_err(|_| Trap::killed())?;
    Ok(buf)
}

/// Copy a kernel buffer out to user memory
pub fn copy_out(space: &mut AddressSpace, dst: UserAddr, data: &[u8]) -> Result<(), Trap> {
    let len = u32::try_from(data.len()).map_err(|_| Trap::killed())?;
    validate_range(space, dst, len)?;
    space.write(dst, data).map_err(|_| Trap::killed())
}

/// Read one validated little-endian word
pub fn read_word(space: &AddressSpace, addr: UserAddr) -> Result<u32, Trap> {
    validate_range(space, addr, 4)?;
    space.read_u32(addr).map_err(|_| Trap::killed())
}
