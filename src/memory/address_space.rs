/*!
 * Address Space
 * Per-process page directory: user page → frame mappings
 */

use super::mmu::{self, SpaceId};
use super::pool::{Frame, PagePool};
use super::types::*;
use crate::core::limits::PAGE_SIZE;
use crate::core::types::UserAddr;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

static NEXT_SPACE_ID: AtomicU64 = AtomicU64::new(1);

struct Mapping {
    frame: Frame,
    writable: bool,
}

/// A user address space
///
/// Owns its page directory frame and every mapped frame. Dropping it returns
/// all of them to the pool; `destroy` additionally checks that the space is
/// no longer active on the current thread.
pub struct AddressSpace {
    id: SpaceId,
    _directory: Frame,
    pages: BTreeMap<UserAddr, Mapping>,
}

impl AddressSpace {
    /// Allocate an empty address space; the directory itself costs one frame
    pub fn new(pool: &PagePool) -> MemoryResult<Self> {
        let directory = pool.get_page()?;
        Ok(Self {
            id: SpaceId(NEXT_SPACE_ID.fetch_add(1, Ordering::Relaxed)),
            _directory: directory,
            pages: BTreeMap::new(),
        })
    }

    pub fn id(&self) -> SpaceId {
        self.id
    }

    /// Load this page directory on the current thread
    pub fn activate(&self) {
        mmu::activate(self.id);
    }

    /// Map `frame` at the user page `upage`
    ///
    /// Fails if `upage` is unaligned, in kernel space, or already mapped; the
    /// frame is released in that case.
    pub fn map(&mut self, upage: UserAddr, frame: Frame, writable: bool) -> MemoryResult<()> {
        if pg_ofs(upage) != 0 {
            return Err(MemoryError::Unaligned(upage));
        }
        if !is_user_vaddr(upage) {
            return Err(MemoryError::NotUserAddress(upage));
        }
        if self.pages.contains_key(&upage) {
            return Err(MemoryError::AlreadyMapped(upage));
        }

        self.pages.insert(upage, Mapping { frame, writable });
        Ok(())
    }

    /// Remove the mapping for the page containing `addr`
    pub fn unmap(&mut self, addr: UserAddr) -> Option<Frame> {
        self.pages
            .remove(&pg_round_down(addr))
            .map(|mapping| mapping.frame)
    }

    /// True if the page containing `addr` is mapped
    pub fn is_mapped(&self, addr: UserAddr) -> bool {
        is_user_vaddr(addr) && self.pages.contains_key(&pg_round_down(addr))
    }

    /// Whether the page containing `addr` is writable from user mode
    pub fn is_writable(&self, addr: UserAddr) -> Option<bool> {
        self.pages
            .get(&pg_round_down(addr))
            .map(|mapping| mapping.writable)
    }

    /// Frame backing the page that contains `addr`
    pub fn translate(&self, addr: UserAddr) -> Option<&Frame> {
        if !is_user_vaddr(addr) {
            return None;
        }
        self.pages
            .get(&pg_round_down(addr))
            .map(|mapping| &mapping.frame)
    }

    pub fn read_byte(&self, addr: UserAddr) -> MemoryResult<u8> {
        self.translate(addr)
            .map(|frame| frame.bytes()[pg_ofs(addr) as usize])
            .ok_or(MemoryError::Unmapped(addr))
    }

    /// Copy `buf.len()` bytes starting at `addr` out of the address space
    pub fn read(&self, addr: UserAddr, buf: &mut [u8]) -> MemoryResult<()> {
        let mut done = 0;
        while done < buf.len() {
            let cursor = offset(addr, done)?;
            let frame = self.translate(cursor).ok_or(MemoryError::Unmapped(cursor))?;
            let start = pg_ofs(cursor) as usize;
            let chunk = (PAGE_SIZE - start).min(buf.len() - done);
            buf[done..done + chunk].copy_from_slice(&frame.bytes()[start..start + chunk]);
            done += chunk;
        }
        Ok(())
    }

    /// Copy `data` into the address space starting at `addr`
    ///
    /// This is a kernel-side store: page write protection does not apply.
    pub fn write(&mut self, addr: UserAddr, data: &[u8]) -> MemoryResult<()> {
        let mut done = 0;
        while done < data.len() {
            let cursor = offset(addr, done)?;
            let mapping = self
                .pages
                .get_mut(&pg_round_down(cursor))
                .filter(|_| is_user_vaddr(cursor))
                .ok_or(MemoryError::Unmapped(cursor))?;
            let start = pg_ofs(cursor) as usize;
            let chunk = (PAGE_SIZE - start).min(data.len() - done);
            mapping.frame.bytes_mut()[start..start + chunk]
                .copy_from_slice(&data[done..done + chunk]);
            done += chunk;
        }
        Ok(())
    }

    /// Little-endian word at `addr`
    pub fn read_u32(&self, addr: UserAddr) -> MemoryResult<u32> {
        let mut word = [0u8; 4];
        self.read(addr, &mut word)?;
        Ok(u32::from_le_bytes(word))
    }

    pub fn write_u32(&mut self, addr: UserAddr, value: u32) -> MemoryResult<()> {
        self.write(addr, &value.to_le_bytes())
    }

    /// Number of mapped user pages
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Mapped user pages in ascending order
    pub fn mapped_pages(&self) -> impl Iterator<Item = UserAddr> + '_ {
        self.pages.keys().copied()
    }

    /// Tear down every mapping and release the directory
    ///
    /// The caller must already have switched this thread off the space.
    pub fn destroy(self) {
        debug_assert_ne!(
            mmu::active(),
            Some(self.id),
            "destroying the active page directory"
        );
        debug!(pages = self.pages.len(), "Destroying address space");
        drop(self);
    }
}

impl fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressSpace")
            .field("id", &self.id)
            .field("pages", &self.pages.len())
            .finish()
    }
}

fn offset(addr: UserAddr, delta: usize) -> MemoryResult<UserAddr> {
    u32::try_from(delta)
        .ok()
        .and_then(|delta| addr.checked_add(delta))
        .ok_or(MemoryError::NotUserAddress(addr))
}
