/*!
 * Image Loading
 *
 * Builds a fresh address space for an executable: validates the header,
 * walks the program headers, maps every loadable segment page by page and
 * adds the initial stack page just below the kernel base.
 */

use super::elf::{Disposition, ElfHeader, ProgramHeader};
use super::types::{LoadError, LoadedImage};
use crate::core::limits::{ELF_HEADER_SIZE, PAGE_MASK, PAGE_SIZE, PHYS_BASE, PROGRAM_HEADER_SIZE};
use crate::core::types::UserAddr;
use crate::memory::{round_up_to_page, AddressSpace, PagePool};
use crate::vfs::{FileSystem, OpenFile};
use tracing::{debug, instrument};

/// Lowest address of the initial stack page
pub const STACK_PAGE: UserAddr = PHYS_BASE - PAGE_SIZE as u32;

/// Loads executables from a file system into pages from a pool
pub struct Loader<'a> {
    fs: &'a dyn FileSystem,
    pool: &'a PagePool,
}

impl<'a> Loader<'a> {
    pub fn new(fs: &'a dyn FileSystem, pool: &'a PagePool) -> Self {
        Self { fs, pool }
    }

    /// Load `file_name` into a new address space stored in `slot`
    ///
    /// The space is placed in `slot` and activated as soon as it exists, so
    /// on failure whatever was mapped so far stays there for the caller's
    /// teardown to reclaim.
    #[instrument(skip_all, fields(name = %file_name))]
    pub fn load(
        &self,
        file_name: &str,
        slot: &mut Option<AddressSpace>,
    ) -> Result<LoadedImage, LoadError> {
        let space = AddressSpace::new(self.pool).map_err(LoadError::AddressSpace)?;
        space.activate();
        let space = slot.insert(space);

        let mut file = self.fs.open(file_name)?;

        let mut raw = [0u8; ELF_HEADER_SIZE];
        if file.read(&mut raw) as usize != raw.len() {
            return Err(LoadError::ShortHeader);
        }
        let header = ElfHeader::parse(&raw)?;
        header.validate()?;

        let file_len = file.length();
        let mut file_ofs = u64::from(header.phoff);
        for index in 0..header.phnum {
            if file_ofs > u64::from(file_len) {
                return Err(LoadError::ProgramHeaderOutOfFile { index });
            }
            file.seek(file_ofs as u32);

            let mut raw = [0u8; PROGRAM_HEADER_SIZE];
            if file.read(&mut raw) as usize != raw.len() {
                return Err(LoadError::ProgramHeaderOutOfFile { index });
            }
            file_ofs += PROGRAM_HEADER_SIZE as u64;

            let phdr =
                ProgramHeader::parse(&raw).ok_or(LoadError::ProgramHeaderOutOfFile { index })?;
            match phdr.kind.disposition() {
                Disposition::Ignore => continue,
                Disposition::Reject => {
                    return Err(LoadError::DynamicSegment {
                        index,
                        kind: phdr.kind.raw(),
                    })
                }
                Disposition::Map => {
                    phdr.validate(file_len)
                        .map_err(|reason| LoadError::BadSegment { index, reason })?;
                    self.load_segment(file.as_mut(), space, &phdr, index)?;
                }
            }
        }

        self.setup_stack(space)?;

        debug!(
            entry = header.entry,
            pages = space.page_count(),
            "Image loaded"
        );
        Ok(LoadedImage {
            entry: header.entry,
            stack_pointer: PHYS_BASE,
        })
    }

    /// Map one validated segment
    ///
    /// The first `page_offset + filesz` bytes starting at the file page are
    /// read from the file; everything after them up to the end of the last
    /// page is zero.
    fn load_segment(
        &self,
        file: &mut dyn OpenFile,
        space: &mut AddressSpace,
        phdr: &ProgramHeader,
        index: u16,
    ) -> Result<(), LoadError> {
        let file_page = phdr.offset & !PAGE_MASK;
        let page_offset = u64::from(phdr.vaddr & PAGE_MASK);
        let mut upage = phdr.vaddr & !PAGE_MASK;

        let total = round_up_to_page(page_offset + u64::from(phdr.memsz));
        let mut read_bytes = if phdr.filesz > 0 {
            page_offset + u64::from(phdr.filesz)
        } else {
            0
        };
        let mut zero_bytes = total - read_bytes;
        let writable = phdr.is_writable();

        debug!(
            index,
            vaddr = phdr.vaddr,
            filesz = phdr.filesz,
            memsz = phdr.memsz,
            writable,
            "Mapping segment"
        );

        file.seek(file_page);
        while read_bytes > 0 || zero_bytes > 0 {
            let page_read = read_bytes.min(PAGE_SIZE as u64) as usize;
            let page_zero = PAGE_SIZE - page_read;

            let mut frame = self
                .pool
                .get_page()
                .map_err(|source| LoadError::Map { index, source })?;
            let bytes = frame.bytes_mut();
            if file.read(&mut bytes[..page_read]) as usize != page_read {
                return Err(LoadError::ShortRead { index, page: upage });
            }
            bytes[page_read..].fill(0);

            space
                .map(upage, frame, writable)
                .map_err(|source| LoadError::Map { index, source })?;

            read_bytes -= page_read as u64;
            zero_bytes -= page_zero as u64;
            upage += PAGE_SIZE as u32;
        }
        Ok(())
    }

    fn setup_stack(&self, space: &mut AddressSpace) -> Result<(), LoadError> {
        let frame = self.pool.get_page().map_err(LoadError::Stack)?;
        space.map(STACK_PAGE, frame, true).map_err(LoadError::Stack)
    }
}
