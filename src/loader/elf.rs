/*!
 * ELF32 Structures
 *
 * Executable header and program header as they appear on disk, little
 * endian. Parsing goes through `bytes::Buf`, encoding through `BufMut`.
 */

use super::types::{LoadError, SegmentFault};
use crate::core::limits::{
    ELF_HEADER_SIZE, ELF_IDENT, EM_386, ET_EXEC, EV_CURRENT, MAX_SEGMENTS, PAGE_MASK, PAGE_SIZE,
    PROGRAM_HEADER_SIZE,
};
use crate::core::types::UserAddr;
use crate::memory::is_user_vaddr;
use bitflags::bitflags;
use bytes::{Buf, BufMut};

/// ELF32 executable header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfHeader {
    pub ident: [u8; 16],
    pub e_type: u16,
    pub machine: u16,
    pub version: u32,
    pub entry: UserAddr,
    pub phoff: u32,
    pub shoff: u32,
    pub flags: u32,
    pub ehsize: u16,
    pub phentsize: u16,
    pub phnum: u16,
    pub shentsize: u16,
    pub shnum: u16,
    pub shstrndx: u16,
}

impl ElfHeader {
    /// Header of an i386 executable with `phnum` program headers right after it
    pub fn executable(entry: UserAddr, phnum: u16) -> Self {
        let mut ident = [0u8; 16];
        ident[..ELF_IDENT.len()].copy_from_slice(&ELF_IDENT);
        Self {
            ident,
            e_type: ET_EXEC,
            machine: EM_386,
            version: EV_CURRENT,
            entry,
            phoff: ELF_HEADER_SIZE as u32,
            shoff: 0,
            flags: 0,
            ehsize: ELF_HEADER_SIZE as u16,
            phentsize: PROGRAM_HEADER_SIZE as u16,
            phnum,
            shentsize: 0,
            shnum: 0,
            shstrndx: 0,
        }
    }

    pub fn parse(raw: &[u8]) -> Result<Self, LoadError> {
        if raw.len() < ELF_HEADER_SIZE {
            return Err(LoadError::ShortHeader);
        }

        let mut buf = &raw[..ELF_HEADER_SIZE];
        let mut ident = [0u8; 16];
        buf.copy_to_slice(&mut ident);
        Ok(Self {
            ident,
            e_type: buf.get_u16_le(),
            machine: buf.get_u16_le(),
            version: buf.get_u32_le(),
            entry: buf.get_u32_le(),
            phoff: buf.get_u32_le(),
            shoff: buf.get_u32_le(),
            flags: buf.get_u32_le(),
            ehsize: buf.get_u16_le(),
            phentsize: buf.get_u16_le(),
            phnum: buf.get_u16_le(),
            shentsize: buf.get_u16_le(),
            shnum: buf.get_u16_le(),
            shstrndx: buf.get_u16_le(),
        })
    }

    /// Check that this is an executable the loader can run
    pub fn validate(&self) -> Result<(), LoadError> {
        if self.ident[..ELF_IDENT.len()] != ELF_IDENT {
            return Err(LoadError::BadHeader("bad identification bytes"));
        }
        if self.e_type != ET_EXEC {
            return Err(LoadError::BadHeader("not an executable"));
        }
        if self.machine != EM_386 {
            return Err(LoadError::BadHeader("not an i386 image"));
        }
        if self.version != EV_CURRENT {
            return Err(LoadError::BadHeader("unknown ELF version"));
        }
        if usize::from(self.phentsize) != PROGRAM_HEADER_SIZE {
            return Err(LoadError::BadHeader("unexpected program header size"));
        }
        if self.phnum > MAX_SEGMENTS {
            return Err(LoadError::TooManySegments {
                count: self.phnum,
                limit: MAX_SEGMENTS,
            });
        }
        Ok(())
    }

    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_slice(&self.ident);
        out.put_u16_le(self.e_type);
        out.put_u16_le(self.machine);
        out.put_u32_le(self.version);
        out.put_u32_le(self.entry);
        out.put_u32_le(self.phoff);
        out.put_u32_le(self.shoff);
        out.put_u32_le(self.flags);
        out.put_u16_le(self.ehsize);
        out.put_u16_le(self.phentsize);
        out.put_u16_le(self.phnum);
        out.put_u16_le(self.shentsize);
        out.put_u16_le(self.shnum);
        out.put_u16_le(self.shstrndx);
    }
}

/// Program header `p_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentType {
    Null,
    Load,
    Dynamic,
    Interp,
    Note,
    Shlib,
    Phdr,
    /// GNU stack permissions marker
    Stack,
    Other(u32),
}

/// What the loader does with a segment of a given type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Map,
    Ignore,
    Reject,
}

impl SegmentType {
    pub const fn from_raw(raw: u32) -> Self {
        match raw {
            0 => SegmentType::Null,
            1 => SegmentType::Load,
            2 => SegmentType::Dynamic,
            3 => SegmentType::Interp,
            4 => SegmentType::Note,
            5 => SegmentType::Shlib,
            6 => SegmentType::Phdr,
            0x6474_e551 => SegmentType::Stack,
            other => SegmentType::Other(other),
        }
    }

    pub const fn raw(self) -> u32 {
        match self {
            SegmentType::Null => 0,
            SegmentType::Load => 1,
            SegmentType::Dynamic => 2,
            SegmentType::Interp => 3,
            SegmentType::Note => 4,
            SegmentType::Shlib => 5,
            SegmentType::Phdr => 6,
            SegmentType::Stack => 0x6474_e551,
            SegmentType::Other(other) => other,
        }
    }

    pub const fn disposition(self) -> Disposition {
        match self {
            SegmentType::Load => Disposition::Map,
            SegmentType::Dynamic | SegmentType::Interp | SegmentType::Shlib => Disposition::Reject,
            _ => Disposition::Ignore,
        }
    }
}

bitflags! {
    /// Segment permission bits (`p_flags`)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SegmentFlags: u32 {
        const EXECUTE = 1;
        const WRITE = 2;
        const READ = 4;
    }
}

/// ELF32 program header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramHeader {
    pub kind: SegmentType,
    pub offset: u32,
    pub vaddr: UserAddr,
    pub paddr: u32,
    pub filesz: u32,
    pub memsz: u32,
    pub flags: SegmentFlags,
    pub align: u32,
}

impl ProgramHeader {
    /// A loadable segment whose file image starts at `offset`
    pub fn load(offset: u32, vaddr: UserAddr, filesz: u32, memsz: u32, flags: SegmentFlags) -> Self {
        Self {
            kind: SegmentType::Load,
            offset,
            vaddr,
            paddr: vaddr,
            filesz,
            memsz,
            flags,
            align: PAGE_SIZE as u32,
        }
    }

    /// A header of any type with every other field zero
    pub fn of_type(kind: SegmentType) -> Self {
        Self {
            kind,
            offset: 0,
            vaddr: 0,
            paddr: 0,
            filesz: 0,
            memsz: 0,
            flags: SegmentFlags::empty(),
            align: 0,
        }
    }

    /// Decode one header; `raw` must hold at least `PROGRAM_HEADER_SIZE` bytes
    pub fn parse(raw: &[u8]) -> Option<Self> {
        if raw.len() < PROGRAM_HEADER_SIZE {
            return None;
        }

        let mut buf = &raw[..PROGRAM_HEADER_SIZE];
        Some(Self {
            kind: SegmentType::from_raw(buf.get_u32_le()),
            offset: buf.get_u32_le(),
            vaddr: buf.get_u32_le(),
            paddr: buf.get_u32_le(),
            filesz: buf.get_u32_le(),
            memsz: buf.get_u32_le(),
            flags: SegmentFlags::from_bits_retain(buf.get_u32_le()),
            align: buf.get_u32_le(),
        })
    }

    pub fn encode(&self, out: &mut impl BufMut) {
        out.put_u32_le(self.kind.raw());
        out.put_u32_le(self.offset);
        out.put_u32_le(self.vaddr);
        out.put_u32_le(self.paddr);
        out.put_u32_le(self.filesz);
        out.put_u32_le(self.memsz);
        out.put_u32_le(self.flags.bits());
        out.put_u32_le(self.align);
    }

    pub fn is_writable(&self) -> bool {
        self.flags.contains(SegmentFlags::WRITE)
    }

    /// Check a loadable segment against a file of `file_len` bytes
    pub fn validate(&self, file_len: u32) -> Result<(), SegmentFault> {
        if (self.offset & PAGE_MASK) != (self.vaddr & PAGE_MASK) {
            return Err(SegmentFault::Misaligned);
        }
        if self.offset > file_len {
            return Err(SegmentFault::OffsetPastEnd);
        }
        if self.memsz < self.filesz {
            return Err(SegmentFault::MemoryTooSmall);
        }
        if self.memsz == 0 {
            return Err(SegmentFault::Empty);
        }

        let end = self.vaddr.checked_add(self.memsz).ok_or(SegmentFault::Wraps)?;
        if !is_user_vaddr(self.vaddr) || !is_user_vaddr(end) {
            return Err(SegmentFault::NotUser);
        }

        // Page 0 stays unmapped so that null pointers fault
        if self.vaddr < PAGE_SIZE as u32 {
            return Err(SegmentFault::PageZero);
        }
        Ok(())
    }
}
