/*!
 * Image Builder
 * Assembles ELF32 executables for demo programs and tests
 */

use super::elf::{ElfHeader, ProgramHeader, SegmentFlags};
use crate::core::limits::{ELF_HEADER_SIZE, PAGE_MASK, PAGE_SIZE, PROGRAM_HEADER_SIZE};
use crate::core::types::UserAddr;
use bytes::{BufMut, BytesMut};
use std::fmt;

#[derive(Debug, Clone)]
struct Segment {
    vaddr: UserAddr,
    data: Vec<u8>,
    memsz: u32,
    flags: SegmentFlags,
}

/// Builder for executable images
///
/// Loadable segments come first in the program header table, followed by any
/// raw headers added with [`ImageBuilder::program_header`]. Segment data is
/// placed on its own file page at the same page offset as its address.
#[derive(Clone)]
pub struct ImageBuilder {
    entry: UserAddr,
    segments: Vec<Segment>,
    raw_headers: Vec<ProgramHeader>,
    overrides: Vec<fn(&mut ElfHeader)>,
}

impl ImageBuilder {
    pub fn new(entry: UserAddr) -> Self {
        Self {
            entry,
            segments: Vec::new(),
            raw_headers: Vec::new(),
            overrides: Vec::new(),
        }
    }

    /// Add a loadable segment backed entirely by `data`
    pub fn segment(self, vaddr: UserAddr, data: impl Into<Vec<u8>>, flags: SegmentFlags) -> Self {
        let data = data.into();
        let memsz = data.len() as u32;
        self.segment_with_memsz(vaddr, data, memsz, flags)
    }

    /// Add a loadable segment whose tail past `data` is zero filled
    pub fn segment_with_memsz(
        mut self,
        vaddr: UserAddr,
        data: impl Into<Vec<u8>>,
        memsz: u32,
        flags: SegmentFlags,
    ) -> Self {
        self.segments.push(Segment {
            vaddr,
            data: data.into(),
            memsz,
            flags,
        });
        self
    }

    /// Add a zero-filled segment with no file contents
    pub fn bss(self, vaddr: UserAddr, memsz: u32, flags: SegmentFlags) -> Self {
        self.segment_with_memsz(vaddr, Vec::new(), memsz, flags)
    }

    /// Append a program header exactly as given
    pub fn program_header(mut self, phdr: ProgramHeader) -> Self {
        self.raw_headers.push(phdr);
        self
    }

    /// Adjust the executable header after it has been filled in
    pub fn with_header(mut self, edit: fn(&mut ElfHeader)) -> Self {
        self.overrides.push(edit);
        self
    }

    /// Assemble the image
    pub fn build(&self) -> Vec<u8> {
        let phnum = self.segments.len() + self.raw_headers.len();
        let table_end = ELF_HEADER_SIZE + phnum * PROGRAM_HEADER_SIZE;

        // Lay out segment data after the header table
        let mut cursor = table_end;
        let mut offsets = Vec::with_capacity(self.segments.len());
        for segment in &self.segments {
            let page = cursor.next_multiple_of(PAGE_SIZE);
            let offset = page + (segment.vaddr & PAGE_MASK) as usize;
            offsets.push(offset);
            cursor = offset + segment.data.len();
        }

        let mut header = ElfHeader::executable(self.entry, phnum as u16);
        for edit in &self.overrides {
            edit(&mut header);
        }

        let mut out = BytesMut::with_capacity(cursor);
        header.encode(&mut out);
        for (segment, &offset) in self.segments.iter().zip(&offsets) {
            ProgramHeader::load(
                offset as u32,
                segment.vaddr,
                segment.data.len() as u32,
                segment.memsz,
                segment.flags,
            )
            .encode(&mut out);
        }
        for phdr in &self.raw_headers {
            phdr.encode(&mut out);
        }

        for (segment, &offset) in self.segments.iter().zip(&offsets) {
            out.resize(offset, 0);
            out.put_slice(&segment.data);
        }
        out.to_vec()
    }
}

impl fmt::Debug for ImageBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageBuilder")
            .field("entry", &self.entry)
            .field("segments", &self.segments)
            .field("raw_headers", &self.raw_headers)
            .field("overrides", &self.overrides.len())
            .finish()
    }
}
