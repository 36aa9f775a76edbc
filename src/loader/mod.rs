/*!
 * Loader Module
 * ELF32 executable loading into fresh user address spaces
 */

pub mod builder;
pub mod elf;
pub mod load;
pub mod types;

// Re-exports
pub use builder::ImageBuilder;
pub use elf::{Disposition, ElfHeader, ProgramHeader, SegmentFlags, SegmentType};
pub use load::{Loader, STACK_PAGE};
pub use types::{LoadError, LoadedImage, SegmentFault};
