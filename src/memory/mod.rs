/*!
 * Memory Module
 * Page pool, user address spaces and page directory activation
 */

pub mod address_space;
pub mod mmu;
pub mod pool;
pub mod types;

// Re-export for convenience
pub use address_space::AddressSpace;
pub use mmu::SpaceId;
pub use pool::{Frame, PagePool};
pub use types::*;
