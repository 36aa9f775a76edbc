/*!
 * MMU Activation
 *
 * Tracks which page directory the current kernel thread has loaded. `None`
 * means only the kernel's own mappings are active.
 */

use std::cell::Cell;

/// Identity of an address space's page directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpaceId(pub(crate) u64);

thread_local! {
    static ACTIVE: Cell<Option<SpaceId>> = const { Cell::new(None) };
}

/// Load a process page directory on this thread
pub fn activate(id: SpaceId) {
    ACTIVE.with(|active| active.set(Some(id)));
}

/// Switch this thread back to the kernel-only page directory
pub fn activate_kernel() {
    ACTIVE.with(|active| active.set(None));
}

/// Page directory currently loaded on this thread
pub fn active() -> Option<SpaceId> {
    ACTIVE.with(Cell::get)
}
