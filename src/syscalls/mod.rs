/*!
 * Syscalls Module
 * Trap entry, pointer validation and the individual system calls
 */

mod dispatcher;
mod fs;
mod numbers;
mod process;
mod system;
pub mod validate;

// Re-export public API
pub use dispatcher::InterruptFrame;
pub use numbers::SyscallNumber;
