/*!
 * Userprog Kernel Library
 *
 * User-program layer of a teaching kernel, hosted on std threads: ELF
 * loading, process launch/wait/exit and the syscall boundary.
 */

pub mod core;
pub mod devices;
pub mod kernel;
pub mod loader;
pub mod memory;
pub mod monitoring;
pub mod process;
pub mod syscalls;
pub mod vfs;

// Re-exports
pub use crate::core::{
    ConfigError, KernelConfig, KernelError, KernelResult, Pid, ProcessError, ProcessInfo,
    ProcessState, Trap, PID_ERROR,
};
pub use devices::{BufferConsole, Console, StdConsole, Timer};
pub use kernel::{Kernel, KernelBuilder};
pub use loader::{ImageBuilder, LoadError, SegmentFlags};
pub use memory::{AddressSpace, PagePool};
pub use monitoring::init_tracing;
pub use process::{Process, ProgramTable, UserContext};
pub use syscalls::{InterruptFrame, SyscallNumber};
pub use vfs::{FileSystem, MemFs, OpenFile};
