/*!
 * Error Types
 * Centralized error handling with thiserror and miette
 */

use miette::Diagnostic;
use thiserror::Error;

pub use crate::core::config::ConfigError;
pub use crate::loader::LoadError;
pub use crate::memory::MemoryError;
pub use crate::process::StackError;
pub use crate::vfs::VfsError;

/// Why a launch request produced no process
#[derive(Error, Debug, Diagnostic)]
pub enum ProcessError {
    #[error("Empty command line")]
    #[diagnostic(
        code(process::empty_command),
        help("The first token of the command line names the program to load.")
    )]
    EmptyCommandLine,

    #[error("Kernel is halted")]
    #[diagnostic(code(process::halted))]
    Halted,

    #[error("Failed to create kernel thread: {0}")]
    #[diagnostic(
        code(process::thread_creation_failed),
        help("The host refused to spawn another thread. Check system limits.")
    )]
    ThreadCreation(#[source] std::io::Error),

    #[error("Failed to load {name}: {source}")]
    #[diagnostic(code(process::load_failed))]
    Load {
        name: String,
        #[source]
        source: LoadError,
    },

    #[error("Arguments for {name} do not fit the initial stack: {source}")]
    #[diagnostic(
        code(process::arguments_too_large),
        help("Shorten the command line; arguments must fit in one stack page.")
    )]
    Arguments {
        name: String,
        #[source]
        source: StackError,
    },
}

/// Unified kernel error type with miette diagnostics
#[derive(Error, Debug, Diagnostic)]
pub enum KernelError {
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("File system error: {0}")]
    Vfs(#[from] VfsError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Process error: {0}")]
    #[diagnostic(transparent)]
    Process(#[from] ProcessError),

    #[error("Configuration error: {0}")]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    #[diagnostic(
        code(kernel::io_error),
        help("Host I/O failed. Check the console and file permissions.")
    )]
    Io(#[from] std::io::Error),
}

/// Transfer of control out of user mode
///
/// Raised by the validator, the dispatcher and faulting user memory accesses,
/// then carried with `?` up to the process thread, which runs exit teardown.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trap {
    /// The process terminates with this status
    #[error("process exited with status {0}")]
    Exit(i32),

    /// The machine powers off; the calling process terminates with it
    #[error("kernel halted")]
    Halt,
}

impl Trap {
    /// Termination for any trust-boundary violation or page fault
    pub const fn killed() -> Self {
        Trap::Exit(crate::core::types::KILLED_STATUS)
    }
}
