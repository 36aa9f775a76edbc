/*!
 * Core Types
 * Common types used across the kernel
 */

use serde::{Deserialize, Serialize};

/// Process ID type
///
/// Signed so that the failure sentinel travels through `eax` unchanged.
pub type Pid = i32;

/// Returned by `exec` and `launch` when no process could be created
pub const PID_ERROR: Pid = -1;

/// File descriptor type
pub type Fd = i32;

/// 32-bit user virtual address
pub type UserAddr = u32;

/// Timer ticks since boot
pub type Ticks = i64;

/// Exit status reported for processes killed by the kernel
pub const KILLED_STATUS: i32 = -1;

/// Common result type for kernel operations
pub type KernelResult<T> = Result<T, super::errors::KernelError>;

/// Lifecycle of a user process as recorded in the process table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    /// Image loaded, running in user mode or inside a syscall
    Running,
    /// Blocked in `wait` on one of its children
    Waiting,
    /// Tearing down resources after `exit`
    Exiting,
}

/// Snapshot of a process table entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: Pid,
    pub name: String,
    pub parent: Pid,
    pub state: ProcessState,
}
