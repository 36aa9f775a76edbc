/*!
 * Process Types
 * Kernel-side state of one user process
 */

use super::exit_state::ExitState;
use super::fd_table::FdTable;
use crate::core::types::{Pid, ProcessInfo, ProcessState};
use crate::memory::AddressSpace;
use std::sync::Arc;

/// A user process, owned by its kernel thread
#[derive(Debug)]
pub struct Process {
    pub pid: Pid,
    /// Program name: the first token of the command line
    pub name: String,
    pub parent: Pid,
    /// Cleared before the space is destroyed during exit
    pub address_space: Option<AddressSpace>,
    pub fds: FdTable,
    /// Record shared with the parent
    pub record: Arc<ExitState>,
    /// Records shared with each child launched by this process
    pub children: Vec<Arc<ExitState>>,
    /// True only while blocked in `wait`
    pub waiting: bool,
}

impl Process {
    pub fn new(
        pid: Pid,
        name: impl Into<String>,
        parent: Pid,
        record: Arc<ExitState>,
        max_open_files: u32,
    ) -> Self {
        Self {
            pid,
            name: name.into(),
            parent,
            address_space: None,
            fds: FdTable::new(max_open_files),
            record,
            children: Vec::new(),
            waiting: false,
        }
    }

    /// Record shared with the child `pid`, if this process launched it
    pub fn child(&self, pid: Pid) -> Option<&Arc<ExitState>> {
        self.children.iter().find(|record| record.child_pid() == pid)
    }

    pub fn info(&self, state: ProcessState) -> ProcessInfo {
        ProcessInfo {
            pid: self.pid,
            name: self.name.clone(),
            parent: self.parent,
            state,
        }
    }
}
