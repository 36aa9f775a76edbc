/*!
 * Process Lifecycle
 * Waiting on children and tearing a process down at exit
 */

use super::exit_state::ExitState;
use super::types::Process;
use crate::core::errors::Trap;
use crate::core::types::{Pid, ProcessState, KILLED_STATUS, PID_ERROR};
use crate::kernel::Kernel;
use crate::memory::mmu;
use std::sync::Arc;
use tracing::{debug, info};

impl Kernel {
    /// Wait for the child `child` of `process` to exit and return its status
    ///
    /// Returns -1 without blocking if `child` is not a child of `process`, has
    /// already been waited for, or if `process` is already waiting.
    pub fn wait(&self, process: &mut Process, child: Pid) -> i32 {
        if child == PID_ERROR || process.waiting {
            return -1;
        }
        let Some(record) = process.child(child).map(Arc::clone) else {
            return -1;
        };

        {
            let mut inner = record.lock();
            if inner.waited {
                return -1;
            }
            inner.waited = true;
            if inner.alive_count == 1 {
                let status = inner.exit_status;
                drop(inner);
                self.reap_child(process, &record);
                return status;
            }
        }

        debug!(pid = process.pid, child, "Waiting for child");
        process.waiting = true;
        self.set_process_state(process.pid, ProcessState::Waiting);

        // Counting semaphore: an exit that lands after the check above has
        // already left its permit here
        record.exited.down();

        process.waiting = false;
        self.set_process_state(process.pid, ProcessState::Running);
        let status = record.exit_status();
        self.reap_child(process, &record);
        status
    }

    /// Forget a child whose status has been collected
    ///
    /// The child is gone, so this drops the last interest in its record. A
    /// later wait on the same pid finds no child.
    fn reap_child(&self, process: &mut Process, record: &Arc<ExitState>) {
        process
            .children
            .retain(|candidate| !Arc::ptr_eq(candidate, record));
        record.release();
    }

    /// Terminate `process` as `trap` says and release everything it owns
    pub(crate) fn exit_process(&self, mut process: Process, trap: Trap) {
        let pid = process.pid;
        self.set_process_state(pid, ProcessState::Exiting);

        let status = match trap {
            Trap::Exit(status) => status,
            Trap::Halt => KILLED_STATUS,
        };
        process.record.set_exit_status(status);
        if let Trap::Exit(status) = trap {
            self.console()
                .putbuf(format!("{}: exit({})\n", process.name, status).as_bytes());
        }

        if process.record.release() > 0 {
            process.record.exited.up();
        }

        self.release_resources(&mut process);
        self.unregister_process(pid);
        info!(pid, name = %process.name, status, "Process exited");
    }

    /// Close descriptors, let go of children and destroy the address space
    pub(crate) fn release_resources(&self, process: &mut Process) {
        let closed = process.fds.close_all();
        let children = self.detach_children(process);

        // Clear the slot and switch away before the directory goes
        if let Some(space) = process.address_space.take() {
            mmu::activate_kernel();
            space.destroy();
        }
        debug!(pid = process.pid, closed, children, "Process resources released");
    }

    /// Drop this process's interest in each child record
    ///
    /// Children that are still running become orphans; their exit status is
    /// discarded.
    pub(crate) fn detach_children(&self, process: &mut Process) -> usize {
        let count = process.children.len();
        for record in process.children.drain(..) {
            record.release();
        }
        count
    }
}
