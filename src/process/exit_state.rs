/*!
 * Shared Exit State
 *
 * The rendezvous record between a parent and one child. It is created by the
 * parent before the child thread exists and is held by both through an
 * `Arc`; `alive_count` tracks how many of them still care about it.
 */

use crate::core::errors::ProcessError;
use crate::core::sync::Semaphore;
use crate::core::types::{Pid, KILLED_STATUS, PID_ERROR};
use parking_lot::{Mutex, MutexGuard};

/// Fields guarded by the record's lock
#[derive(Debug)]
pub struct ExitInner {
    /// Parties still referencing the record: 1 until the child has loaded,
    /// then 2, then decremented by each side's exit
    pub alive_count: u32,
    pub exit_status: i32,
    pub child_pid: Pid,
    /// Set once a wait has consumed this record
    pub waited: bool,
    /// Why the child failed to load, handed back to the launching parent
    pub load_error: Option<ProcessError>,
}

/// Parent/child exit-state record
#[derive(Debug)]
pub struct ExitState {
    inner: Mutex<ExitInner>,
    /// Released once by the child when loading finished, either way
    pub ready: Semaphore,
    /// Released once by whichever side exits first while the other is alive
    pub exited: Semaphore,
}

impl ExitState {
    pub fn new(child_pid: Pid) -> Self {
        Self {
            inner: Mutex::new(ExitInner {
                alive_count: 1,
                exit_status: KILLED_STATUS,
                child_pid,
                waited: false,
                load_error: None,
            }),
            ready: Semaphore::new(0),
            exited: Semaphore::new(0),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, ExitInner> {
        self.inner.lock()
    }

    pub fn child_pid(&self) -> Pid {
        self.lock().child_pid
    }

    pub fn exit_status(&self) -> i32 {
        self.lock().exit_status
    }

    pub fn set_exit_status(&self, status: i32) {
        self.lock().exit_status = status;
    }

    pub fn alive_count(&self) -> u32 {
        self.lock().alive_count
    }

    /// Second owner: called by the child once its image has loaded
    pub fn attach(&self) {
        self.lock().alive_count += 1;
    }

    /// Drop one owner; returns the remaining count
    pub fn release(&self) -> u32 {
        let mut inner = self.lock();
        inner.alive_count = inner.alive_count.saturating_sub(1);
        inner.alive_count
    }
}

impl Default for ExitState {
    fn default() -> Self {
        Self::new(PID_ERROR)
    }
}
