/*!
 * System Syscalls
 * halt, sleep
 */

use crate::core::errors::Trap;
use crate::kernel::Kernel;
use crate::process::Process;
use tracing::info;

impl Kernel {
    /// Power off; the caller does not return to user mode
    pub(super) fn sys_halt(&self, process: &mut Process) -> Result<i32, Trap> {
        info!(pid = process.pid, "halt requested");
        self.halt();
        Err(Trap::Halt)
    }

    pub(super) fn sys_sleep(&self, millis: i32) -> i32 {
        self.timer().msleep(i64::from(millis));
        0
    }
}
