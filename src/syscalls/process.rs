/*!
 * Process Syscalls
 * exit, exec, wait
 */

use super::validate::validate_c_string;
use crate::core::errors::Trap;
use crate::core::types::{Pid, UserAddr};
use crate::kernel::Kernel;
use crate::process::Process;

impl Kernel {
    pub(super) fn sys_exit(&self, _process: &mut Process, status: i32) -> Result<i32, Trap> {
        Err(Trap::Exit(status))
    }

    pub(super) fn sys_exec(&self, process: &mut Process, command_line: UserAddr) -> Result<i32, Trap> {
        let space = process.address_space.as_ref().ok_or_else(Trap::killed)?;
        let command_line = validate_c_string(space, command_line)?;
        Ok(self.launch(process, &command_line))
    }

    pub(super) fn sys_wait(&self, process: &mut Process, child: Pid) -> i32 {
        self.wait(process, child)
    }
}
