/*!
 * Syscall Dispatcher
 *
 * Entry point of the syscall trap. The number and its arguments are words on
 * the user stack: `[esp]` is the number, `[esp + 4 * (i + 1)]` argument `i`.
 * Every word is validated before it is read.
 */

use super::numbers::SyscallNumber;
use super::validate::{read_word, validate_range};
use crate::core::errors::Trap;
use crate::core::limits::WORD_SIZE;
use crate::core::types::UserAddr;
use crate::kernel::Kernel;
use crate::monitoring::SyscallSpan;
use crate::process::Process;
use tracing::{debug, warn};

/// Register state saved by the trap
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterruptFrame {
    /// User stack pointer at the time of the trap
    pub esp: UserAddr,
    /// Return value register
    pub eax: u32,
}

/// Most arguments any call takes
const MAX_ARGS: usize = 3;

impl Kernel {
    /// Handle one syscall trap from `process`
    ///
    /// On return `frame.eax` holds the result. An error means the process must
    /// terminate.
    pub fn syscall(&self, process: &mut Process, frame: &mut InterruptFrame) -> Result<(), Trap> {
        let space = process.address_space.as_ref().ok_or_else(Trap::killed)?;

        let raw = read_word(space, frame.esp)?;
        let Some(call) = SyscallNumber::from_raw(raw) else {
            warn!(pid = process.pid, number = raw, "Unknown system call");
            return Err(Trap::killed());
        };

        let argc = call.arg_count();
        let args_start = frame.esp.checked_add(WORD_SIZE).ok_or_else(Trap::killed)?;
        validate_range(space, args_start, argc as u32 * WORD_SIZE)?;

        let mut args = [0u32; MAX_ARGS];
        for (i, arg) in args.iter_mut().take(argc).enumerate() {
            *arg = read_word(space, args_start + i as u32 * WORD_SIZE)?;
        }

        let span = SyscallSpan::new(call, process.pid);
        let _entered = span.enter();
        debug!(?args, "System call");

        let ret = match call {
            SyscallNumber::Halt => self.sys_halt(process)?,
            SyscallNumber::Exit => self.sys_exit(process, args[0] as i32)?,
            SyscallNumber::Exec => self.sys_exec(process, args[0])?,
            SyscallNumber::Wait => self.sys_wait(process, args[0] as i32),
            SyscallNumber::Create => self.sys_create(process, args[0], args[1])?,
            SyscallNumber::Remove => self.sys_remove(process, args[0])?,
            SyscallNumber::Open => self.sys_open(process, args[0])?,
            SyscallNumber::Filesize => self.sys_filesize(process, args[0] as i32),
            SyscallNumber::Read => self.sys_read(process, args[0] as i32, args[1], args[2])?,
            SyscallNumber::Write => self.sys_write(process, args[0] as i32, args[1], args[2])?,
            SyscallNumber::Seek => self.sys_seek(process, args[0] as i32, args[1]),
            SyscallNumber::Tell => self.sys_tell(process, args[0] as i32),
            SyscallNumber::Close => self.sys_close(process, args[0] as i32),
            SyscallNumber::Sleep => self.sys_sleep(args[0] as i32),
        };

        span.record_return(ret);
        frame.eax = ret as u32;
        Ok(())
    }
}
