/*!
 * User Programs
 *
 * The code of a loaded image is a native routine registered under the
 * image's entry point. It runs on the process thread and sees the machine
 * only through `UserContext`: loads and stores through its own page table,
 * and the syscall trap.
 */

use super::types::Process;
use crate::core::errors::Trap;
use crate::core::limits::{PAGE_SIZE, WORD_SIZE};
use crate::core::types::{Fd, Pid, UserAddr};
use crate::kernel::Kernel;
use crate::memory::{is_user_vaddr, pg_round_down, AddressSpace};
use crate::syscalls::{InterruptFrame, SyscallNumber};
use ahash::RandomState;
use dashmap::DashMap;
use std::sync::Arc;

/// Body of a user program
///
/// Returning `Ok(status)` is returning from `main`: the process exits with
/// that status. Errors carry the trap that ended the process.
pub type UserMain = Arc<dyn Fn(&mut UserContext<'_>) -> Result<i32, Trap> + Send + Sync>;

/// Entry point → program routine
#[derive(Default)]
pub struct ProgramTable {
    programs: DashMap<UserAddr, UserMain, RandomState>,
}

impl ProgramTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `main` as the code found at `entry`, replacing any previous one
    pub fn register<F>(&self, entry: UserAddr, main: F)
    where
        F: Fn(&mut UserContext<'_>) -> Result<i32, Trap> + Send + Sync + 'static,
    {
        self.programs.insert(entry, Arc::new(main));
    }

    pub fn get(&self, entry: UserAddr) -> Option<UserMain> {
        self.programs.get(&entry).map(|main| Arc::clone(main.value()))
    }

    pub fn unregister(&self, entry: UserAddr) -> bool {
        self.programs.remove(&entry).is_some()
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

/// User-mode view of a running process
pub struct UserContext<'a> {
    kernel: &'a Kernel,
    process: &'a mut Process,
    entry_esp: UserAddr,
    esp: UserAddr,
}

impl<'a> UserContext<'a> {
    pub(crate) fn new(kernel: &'a Kernel, process: &'a mut Process, esp: UserAddr) -> Self {
        Self {
            kernel,
            process,
            entry_esp: esp,
            esp,
        }
    }

    pub fn pid(&self) -> Pid {
        self.process.pid
    }

    /// Current user stack pointer
    pub fn esp(&self) -> UserAddr {
        self.esp
    }

    pub fn set_esp(&mut self, esp: UserAddr) {
        self.esp = esp;
    }

    fn space(&self) -> Result<&AddressSpace, Trap> {
        self.process.address_space.as_ref().ok_or_else(Trap::killed)
    }

    /// `argv` as laid out on the stack at entry
    pub fn args(&self) -> Result<Vec<String>, Trap> {
        let argc = self.read_u32(self.entry_esp + WORD_SIZE)?;
        let argv = self.read_u32(self.entry_esp + 2 * WORD_SIZE)?;
        (0..argc)
            .map(|i| {
                let ptr = self.read_u32(argv.wrapping_add(i * WORD_SIZE))?;
                self.read_c_str(ptr)
            })
            .collect()
    }

    /// User load; faults on unmapped or kernel addresses
    pub fn read(&self, addr: UserAddr, buf: &mut [u8]) -> Result<(), Trap> {
        self.space()?.read(addr, buf).map_err(|_| Trap::killed())
    }

    pub fn read_u32(&self, addr: UserAddr) -> Result<u32, Trap> {
        self.space()?.read_u32(addr).map_err(|_| Trap::killed())
    }

    pub fn read_c_str(&self, addr: UserAddr) -> Result<String, Trap> {
        let space = self.space()?;
        let mut bytes = Vec::new();
        let mut cursor = addr;
        loop {
            let byte = space.read_byte(cursor).map_err(|_| Trap::killed())?;
            if byte == 0 {
                return Ok(String::from_utf8_lossy(&bytes).into_owned());
            }
            bytes.push(byte);
            cursor = cursor.checked_add(1).ok_or_else(Trap::killed)?;
        }
    }

    /// User store; faults on unmapped, kernel or read-only pages
    pub fn write(&mut self, addr: UserAddr, data: &[u8]) -> Result<(), Trap> {
        let space = self
            .process
            .address_space
            .as_mut()
            .ok_or_else(Trap::killed)?;

        if !data.is_empty() {
            let last = addr
                .checked_add(data.len() as u32 - 1)
                .ok_or_else(Trap::killed)?;
            let mut page = pg_round_down(addr);
            while page <= pg_round_down(last) {
                if !is_user_vaddr(page) || space.is_writable(page) != Some(true) {
                    return Err(Trap::killed());
                }
                match page.checked_add(PAGE_SIZE as u32) {
                    Some(next) => page = next,
                    None => break,
                }
            }
        }
        space.write(addr, data).map_err(|_| Trap::killed())
    }

    /// Push `bytes` below the stack pointer, keeping it word aligned
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Result<UserAddr, Trap> {
        let len = u32::try_from(bytes.len()).map_err(|_| Trap::killed())?;
        let addr = self.esp.checked_sub(len).ok_or_else(Trap::killed)? & !(WORD_SIZE - 1);
        self.write(addr, bytes)?;
        self.esp = addr;
        Ok(addr)
    }

    /// Push a NUL-terminated copy of `s`
    pub fn push_str(&mut self, s: &str) -> Result<UserAddr, Trap> {
        let mut bytes = Vec::with_capacity(s.len() + 1);
        bytes.extend_from_slice(s.as_bytes());
        bytes.push(0);
        self.push_bytes(&bytes)
    }

    /// Reserve `len` zeroed bytes on the stack
    pub fn alloca(&mut self, len: u32) -> Result<UserAddr, Trap> {
        self.push_bytes(&vec![0u8; len as usize])
    }

    /// Trap into the kernel with `number` and `args` pushed on the stack
    ///
    /// The stack pointer is restored afterwards, as the C stubs do.
    pub fn syscall(&mut self, number: u32, args: &[u32]) -> Result<i32, Trap> {
        let saved = self.esp;
        for &arg in args.iter().rev() {
            self.push_bytes(&arg.to_le_bytes())?;
        }
        self.push_bytes(&number.to_le_bytes())?;

        let result = self.syscall_with_esp(self.esp);
        self.esp = saved;
        result
    }

    /// Trap into the kernel with an arbitrary stack pointer
    pub fn syscall_with_esp(&mut self, esp: UserAddr) -> Result<i32, Trap> {
        let mut frame = InterruptFrame { esp, eax: 0 };
        self.kernel.syscall(self.process, &mut frame)?;
        Ok(frame.eax as i32)
    }

    fn call(&mut self, number: SyscallNumber, args: &[u32]) -> Result<i32, Trap> {
        self.syscall(number.raw(), args)
    }

    /// Run `f` with a scratch copy of `s` on the stack, then pop it
    fn with_str<T>(
        &mut self,
        s: &str,
        f: impl FnOnce(&mut Self, UserAddr) -> Result<T, Trap>,
    ) -> Result<T, Trap> {
        let saved = self.esp;
        let addr = self.push_str(s)?;
        let result = f(self, addr);
        self.esp = saved;
        result
    }

    pub fn sys_halt(&mut self) -> Result<i32, Trap> {
        self.call(SyscallNumber::Halt, &[])
    }

    pub fn sys_exit(&mut self, status: i32) -> Result<i32, Trap> {
        self.call(SyscallNumber::Exit, &[status as u32])
    }

    pub fn sys_exec(&mut self, command_line: &str) -> Result<Pid, Trap> {
        self.with_str(command_line, |ctx, addr| {
            ctx.call(SyscallNumber::Exec, &[addr])
        })
    }

    pub fn sys_wait(&mut self, pid: Pid) -> Result<i32, Trap> {
        self.call(SyscallNumber::Wait, &[pid as u32])
    }

    pub fn sys_create(&mut self, name: &str, initial_size: u32) -> Result<bool, Trap> {
        self.with_str(name, |ctx, addr| {
            ctx.call(SyscallNumber::Create, &[addr, initial_size])
                .map(|ret| ret != 0)
        })
    }

    pub fn sys_remove(&mut self, name: &str) -> Result<bool, Trap> {
        self.with_str(name, |ctx, addr| {
            ctx.call(SyscallNumber::Remove, &[addr]).map(|ret| ret != 0)
        })
    }

    pub fn sys_open(&mut self, name: &str) -> Result<Fd, Trap> {
        self.with_str(name, |ctx, addr| ctx.call(SyscallNumber::Open, &[addr]))
    }

    pub fn sys_filesize(&mut self, fd: Fd) -> Result<i32, Trap> {
        self.call(SyscallNumber::Filesize, &[fd as u32])
    }

    pub fn sys_read(&mut self, fd: Fd, buffer: UserAddr, size: u32) -> Result<i32, Trap> {
        self.call(SyscallNumber::Read, &[fd as u32, buffer, size])
    }

    pub fn sys_write(&mut self, fd: Fd, buffer: UserAddr, size: u32) -> Result<i32, Trap> {
        self.call(SyscallNumber::Write, &[fd as u32, buffer, size])
    }

    pub fn sys_seek(&mut self, fd: Fd, position: u32) -> Result<(), Trap> {
        self.call(SyscallNumber::Seek, &[fd as u32, position])
            .map(|_| ())
    }

    pub fn sys_tell(&mut self, fd: Fd) -> Result<i32, Trap> {
        self.call(SyscallNumber::Tell, &[fd as u32])
    }

    pub fn sys_close(&mut self, fd: Fd) -> Result<(), Trap> {
        self.call(SyscallNumber::Close, &[fd as u32]).map(|_| ())
    }

    pub fn sys_sleep(&mut self, millis: i32) -> Result<(), Trap> {
        self.call(SyscallNumber::Sleep, &[millis as u32]).map(|_| ())
    }

    /// Write `text` to the console through descriptor 1
    pub fn print(&mut self, text: &str) -> Result<i32, Trap> {
        let saved = self.esp;
        let result = self
            .push_bytes(text.as_bytes())
            .and_then(|addr| self.sys_write(1, addr, text.len() as u32));
        self.esp = saved;
        result
    }
}
