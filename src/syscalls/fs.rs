/*!
 * File System Syscalls
 * create, remove, open, filesize, read, write, seek, tell, close
 */

use super::validate::{copy_in, copy_out, validate_c_string, validate_range};
use crate::core::errors::Trap;
use crate::core::limits::{STDIN_FILENO, STDOUT_FILENO};
use crate::core::types::{Fd, UserAddr};
use crate::kernel::Kernel;
use crate::process::Process;
use tracing::{debug, warn};

impl Kernel {
    pub(super) fn sys_create(
        &self,
        process: &mut Process,
        path: UserAddr,
        initial_size: u32,
    ) -> Result<i32, Trap> {
        let space = process.address_space.as_ref().ok_or_else(Trap::killed)?;
        let name = validate_c_string(space, path)?;
        match self.file_system().create(&name, initial_size) {
            Ok(()) => Ok(1),
            Err(error) => {
                debug!(pid = process.pid, %error, "create failed");
                Ok(0)
            }
        }
    }

    pub(super) fn sys_remove(&self, process: &mut Process, path: UserAddr) -> Result<i32, Trap> {
        let space = process.address_space.as_ref().ok_or_else(Trap::killed)?;
        let name = validate_c_string(space, path)?;
        Ok(i32::from(self.file_system().remove(&name).is_ok()))
    }

    pub(super) fn sys_open(&self, process: &mut Process, path: UserAddr) -> Result<i32, Trap> {
        // A full table fails before the path is looked at
        if process.fds.is_full() {
            warn!(pid = process.pid, "Descriptor table exhausted");
            return Ok(-1);
        }

        let space = process.address_space.as_ref().ok_or_else(Trap::killed)?;
        let name = validate_c_string(space, path)?;
        let file = match self.file_system().open(&name) {
            Ok(file) => file,
            Err(error) => {
                debug!(pid = process.pid, %error, "open failed");
                return Ok(-1);
            }
        };
        Ok(process.fds.insert(file).unwrap_or(-1))
    }

    pub(super) fn sys_filesize(&self, process: &mut Process, fd: Fd) -> i32 {
        process
            .fds
            .get(fd)
            .map_or(-1, |file| file.length() as i32)
    }

    pub(super) fn sys_read(
        &self,
        process: &mut Process,
        fd: Fd,
        buffer: UserAddr,
        size: u32,
    ) -> Result<i32, Trap> {
        let Process {
            address_space,
            fds,
            ..
        } = process;
        let space = address_space.as_mut().ok_or_else(Trap::killed)?;
        validate_range(space, buffer, size)?;

        if fd == STDIN_FILENO {
            for i in 0..size {
                let byte = [self.console().getc()];
                copy_out(space, buffer + i, &byte)?;
                // Keyboard input is echoed
                self.console().putbuf(&byte);
            }
            return Ok(size as i32);
        }

        let Some(file) = fds.get_mut(fd) else {
            return Ok(-1);
        };
        let mut data = vec![0u8; size as usize];
        let read = file.read(&mut data) as usize;
        copy_out(space, buffer, &data[..read])?;
        Ok(read as i32)
    }

    pub(super) fn sys_write(
        &self,
        process: &mut Process,
        fd: Fd,
        buffer: UserAddr,
        size: u32,
    ) -> Result<i32, Trap> {
        let Process {
            address_space,
            fds,
            ..
        } = process;
        let space = address_space.as_ref().ok_or_else(Trap::killed)?;
        let data = copy_in(space, buffer, size)?;

        if fd == STDOUT_FILENO {
            self.console().putbuf(&data);
            return Ok(size as i32);
        }

        match fds.get_mut(fd) {
            Some(file) => Ok(file.write(&data) as i32),
            None => Ok(-1),
        }
    }

    /// Positions past end of file and unknown descriptors are ignored
    pub(super) fn sys_seek(&self, process: &mut Process, fd: Fd, position: u32) -> i32 {
        if let Some(file) = process.fds.get_mut(fd) {
            if position <= file.length() {
                file.seek(position);
            }
        }
        0
    }

    pub(super) fn sys_tell(&self, process: &mut Process, fd: Fd) -> i32 {
        process.fds.get(fd).map_or(-1, |file| file.tell() as i32)
    }

    pub(super) fn sys_close(&self, process: &mut Process, fd: Fd) -> i32 {
        if !process.fds.close(fd) {
            debug!(pid = process.pid, fd, "close of unopened descriptor");
        }
        0
    }
}
