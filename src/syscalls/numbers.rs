/*!
 * Syscall Numbers
 * Trap numbers and the argument count of each call
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// System call selected by the word at the user stack pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum SyscallNumber {
    Halt = 0,
    Exit = 1,
    Exec = 2,
    Wait = 3,
    Create = 4,
    Remove = 5,
    Open = 6,
    Filesize = 7,
    Read = 8,
    Write = 9,
    Seek = 10,
    Tell = 11,
    Close = 12,
    Sleep = 13,
}

impl SyscallNumber {
    pub const ALL: [SyscallNumber; 14] = [
        SyscallNumber::Halt,
        SyscallNumber::Exit,
        SyscallNumber::Exec,
        SyscallNumber::Wait,
        SyscallNumber::Create,
        SyscallNumber::Remove,
        SyscallNumber::Open,
        SyscallNumber::Filesize,
        SyscallNumber::Read,
        SyscallNumber::Write,
        SyscallNumber::Seek,
        SyscallNumber::Tell,
        SyscallNumber::Close,
        SyscallNumber::Sleep,
    ];

    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }

    pub const fn raw(self) -> u32 {
        self as u32
    }

    /// Argument words that follow the number on the user stack
    pub const fn arg_count(self) -> usize {
        match self {
            SyscallNumber::Halt => 0,
            SyscallNumber::Create | SyscallNumber::Seek => 2,
            SyscallNumber::Read | SyscallNumber::Write => 3,
            _ => 1,
        }
    }

    /// Calls that legitimately block on another thread or on time
    pub const fn may_block(self) -> bool {
        matches!(
            self,
            SyscallNumber::Exec | SyscallNumber::Wait | SyscallNumber::Read | SyscallNumber::Sleep
        )
    }

    pub const fn name(self) -> &'static str {
        match self {
            SyscallNumber::Halt => "halt",
            SyscallNumber::Exit => "exit",
            SyscallNumber::Exec => "exec",
            SyscallNumber::Wait => "wait",
            SyscallNumber::Create => "create",
            SyscallNumber::Remove => "remove",
            SyscallNumber::Open => "open",
            SyscallNumber::Filesize => "filesize",
            SyscallNumber::Read => "read",
            SyscallNumber::Write => "write",
            SyscallNumber::Seek => "seek",
            SyscallNumber::Tell => "tell",
            SyscallNumber::Close => "close",
            SyscallNumber::Sleep => "sleep",
        }
    }
}

impl fmt::Display for SyscallNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
