/*!
 * Command Lines and the Initial Stack
 *
 * Tokenizes a command line and lays out `argc`/`argv` on the user stack the
 * way the i386 C runtime expects to find them at process entry.
 */

use crate::core::limits::{MAX_COMMAND_LINE, PAGE_SIZE, PHYS_BASE, WORD_SIZE};
use crate::core::types::UserAddr;
use miette::Diagnostic;
use thiserror::Error;

/// Stack construction errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Diagnostic)]
pub enum StackError {
    #[error("initial stack overflows its page: {needed} more bytes with {available} left")]
    #[diagnostic(code(process::stack_overflow))]
    Overflow { needed: usize, available: usize },
}

/// Kernel copy of a command line: ends at the first NUL, then is bounded to
/// one page minus the terminator, cut at a character boundary
pub fn bounded_command_line(command_line: &str) -> String {
    let command_line = command_line
        .split_once('\0')
        .map_or(command_line, |(head, _)| head);
    if command_line.len() <= MAX_COMMAND_LINE {
        return command_line.to_string();
    }
    let mut end = MAX_COMMAND_LINE;
    while !command_line.is_char_boundary(end) {
        end -= 1;
    }
    command_line[..end].to_string()
}

/// Split on spaces, skipping empty tokens and keeping at most `max_args`
pub fn tokenize(command_line: &str, max_args: usize) -> Vec<&str> {
    command_line
        .split(' ')
        .filter(|token| !token.is_empty())
        .take(max_args)
        .collect()
}

/// Downward-growing image of the stack page that ends at `PHYS_BASE`
pub struct StackBuilder {
    page: Box<[u8; PAGE_SIZE]>,
    /// Offset of the lowest used byte within `page`
    cursor: usize,
}

impl StackBuilder {
    pub fn new() -> Self {
        Self {
            page: Box::new([0u8; PAGE_SIZE]),
            cursor: PAGE_SIZE,
        }
    }

    /// Current stack pointer
    pub fn esp(&self) -> UserAddr {
        PHYS_BASE - (PAGE_SIZE - self.cursor) as u32
    }

    /// Push raw bytes; returns their user address
    pub fn push_bytes(&mut self, bytes: &[u8]) -> Result<UserAddr, StackError> {
        if bytes.len() > self.cursor {
            return Err(StackError::Overflow {
                needed: bytes.len(),
                available: self.cursor,
            });
        }
        self.cursor -= bytes.len();
        self.page[self.cursor..self.cursor + bytes.len()].copy_from_slice(bytes);
        Ok(self.esp())
    }

    /// Push a string followed by its terminating NUL
    pub fn push_c_str(&mut self, s: &str) -> Result<UserAddr, StackError> {
        self.push_bytes(&[0])?;
        self.push_bytes(s.as_bytes())
    }

    pub fn push_word(&mut self, word: u32) -> Result<UserAddr, StackError> {
        self.push_bytes(&word.to_le_bytes())
    }

    /// Round the stack pointer down to a word boundary
    pub fn align(&mut self) {
        self.cursor -= self.cursor % WORD_SIZE as usize;
    }

    /// Bytes from the stack pointer up to the top of the page
    pub fn used(&self) -> &[u8] {
        &self.page[self.cursor..]
    }
}

impl Default for StackBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Lay out the process entry stack for `args`
///
/// From the top down: the argument strings in reverse order, padding to a
/// word boundary, a null `argv[argc]`, the `argv` pointers in reverse order,
/// `argv` itself, `argc` and a zero return address.
pub fn build_initial_stack(args: &[&str]) -> Result<StackBuilder, StackError> {
    let mut stack = StackBuilder::new();

    let mut addrs = Vec::with_capacity(args.len());
    for arg in args.iter().rev() {
        addrs.push(stack.push_c_str(arg)?);
    }
    stack.align();

    stack.push_word(0)?;
    for &addr in &addrs {
        stack.push_word(addr)?;
    }
    let argv = stack.esp();
    stack.push_word(argv)?;
    stack.push_word(args.len() as u32)?;
    stack.push_word(0)?;
    Ok(stack)
}
