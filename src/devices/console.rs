/*!
 * Console
 * Keyboard input and text output used by descriptors 0 and 1
 */

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io::{Read, Write};

/// Console device
pub trait Console: Send + Sync {
    /// Next input byte, blocking until one is available
    fn getc(&self) -> u8;

    /// Write a whole buffer as one unit, never interleaved with other writers
    fn putbuf(&self, buf: &[u8]);
}

/// In-memory console with scripted input and captured output
#[derive(Debug, Default)]
pub struct BufferConsole {
    input: Mutex<VecDeque<u8>>,
    input_ready: Condvar,
    output: Mutex<Vec<u8>>,
}

impl BufferConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes for `getc`
    pub fn push_input(&self, bytes: &[u8]) {
        self.input.lock().extend(bytes.iter().copied());
        self.input_ready.notify_all();
    }

    /// Everything written so far
    pub fn output(&self) -> Vec<u8> {
        self.output.lock().clone()
    }

    /// Output decoded lossily as text
    pub fn output_string(&self) -> String {
        String::from_utf8_lossy(&self.output.lock()).into_owned()
    }

    /// Output split into lines
    pub fn output_lines(&self) -> Vec<String> {
        self.output_string().lines().map(str::to_string).collect()
    }
}

impl Console for BufferConsole {
    fn getc(&self) -> u8 {
        let mut input = self.input.lock();
        loop {
            if let Some(byte) = input.pop_front() {
                return byte;
            }
            self.input_ready.wait(&mut input);
        }
    }

    fn putbuf(&self, buf: &[u8]) {
        self.output.lock().extend_from_slice(buf);
    }
}

/// Console backed by the host's stdin and stdout
#[derive(Debug, Default)]
pub struct StdConsole {
    write_lock: Mutex<()>,
}

impl StdConsole {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Console for StdConsole {
    fn getc(&self) -> u8 {
        let mut byte = [0u8; 1];
        match std::io::stdin().lock().read(&mut byte) {
            Ok(1) => byte[0],
            // End of input reads as NUL, like an idle keyboard line
            _ => 0,
        }
    }

    fn putbuf(&self, buf: &[u8]) {
        let _guard = self.write_lock.lock();
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(buf);
        let _ = stdout.flush();
    }
}
