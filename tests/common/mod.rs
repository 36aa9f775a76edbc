/*!
 * Shared Test Harness
 * Boots a kernel with an in-memory file system and a captured console
 */

#![allow(dead_code)]

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use userprog_kernel::{
    BufferConsole, ImageBuilder, Kernel, KernelConfig, MemFs, SegmentFlags, Trap, UserContext,
};

/// Base of the code segment of the first installed program
pub const CODE_BASE: u32 = 0x0804_8000;

/// Distance from an image's code page to its data page
pub const DATA_OFFSET: u32 = 0x0100_0000;

pub struct TestKernel {
    pub kernel: Kernel,
    pub fs: Arc<MemFs>,
    pub console: Arc<BufferConsole>,
    next_entry: std::sync::atomic::AtomicU32,
}

pub fn boot() -> TestKernel {
    boot_with(KernelConfig::default().without_ticker())
}

pub fn boot_with(config: KernelConfig) -> TestKernel {
    let fs = Arc::new(MemFs::new());
    let console = Arc::new(BufferConsole::new());
    let kernel = Kernel::builder()
        .with_config(config)
        .with_file_system(fs.clone())
        .with_console(console.clone())
        .build()
        .unwrap();

    TestKernel {
        kernel,
        fs,
        console,
        next_entry: std::sync::atomic::AtomicU32::new(CODE_BASE),
    }
}

/// A small valid image: one code page at `entry` and one data page above it
pub fn image(entry: u32) -> Vec<u8> {
    ImageBuilder::new(entry)
        .segment(entry, b"\x90\x90\xc3".to_vec(), SegmentFlags::READ | SegmentFlags::EXECUTE)
        .bss(entry + DATA_OFFSET, 0x1000, SegmentFlags::READ | SegmentFlags::WRITE)
        .build()
}

impl TestKernel {
    /// Install `name` as an executable whose code is `main`
    pub fn install<F>(&self, name: &str, main: F) -> u32
    where
        F: Fn(&mut UserContext<'_>) -> Result<i32, Trap> + Send + Sync + 'static,
    {
        let entry = self
            .next_entry
            .fetch_add(0x1000, std::sync::atomic::Ordering::Relaxed);
        self.install_at(name, entry, main);
        entry
    }

    /// Install `name` with its code page at a chosen `entry`
    pub fn install_at<F>(&self, name: &str, entry: u32, main: F)
    where
        F: Fn(&mut UserContext<'_>) -> Result<i32, Trap> + Send + Sync + 'static,
    {
        self.fs.install(name, &image(entry)).unwrap();
        self.kernel.programs().register(entry, main);
    }

    /// Wait until every user process has finished tearing down
    pub fn settle(&self) {
        wait_until(|| self.kernel.process_count() == 0);
    }

    pub fn output(&self) -> String {
        self.console.output_string()
    }

    pub fn lines(&self) -> Vec<String> {
        self.console.output_lines()
    }
}

/// Poll `condition` for up to five seconds
pub fn wait_until(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        thread::sleep(Duration::from_millis(1));
    }
}
