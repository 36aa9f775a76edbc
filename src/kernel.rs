/*!
 * Kernel
 *
 * Owns the collaborators every process shares (page pool, file system,
 * console, timer, registered programs) together with the process table and
 * pid allocation. `Kernel` is a cheap handle; clones share one instance.
 */

use crate::core::config::KernelConfig;
use crate::core::errors::KernelError;
use crate::core::types::{KernelResult, Pid, ProcessInfo, ProcessState, PID_ERROR};
use crate::devices::{BufferConsole, Console, Timer};
use crate::memory::PagePool;
use crate::process::{ExitState, Process, ProgramTable};
use crate::vfs::{FileSystem, MemFs};
use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

struct KernelInner {
    config: KernelConfig,
    pool: PagePool,
    fs: Arc<dyn FileSystem>,
    console: Arc<dyn Console>,
    timer: Arc<Timer>,
    programs: ProgramTable,
    processes: DashMap<Pid, ProcessInfo, RandomState>,
    next_pid: AtomicI32,
    halted: Mutex<bool>,
    halt_signal: Condvar,
}

/// Handle to a running kernel
#[derive(Clone)]
pub struct Kernel {
    inner: Arc<KernelInner>,
}

/// Builder for Kernel
pub struct KernelBuilder {
    config: KernelConfig,
    fs: Option<Arc<dyn FileSystem>>,
    console: Option<Arc<dyn Console>>,
}

impl KernelBuilder {
    /// Create a builder with the default configuration
    pub fn new() -> Self {
        Self {
            config: KernelConfig::default(),
            fs: None,
            console: None,
        }
    }

    pub fn with_config(mut self, config: KernelConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `fs` instead of an empty `MemFs`
    pub fn with_file_system(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    /// Use `console` instead of a `BufferConsole`
    pub fn with_console(mut self, console: Arc<dyn Console>) -> Self {
        self.console = Some(console);
        self
    }

    /// Build the kernel, starting the timer ticker if configured
    pub fn build(self) -> KernelResult<Kernel> {
        self.config.validate()?;

        let timer = Timer::new(self.config.timer_freq);
        if self.config.start_ticker {
            timer.start_ticker().map_err(KernelError::Io)?;
        }

        info!(
            user_pages = self.config.user_pool_pages,
            max_open_files = self.config.max_open_files,
            timer_freq = self.config.timer_freq,
            "Kernel initialized"
        );

        Ok(Kernel {
            inner: Arc::new(KernelInner {
                pool: PagePool::new(self.config.user_pool_pages),
                fs: self.fs.unwrap_or_else(|| Arc::new(MemFs::new())),
                console: self
                    .console
                    .unwrap_or_else(|| Arc::new(BufferConsole::new())),
                timer,
                programs: ProgramTable::new(),
                processes: DashMap::with_hasher(RandomState::new()),
                next_pid: AtomicI32::new(1),
                halted: Mutex::new(false),
                halt_signal: Condvar::new(),
                config: self.config,
            }),
        })
    }
}

impl Default for KernelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    pub fn builder() -> KernelBuilder {
        KernelBuilder::new()
    }

    pub fn config(&self) -> &KernelConfig {
        &self.inner.config
    }

    pub fn pool(&self) -> &PagePool {
        &self.inner.pool
    }

    pub fn file_system(&self) -> &Arc<dyn FileSystem> {
        &self.inner.fs
    }

    pub fn console(&self) -> &Arc<dyn Console> {
        &self.inner.console
    }

    pub fn timer(&self) -> &Arc<Timer> {
        &self.inner.timer
    }

    /// Native routines that stand in for the code of loaded images
    pub fn programs(&self) -> &ProgramTable {
        &self.inner.programs
    }

    pub(crate) fn allocate_pid(&self) -> Pid {
        self.inner.next_pid.fetch_add(1, Ordering::Relaxed)
    }

    /// A process context for kernel code that launches and waits on user
    /// programs without being one itself
    ///
    /// It owns no address space and is never entered in the process table.
    pub fn kernel_process(&self) -> Process {
        let pid = self.allocate_pid();
        Process::new(
            pid,
            "kernel",
            PID_ERROR,
            Arc::new(ExitState::new(pid)),
            self.inner.config.max_open_files,
        )
    }

    /// Launch `command_line` and wait for it from a fresh kernel context
    ///
    /// Returns the exit status, or -1 if the program could not be started.
    pub fn run(&self, command_line: &str) -> i32 {
        let mut context = self.kernel_process();
        let pid = self.launch(&mut context, command_line);
        let status = self.wait(&mut context, pid);
        self.detach_children(&mut context);
        status
    }

    pub(crate) fn register_process(&self, info: ProcessInfo) {
        self.inner.processes.insert(info.pid, info);
    }

    pub(crate) fn unregister_process(&self, pid: Pid) {
        self.inner.processes.remove(&pid);
    }

    pub(crate) fn set_process_state(&self, pid: Pid, state: ProcessState) {
        if let Some(mut info) = self.inner.processes.get_mut(&pid) {
            info.state = state;
        }
    }

    /// True while `pid` is a loaded, not yet exited user process
    pub fn is_alive(&self, pid: Pid) -> bool {
        self.inner.processes.contains_key(&pid)
    }

    pub fn process_count(&self) -> usize {
        self.inner.processes.len()
    }

    pub fn process_info(&self, pid: Pid) -> Option<ProcessInfo> {
        self.inner.processes.get(&pid).map(|info| info.clone())
    }

    /// Snapshot of the process table, ordered by pid
    pub fn processes(&self) -> Vec<ProcessInfo> {
        let mut list: Vec<ProcessInfo> = self
            .inner
            .processes
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        list.sort_by_key(|info| info.pid);
        list
    }

    /// Power off: stop the timer, release sleeping processes and wake
    /// everyone in `wait_for_halt`
    pub fn halt(&self) {
        let mut halted = self.inner.halted.lock();
        if !*halted {
            *halted = true;
            info!("Powering off");
            self.inner.timer.power_off();
        }
        self.inner.halt_signal.notify_all();
    }

    pub fn is_halted(&self) -> bool {
        *self.inner.halted.lock()
    }

    /// Block until the kernel halts; returns false on timeout
    pub fn wait_for_halt(&self, timeout: Duration) -> bool {
        let mut halted = self.inner.halted.lock();
        if !*halted {
            self.inner.halt_signal.wait_for(&mut halted, timeout);
        }
        *halted
    }

    /// Stop background activity
    pub fn shutdown(&self) {
        self.inner.timer.stop_ticker();
        info!(processes = self.process_count(), "Kernel shut down");
    }
}
