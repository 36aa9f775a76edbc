/*!
 * Process Launch
 *
 * Parent side: create the shared record, spawn the child's kernel thread and
 * block until the child reports whether its image loaded. Child side: load,
 * build the initial stack, report, then run in user mode until exit.
 */

use super::args::{bounded_command_line, build_initial_stack, tokenize};
use super::exit_state::ExitState;
use super::program::UserContext;
use super::types::Process;
use crate::core::errors::{LoadError, ProcessError, Trap};
use crate::core::types::{Pid, ProcessState, KILLED_STATUS, PID_ERROR};
use crate::kernel::Kernel;
use crate::loader::{LoadedImage, Loader};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use tracing::{info, instrument, warn};

impl Kernel {
    /// Start `command_line` as a child of `parent`
    ///
    /// Blocks until the child has loaded. Returns the child's pid, or
    /// `PID_ERROR` if no process could be started.
    pub fn launch(&self, parent: &mut Process, command_line: &str) -> Pid {
        match self.try_launch(parent, command_line) {
            Ok(pid) => pid,
            Err(error) => {
                warn!(parent = parent.pid, %error, "Launch failed");
                PID_ERROR
            }
        }
    }

    /// Like `launch`, reporting why the child did not start
    #[instrument(skip_all, fields(parent = parent.pid))]
    pub fn try_launch(&self, parent: &mut Process, command_line: &str) -> Result<Pid, ProcessError> {
        if self.is_halted() {
            return Err(ProcessError::Halted);
        }

        let pid = self.allocate_pid();
        let record = Arc::new(ExitState::new(pid));
        let command_line = bounded_command_line(command_line);
        let thread_name = match command_line.split(' ').find(|token| !token.is_empty()) {
            Some(name) => format!("{name}#{pid}"),
            None => format!("process#{pid}"),
        };

        let kernel = self.clone();
        let child_record = Arc::clone(&record);
        let parent_pid = parent.pid;
        thread::Builder::new()
            .name(thread_name)
            .spawn(move || kernel.start_process(pid, parent_pid, child_record, &command_line))
            .map_err(ProcessError::ThreadCreation)?;

        record.ready.down();

        {
            let mut inner = record.lock();
            if inner.alive_count == 1 {
                return Err(inner.load_error.take().unwrap_or(ProcessError::EmptyCommandLine));
            }
        }

        parent.children.push(record);
        Ok(pid)
    }

    /// Body of a new process thread
    fn start_process(&self, pid: Pid, parent: Pid, record: Arc<ExitState>, command_line: &str) {
        let args = tokenize(command_line, self.config().max_args);
        let name = args.first().copied().unwrap_or_default();
        let mut process = Process::new(
            pid,
            name,
            parent,
            Arc::clone(&record),
            self.config().max_open_files,
        );

        let image = match self.load_process(&mut process, &args) {
            Ok(image) => image,
            Err(error) => {
                self.abort_launch(process, error);
                return;
            }
        };

        self.register_process(process.info(ProcessState::Running));
        info!(pid, name = %process.name, parent, argc = args.len(), "Process started");
        record.ready.up();

        let trap = self.enter_user_mode(&mut process, image);
        self.exit_process(process, trap);
    }

    /// Load the image named by `args[0]` and lay out its initial stack
    fn load_process(&self, process: &mut Process, args: &[&str]) -> Result<LoadedImage, ProcessError> {
        if args.is_empty() {
            return Err(ProcessError::EmptyCommandLine);
        }

        let name = process.name.clone();
        let loader = Loader::new(self.file_system().as_ref(), self.pool());
        let image = loader
            .load(&name, &mut process.address_space)
            .map_err(|source| ProcessError::Load {
                name: name.clone(),
                source,
            })?;

        let stack = build_initial_stack(args).map_err(|source| ProcessError::Arguments {
            name: name.clone(),
            source,
        })?;
        if let Some(space) = process.address_space.as_mut() {
            space
                .write(stack.esp(), stack.used())
                .map_err(|source| ProcessError::Load {
                    name: name.clone(),
                    source: LoadError::Stack(source),
                })?;
        }
        process.record.attach();

        Ok(LoadedImage {
            entry: image.entry,
            stack_pointer: stack.esp(),
        })
    }

    /// Failed load: report to the parent and reclaim what was built
    ///
    /// The record's owner count is left alone, which is how the parent
    /// tells failure from success.
    fn abort_launch(&self, mut process: Process, error: ProcessError) {
        if let ProcessError::Load {
            name,
            source: LoadError::Open(_),
        } = &error
        {
            self.console()
                .putbuf(format!("load: {name}: open failed\n").as_bytes());
        }
        warn!(pid = process.pid, name = %process.name, %error, "Load failed");

        process.record.set_exit_status(KILLED_STATUS);
        self.release_resources(&mut process);

        let record = Arc::clone(&process.record);
        drop(process);
        record.lock().load_error = Some(error);
        record.ready.up();
    }

    /// Run the program registered for the image's entry point
    fn enter_user_mode(&self, process: &mut Process, image: LoadedImage) -> Trap {
        let Some(main) = self.programs().get(image.entry) else {
            warn!(pid = process.pid, entry = image.entry, "No code at entry point");
            return Trap::killed();
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut context = UserContext::new(self, process, image.stack_pointer);
            main(&mut context)
        }));

        match outcome {
            Ok(Ok(status)) => Trap::Exit(status),
            Ok(Err(trap)) => trap,
            Err(_) => {
                warn!(pid = process.pid, "User program faulted");
                Trap::killed()
            }
        }
    }
}
