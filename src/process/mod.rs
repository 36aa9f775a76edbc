/*!
 * Process Module
 * User process creation, parent/child rendezvous and teardown
 */

pub mod args;
pub mod exit_state;
pub mod fd_table;
mod launch;
mod lifecycle;
pub mod program;
pub mod types;

// Re-exports
pub use args::{bounded_command_line, build_initial_stack, tokenize, StackBuilder, StackError};
pub use exit_state::{ExitInner, ExitState};
pub use fd_table::FdTable;
pub use program::{ProgramTable, UserContext, UserMain};
pub use types::Process;
