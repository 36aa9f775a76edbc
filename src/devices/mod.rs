/*!
 * Devices Module
 * Console and timer collaborators
 */

pub mod console;
pub mod timer;

pub use console::{BufferConsole, Console, StdConsole};
pub use timer::Timer;
