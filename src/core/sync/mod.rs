/*!
 * Synchronization Primitives
 *
 * Blocking primitives for kernel threads. Rendezvous between a parent and a
 * child (load finished, child exited) is a semaphore released once by one side
 * and downed once by the other; because the count persists, a release that
 * happens before the matching down is never lost.
 */

mod semaphore;

pub use semaphore::Semaphore;
