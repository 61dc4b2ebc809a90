//! Thread synchronization primitives built around a value-holding event.
//!
//! [`synca::Event`] carries a payload behind a single lock and lets threads
//! wait on it either through guarded waits that re-check the payload or
//! through single shot signal and broadcast waits. [`synca::WaitGroup`] and
//! [`synca::SemWait`] build counting waiters on top of it, and
//! [`polling`] offers interval polling that honours a
//! [`synca::CancelSignal`].

#[macro_use]
mod macros;

pub mod extensions;
pub mod polling;
pub mod synca;
