#![cfg(test)]

pub mod counting_waiters;
pub mod event_waits;
pub mod polling;
