//! Platform abstraction layer for step measurements.
//!
//! This module provides the clock and memory probe abstractions that sessions take their
//! readings from, the real implementations backed by the operating system or the tracking
//! allocator, and fake implementations for testing.

mod abstractions;
#[cfg(test)]
mod fake;
mod heap;
mod real;

pub use abstractions::{Clock, MemoryProbe, MemoryReading};
#[cfg(test)]
pub(crate) use fake::{FakeClock, FakeMemoryProbe};
pub use heap::HeapMemoryProbe;
pub use real::{ResidentMemoryProbe, SystemClock};
