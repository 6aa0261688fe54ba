//! Clock and memory probe trait definitions.

use std::fmt::Debug;
use std::time::Duration;

use crate::ProbeError;

/// Supplies monotonic timestamps for measuring step durations.
///
/// Timestamps are expressed as the time elapsed since an arbitrary origin fixed by the clock.
/// Consecutive calls must never go backwards.
///
/// # Examples
///
/// ```
/// use std::sync::atomic::{self, AtomicU64};
/// use std::time::Duration;
///
/// use step_tracker::{Clock, Session};
///
/// /// Advances by one second on every reading.
/// #[derive(Debug, Default)]
/// struct TickingClock {
///     ticks: AtomicU64,
/// }
///
/// impl Clock for TickingClock {
///     fn now(&self) -> Duration {
///         Duration::from_secs(self.ticks.fetch_add(1, atomic::Ordering::Relaxed))
///     }
/// }
///
/// let session = Session::builder().clock(TickingClock::default()).build();
/// ```
pub trait Clock: Debug + Send + Sync + 'static {
    /// Gets the current timestamp.
    fn now(&self) -> Duration;
}

/// Supplies readings of the memory used by the current process.
///
/// A reading may be an approximation, such as the resident set size or the number of live
/// heap bytes. Only differences between readings are reported, so the absolute baseline
/// does not matter.
pub trait MemoryProbe: Debug + Send + Sync + 'static {
    /// Takes a reading of the memory currently in use.
    ///
    /// # Errors
    ///
    /// Returns a [`ProbeError`] if no reading can be taken.
    fn memory_used(&self) -> Result<MemoryReading, ProbeError>;
}

/// A reading taken by a [`MemoryProbe`].
///
/// Some probes gather memory usage from multiple sources at once (for example, one counter
/// per thread). Such batch readings are reduced to a single value by summation.
#[derive(Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum MemoryReading {
    /// A single value covering the entire process.
    Bytes(u64),

    /// One signed value per source. The process-wide value is their sum.
    Batch(Vec<i64>),
}

impl MemoryReading {
    /// The number of bytes represented by this reading.
    ///
    /// Batch readings are summed, never averaged, so that every measured allocation is
    /// accounted for exactly once.
    #[must_use]
    pub fn total(&self) -> i64 {
        match self {
            Self::Bytes(bytes) => i64::try_from(*bytes).unwrap_or(i64::MAX),
            Self::Batch(parts) => parts
                .iter()
                .fold(0_i64, |total, part| total.saturating_add(*part)),
        }
    }
}
