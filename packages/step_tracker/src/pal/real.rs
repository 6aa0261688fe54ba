//! Real clock and memory probe implementations backed by the operating system.

use std::time::{Duration, Instant};

use crate::pal::abstractions::{Clock, MemoryProbe, MemoryReading};
use crate::ProbeError;

/// Monotonic clock based on [`Instant`].
///
/// Timestamps are measured from the moment the clock was created.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Creates a clock whose origin is the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Reads the resident set size of the current process.
///
/// On Linux this is taken from `/proc/self/statm`. On other platforms every reading fails
/// with [`ProbeError::Unsupported`]; use [`HeapMemoryProbe`](crate::HeapMemoryProbe) there.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResidentMemoryProbe;

impl MemoryProbe for ResidentMemoryProbe {
    #[cfg(target_os = "linux")]
    fn memory_used(&self) -> Result<MemoryReading, ProbeError> {
        let statm = std::fs::read_to_string("/proc/self/statm")
            .map_err(|source| ProbeError::Io { source })?;

        let resident_pages = parse_statm_resident_pages(&statm)?;

        // SAFETY: sysconf has no preconditions; it only reads a configuration value.
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        let page_size = u64::try_from(page_size).map_err(|e| ProbeError::Malformed {
            detail: format!("invalid page size {page_size}: {e}"),
        })?;

        Ok(MemoryReading::Bytes(
            resident_pages.saturating_mul(page_size),
        ))
    }

    #[cfg(not(target_os = "linux"))]
    fn memory_used(&self) -> Result<MemoryReading, ProbeError> {
        Err(ProbeError::Unsupported {
            probe: "ResidentMemoryProbe",
            reason: "resident set size is only available on Linux",
        })
    }
}

/// Extracts the resident page count, the second field of `/proc/self/statm`.
#[cfg_attr(not(target_os = "linux"), allow(dead_code, reason = "only used on Linux"))]
fn parse_statm_resident_pages(statm: &str) -> Result<u64, ProbeError> {
    let field = statm
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| ProbeError::Malformed {
            detail: format!("expected at least two fields in statm, got '{}'", statm.trim()),
        })?;

    field.parse::<u64>().map_err(|e| ProbeError::Malformed {
        detail: format!("resident page count '{field}' is not a number: {e}"),
    })
}
